//! Core domain types and logic.

pub mod bar;
pub mod signal;
pub mod instrument;
pub mod position;
pub mod indicator_helpers;
pub mod stop_distance;
pub mod ledger;
pub mod metrics;
pub mod simulator;
pub mod strategy;
pub mod backtest;
pub mod config_validation;
pub mod error;
