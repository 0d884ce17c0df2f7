//! Port traits through which the domain reaches the outside world.

pub mod config_port;
pub mod data_port;
pub mod report_port;
pub mod trade_store_port;
