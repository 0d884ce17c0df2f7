//! Performance metrics derived from a finished run.

use serde::{Deserialize, Serialize};

use super::ledger::{Ledger, Tally};
use super::position::ExecutedTrade;

/// Round to cents.
///
/// Rounds the exact binary value with ties to even, so `10.125` becomes
/// `10.12` and `2.505` (stored just below the tie) becomes `2.5`.
pub fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub trade: usize,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_profit: f64,
    pub drawdown_max: f64,
    pub winrate: f64,
    pub nr_trades: usize,
    /// `None` when there were trades but no losses (unbounded ratio).
    pub profit_factor: Option<f64>,
    pub expectancy: f64,
    pub balance_curve: Vec<BalancePoint>,
}

impl Metrics {
    pub fn compute(tally: &Tally, equity_curve: &[f64]) -> Self {
        let nr_trades = tally.nr_trades;

        let winrate = if nr_trades > 0 {
            tally.wins as f64 / nr_trades as f64 * 100.0
        } else {
            0.0
        };

        let profit_factor = if nr_trades == 0 {
            Some(0.0)
        } else if tally.loss_sum == 0.0 {
            None
        } else {
            Some(round2(tally.profit_sum / tally.loss_sum))
        };

        let expectancy = if nr_trades > 0 {
            tally.total_profit / nr_trades as f64
        } else {
            0.0
        };

        let balance_curve = equity_curve
            .iter()
            .enumerate()
            .map(|(trade, &balance)| BalancePoint {
                trade,
                balance: round2(balance),
            })
            .collect();

        Metrics {
            total_profit: round2(tally.total_profit),
            drawdown_max: round2(compute_drawdown(equity_curve)),
            winrate: round2(winrate),
            nr_trades,
            profit_factor,
            expectancy: round2(expectancy),
            balance_curve,
        }
    }

    pub fn from_ledger(ledger: &Ledger) -> Self {
        Metrics::compute(&ledger.tally, &ledger.equity_curve)
    }

    /// Recompute from a stored trade list and its equity curve.
    pub fn from_trades(trades: &[ExecutedTrade], equity_curve: &[f64]) -> Self {
        Metrics::compute(&Tally::from_trades(trades), equity_curve)
    }
}

/// Largest fall from a running peak, in account currency.
pub fn compute_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &balance in equity_curve {
        peak = peak.max(balance);
        max_dd = max_dd.max(peak - balance);
    }
    max_dd
}
