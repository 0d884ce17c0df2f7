//! Running account state threaded through a simulation.

use super::position::ExecutedTrade;

/// Win/loss counters and sums over closed trades.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    pub nr_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub total_profit: f64,
    pub profit_sum: f64,
    /// Sum of absolute losses.
    pub loss_sum: f64,
}

impl Tally {
    pub fn record(&mut self, profit: f64) {
        self.nr_trades += 1;
        self.total_profit += profit;
        if profit > 0.0 {
            self.wins += 1;
            self.profit_sum += profit;
        } else if profit < 0.0 {
            self.losses += 1;
            self.loss_sum += profit.abs();
        }
    }

    pub fn from_trades(trades: &[ExecutedTrade]) -> Self {
        let mut tally = Tally::default();
        for trade in trades {
            tally.record(trade.profit);
        }
        tally
    }
}

/// Equity, equity curve and tally for one run.
///
/// The curve is seeded with the initial balance and grows by one point per
/// recorded trade.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    pub initial_balance: f64,
    pub equity: f64,
    pub equity_curve: Vec<f64>,
    pub tally: Tally,
}

impl Ledger {
    pub fn new(initial_balance: f64) -> Self {
        Ledger {
            initial_balance,
            equity: initial_balance,
            equity_curve: vec![initial_balance],
            tally: Tally::default(),
        }
    }

    pub fn record(&mut self, profit: f64) {
        self.equity += profit;
        self.equity_curve.push(self.equity);
        self.tally.record(profit);
    }

    /// Rebuild a ledger from stored trades.
    pub fn replay(initial_balance: f64, trades: &[ExecutedTrade]) -> Self {
        let mut ledger = Ledger::new(initial_balance);
        for trade in trades {
            ledger.record(trade.profit);
        }
        ledger
    }
}
