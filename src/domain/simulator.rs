//! Bar-by-bar trade simulation.
//!
//! A run is a fold over bar indices. Each step first checks the open position
//! against its stop-loss and take-profit, then consumes at most one signal.
//! Whatever is still open after the last bar is closed at its close price.
//!
//! Sizing is risk based: a stop-loss costs `risk_per_trade` percent of the
//! equity at settlement, a take-profit earns that amount times the
//! risk-reward ratio, and any other exit earns in proportion to how far price
//! moved relative to the stop distance.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::bar::PriceBar;
use super::error::SimulationError;
use super::ledger::Ledger;
use super::metrics::{round2, Metrics};
use super::position::{ExecutedTrade, ExitReason, LevelHit, Position};
use super::signal::Signal;
use super::stop_distance;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub initial_balance: f64,
    /// Percent of equity risked per trade, in `(0, 100]`.
    pub risk_per_trade: f64,
    pub risk_reward_ratio: f64,
    /// Upper bound on the number of bars a run may process.
    pub max_candles: Option<usize>,
}

impl SimulationConfig {
    pub fn new(initial_balance: f64, risk_per_trade: f64, risk_reward_ratio: f64) -> Self {
        SimulationConfig {
            initial_balance,
            risk_per_trade,
            risk_reward_ratio,
            max_candles: None,
        }
    }

    pub fn with_max_candles(mut self, limit: usize) -> Self {
        self.max_candles = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        let invalid = |reason: &str| {
            Err(SimulationError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if !self.initial_balance.is_finite() || self.initial_balance <= 0.0 {
            return invalid("initial_balance must be positive");
        }
        if !self.risk_per_trade.is_finite()
            || self.risk_per_trade <= 0.0
            || self.risk_per_trade > 100.0
        {
            return invalid("risk_per_trade must be in (0, 100]");
        }
        if !self.risk_reward_ratio.is_finite() || self.risk_reward_ratio <= 0.0 {
            return invalid("risk_reward_ratio must be positive");
        }
        Ok(())
    }

    pub fn risk_amount(&self, equity: f64) -> f64 {
        equity * (self.risk_per_trade / 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub executed_trades: Vec<ExecutedTrade>,
    pub metrics: Metrics,
    /// Unrounded balances, seeded with the initial balance.
    pub equity_curve: Vec<f64>,
}

/// Profit for closing `position` at `exit_price`, sized from current `equity`.
pub fn settle_profit(
    position: &Position,
    exit_price: f64,
    hit: Option<LevelHit>,
    equity: f64,
    config: &SimulationConfig,
) -> f64 {
    let risk_amount = config.risk_amount(equity);

    match hit {
        Some(LevelHit::TakeProfit) => round2(risk_amount * config.risk_reward_ratio),
        Some(LevelHit::StopLoss) => round2(-risk_amount),
        None => {
            let stop_distance = position.stop_distance();
            if stop_distance <= 0.0 {
                return 0.0;
            }
            let rr_achieved = (position.favorable_move(exit_price) / stop_distance)
                .clamp(-1.0, config.risk_reward_ratio);
            round2(risk_amount * rr_achieved)
        }
    }
}

/// Read-only inputs shared by every step of a run.
struct Run<'a> {
    bars: &'a [PriceBar],
    signals: &'a [Signal],
    symbol: &'a str,
    config: &'a SimulationConfig,
}

impl Run<'_> {
    fn open(&self, signal: &Signal, index: usize) -> Position {
        let sl_distance = stop_distance::estimate(
            signal.price,
            self.bars,
            index,
            self.symbol,
            signal.action,
        );
        let position = Position::open(
            signal.action,
            signal.price,
            index,
            sl_distance,
            self.config.risk_reward_ratio,
        );
        debug!(
            index,
            action = %position.action,
            entry = position.entry_price,
            sl = position.sl_price,
            tp = position.tp_price,
            "opened position"
        );
        position
    }
}

/// Accumulator threaded through the fold.
struct RunState {
    position: Option<Position>,
    next_signal: usize,
    trades: Vec<ExecutedTrade>,
    ledger: Ledger,
}

impl RunState {
    fn new(initial_balance: f64) -> Self {
        RunState {
            position: None,
            next_signal: 0,
            trades: Vec::new(),
            ledger: Ledger::new(initial_balance),
        }
    }

    fn step(mut self, run: &Run<'_>, index: usize) -> Self {
        let bar = &run.bars[index];

        if let Some(position) = self.position.take() {
            let window = &run.bars[position.entry_index + 1..=index];
            match position.first_level_hit(window) {
                Some(hit) => self.close(run, position, index, bar.close, hit.into()),
                None => self.position = Some(position),
            }
        }

        let due = run
            .signals
            .get(self.next_signal)
            .filter(|signal| signal.timestamp <= bar.timestamp);

        if let Some(signal) = due {
            self.position = match self.position.take() {
                None => Some(run.open(signal, index)),
                Some(position) if position.action != signal.action => {
                    self.close(run, position, index, signal.price, ExitReason::Signal);
                    Some(run.open(signal, index))
                }
                Some(position) => Some(position),
            };
            self.next_signal += 1;
        }

        self
    }

    fn finish(mut self, run: &Run<'_>) -> Self {
        if let (Some(position), Some(last)) = (self.position.take(), run.bars.len().checked_sub(1))
        {
            let exit_price = run.bars[last].close;
            self.close(run, position, last, exit_price, ExitReason::EndOfData);
        }
        self
    }

    fn close(
        &mut self,
        run: &Run<'_>,
        position: Position,
        exit_index: usize,
        exit_price: f64,
        reason: ExitReason,
    ) {
        let profit = settle_profit(
            &position,
            exit_price,
            reason.level_hit(),
            self.ledger.equity,
            run.config,
        );

        let trade = ExecutedTrade {
            entry_index: position.entry_index,
            exit_index,
            entry_action: position.action,
            exit_action: position.action.opposite(),
            entry_price: position.entry_price,
            exit_price,
            sl_price: position.sl_price,
            tp_price: position.tp_price,
            profit,
            pips: (position.entry_price - exit_price).abs(),
            open_timestamp: run.bars[position.entry_index].timestamp,
            close_timestamp: run.bars[exit_index].timestamp,
            exit_reason: reason,
        };
        debug!(
            entry_index = trade.entry_index,
            exit_index,
            ?reason,
            exit = exit_price,
            profit,
            "closed position"
        );

        self.ledger.record(profit);
        self.trades.push(trade);
    }
}

/// Simulate `signals` against `bars` for `symbol`.
///
/// Bars and signals must be sorted by timestamp. Empty inputs produce zero
/// trades.
pub fn simulate(
    bars: &[PriceBar],
    signals: &[Signal],
    symbol: &str,
    config: &SimulationConfig,
) -> Result<SimulationOutput, SimulationError> {
    config.validate()?;
    if let Some(limit) = config.max_candles {
        if bars.len() > limit {
            return Err(SimulationError::CandleLimitExceeded {
                bars: bars.len(),
                limit,
            });
        }
    }

    let run = Run {
        bars,
        signals,
        symbol,
        config,
    };

    let state = (0..bars.len())
        .fold(RunState::new(config.initial_balance), |state, index| {
            state.step(&run, index)
        })
        .finish(&run);

    let metrics = Metrics::from_ledger(&state.ledger);
    info!(
        symbol,
        bars = bars.len(),
        signals = signals.len(),
        trades = metrics.nr_trades,
        total_profit = metrics.total_profit,
        "simulation complete"
    );

    Ok(SimulationOutput {
        executed_trades: state.trades,
        metrics,
        equity_curve: state.ledger.equity_curve,
    })
}
