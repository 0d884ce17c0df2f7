//! Open position and executed trade records.

use serde::{Deserialize, Serialize};

use super::bar::PriceBar;
use super::signal::Action;

/// Which protective level a bar touched first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelHit {
    StopLoss,
    TakeProfit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    /// Closed by an opposing signal.
    Signal,
    /// Force-closed on the final bar.
    EndOfData,
}

impl ExitReason {
    pub fn level_hit(self) -> Option<LevelHit> {
        match self {
            ExitReason::TakeProfit => Some(LevelHit::TakeProfit),
            ExitReason::StopLoss => Some(LevelHit::StopLoss),
            ExitReason::Signal | ExitReason::EndOfData => None,
        }
    }
}

impl From<LevelHit> for ExitReason {
    fn from(hit: LevelHit) -> Self {
        match hit {
            LevelHit::StopLoss => ExitReason::StopLoss,
            LevelHit::TakeProfit => ExitReason::TakeProfit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub action: Action,
    pub entry_price: f64,
    pub entry_index: usize,
    pub sl_price: f64,
    pub tp_price: f64,
}

impl Position {
    /// Build a position whose stop sits `sl_distance` away from `entry_price`
    /// and whose target sits `sl_distance * risk_reward_ratio` away.
    pub fn open(
        action: Action,
        entry_price: f64,
        entry_index: usize,
        sl_distance: f64,
        risk_reward_ratio: f64,
    ) -> Self {
        let tp_distance = sl_distance * risk_reward_ratio;
        let (sl_price, tp_price) = match action {
            Action::Buy => (entry_price - sl_distance, entry_price + tp_distance),
            Action::Sell => (entry_price + sl_distance, entry_price - tp_distance),
        };
        Position {
            action,
            entry_price,
            entry_index,
            sl_price,
            tp_price,
        }
    }

    pub fn touches_stop_loss(&self, bar: &PriceBar) -> bool {
        match self.action {
            Action::Buy => bar.low <= self.sl_price,
            Action::Sell => bar.high >= self.sl_price,
        }
    }

    pub fn touches_take_profit(&self, bar: &PriceBar) -> bool {
        match self.action {
            Action::Buy => bar.high >= self.tp_price,
            Action::Sell => bar.low <= self.tp_price,
        }
    }

    /// Resolve the level hit inside one bar.
    ///
    /// When both levels are inside the bar, the one closer to the open wins;
    /// an exact tie goes to take-profit.
    pub fn level_hit(&self, bar: &PriceBar) -> Option<LevelHit> {
        match (self.touches_stop_loss(bar), self.touches_take_profit(bar)) {
            (true, true) => {
                if (bar.open - self.sl_price).abs() < (bar.open - self.tp_price).abs() {
                    Some(LevelHit::StopLoss)
                } else {
                    Some(LevelHit::TakeProfit)
                }
            }
            (true, false) => Some(LevelHit::StopLoss),
            (false, true) => Some(LevelHit::TakeProfit),
            (false, false) => None,
        }
    }

    /// First level hit across `bars`, in order.
    pub fn first_level_hit(&self, bars: &[PriceBar]) -> Option<LevelHit> {
        bars.iter().find_map(|bar| self.level_hit(bar))
    }

    /// Distance from entry to stop, positive when the stop is on the losing side.
    pub fn stop_distance(&self) -> f64 {
        match self.action {
            Action::Buy => self.entry_price - self.sl_price,
            Action::Sell => self.sl_price - self.entry_price,
        }
    }

    /// Price move in the position's favour if closed at `exit_price`.
    pub fn favorable_move(&self, exit_price: f64) -> f64 {
        match self.action {
            Action::Buy => exit_price - self.entry_price,
            Action::Sell => self.entry_price - exit_price,
        }
    }
}

/// A closed trade. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedTrade {
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_action: Action,
    pub exit_action: Action,
    pub entry_price: f64,
    pub exit_price: f64,
    pub sl_price: f64,
    pub tp_price: f64,
    pub profit: f64,
    pub pips: f64,
    pub open_timestamp: i64,
    pub close_timestamp: i64,
    pub exit_reason: ExitReason,
}
