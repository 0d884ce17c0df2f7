//! Built-in signal generators.
//!
//! Strategies are a closed set selected by their type name. Each one turns a
//! bar series plus numeric parameters into a time-ordered signal list.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::bar::PriceBar;
use crate::domain::error::TradesimError;
use crate::domain::indicator_helpers::calc_sma;
use crate::domain::signal::{Action, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyType {
    /// Fast SMA crossing the slow SMA.
    SmaCross,
    /// Close breaking the prior `lookback`-bar high or low.
    Breakout,
}

impl StrategyType {
    pub const ALL: [StrategyType; 2] = [StrategyType::SmaCross, StrategyType::Breakout];

    pub fn name(self) -> &'static str {
        match self {
            StrategyType::SmaCross => "sma_cross",
            StrategyType::Breakout => "breakout",
        }
    }

    /// Parameter keys this strategy reads, with their defaults.
    pub fn defaults(self) -> &'static [(&'static str, f64)] {
        match self {
            StrategyType::SmaCross => &[("fast", 10.0), ("slow", 30.0)],
            StrategyType::Breakout => &[("lookback", 20.0)],
        }
    }

    /// `key` from `params`, falling back to its entry in [`defaults`].
    ///
    /// [`defaults`]: StrategyType::defaults
    pub fn period(self, params: &StrategyParams, key: &str) -> Result<usize, TradesimError> {
        let default = self
            .defaults()
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| *value as usize)
            .ok_or_else(|| invalid_param(key, "not a parameter of this strategy"))?;
        params.period(key, default)
    }

    pub fn validate(self, params: &StrategyParams) -> Result<(), TradesimError> {
        match self {
            StrategyType::SmaCross => {
                let fast = self.period(params, "fast")?;
                let slow = self.period(params, "slow")?;
                if fast >= slow {
                    return Err(invalid_param("fast", "fast must be shorter than slow"));
                }
                Ok(())
            }
            StrategyType::Breakout => self.period(params, "lookback").map(|_| ()),
        }
    }

    pub fn generate_signals(
        self,
        bars: &[PriceBar],
        params: &StrategyParams,
    ) -> Result<Vec<Signal>, TradesimError> {
        self.validate(params)?;
        let signals = match self {
            StrategyType::SmaCross => sma_cross(
                bars,
                self.period(params, "fast")?,
                self.period(params, "slow")?,
            ),
            StrategyType::Breakout => breakout(bars, self.period(params, "lookback")?),
        };
        Ok(signals)
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for StrategyType {
    type Err = TradesimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        StrategyType::ALL
            .into_iter()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| TradesimError::UnknownStrategy {
                name: s.trim().to_string(),
            })
    }
}

fn invalid_param(key: &str, reason: &str) -> TradesimError {
    TradesimError::ConfigInvalid {
        section: "strategy".into(),
        key: key.into(),
        reason: reason.into(),
    }
}

/// Numeric strategy parameters keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyParams(BTreeMap<String, f64>);

impl StrategyParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: f64) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn insert(&mut self, key: &str, value: f64) {
        self.0.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    /// A positive whole-number period.
    pub fn period(&self, key: &str, default: usize) -> Result<usize, TradesimError> {
        match self.get(key) {
            None => Ok(default),
            Some(v) if v.is_finite() && v >= 1.0 && v.fract() == 0.0 => Ok(v as usize),
            Some(_) => Err(invalid_param(key, "must be a positive whole number")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub strategy_type: StrategyType,
    pub parameters: StrategyParams,
}

impl Strategy {
    pub fn generate_signals(&self, bars: &[PriceBar]) -> Result<Vec<Signal>, TradesimError> {
        self.strategy_type.generate_signals(bars, &self.parameters)
    }
}

fn sma_cross(bars: &[PriceBar], fast: usize, slow: usize) -> Vec<Signal> {
    let fast_sma = calc_sma(bars, fast);
    let slow_sma = calc_sma(bars, slow);

    let spread: Vec<Option<f64>> = fast_sma
        .iter()
        .zip(&slow_sma)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    (1..bars.len())
        .filter_map(|i| {
            let (prev, curr) = (spread[i - 1]?, spread[i]?);
            let action = if prev <= 0.0 && curr > 0.0 {
                Action::Buy
            } else if prev >= 0.0 && curr < 0.0 {
                Action::Sell
            } else {
                return None;
            };
            Some(Signal::new(bars[i].timestamp, action, bars[i].close))
        })
        .collect()
}

fn breakout(bars: &[PriceBar], lookback: usize) -> Vec<Signal> {
    let mut signals = Vec::new();
    let mut last: Option<Action> = None;

    for i in lookback..bars.len() {
        let window = &bars[i - lookback..i];
        let highest = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let bar = &bars[i];

        let action = if bar.close > highest {
            Action::Buy
        } else if bar.close < lowest {
            Action::Sell
        } else {
            continue;
        };

        if last != Some(action) {
            signals.push(Signal::new(bar.timestamp, action, bar.close));
            last = Some(action);
        }
    }
    signals
}
