//! Instrument classification for pip sizing.

use std::fmt;

/// Default stop distance, in pips, when no volatility estimate is available.
pub const DEFAULT_STOP_PIPS: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentClass {
    Gold,
    Silver,
    Crypto,
    AsianFx,
    StandardFx,
    Other,
}

impl InstrumentClass {
    /// Classify a symbol. Matching is case-insensitive and the first rule
    /// that matches wins.
    pub fn classify(symbol: &str) -> Self {
        let s = symbol.to_uppercase();
        let six_letter_pair = s.chars().count() == 6 && s.chars().all(char::is_alphabetic);

        if s.starts_with("XAU") || s.starts_with("GOLD") {
            InstrumentClass::Gold
        } else if s.starts_with("XAG") || s.starts_with("SILVER") {
            InstrumentClass::Silver
        } else if (s.ends_with("USDT") || s.ends_with("USD")) && !six_letter_pair {
            InstrumentClass::Crypto
        } else if s.ends_with("JPY") || s.ends_with("JPT") || s.ends_with("HKD") {
            InstrumentClass::AsianFx
        } else if six_letter_pair {
            InstrumentClass::StandardFx
        } else {
            InstrumentClass::Other
        }
    }

    pub fn pip_size(self) -> f64 {
        match self {
            InstrumentClass::Gold => 0.1,
            InstrumentClass::Silver | InstrumentClass::Crypto | InstrumentClass::AsianFx => 0.01,
            InstrumentClass::StandardFx | InstrumentClass::Other => 0.0001,
        }
    }
}

impl fmt::Display for InstrumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstrumentClass::Gold => "gold",
            InstrumentClass::Silver => "silver",
            InstrumentClass::Crypto => "crypto",
            InstrumentClass::AsianFx => "asian-fx",
            InstrumentClass::StandardFx => "fx",
            InstrumentClass::Other => "other",
        };
        write!(f, "{name}")
    }
}

pub fn pip_size(symbol: &str) -> f64 {
    InstrumentClass::classify(symbol).pip_size()
}

/// Stop distance used when the estimator has nothing better.
pub fn default_stop_distance(symbol: &str) -> f64 {
    DEFAULT_STOP_PIPS * pip_size(symbol)
}
