//! Dynamic stop-loss distance estimation.
//!
//! Three independent heuristics each propose a distance from entry to stop:
//!
//! - volatility: ATR(14) at the entry bar, x1.5
//! - structure: distance to the swing low (BUY) or swing high (SELL) of the
//!   ten bars before entry
//! - range percentile: 75th percentile of `high - low` over the thirty bars
//!   ending at entry, x1.2
//!
//! The widest valid candidate wins. A heuristic that cannot produce a finite,
//! positive distance drops out; if all drop out, or the entry index leaves no
//! history to look at, the symbol's default of twenty pips is used.

use tracing::trace;

use super::bar::PriceBar;
use super::indicator_helpers::{atr_at, percentile};
use super::instrument::default_stop_distance;
use super::signal::Action;

pub const ATR_PERIOD: usize = 14;
pub const ATR_MULTIPLIER: f64 = 1.5;
pub const STRUCTURE_LOOKBACK: usize = 10;
pub const RANGE_WINDOW: usize = 30;
pub const RANGE_PERCENTILE: f64 = 75.0;
pub const RANGE_MULTIPLIER: f64 = 1.2;

/// Stop distance for an entry at `entry_price` on bar `entry_index`.
///
/// Always returns a positive distance.
pub fn estimate(
    entry_price: f64,
    bars: &[PriceBar],
    entry_index: usize,
    symbol: &str,
    action: Action,
) -> f64 {
    if bars.is_empty() || entry_index == 0 || entry_index >= bars.len() {
        return default_stop_distance(symbol);
    }

    let atr = atr_distance(bars, entry_index);
    let structure = structure_distance(entry_price, bars, entry_index, action);
    let range = range_percentile_distance(bars, entry_index);
    trace!(entry_index, ?atr, ?structure, ?range, "stop distance candidates");

    [atr, structure, range]
        .into_iter()
        .flatten()
        .filter(|d| is_valid(*d))
        .reduce(f64::max)
        .unwrap_or_else(|| default_stop_distance(symbol))
}

fn is_valid(distance: f64) -> bool {
    distance.is_finite() && distance > 0.0
}

/// ATR(14) at `entry_index`, scaled. `None` before the ATR has warmed up.
pub fn atr_distance(bars: &[PriceBar], entry_index: usize) -> Option<f64> {
    atr_at(bars, entry_index, ATR_PERIOD)
        .filter(|atr| is_valid(*atr))
        .map(|atr| atr * ATR_MULTIPLIER)
}

/// Distance from entry to the recent swing extreme on the stop side.
///
/// Floored at zero when price is already beyond the extreme; `None` when
/// there are no bars before the entry.
pub fn structure_distance(
    entry_price: f64,
    bars: &[PriceBar],
    entry_index: usize,
    action: Action,
) -> Option<f64> {
    let end = entry_index.min(bars.len());
    let window = &bars[end.saturating_sub(STRUCTURE_LOOKBACK)..end];
    if window.is_empty() {
        return None;
    }

    let distance = match action {
        Action::Buy => {
            let swing_low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            entry_price - swing_low
        }
        Action::Sell => {
            let swing_high = window
                .iter()
                .map(|b| b.high)
                .fold(f64::NEG_INFINITY, f64::max);
            swing_high - entry_price
        }
    };
    Some(distance.max(0.0))
}

/// 75th percentile of bar ranges over the trailing window, scaled.
pub fn range_percentile_distance(bars: &[PriceBar], entry_index: usize) -> Option<f64> {
    if entry_index >= bars.len() {
        return None;
    }
    let start = (entry_index + 1).saturating_sub(RANGE_WINDOW);
    let ranges: Vec<f64> = bars[start..=entry_index].iter().map(PriceBar::range).collect();

    percentile(&ranges, RANGE_PERCENTILE)
        .filter(|p| is_valid(*p))
        .map(|p| p * RANGE_MULTIPLIER)
}
