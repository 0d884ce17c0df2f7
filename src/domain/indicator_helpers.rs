//! Shared helper functions for indicator calculations.

use crate::domain::bar::PriceBar;

/// Wilder-smoothed average true range for every bar.
///
/// The first bar's true range is `high - low`. Entries before `period - 1`
/// are `None`; the value at `period - 1` is the mean of the first `period`
/// true ranges.
pub fn calc_atr(bars: &[PriceBar], period: usize) -> Vec<Option<f64>> {
    if bars.len() < period || period == 0 {
        return vec![None; bars.len()];
    }

    let tr_values: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.range()
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect();

    let mut results: Vec<Option<f64>> = Vec::with_capacity(bars.len());
    let mut prev_atr = 0.0;

    for i in 0..bars.len() {
        if i < period - 1 {
            results.push(None);
        } else if i == period - 1 {
            prev_atr = tr_values[0..=i].iter().sum::<f64>() / period as f64;
            results.push(Some(prev_atr));
        } else {
            prev_atr = (prev_atr * (period - 1) as f64 + tr_values[i]) / period as f64;
            results.push(Some(prev_atr));
        }
    }

    results
}

/// ATR evaluated at `index`, using only bars up to and including it.
pub fn atr_at(bars: &[PriceBar], index: usize, period: usize) -> Option<f64> {
    if index >= bars.len() {
        return None;
    }
    calc_atr(&bars[..=index], period).last().copied().flatten()
}

/// Percentile with linear interpolation between closest ranks.
///
/// `q` is in `[0, 100]`. NaN values are ignored; `None` when nothing is left.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() || !(0.0..=100.0).contains(&q) {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Simple moving average of closes; `None` during warmup.
pub fn calc_sma(bars: &[PriceBar], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; bars.len()];
    }

    let mut values = Vec::with_capacity(bars.len());
    let mut window_sum = 0.0;
    for (i, bar) in bars.iter().enumerate() {
        window_sum += bar.close;
        if i >= period {
            window_sum -= bars[i - period].close;
        }
        if i + 1 >= period {
            values.push(Some(window_sum / period as f64));
        } else {
            values.push(None);
        }
    }
    values
}
