//! Backward-looking rolling computations over a price history.
//!
//! Every function returns a [`Series`] aligned with its input: the value at
//! index `t` only reads inputs at indices `<= t`, and positions without enough
//! history are `None`.

pub mod bollinger;
pub mod drawdown;
pub mod rsi;

pub use bollinger::*;
pub use drawdown::*;
pub use rsi::*;

use crate::stats;

/// Aligned column with missing values
pub type Series = Vec<Option<f64>>;

pub fn lift(values: &[f64]) -> Series {
    values.iter().copied().map(Some).collect()
}

/// `values[t] / values[t - periods] - 1`
pub fn pct_change(values: &[f64], periods: usize) -> Series {
    (0..values.len())
        .map(|t| {
            if periods == 0 || t < periods {
                return None;
            }
            ratio_minus_one(values[t], values[t - periods])
        })
        .collect()
}

/// Moves every value `lag` rows later
pub fn shift(values: &[Option<f64>], lag: usize) -> Series {
    (0..values.len())
        .map(|t| if t < lag { None } else { values[t - lag] })
        .collect()
}

/// Applies `f` to each full trailing window. Windows touching a missing value
/// yield `None`.
pub fn rolling<F>(values: &[Option<f64>], window: usize, f: F) -> Series
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }
    let mut buf = Vec::with_capacity(window);
    for t in (window - 1)..values.len() {
        buf.clear();
        buf.extend(values[t + 1 - window..=t].iter().map_while(|v| *v));
        if buf.len() == window {
            out[t] = f(&buf);
        }
    }
    out
}

pub fn sma(values: &[f64], window: usize) -> Series {
    rolling(&lift(values), window, stats::mean)
}

/// Rolling sample standard deviation (ddof = 1)
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Series {
    rolling(values, window, |w| stats::std_dev(w, 1))
}

pub fn highest(values: &[f64], window: usize) -> Series {
    rolling(&lift(values), window, |w| w.iter().copied().reduce(f64::max))
}

pub fn cummax(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(f64::NEG_INFINITY, |peak, &v| {
            *peak = peak.max(v);
            Some(*peak)
        })
        .collect()
}

/// `num / den - 1`, missing on a zero or non-finite result
pub fn ratio_minus_one(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        return None;
    }
    let r = num / den - 1.0;
    r.is_finite().then_some(r)
}

/// Element-wise [`ratio_minus_one`] over two aligned series
pub fn zip_ratio(num: &[Option<f64>], den: &[Option<f64>]) -> Series {
    num.iter()
        .zip(den)
        .map(|(n, d)| match (n, d) {
            (Some(n), Some(d)) => ratio_minus_one(*n, *d),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pct_change() {
        let out = pct_change(&[100.0, 110.0, 121.0, 0.0, 5.0], 1);
        assert_eq!(out[0], None);
        assert_relative_eq!(out[1].unwrap(), 0.1, epsilon = 1e-12);
        assert_relative_eq!(out[2].unwrap(), 0.1, epsilon = 1e-12);
        assert_relative_eq!(out[3].unwrap(), -1.0);
        // zero base
        assert_eq!(out[4], None);
    }

    #[test]
    fn test_sma_warmup() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out[..2], [None, None]);
        assert_eq!(out[2], Some(2.0));
        assert_eq!(out[3], Some(3.0));
    }

    #[test]
    fn test_rolling_skips_windows_with_missing() {
        let values = vec![None, Some(1.0), Some(3.0), Some(5.0)];
        let out = rolling_std(&values, 2);
        assert_eq!(out[1], None);
        assert_relative_eq!(out[2].unwrap(), 2.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_shift_and_highest() {
        let lagged = shift(&lift(&[1.0, 2.0, 3.0]), 2);
        assert_eq!(lagged, vec![None, None, Some(1.0)]);

        let out = highest(&[3.0, 1.0, 2.0, 0.5], 2);
        assert_eq!(out, vec![None, Some(3.0), Some(2.0), Some(2.0)]);
    }

    #[test]
    fn test_cummax() {
        assert_eq!(cummax(&[1.0, 3.0, 2.0, 4.0]), vec![1.0, 3.0, 3.0, 4.0]);
    }

    #[test]
    fn test_values_never_depend_on_future_rows() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let full = rolling_std(&pct_change(&prices, 1), 10);
        let truncated = rolling_std(&pct_change(&prices[..40], 1), 10);
        assert_eq!(full[..40], truncated[..]);
    }
}
