use super::{cummax, lift, rolling, Series};

/// Distance below the all-time high, `price / cummax(price) - 1`
pub fn current_drawdown(prices: &[f64]) -> Series {
    prices
        .iter()
        .zip(cummax(prices))
        .map(|(p, peak)| if peak > 0.0 { Some(p / peak - 1.0) } else { None })
        .collect()
}

/// Worst peak-to-trough decline inside each trailing window. The running peak
/// restarts at the first row of every window.
pub fn rolling_max_drawdown(prices: &[f64], window: usize) -> Series {
    rolling(&lift(prices), window, max_drawdown)
}

/// Minimum of `(x - running_peak) / running_peak`; `Some(0.0)` for a
/// non-decreasing path
pub fn max_drawdown(path: &[f64]) -> Option<f64> {
    let mut peak = f64::NEG_INFINITY;
    let mut worst: Option<f64> = None;
    for &x in path {
        peak = peak.max(x);
        if peak <= 0.0 {
            return None;
        }
        let dd = (x - peak) / peak;
        worst = Some(worst.map_or(dd, |w: f64| w.min(dd)));
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_current_drawdown() {
        let out = current_drawdown(&[100.0, 120.0, 90.0, 130.0]);
        assert_eq!(out[0], Some(0.0));
        assert_relative_eq!(out[2].unwrap(), -0.25);
        assert_eq!(out[3], Some(0.0));
    }

    #[test]
    fn test_max_drawdown_path() {
        assert_relative_eq!(max_drawdown(&[100.0, 80.0, 120.0, 60.0, 90.0]).unwrap(), -0.5);
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), Some(0.0));
        assert_eq!(max_drawdown(&[]), None);
    }

    #[test]
    fn test_rolling_window_forgets_old_peak() {
        let prices = [200.0, 100.0, 100.0, 100.0];
        let out = rolling_max_drawdown(&prices, 2);
        assert_eq!(out[0], None);
        assert_relative_eq!(out[1].unwrap(), -0.5);
        assert_eq!(out[2], Some(0.0));
    }
}
