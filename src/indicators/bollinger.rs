use super::{lift, rolling_std, sma, Series};

#[derive(Debug, Clone, Copy)]
pub struct BollingerOutput {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerOutput {
    /// Band width normalized by the middle band
    pub fn width(&self) -> Option<f64> {
        if self.middle == 0.0 {
            return None;
        }
        Some((self.upper - self.lower) / self.middle)
    }
}

/// Bands around the rolling mean at `num_std` sample standard deviations
pub fn bollinger_bands(
    prices: &[f64],
    period: usize,
    num_std: f64,
) -> Vec<Option<BollingerOutput>> {
    let middle = sma(prices, period);
    let std = rolling_std(&lift(prices), period);

    middle
        .iter()
        .zip(&std)
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(BollingerOutput {
                upper: m + num_std * s,
                middle: *m,
                lower: m - num_std * s,
            }),
            _ => None,
        })
        .collect()
}

pub fn bollinger_width(prices: &[f64], period: usize, num_std: f64) -> Series {
    bollinger_bands(prices, period, num_std)
        .into_iter()
        .map(|bands| bands.and_then(|b| b.width()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_flat_prices_have_zero_width() {
        let out = bollinger_width(&[50.0; 25], 20, 2.0);
        assert!(out[18].is_none());
        assert_relative_eq!(out[19].unwrap(), 0.0);
    }

    #[test]
    fn test_width_uses_sample_std() {
        let prices = [9.0, 10.0, 11.0];
        let bands = bollinger_bands(&prices, 3, 2.0)[2].unwrap();
        // sample std of 9, 10, 11 is 1
        assert_relative_eq!(bands.upper, 12.0, epsilon = 1e-12);
        assert_relative_eq!(bands.lower, 8.0, epsilon = 1e-12);
        assert_relative_eq!(bands.width().unwrap(), 0.4, epsilon = 1e-12);
    }
}
