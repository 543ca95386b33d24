use super::{rolling, Series};
use crate::stats;

/// Relative Strength Index from simple rolling means of gains and losses.
///
/// The first row has no prior price and counts as an unchanged day. A window
/// without any loss is reported as missing rather than 100.
pub fn rsi(prices: &[f64], period: usize) -> Series {
    let mut gains = Vec::with_capacity(prices.len());
    let mut losses = Vec::with_capacity(prices.len());
    for t in 0..prices.len() {
        let change = if t == 0 { 0.0 } else { prices[t] - prices[t - 1] };
        gains.push(Some(change.max(0.0)));
        losses.push(Some((-change).max(0.0)));
    }

    let avg_gain = rolling(&gains, period, stats::mean);
    let avg_loss = rolling(&losses, period, stats::mean);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(gain, loss)| match (gain, loss) {
            (Some(g), Some(l)) if *l > 0.0 => Some(100.0 - 100.0 / (1.0 + g / l)),
            _ => None,
        })
        .collect()
}
