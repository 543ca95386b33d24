use chrono::NaiveDate;
use tracing::{debug, info};

use super::results::{BacktestResults, DailyOutcome, MetricsCalculator};
use crate::config::BacktestSettings;
use crate::error::{ExperimentError, ExperimentResult};

/// Long/flat strategy driven by model predictions.
///
/// Go long when the prediction is positive, act on it the next day, and pay
/// `cost_bps` on every unit of position change.
pub struct SignalBacktester<'a> {
    settings: &'a BacktestSettings,
}

impl<'a> SignalBacktester<'a> {
    pub fn new(settings: &'a BacktestSettings) -> Self {
        Self { settings }
    }

    /// `returns[t]` is the realized return of row `t`; rows without one are
    /// skipped when compounding.
    pub fn run(
        &self,
        dates: &[NaiveDate],
        predictions: &[f64],
        returns: &[Option<f64>],
    ) -> ExperimentResult<BacktestResults> {
        if dates.len() != predictions.len() || predictions.len() != returns.len() {
            return Err(ExperimentError::MalformedInput(format!(
                "backtest inputs differ in length: {} dates, {} predictions, {} returns",
                dates.len(),
                predictions.len(),
                returns.len()
            )));
        }

        let positions = lagged_positions(predictions);
        let cost_rate = self.settings.cost_bps / 10_000.0;

        let mut days = Vec::with_capacity(positions.len());
        let mut previous = 0.0;
        let mut pending_cost = 0.0;
        for (t, &position) in positions.iter().enumerate() {
            pending_cost += (position - previous).abs() * cost_rate;
            previous = position;

            // costs of a row without a return are charged on the next compounded row
            let Some(daily) = returns[t] else {
                debug!("Skipping {}: no realized return", dates[t]);
                continue;
            };
            let cost = std::mem::take(&mut pending_cost);
            days.push(DailyOutcome {
                date: dates[t],
                position,
                cost,
                net_return: position * daily - cost,
            });
        }

        let results = MetricsCalculator::calculate(&days, self.settings.trading_days_per_year);
        info!(
            "Backtest: {} days, total return {:.2}%, sharpe {:.2}, max drawdown {:.2}%",
            results.days,
            results.total_return * 100.0,
            results.sharpe,
            results.max_drawdown * 100.0
        );
        Ok(results)
    }
}

/// Position held on each row: yesterday's signal, flat on the first row
pub fn lagged_positions(predictions: &[f64]) -> Vec<f64> {
    let mut positions = Vec::with_capacity(predictions.len());
    let mut signal = 0.0;
    for &prediction in predictions {
        positions.push(signal);
        signal = if prediction > 0.0 { 1.0 } else { 0.0 };
    }
    positions
}
