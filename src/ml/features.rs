use serde::{Deserialize, Serialize};

use crate::config::BaseFeatureSettings;
use crate::error::{ExperimentError, ExperimentResult};
use crate::indicators::{self, Series};

/// A derived signal and its window parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Return over `periods` rows
    Momentum { periods: usize },
    /// Price relative to its simple moving average
    PriceToSma { window: usize },
    /// Fast SMA relative to slow SMA
    SmaCrossover { fast: usize, slow: usize },
    /// Price relative to the rolling high
    DistanceFromHigh { window: usize },
    /// Sample std of daily returns
    Volatility { window: usize },
    CurrentDrawdown,
    RollingMaxDrawdown { window: usize },
    Rsi { period: usize },
    BollingerWidth { period: usize, num_std: f64 },
    /// Daily return `lag` rows ago
    LaggedReturn { lag: usize },
}

impl FeatureKind {
    /// Compute the column for a price history. Values at index `t` only read
    /// prices at indices `<= t`.
    pub fn compute(&self, prices: &[f64]) -> Series {
        match *self {
            FeatureKind::Momentum { periods } => indicators::pct_change(prices, periods),
            FeatureKind::PriceToSma { window } => {
                indicators::zip_ratio(&indicators::lift(prices), &indicators::sma(prices, window))
            }
            FeatureKind::SmaCrossover { fast, slow } => indicators::zip_ratio(
                &indicators::sma(prices, fast),
                &indicators::sma(prices, slow),
            ),
            FeatureKind::DistanceFromHigh { window } => indicators::zip_ratio(
                &indicators::lift(prices),
                &indicators::highest(prices, window),
            ),
            FeatureKind::Volatility { window } => {
                indicators::rolling_std(&indicators::pct_change(prices, 1), window)
            }
            FeatureKind::CurrentDrawdown => indicators::current_drawdown(prices),
            FeatureKind::RollingMaxDrawdown { window } => {
                indicators::rolling_max_drawdown(prices, window)
            }
            FeatureKind::Rsi { period } => indicators::rsi(prices, period),
            FeatureKind::BollingerWidth { period, num_std } => {
                indicators::bollinger_width(prices, period, num_std)
            }
            FeatureKind::LaggedReturn { lag } => {
                indicators::shift(&indicators::pct_change(prices, 1), lag)
            }
        }
    }
}

/// Named feature column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub id: String,
    pub kind: FeatureKind,
}

impl FeatureSpec {
    pub fn new(id: impl Into<String>, kind: FeatureKind) -> Self {
        Self { id: id.into(), kind }
    }
}

/// Selectable features, in listing order
const REGISTRY: [(&str, FeatureKind); 15] = [
    // Momentum
    ("mom_1m", FeatureKind::Momentum { periods: 21 }),
    ("mom_3m", FeatureKind::Momentum { periods: 63 }),
    ("mom_6m", FeatureKind::Momentum { periods: 126 }),
    ("mom_12m", FeatureKind::Momentum { periods: 252 }),
    // Trend
    ("px_sma50", FeatureKind::PriceToSma { window: 50 }),
    ("px_sma200", FeatureKind::PriceToSma { window: 200 }),
    ("sma50_sma200", FeatureKind::SmaCrossover { fast: 50, slow: 200 }),
    ("dist_52w_high", FeatureKind::DistanceFromHigh { window: 252 }),
    // Risk
    ("vol_1m", FeatureKind::Volatility { window: 21 }),
    ("vol_3m", FeatureKind::Volatility { window: 63 }),
    ("vol_6m", FeatureKind::Volatility { window: 126 }),
    ("dd_current", FeatureKind::CurrentDrawdown),
    ("mdd_12m", FeatureKind::RollingMaxDrawdown { window: 252 }),
    // Oscillators
    ("rsi_14", FeatureKind::Rsi { period: 14 }),
    ("bb_width", FeatureKind::BollingerWidth { period: 20, num_std: 2.0 }),
];

pub fn all_feature_ids() -> Vec<String> {
    REGISTRY.iter().map(|(id, _)| id.to_string()).collect()
}

pub fn lookup(id: &str) -> Option<FeatureSpec> {
    REGISTRY
        .iter()
        .find(|(name, _)| *name == id)
        .map(|(name, kind)| FeatureSpec::new(*name, *kind))
}

/// Resolve requested ids against the registry, keeping request order.
/// Fails before any computation when the set is empty or has unknown ids.
pub fn resolve(ids: &[String]) -> ExperimentResult<Vec<FeatureSpec>> {
    if ids.is_empty() {
        return Err(ExperimentError::EmptyFeatureSet);
    }

    let invalid: Vec<String> = ids.iter().filter(|id| lookup(id).is_none()).cloned().collect();
    if !invalid.is_empty() {
        return Err(ExperimentError::UnknownFeatures {
            invalid,
            valid: all_feature_ids(),
        });
    }

    Ok(ids.iter().filter_map(|id| lookup(id)).collect())
}

/// Lagged returns, two moving-average ratios and rolling volatility
pub fn base_feature_set(settings: &BaseFeatureSettings) -> Vec<FeatureSpec> {
    let mut specs: Vec<FeatureSpec> = (1..=settings.lags)
        .map(|lag| FeatureSpec::new(format!("ret_lag{}", lag), FeatureKind::LaggedReturn { lag }))
        .collect();
    specs.push(FeatureSpec::new(
        "ma_ratio_short",
        FeatureKind::PriceToSma { window: settings.ma_short },
    ));
    specs.push(FeatureSpec::new(
        "ma_ratio_long",
        FeatureKind::PriceToSma { window: settings.ma_long },
    ));
    specs.push(FeatureSpec::new(
        "volatility",
        FeatureKind::Volatility { window: settings.vol_window },
    ));
    specs
}
