use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{ExperimentError, ExperimentResult};

/// Immutable settings shared by every pipeline stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub split: SplitSettings,
    pub target: TargetSettings,
    pub network: NetworkSettings,
    pub training: TrainingSettings,
    pub uncertainty: UncertaintySettings,
    pub backtest: BacktestSettings,
    pub base_features: BaseFeatureSettings,
    pub paths: PathSettings,
}

impl ExperimentConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> ExperimentResult<Self> {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config: ExperimentConfig = toml::from_str(&raw)
            .map_err(|e| ExperimentError::InvalidConfig(e.to_string()))?;
        config
            .validate()
            .map_err(|errors| ExperimentError::InvalidConfig(errors.join(", ")))?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // Split validation
        if self.split.train_ratio <= 0.0 || self.split.train_ratio >= 1.0 {
            errors.push("split.train_ratio must be between 0 and 1".to_string());
        }
        if self.split.val_ratio <= 0.0 {
            errors.push("split.val_ratio must be > 0".to_string());
        }
        if self.split.train_ratio + self.split.val_ratio >= 1.0 {
            errors.push(
                "split: train_ratio + val_ratio must leave room for a test set".to_string(),
            );
        }
        if self.split.min_samples < 3 {
            errors.push("split.min_samples must be >= 3".to_string());
        }

        if self.target.horizon_days == 0 {
            errors.push("target.horizon_days must be > 0".to_string());
        }

        // Network validation
        if self.network.hidden_sizes.is_empty() || self.network.hidden_sizes.contains(&0) {
            errors.push("network.hidden_sizes must be non-empty and non-zero".to_string());
        }
        if !(0.0..1.0).contains(&self.network.dropout) {
            errors.push("network.dropout must be in [0, 1)".to_string());
        }

        // Training validation
        if self.training.learning_rate <= 0.0 {
            errors.push("training.learning_rate must be > 0".to_string());
        }
        if self.training.epochs == 0 {
            errors.push("training.epochs must be > 0".to_string());
        }
        if self.training.patience == 0 {
            errors.push("training.patience must be > 0".to_string());
        }
        if self.training.batch_size == 0 {
            errors.push("training.batch_size must be > 0".to_string());
        }

        if self.uncertainty.market_floor < 0.0 {
            errors.push("uncertainty.market_floor must be >= 0".to_string());
        }
        if self.uncertainty.ci_z <= 0.0 {
            errors.push("uncertainty.ci_z must be > 0".to_string());
        }
        if self.uncertainty.extrapolation_slope < 0.0 {
            errors.push("uncertainty.extrapolation_slope must be >= 0".to_string());
        }
        if self.uncertainty.extrapolation_threshold < 0.0 {
            errors.push("uncertainty.extrapolation_threshold must be >= 0".to_string());
        }
        if self.backtest.cost_bps < 0.0 {
            errors.push("backtest.cost_bps must be >= 0".to_string());
        }
        if self.backtest.trading_days_per_year <= 0.0 {
            errors.push("backtest.trading_days_per_year must be > 0".to_string());
        }

        if self.base_features.ma_short == 0
            || self.base_features.ma_long == 0
            || self.base_features.vol_window < 2
        {
            errors.push("base_features: windows must be > 0 (vol_window >= 2)".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitSettings {
    pub train_ratio: f64,
    pub val_ratio: f64,
    /// Complete feature/target rows required before training
    pub min_samples: usize,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            train_ratio: 0.70,
            val_ratio: 0.15,
            min_samples: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSettings {
    /// Forward horizon in trading days (~12 months)
    pub horizon_days: usize,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self { horizon_days: 252 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub hidden_sizes: Vec<usize>,
    pub dropout: f64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![64, 32],
            dropout: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Adam,
    Sgd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub optimizer: OptimizerKind,
    pub learning_rate: f64,
    pub epochs: usize,
    /// Consecutive non-improving epochs before stopping
    pub patience: usize,
    pub batch_size: usize,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            optimizer: OptimizerKind::Adam,
            learning_rate: 0.001,
            epochs: 100,
            patience: 10,
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UncertaintySettings {
    /// z-score beyond which the latest inputs count as extrapolation
    pub extrapolation_threshold: f64,
    /// Std multiplier added per unit of z-score above the threshold
    pub extrapolation_slope: f64,
    /// Minimum std for 12-month returns
    pub market_floor: f64,
    pub ci_z: f64,
}

impl Default for UncertaintySettings {
    fn default() -> Self {
        Self {
            extrapolation_threshold: 2.0,
            extrapolation_slope: 0.1,
            market_floor: 0.10,
            ci_z: 1.96,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    pub cost_bps: f64,
    pub trading_days_per_year: f64,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            cost_bps: 5.0,
            trading_days_per_year: 252.0,
        }
    }
}

/// Fixed feature preset used by `predict` and `backtest` when no ids are given
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseFeatureSettings {
    pub lags: usize,
    pub ma_short: usize,
    pub ma_long: usize,
    pub vol_window: usize,
}

impl Default for BaseFeatureSettings {
    fn default() -> Self {
        Self {
            lags: 20,
            ma_short: 10,
            ma_long: 50,
            vol_window: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub data: PathBuf,
    pub prediction_output: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            data: PathBuf::from("tmp/etf-backtest/data.json"),
            prediction_output: PathBuf::from("tmp/etf-backtest/prediction.json"),
        }
    }
}
