use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info};

use super::backend::ComputeBackend;
use super::nn::{build_optimizer, Mlp, Optimizer};
use crate::config::{NetworkSettings, TrainingSettings};
use crate::error::{ExperimentError, ExperimentResult};

/// Training report after model fit
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub epochs_run: usize,
    /// 1-based epoch of the returned parameters
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<f64>,
    pub stopped_early: bool,
}

/// Mini-batch trainer with early stopping on validation MSE
pub struct Trainer<'a> {
    network: &'a NetworkSettings,
    training: &'a TrainingSettings,
}

impl<'a> Trainer<'a> {
    pub fn new(network: &'a NetworkSettings, training: &'a TrainingSettings) -> Self {
        Self { network, training }
    }

    /// Fit a fresh network. `seed` fixes initialization, shuffling and
    /// dropout masks. The returned network holds the parameters of the epoch
    /// with the lowest validation loss.
    pub fn fit(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_val: &Array2<f64>,
        y_val: &Array1<f64>,
        seed: u64,
    ) -> ExperimentResult<(Mlp, TrainingReport)> {
        let n = x_train.nrows();
        if n == 0 || y_val.is_empty() {
            return Err(ExperimentError::InsufficientData { rows: n, required: 1 });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let backend = ComputeBackend::select();
        let mut model = Mlp::new(
            x_train.ncols(),
            &self.network.hidden_sizes,
            self.network.dropout,
            backend,
            &mut rng,
        );
        let mut optimizers: Vec<Box<dyn Optimizer>> = (0..model.layers.len())
            .map(|_| build_optimizer(self.training.optimizer, self.training.learning_rate))
            .collect();

        info!(
            "Training MLP {:?} ({} params) on {} rows, backend={}",
            self.network.hidden_sizes,
            model.num_parameters(),
            n,
            backend
        );

        let mut best: Option<(Mlp, usize)> = None;
        let mut best_val_loss = f64::INFINITY;
        let mut patience_counter = 0;
        let mut train_losses = Vec::new();
        let mut val_losses = Vec::new();
        let mut stopped_early = false;
        let mut indices: Vec<usize> = (0..n).collect();

        for epoch in 1..=self.training.epochs {
            indices.shuffle(&mut rng);
            let train_loss = self.run_epoch(
                &mut model,
                &mut optimizers,
                x_train,
                y_train,
                &indices,
                &mut rng,
            );
            let val_loss = model.mse(x_val, y_val);
            train_losses.push(train_loss);
            val_losses.push(val_loss);

            debug!(
                "Epoch {}: train_loss={:.6}, val_loss={:.6}",
                epoch, train_loss, val_loss
            );

            if val_loss < best_val_loss {
                best_val_loss = val_loss;
                patience_counter = 0;
                best = Some((model.clone(), epoch));
            } else {
                patience_counter += 1;
                if patience_counter >= self.training.patience {
                    info!("Early stopping at epoch {}", epoch);
                    stopped_early = true;
                    break;
                }
            }
        }

        let epochs_run = train_losses.len();
        let (model, best_epoch) = match best {
            Some(snapshot) => snapshot,
            None => {
                best_val_loss = model.mse(x_val, y_val);
                (model, epochs_run)
            }
        };

        info!(
            "Training done: {} epochs, best epoch {} (val_loss={:.6})",
            epochs_run, best_epoch, best_val_loss
        );

        Ok((
            model,
            TrainingReport {
                epochs_run,
                best_epoch,
                best_val_loss,
                train_losses,
                val_losses,
                stopped_early,
            },
        ))
    }

    /// One pass over the shuffled rows; returns the mean batch loss
    fn run_epoch(
        &self,
        model: &mut Mlp,
        optimizers: &mut [Box<dyn Optimizer>],
        x: &Array2<f64>,
        y: &Array1<f64>,
        order: &[usize],
        rng: &mut StdRng,
    ) -> f64 {
        let mut total = 0.0;
        let mut batches = 0;

        for batch in order.chunks(self.training.batch_size.max(1)) {
            let x_batch = x.select(Axis(0), batch);
            let y_batch = y.select(Axis(0), batch);

            let predictions = model.forward_train(&x_batch, rng);
            let diff = &predictions - &y_batch;
            total += diff.mapv(|d| d * d).mean().unwrap_or(0.0);
            batches += 1;

            model.backward(&predictions, &y_batch, optimizers);
        }

        if batches == 0 {
            0.0
        } else {
            total / batches as f64
        }
    }
}
