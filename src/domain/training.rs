// ============================================================
// Layer 3 — Training Progress Types
// ============================================================
// EpochLogs is the metrics mapping handed to monitors after
// every epoch. Metric names differ between naming conventions
// (`mae` vs `mean_absolute_error`), so readers go through the
// accessors below instead of indexing by a fixed key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const LOSS:     &str = "loss";
pub const MAE:      &str = "mae";
pub const VAL_LOSS: &str = "val_loss";
pub const VAL_MAE:  &str = "val_mae";

const MAE_LONG:     &str = "mean_absolute_error";
const VAL_MAE_LONG: &str = "val_mean_absolute_error";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochLogs {
    metrics: BTreeMap<String, f64>,
}

impl EpochLogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs with the four standard metrics under their short names.
    pub fn standard(loss: f64, mae: f64, val_loss: f64, val_mae: f64) -> Self {
        let mut logs = Self::new();
        logs.insert(LOSS, loss);
        logs.insert(MAE, mae);
        logs.insert(VAL_LOSS, val_loss);
        logs.insert(VAL_MAE, val_mae);
        logs
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.metrics.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn loss(&self) -> Option<f64> {
        self.get(LOSS)
    }

    pub fn val_loss(&self) -> Option<f64> {
        self.get(VAL_LOSS)
    }

    /// Training mean absolute error under either naming convention.
    pub fn mae(&self) -> Option<f64> {
        self.get(MAE).or_else(|| self.get(MAE_LONG))
    }

    /// Validation mean absolute error under either naming convention.
    pub fn val_mae(&self) -> Option<f64> {
        self.get(VAL_MAE).or_else(|| self.get(VAL_MAE_LONG))
    }

    /// What a progress display shows as training precision:
    /// MAE when available, MSE loss otherwise.
    pub fn training_precision(&self) -> Option<(&'static str, f64)> {
        self.mae()
            .map(|v| ("mae", v))
            .or_else(|| self.loss().map(|v| ("mse", v)))
    }

    /// Validation counterpart of [`EpochLogs::training_precision`].
    pub fn validation_precision(&self) -> Option<(&'static str, f64)> {
        self.val_mae()
            .map(|v| ("val_mae", v))
            .or_else(|| self.val_loss().map(|v| ("val_mse", v)))
    }
}

/// Lifecycle events of one training or fine-tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrainingEvent {
    Started {
        total_epochs: usize,
    },
    EpochFinished {
        epoch:       usize,
        epochs_left: usize,
        logs:        EpochLogs,
    },
    Finished,
}
