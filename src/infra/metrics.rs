// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch, so
// learning curves can be plotted after the run.
//
// Metrics recorded per epoch:
//   - epoch:    the epoch number (1, 2, 3, ...)
//   - loss:     mean squared error on the training set
//   - mae:      mean absolute error on the training set (pixels)
//   - val_loss: mean squared error on the validation set
//   - val_mae:  mean absolute error on the validation set
//
// Example CSV output:
//   epoch,loss,mae,val_loss,val_mae
//   1,812.402100,21.330400,790.118200,20.904100
//   2,433.870300,15.201900,451.006600,15.880200
//
// Missing metrics are written as NaN. Rows are appended, so
// a resumed run continues the same file.

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::training::EpochLogs;
use crate::domain::traits::ProgressSink;

pub const METRICS_FILE: &str = "metrics.csv";

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join(METRICS_FILE);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,loss,mae,val_loss,val_mae")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row.
    pub fn log(&self, epoch: usize, logs: &EpochLogs) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;

        let value = |v: Option<f64>| v.unwrap_or(f64::NAN);
        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6}",
            epoch,
            value(logs.loss()),
            value(logs.mae()),
            value(logs.val_loss()),
            value(logs.val_mae()),
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

impl ProgressSink for MetricsLogger {
    fn run_started(&mut self, total_epochs: usize) -> Result<()> {
        tracing::debug!("Logging {} epochs to '{}'", total_epochs, self.csv_path.display());
        Ok(())
    }

    fn epoch_finished(&mut self, epoch: usize, _epochs_left: usize, logs: &EpochLogs) -> Result<()> {
        self.log(epoch, logs)
    }

    fn run_finished(&mut self) -> Result<()> {
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rows_are_appended() {
        let tmp        = TempDir::new().unwrap();
        let mut logger = MetricsLogger::new(tmp.path()).unwrap();

        logger.epoch_finished(1, 1, &EpochLogs::standard(4.0, 2.0, 5.0, 2.5)).unwrap();
        // A second logger on the same folder keeps the existing rows
        let logger2 = MetricsLogger::new(tmp.path()).unwrap();
        let mut long = EpochLogs::new();
        long.insert("loss", 3.0);
        long.insert("mean_absolute_error", 1.5);
        logger2.log(2, &long).unwrap();

        let text  = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "epoch,loss,mae,val_loss,val_mae");
        assert_eq!(lines[1], "1,4.000000,2.000000,5.000000,2.500000");
        assert_eq!(lines[2], "2,3.000000,1.500000,NaN,NaN");
    }
}
