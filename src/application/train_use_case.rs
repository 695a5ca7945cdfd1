// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Prepare the datasets        (unless skip_prepare)
//   Step 2: Load training + validation  (Layer 4 - data)
//   Step 3: Build or reload the network (Layer 5 / Layer 6)
//   Step 4: Save configs                (Layer 6 - infra)
//   Step 5: Run on a background thread  (Layer 5 - ml)
//   Step 6: Relay progress events until the run ends
//
// Three modes share the pipeline:
//   Scratch  — new network sized from the training images
//   Resume   — reload the checkpoint, keep training at 1e-3
//   FineTune — reload the checkpoint, freeze normalisation, 1e-5

use anyhow::{bail, Context, Result};
use burn::{
    backend::{Autodiff, Wgpu},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::sync::mpsc;

use crate::application::{
    prepare_use_case::{PrepareConfig, PrepareUseCase},
    project::ProjectLayout,
};
use crate::data::{
    loader::{DatasetLoader, LandmarkArrays},
    table::read_vocabulary,
};
use crate::domain::training::{EpochLogs, TrainingEvent};
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::{
    model::{LandmarkNet, LandmarkNetConfig},
    monitor::{ChannelSink, CheckpointingMonitor},
    trainer::{spawn_fine_tuning, spawn_training, FitOptions, DEFAULT_BATCH_SIZE},
};

type TrainBackend = Autodiff<Wgpu>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainMode {
    Scratch,
    Resume,
    FineTune,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// Serialisable so it can be saved next to the checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub model_name:     String,
    pub mode:           TrainMode,
    pub epochs:         usize,
    pub batch_size:     usize,
    pub save_frequency: usize,
    pub skip_prepare:   bool,
    pub prepare:        PrepareConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            model_name:     "landmark_model".to_string(),
            mode:           TrainMode::Scratch,
            epochs:         100,
            batch_size:     DEFAULT_BATCH_SIZE,
            save_frequency: 10,
            skip_prepare:   false,
            prepare:        PrepareConfig::default(),
        }
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub epochs:          usize,
    pub last_logs:       Option<EpochLogs>,
    pub training_size:   usize,
    pub validation_size: usize,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run on the GPU backend, handing every progress event to
    /// `on_event` as it arrives.
    pub fn execute(&self, on_event: impl FnMut(&TrainingEvent)) -> Result<TrainReport> {
        self.run::<TrainBackend>(Default::default(), on_event)
    }

    pub fn run<B: AutodiffBackend>(
        &self,
        device:       B::Device,
        mut on_event: impl FnMut(&TrainingEvent),
    ) -> Result<TrainReport> {
        let cfg     = &self.config;
        let project = ProjectLayout::new(&cfg.prepare.project_dir);

        // ── Step 1: Prepare ───────────────────────────────────────────────────
        if cfg.skip_prepare {
            tracing::info!("Reusing the prepared datasets in '{}'", project.root().display());
        } else {
            PrepareUseCase::new(cfg.prepare.clone()).execute()?;
        }

        // ── Step 2: Load arrays ───────────────────────────────────────────────
        let vocabulary = read_vocabulary(&project.model_table()).context("Cannot read the landmark vocabulary")?;
        let loader     = DatasetLoader::new(&vocabulary);
        let train      = loader
            .load_folder(&project.training_dir())
            .context("No prepared training data, run 'prepare' first")?;
        if train.is_empty() {
            bail!("Training folder '{}' is empty, run 'prepare' first", project.training_dir().display());
        }
        let val = loader
            .load_folder(&project.validation_dir())
            .context("No prepared validation data, run 'prepare' first")?;
        tracing::info!(
            "Loaded {} training and {} validation samples of {}x{}",
            train.n_samples(), val.n_samples(), train.width, train.height,
        );

        // ── Step 3: Network ───────────────────────────────────────────────────
        let checkpoints = CheckpointManager::new(project.models_dir(), &cfg.model_name)?;
        let model       = match cfg.mode {
            TrainMode::Scratch => {
                let net = LandmarkNetConfig::new(train.height, train.width, vocabulary.len());
                net.check()?;
                checkpoints.save_config(&net)?;
                tracing::info!("New model '{}' for {}x{} inputs", cfg.model_name, net.width, net.height);
                net.init::<B>(&device)
            }
            TrainMode::Resume | TrainMode::FineTune => {
                let (net, model) = checkpoints.load_model::<B>(&device)?;
                check_compatible(&net, &train)?;
                model
            }
        };

        // ── Step 4: Save run config ───────────────────────────────────────────
        checkpoints.save_run_config(cfg)?;

        // ── Step 5: Spawn ─────────────────────────────────────────────────────
        let (tx, rx)  = mpsc::channel();
        let monitor   = CheckpointingMonitor::<B>::new(checkpoints, cfg.save_frequency)
            .with_sink(ChannelSink::new(tx))
            .with_sink(MetricsLogger::new(project.root())?);
        let report    = TrainReport {
            epochs:          cfg.epochs,
            last_logs:       None,
            training_size:   train.n_samples(),
            validation_size: val.n_samples(),
        };

        let handle = match cfg.mode {
            TrainMode::Scratch | TrainMode::Resume => {
                let options = FitOptions::training(cfg.epochs).with_batch_size(cfg.batch_size);
                spawn_training(model, train, val, options, monitor, device)?
            }
            TrainMode::FineTune => {
                let options = FitOptions::fine_tuning(cfg.epochs).with_batch_size(cfg.batch_size);
                spawn_fine_tuning(model, train, val, options, monitor, device)?
            }
        };

        // ── Step 6: Relay progress ────────────────────────────────────────────
        // The channel closes when the monitor is dropped with the thread.
        let mut last_logs = None;
        for event in rx {
            on_event(&event);
            if let TrainingEvent::EpochFinished { logs, .. } = event {
                last_logs = Some(logs);
            }
        }

        let _model: LandmarkNet<B> = handle.join()?;
        Ok(TrainReport { last_logs, ..report })
    }
}

/// A reloaded network must accept the prepared images and
/// predict the vocabulary's landmarks.
fn check_compatible(net: &LandmarkNetConfig, train: &LandmarkArrays) -> Result<()> {
    if (net.height, net.width) != (train.height, train.width) {
        bail!(
            "Model expects {}x{} images but the training data is {}x{}; rebuild with the original binning",
            net.width, net.height, train.width, train.height,
        );
    }
    if net.n_landmarks != train.n_landmarks {
        bail!("Model predicts {} landmarks but the project has {}", net.n_landmarks, train.n_landmarks);
    }
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::prepare_use_case::tests::write_project;
    use crate::data::builder::BuildOptions;
    use burn::backend::NdArray;
    use tempfile::TempDir;

    type TestAdBackend = Autodiff<NdArray>;

    fn config(project: &std::path::Path, mode: TrainMode, skip_prepare: bool) -> TrainConfig {
        TrainConfig {
            model_name:     "test".to_string(),
            mode,
            epochs:         2,
            batch_size:     4,
            save_frequency: 1,
            skip_prepare,
            prepare: PrepareConfig {
                project_dir: project.display().to_string(),
                build:       BuildOptions { augmentations: 0, binning: Some(2), ..BuildOptions::default() },
                seed:        Some(3),
            },
        }
    }

    #[test]
    fn test_scratch_then_fine_tune() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), 6);

        let mut events = Vec::new();
        let report = TrainUseCase::new(config(tmp.path(), TrainMode::Scratch, false))
            .run::<TestAdBackend>(Default::default(), |e| events.push(e.clone()))
            .unwrap();

        assert_eq!(report.training_size, 4);
        assert_eq!(report.validation_size, 1);
        assert!(report.last_logs.is_some());
        assert_eq!(events.first(), Some(&TrainingEvent::Started { total_epochs: 2 }));
        assert_eq!(events.last(), Some(&TrainingEvent::Finished));
        assert!(tmp.path().join("models").join("train_config.json").exists());
        assert!(tmp.path().join("metrics.csv").exists());

        let report = TrainUseCase::new(config(tmp.path(), TrainMode::FineTune, true))
            .run::<TestAdBackend>(Default::default(), |_| {})
            .unwrap();
        assert_eq!(report.epochs, 2);
    }

    #[test]
    fn test_resume_without_checkpoint_fails() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), 6);

        let result = TrainUseCase::new(config(tmp.path(), TrainMode::Resume, false))
            .run::<TestAdBackend>(Default::default(), |_| {});
        assert!(result.is_err());
    }

    #[test]
    fn test_skip_prepare_without_data_fails() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), 6);

        let err = TrainUseCase::new(config(tmp.path(), TrainMode::Scratch, true))
            .run::<TestAdBackend>(Default::default(), |_| {})
            .unwrap_err();
        assert!(format!("{err:#}").contains("run 'prepare' first"));
    }

    #[test]
    fn test_incompatible_checkpoint_is_rejected() {
        let arrays = LandmarkArrays {
            file_names:  vec!["a.tif".to_string()],
            images:      vec![0.0; 64 * 64],
            coords:      vec![0.0; 4],
            height:      64,
            width:       64,
            n_landmarks: 2,
        };
        assert!(check_compatible(&LandmarkNetConfig::new(64, 64, 2), &arrays).is_ok());
        assert!(check_compatible(&LandmarkNetConfig::new(32, 64, 2), &arrays).is_err());
        assert!(check_compatible(&LandmarkNetConfig::new(64, 64, 3), &arrays).is_err());
    }
}
