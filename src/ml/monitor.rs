// ============================================================
// Layer 5 — Training Monitor & Checkpoint Policy
// ============================================================
// The trainer reports to a TrainingMonitor at three points:
//
//   on_train_begin(total_epochs)
//   on_epoch_end(epoch, logs, model)     once per finished epoch
//   on_train_end(model)
//
// CheckpointingMonitor drives the checkpoint policy:
//
//   NoBaseline ──epoch 1──▶ Tracking { previous_val_loss }
//
//   - epoch 1 always captures a snapshot of the model
//   - later epochs capture a snapshot when val_loss improved on
//     the previous epoch's val_loss (the snapshot is replaced,
//     it is not the best over the whole run)
//   - after each epoch the countdown `epochs_left` is decremented;
//     when it is a multiple of save_frequency the snapshot is
//     written to disk
//   - at the end of the run the live model is written, whatever
//     the last periodic save was
//
// Progress is forwarded to any number of ProgressSinks
// (channel to the CLI, metrics CSV, ...).

use anyhow::Result;
use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};
use std::sync::mpsc::Sender;

use crate::domain::training::{EpochLogs, TrainingEvent};
use crate::domain::traits::ProgressSink;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::LandmarkNet;

// ─── TrainingMonitor ──────────────────────────────────────────────────────────
pub trait TrainingMonitor<B: AutodiffBackend>: Send {
    fn on_train_begin(&mut self, total_epochs: usize) -> Result<()>;

    fn on_epoch_end(&mut self, epoch: usize, logs: &EpochLogs, model: &LandmarkNet<B>) -> Result<()>;

    fn on_train_end(&mut self, model: &LandmarkNet<B>) -> Result<()>;
}

// ─── CheckpointPolicy ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolicyState {
    NoBaseline,
    Tracking { previous_val_loss: f64 },
}

/// What to do with the model after one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochDecision {
    /// Replace the retained snapshot with the current weights
    pub capture_snapshot: bool,

    /// Write the retained snapshot to disk
    pub persist_snapshot: bool,

    /// Countdown after this epoch
    pub epochs_left: usize,
}

#[derive(Debug, Clone)]
pub struct CheckpointPolicy {
    save_frequency: usize,
    epochs_left:    usize,
    state:          PolicyState,
}

impl CheckpointPolicy {
    /// `save_frequency == 0` disables periodic saves.
    pub fn new(total_epochs: usize, save_frequency: usize) -> Self {
        Self { save_frequency, epochs_left: total_epochs, state: PolicyState::NoBaseline }
    }

    pub fn state(&self) -> PolicyState {
        self.state
    }

    /// Advance by one finished epoch with its validation loss.
    /// A missing or NaN loss never counts as an improvement.
    pub fn on_epoch_end(&mut self, val_loss: Option<f64>) -> EpochDecision {
        self.epochs_left = self.epochs_left.saturating_sub(1);
        let current      = val_loss.unwrap_or(f64::NAN);

        let capture_snapshot = match self.state {
            PolicyState::NoBaseline => true,
            PolicyState::Tracking { previous_val_loss } => current < previous_val_loss,
        };
        self.state = PolicyState::Tracking { previous_val_loss: current };

        let persist_snapshot = self.save_frequency > 0 && self.epochs_left % self.save_frequency == 0;

        EpochDecision { capture_snapshot, persist_snapshot, epochs_left: self.epochs_left }
    }
}

// ─── CheckpointingMonitor ─────────────────────────────────────────────────────
/// Applies the checkpoint policy to a live training run.
pub struct CheckpointingMonitor<B: AutodiffBackend> {
    checkpoints:    CheckpointManager,
    save_frequency: usize,
    policy:         CheckpointPolicy,
    snapshot:       Option<LandmarkNet<B::InnerBackend>>,
    sinks:          Vec<Box<dyn ProgressSink>>,
}

impl<B: AutodiffBackend> CheckpointingMonitor<B> {
    pub fn new(checkpoints: CheckpointManager, save_frequency: usize) -> Self {
        Self {
            checkpoints,
            save_frequency,
            policy: CheckpointPolicy::new(0, save_frequency),
            snapshot: None,
            sinks: Vec::new(),
        }
    }

    /// Also report progress to `sink`.
    pub fn with_sink(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl<B: AutodiffBackend> TrainingMonitor<B> for CheckpointingMonitor<B> {
    fn on_train_begin(&mut self, total_epochs: usize) -> Result<()> {
        self.policy   = CheckpointPolicy::new(total_epochs, self.save_frequency);
        self.snapshot = None;
        for sink in &mut self.sinks {
            sink.run_started(total_epochs)?;
        }
        Ok(())
    }

    fn on_epoch_end(&mut self, epoch: usize, logs: &EpochLogs, model: &LandmarkNet<B>) -> Result<()> {
        let decision = self.policy.on_epoch_end(logs.val_loss());

        for sink in &mut self.sinks {
            sink.epoch_finished(epoch, decision.epochs_left, logs)?;
        }

        if decision.capture_snapshot {
            tracing::debug!("Epoch {}: keeping a snapshot of the current weights", epoch);
            self.snapshot = Some(model.valid());
        }

        if decision.persist_snapshot {
            if let Some(snapshot) = &self.snapshot {
                self.checkpoints.save_model(snapshot)?;
                tracing::info!("Epoch {}: snapshot saved to '{}'", epoch, self.checkpoints.model_path().display());
            }
        }
        Ok(())
    }

    fn on_train_end(&mut self, model: &LandmarkNet<B>) -> Result<()> {
        self.checkpoints.save_model(&model.valid())?;
        tracing::info!("Final model saved to '{}'", self.checkpoints.model_path().display());
        for sink in &mut self.sinks {
            sink.run_finished()?;
        }
        Ok(())
    }
}

// ─── ChannelSink ──────────────────────────────────────────────────────────────
/// Forwards progress as TrainingEvents over an mpsc channel.
///
/// A closed channel only means nobody is watching any more; the
/// run carries on.
pub struct ChannelSink {
    sender: Sender<TrainingEvent>,
}

impl ChannelSink {
    pub fn new(sender: Sender<TrainingEvent>) -> Self {
        Self { sender }
    }

    fn send(&self, event: TrainingEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("Progress receiver dropped, event discarded");
        }
    }
}

impl ProgressSink for ChannelSink {
    fn run_started(&mut self, total_epochs: usize) -> Result<()> {
        self.send(TrainingEvent::Started { total_epochs });
        Ok(())
    }

    fn epoch_finished(&mut self, epoch: usize, epochs_left: usize, logs: &EpochLogs) -> Result<()> {
        self.send(TrainingEvent::EpochFinished { epoch, epochs_left, logs: logs.clone() });
        Ok(())
    }

    fn run_finished(&mut self) -> Result<()> {
        self.send(TrainingEvent::Finished);
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::LandmarkNetConfig;
    use burn::backend::{Autodiff, NdArray};
    use std::sync::mpsc;
    use tempfile::TempDir;

    type TestAdBackend = Autodiff<NdArray>;

    fn run_policy(losses: &[f64], save_frequency: usize) -> Vec<EpochDecision> {
        let mut policy = CheckpointPolicy::new(losses.len(), save_frequency);
        losses.iter().map(|&l| policy.on_epoch_end(Some(l))).collect()
    }

    #[test]
    fn test_policy_example_run() {
        let decisions = run_policy(&[0.5, 0.5, 0.3, 0.3, 0.6], 2);

        let left: Vec<usize>    = decisions.iter().map(|d| d.epochs_left).collect();
        let capture: Vec<bool>  = decisions.iter().map(|d| d.capture_snapshot).collect();
        let persist: Vec<bool>  = decisions.iter().map(|d| d.persist_snapshot).collect();

        assert_eq!(left, vec![4, 3, 2, 1, 0]);
        // Epoch 1 is the baseline, epoch 3 improves 0.5 → 0.3
        assert_eq!(capture, vec![true, false, true, false, false]);
        assert_eq!(persist, vec![true, false, true, false, true]);
    }

    #[test]
    fn test_policy_compares_with_previous_epoch_only() {
        // 0.4 is worse than the best (0.2) but better than the previous (0.9)
        let decisions = run_policy(&[0.2, 0.9, 0.4], 0);
        assert!(decisions[2].capture_snapshot);
        assert!(decisions.iter().all(|d| !d.persist_snapshot));
    }

    #[test]
    fn test_policy_never_improves_on_nan() {
        let mut policy = CheckpointPolicy::new(3, 1);
        policy.on_epoch_end(Some(1.0));
        assert!(!policy.on_epoch_end(Some(f64::NAN)).capture_snapshot);
        assert!(!policy.on_epoch_end(None).capture_snapshot);
        assert!(matches!(
            policy.state(),
            PolicyState::Tracking { previous_val_loss } if previous_val_loss.is_nan()
        ));
    }

    #[test]
    fn test_monitor_saves_and_reports() {
        let tmp         = TempDir::new().unwrap();
        let checkpoints = CheckpointManager::new(tmp.path(), "landmarks").unwrap();
        let (tx, rx)    = mpsc::channel();
        let device      = Default::default();
        let config      = LandmarkNetConfig::new(32, 32, 1);
        checkpoints.save_config(&config).unwrap();
        let model       = config.init::<TestAdBackend>(&device);

        let mut monitor = CheckpointingMonitor::<TestAdBackend>::new(checkpoints, 2).with_sink(ChannelSink::new(tx));
        monitor.on_train_begin(2).unwrap();
        monitor.on_epoch_end(1, &EpochLogs::standard(1.0, 1.0, 2.0, 2.0), &model).unwrap();
        assert!(monitor.snapshot.is_some());
        // Countdown 1 is not a multiple of 2 yet
        assert!(!monitor.checkpoints.exists::<NdArray>());

        monitor.on_epoch_end(2, &EpochLogs::standard(0.5, 0.5, 1.0, 1.0), &model).unwrap();
        monitor.on_train_end(&model).unwrap();
        assert!(monitor.checkpoints.exists::<NdArray>());

        let events: Vec<TrainingEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], TrainingEvent::Started { total_epochs: 2 });
        assert!(matches!(events[2], TrainingEvent::EpochFinished { epoch: 2, epochs_left: 0, .. }));
        assert_eq!(events[3], TrainingEvent::Finished);
    }

    fn head_weights<B: burn::prelude::Backend>(model: &LandmarkNet<B>) -> Vec<f32> {
        model.head.weight.val().into_data().to_vec::<f32>().unwrap()
    }

    /// Weights go through half precision on disk.
    fn same_weights(a: &[f32], b: &[f32]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-3)
    }

    #[test]
    fn test_saved_weights_follow_snapshot_then_live_model() {
        let tmp         = TempDir::new().unwrap();
        let checkpoints = CheckpointManager::new(tmp.path(), "landmarks").unwrap();
        let device      = Default::default();
        let config      = LandmarkNetConfig::new(32, 32, 1);
        checkpoints.save_config(&config).unwrap();

        // A freshly initialised network per epoch stands in for the
        // weights after that epoch.
        let models: Vec<LandmarkNet<TestAdBackend>> = (0..5).map(|_| config.init(&device)).collect();
        let losses  = [0.5, 0.5, 0.3, 0.3, 0.6];
        let on_disk = |monitor: &CheckpointingMonitor<TestAdBackend>| {
            let (_, loaded) = monitor.checkpoints.load_model::<NdArray>(&device).unwrap();
            head_weights(&loaded)
        };

        let mut monitor = CheckpointingMonitor::<TestAdBackend>::new(checkpoints, 2);
        monitor.on_train_begin(5).unwrap();
        for (i, (model, loss)) in models.iter().zip(losses).enumerate().take(4) {
            monitor.on_epoch_end(i + 1, &EpochLogs::standard(loss, loss, loss, loss), model).unwrap();
        }

        let epoch3 = head_weights(&models[2].valid());
        let epoch4 = head_weights(&models[3].valid());
        assert!(!same_weights(&epoch3, &epoch4));
        // The save after epoch 3 holds the epoch-3 snapshot
        assert!(same_weights(&on_disk(&monitor), &epoch3));

        // Epoch 5 does not improve: the periodic save rewrites the
        // epoch-3 snapshot, the end of the run writes the live model
        monitor.on_epoch_end(5, &EpochLogs::standard(0.6, 0.6, 0.6, 0.6), &models[4]).unwrap();
        assert!(same_weights(&on_disk(&monitor), &epoch3));

        monitor.on_train_end(&models[4]).unwrap();
        assert!(same_weights(&on_disk(&monitor), &head_weights(&models[4].valid())));
    }
}
