// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + validation loop using Burn's DataLoader and Adam.
//
//   train     — fresh Adam at 1e-3, all layers trainable
//   fine_tune — normalisation frozen, fresh Adam at 1e-5
//
// Per epoch the monitor receives loss (MSE) and mae over the
// training batches, then val_loss / val_mae from the validation
// set, each averaged per sample. An empty validation set
// reports NaN instead of failing.
//
// Training runs on the autodiff backend B; validation runs on
// model.valid(), i.e. B::InnerBackend, so the validation
// batcher is built for the inner backend too.
//
// spawn_training / spawn_fine_tuning run the same loop on a
// dedicated thread and return a TrainingHandle; a failure or
// panic in that thread is logged there and handed back by
// join().

use anyhow::{anyhow, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{
    any::Any,
    thread::{self, JoinHandle},
};

use crate::data::{
    batcher::LandmarkBatcher,
    dataset::LandmarkDataset,
    loader::LandmarkArrays,
};
use crate::domain::error::PipelineError;
use crate::domain::training::EpochLogs;
use crate::ml::model::LandmarkNet;
use crate::ml::monitor::TrainingMonitor;

pub const TRAIN_LEARNING_RATE:     f64 = 1e-3;
pub const FINE_TUNE_LEARNING_RATE: f64 = 1e-5;
pub const DEFAULT_BATCH_SIZE:      usize = 16;

// Keras Adam default epsilon
const ADAM_EPSILON: f32 = 1e-7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub epochs:        usize,
    pub batch_size:    usize,
    pub learning_rate: f64,
    pub shuffle_seed:  u64,
}

impl FitOptions {
    pub fn training(epochs: usize) -> Self {
        Self { epochs, batch_size: DEFAULT_BATCH_SIZE, learning_rate: TRAIN_LEARNING_RATE, shuffle_seed: 42 }
    }

    pub fn fine_tuning(epochs: usize) -> Self {
        Self { learning_rate: FINE_TUNE_LEARNING_RATE, ..Self::training(epochs) }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

// ─── Entry Points ─────────────────────────────────────────────────────────────

/// Train every layer of `model` for `options.epochs` epochs.
pub fn train<B: AutodiffBackend>(
    model:   LandmarkNet<B>,
    train:   LandmarkArrays,
    val:     LandmarkArrays,
    options: &FitOptions,
    monitor: &mut dyn TrainingMonitor<B>,
    device:  &B::Device,
) -> Result<LandmarkNet<B>> {
    tracing::info!(
        "Training on {} samples ({} validation), {} epochs, lr={}",
        train.n_samples(), val.n_samples(), options.epochs, options.learning_rate,
    );
    fit(model, train, val, options, monitor, device)
}

/// Continue training a trained model with its normalisation
/// layers frozen.
pub fn fine_tune<B: AutodiffBackend>(
    model:   LandmarkNet<B>,
    train:   LandmarkArrays,
    val:     LandmarkArrays,
    options: &FitOptions,
    monitor: &mut dyn TrainingMonitor<B>,
    device:  &B::Device,
) -> Result<LandmarkNet<B>> {
    tracing::info!(
        "Fine-tuning on {} samples ({} validation), {} epochs, lr={}, normalisation frozen",
        train.n_samples(), val.n_samples(), options.epochs, options.learning_rate,
    );
    fit(model.freeze_normalization(), train, val, options, monitor, device)
}

// ─── Background Runs ──────────────────────────────────────────────────────────

/// A training run on its own thread.
pub struct TrainingHandle<B: AutodiffBackend> {
    name:   &'static str,
    handle: JoinHandle<Result<LandmarkNet<B>>>,
}

impl<B: AutodiffBackend> TrainingHandle<B> {
    /// Wait for the run and return the trained model, or the error
    /// (or panic) that stopped it.
    pub fn join(self) -> Result<LandmarkNet<B>> {
        match self.handle.join() {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!("{} thread panicked: {}", self.name, message);
                Err(anyhow!("{} thread panicked: {}", self.name, message))
            }
        }
    }
}

pub fn spawn_training<B, M>(
    model:   LandmarkNet<B>,
    train:   LandmarkArrays,
    val:     LandmarkArrays,
    options: FitOptions,
    monitor: M,
    device:  B::Device,
) -> Result<TrainingHandle<B>>
where
    B: AutodiffBackend,
    M: TrainingMonitor<B> + 'static,
{
    spawn_run("training", monitor, move |monitor| {
        self::train(model, train, val, &options, monitor, &device)
    })
}

pub fn spawn_fine_tuning<B, M>(
    model:   LandmarkNet<B>,
    train:   LandmarkArrays,
    val:     LandmarkArrays,
    options: FitOptions,
    monitor: M,
    device:  B::Device,
) -> Result<TrainingHandle<B>>
where
    B: AutodiffBackend,
    M: TrainingMonitor<B> + 'static,
{
    spawn_run("fine-tuning", monitor, move |monitor| {
        fine_tune(model, train, val, &options, monitor, &device)
    })
}

fn spawn_run<B, M, F>(name: &'static str, mut monitor: M, run: F) -> Result<TrainingHandle<B>>
where
    B: AutodiffBackend,
    M: TrainingMonitor<B> + 'static,
    F: FnOnce(&mut dyn TrainingMonitor<B>) -> Result<LandmarkNet<B>> + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(format!("landmark-{name}"))
        .spawn(move || {
            let result = run(&mut monitor);
            if let Err(e) = &result {
                tracing::error!("{} failed: {:#}", name, e);
            }
            result
        })?;
    Ok(TrainingHandle { name, handle })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

// ─── Epoch Loop ───────────────────────────────────────────────────────────────

/// Per-sample running averages of loss and mae.
#[derive(Default)]
struct RunningMetrics {
    samples:  usize,
    loss_sum: f64,
    mae_sum:  f64,
}

impl RunningMetrics {
    fn add(&mut self, samples: usize, loss: f64, mae: f64) {
        self.samples  += samples;
        self.loss_sum += loss * samples as f64;
        self.mae_sum  += mae * samples as f64;
    }

    fn loss(&self) -> f64 {
        if self.samples > 0 { self.loss_sum / self.samples as f64 } else { f64::NAN }
    }

    fn mae(&self) -> f64 {
        if self.samples > 0 { self.mae_sum / self.samples as f64 } else { f64::NAN }
    }
}

fn mean_absolute_error<B: Backend>(output: Tensor<B, 2>, targets: Tensor<B, 2>) -> f64 {
    (output - targets).abs().mean().into_scalar().elem::<f64>()
}

fn fit<B: AutodiffBackend>(
    model:   LandmarkNet<B>,
    train:   LandmarkArrays,
    val:     LandmarkArrays,
    options: &FitOptions,
    monitor: &mut dyn TrainingMonitor<B>,
    device:  &B::Device,
) -> Result<LandmarkNet<B>> {
    if train.is_empty() {
        return Err(PipelineError::EmptyDataset("training".into()).into());
    }
    let (height, width) = (train.height, train.width);
    if !val.is_empty() && (val.height, val.width) != (height, width) {
        return Err(PipelineError::NonUniformShape {
            path:         "validation set".into(),
            width:        width as u32,
            height:       height as u32,
            found_width:  val.width as u32,
            found_height: val.height as u32,
        }
        .into());
    }

    // ── Data loaders ──────────────────────────────────────────────────────────
    let batch_size    = options.batch_size.max(1);
    let train_batcher = LandmarkBatcher::<B>::new(device.clone(), height, width);
    let train_loader  = DataLoaderBuilder::new(train_batcher)
        .batch_size(batch_size)
        .shuffle(options.shuffle_seed)
        .num_workers(1)
        .build(LandmarkDataset::new(train));

    let val_batcher = LandmarkBatcher::<B::InnerBackend>::new(device.clone(), height, width);
    let val_loader  = DataLoaderBuilder::new(val_batcher)
        .batch_size(batch_size)
        .num_workers(1)
        .build(LandmarkDataset::new(val));

    let mut optim = AdamConfig::new().with_epsilon(ADAM_EPSILON).init();
    let mut model = model;

    monitor.on_train_begin(options.epochs)?;

    for epoch in 1..=options.epochs {
        // ── Training phase ────────────────────────────────────────────────────
        let mut train_metrics = RunningMetrics::default();
        for batch in train_loader.iter() {
            let samples        = batch.targets.dims()[0];
            let (loss, output) = model.forward_loss(batch.images, batch.targets.clone());

            let loss_val = loss.clone().into_scalar().elem::<f64>();
            let mae_val  = mean_absolute_error(output.inner(), batch.targets.inner());
            train_metrics.add(samples, loss_val, mae_val);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(options.learning_rate, model, grads);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid     = model.valid();
        let mut val_metrics = RunningMetrics::default();
        for batch in val_loader.iter() {
            let samples        = batch.targets.dims()[0];
            let (loss, output) = model_valid.forward_loss(batch.images, batch.targets.clone());
            val_metrics.add(
                samples,
                loss.into_scalar().elem::<f64>(),
                mean_absolute_error(output, batch.targets),
            );
        }

        let logs = EpochLogs::standard(
            train_metrics.loss(),
            train_metrics.mae(),
            val_metrics.loss(),
            val_metrics.mae(),
        );
        tracing::debug!(
            "Epoch {}/{}: loss={:.4} mae={:.4} val_loss={:.4} val_mae={:.4}",
            epoch, options.epochs,
            train_metrics.loss(), train_metrics.mae(), val_metrics.loss(), val_metrics.mae(),
        );
        monitor.on_epoch_end(epoch, &logs, &model)?;
    }

    monitor.on_train_end(&model)?;
    tracing::info!("Training complete!");
    Ok(model)
}
