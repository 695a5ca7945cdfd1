// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the landmark network with Burn's
// CompactRecorder. A model is identified by its name and
// lives as one set of files that every save overwrites (no
// per-epoch versions):
//
//   <dir>/
//     <model_name>.mpk       ← weights (extension set by the recorder)
//     <model_name>.json      ← LandmarkNetConfig, to rebuild the network
//     train_config.json      ← the run settings that produced it
//
// Extensions are appended to the full model name, so names with
// dots ("fish.v1", "fish.v2") stay distinct.
//
// The network config is written separately because loading
// needs the exact architecture (input size, landmark count)
// before the weights can be restored into it.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, FileRecorder, Recorder},
};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::ml::model::{LandmarkNet, LandmarkNetConfig};

pub const RUN_CONFIG_FILE: &str = "train_config.json";

pub struct CheckpointManager {
    dir:        PathBuf,
    model_name: String,
}

impl CheckpointManager {
    /// Creates `dir` if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>, model_name: impl Into<String>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir, model_name: model_name.into() })
    }

    /// Extension-less location of the model, for messages.
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.model_name)
    }

    fn file_path(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.model_name, extension))
    }

    /// The recorder resets the extension of the path it is given,
    /// so it always receives this full file name.
    pub fn weights_path<B: Backend>(&self) -> PathBuf {
        self.file_path(<CompactRecorder as FileRecorder<B>>::file_extension())
    }

    fn config_path(&self) -> PathBuf {
        self.file_path("json")
    }

    /// True once weights have been written for this model name.
    pub fn exists<B: Backend>(&self) -> bool {
        self.weights_path::<B>().exists()
    }

    /// Overwrite the stored weights with `model`'s.
    pub fn save_model<B: Backend>(&self, model: &LandmarkNet<B>) -> Result<()> {
        let path = self.weights_path::<B>();
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save model to '{}'", path.display()))?;

        tracing::debug!("Saved model weights to '{}'", path.display());
        Ok(())
    }

    /// Rebuild the network from its saved config, then restore the
    /// saved weights into it.
    pub fn load_model<B: Backend>(&self, device: &B::Device) -> Result<(LandmarkNetConfig, LandmarkNet<B>)> {
        let config = self.load_config()?;
        let path   = self.weights_path::<B>();

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load model '{}'. Have you trained the model first?", path.display())
            })?;

        tracing::info!("Loaded model '{}' ({}x{}, {} landmarks)", self.model_name, config.width, config.height, config.n_landmarks);
        Ok((config.clone(), config.init::<B>(device).load_record(record)))
    }

    pub fn save_config(&self, config: &LandmarkNetConfig) -> Result<()> {
        write_json(&self.config_path(), config)
    }

    pub fn load_config(&self) -> Result<LandmarkNetConfig> {
        let path = self.config_path();
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read model config from '{}'. \
                 Make sure you have run 'train' first.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Record the settings of the run next to the model.
    pub fn save_run_config<T: Serialize>(&self, run: &T) -> Result<()> {
        write_json(&self.dir.join(RUN_CONFIG_FILE), run)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))?;
    tracing::debug!("Wrote '{}'", path.display());
    Ok(())
}
