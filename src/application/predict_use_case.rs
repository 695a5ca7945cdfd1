// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Predicts every landmark for every image of the project file
// table and writes them as a coordinate table, in the same
// schema as df_landmarks.csv, inside the project folder.

use anyhow::{Context, Result};
use burn::{backend::Wgpu, prelude::Backend};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::project::{ProjectLayout, PREDICTION_TABLE};
use crate::data::table::{read_file_table, read_vocabulary, write_coordinate_table};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::Predictor;

type InferBackend = Wgpu;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictConfig {
    pub project_dir: String,
    pub model_name:  String,

    /// Output table name, relative to the project folder
    pub output: String,

    /// Divide each image by its positive mean before resizing;
    /// must match how the training images were prepared
    pub normalize: bool,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            project_dir: ".".to_string(),
            model_name:  "landmark_model".to_string(),
            output:      PREDICTION_TABLE.to_string(),
            normalize:   true,
        }
    }
}

/// Where the predictions went.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictReport {
    pub images: usize,
    pub output: PathBuf,
}

pub struct PredictUseCase {
    config: PredictConfig,
}

impl PredictUseCase {
    pub fn new(config: PredictConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PredictReport> {
        self.run::<InferBackend>(Default::default())
    }

    pub fn run<B: Backend>(&self, device: B::Device) -> Result<PredictReport> {
        let cfg     = &self.config;
        let project = ProjectLayout::new(&cfg.project_dir);

        let vocabulary  = read_vocabulary(&project.model_table()).context("Cannot read the landmark vocabulary")?;
        let files       = read_file_table(&project.file_table()).context("Cannot read the project file table")?;
        let checkpoints = CheckpointManager::new(project.models_dir(), &cfg.model_name)?;
        let predictor   = Predictor::<B>::from_checkpoint(&checkpoints, device)?;

        tracing::info!("Predicting {} landmarks on {} images", vocabulary.len(), files.len());
        let samples = predictor.predict(&files, &vocabulary, cfg.normalize)?;

        let output = project.output(&cfg.output);
        write_coordinate_table(&output, &vocabulary, &samples)
            .with_context(|| format!("Cannot write predictions to '{}'", output.display()))?;

        Ok(PredictReport { images: samples.len(), output })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::prepare_use_case::tests::write_project;
    use crate::data::table::read_coordinate_table;
    use crate::domain::landmark::Vocabulary;
    use crate::ml::model::LandmarkNetConfig;
    use burn::backend::NdArray;
    use tempfile::TempDir;

    #[test]
    fn test_predictions_written_for_every_file() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), 3);

        let device      = Default::default();
        let checkpoints = CheckpointManager::new(tmp.path().join("models"), "m").unwrap();
        let net         = LandmarkNetConfig::new(32, 32, 2);
        checkpoints.save_config(&net).unwrap();
        checkpoints.save_model(&net.init::<NdArray>(&device)).unwrap();

        let config = PredictConfig {
            project_dir: tmp.path().display().to_string(),
            model_name:  "m".to_string(),
            ..PredictConfig::default()
        };
        let report = PredictUseCase::new(config).run::<NdArray>(device).unwrap();
        assert_eq!(report.images, 3);

        let vocab = Vocabulary::from_names(["head", "tail"]);
        let rows  = read_coordinate_table(&report.output, &vocab).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|s| s.is_complete()));
    }

    #[test]
    fn test_missing_model_fails() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), 2);

        let config = PredictConfig { project_dir: tmp.path().display().to_string(), ..PredictConfig::default() };
        assert!(PredictUseCase::new(config).run::<NdArray>(Default::default()).is_err());
    }
}
