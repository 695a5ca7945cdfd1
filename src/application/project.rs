// ============================================================
// Layer 2 — Project Layout
// ============================================================
// Where every use case finds and writes its files:
//
//   <project>/
//     df_files.csv                 file name → full path
//     df_model.csv                 landmark vocabulary (name, target)
//     df_landmarks.csv             annotated coordinates
//     training_data/               built by `prepare`
//     validation_data/             built by `prepare`
//     models/                      checkpoints and their configs
//     metrics.csv                  per-epoch training metrics
//     df_predicted_landmarks.csv   default output of `predict`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::table::LANDMARK_TABLE;

pub const FILE_TABLE:        &str = "df_files.csv";
pub const MODEL_TABLE:       &str = "df_model.csv";
pub const TRAINING_DIR:      &str = "training_data";
pub const VALIDATION_DIR:    &str = "validation_data";
pub const MODELS_DIR:        &str = "models";
pub const PREDICTION_TABLE:  &str = "df_predicted_landmarks.csv";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_table(&self) -> PathBuf {
        self.root.join(FILE_TABLE)
    }

    pub fn model_table(&self) -> PathBuf {
        self.root.join(MODEL_TABLE)
    }

    pub fn landmark_table(&self) -> PathBuf {
        self.root.join(LANDMARK_TABLE)
    }

    pub fn training_dir(&self) -> PathBuf {
        self.root.join(TRAINING_DIR)
    }

    pub fn validation_dir(&self) -> PathBuf {
        self.root.join(VALIDATION_DIR)
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join(MODELS_DIR)
    }

    /// Resolve an output table name inside the project.
    pub fn output(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}
