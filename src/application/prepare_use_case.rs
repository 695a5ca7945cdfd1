// ============================================================
// Layer 2 — PrepareUseCase
// ============================================================
// Turns the annotated project into training and validation
// folders:
//
//   Step 1: Read the vocabulary         (df_model.csv)
//   Step 2: Read the coordinate table   (df_landmarks.csv)
//   Step 3: Read the file table         (df_files.csv)
//   Step 4: Build both dataset folders  (Layer 4 - data)

use anyhow::{Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::application::project::ProjectLayout;
use crate::data::{
    builder::{BuildOptions, BuildSummary, DatasetBuilder},
    table::{read_coordinate_table, read_file_table, read_vocabulary},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepareConfig {
    pub project_dir: String,
    pub build:       BuildOptions,

    /// Fixed seed for a reproducible split and augmentation;
    /// `None` draws one from the OS
    pub seed: Option<u64>,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            project_dir: ".".to_string(),
            build:       BuildOptions::default(),
            seed:        None,
        }
    }
}

pub struct PrepareUseCase {
    config: PrepareConfig,
}

impl PrepareUseCase {
    pub fn new(config: PrepareConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<BuildSummary> {
        let cfg     = &self.config;
        let project = ProjectLayout::new(&cfg.project_dir);

        let vocabulary = read_vocabulary(&project.model_table())
            .with_context(|| format!("Cannot read the landmark vocabulary of '{}'", cfg.project_dir))?;
        let samples = read_coordinate_table(&project.landmark_table(), &vocabulary)
            .context("Cannot read the annotated landmarks")?;
        let files = read_file_table(&project.file_table())
            .context("Cannot read the project file table")?;
        tracing::info!(
            "Project '{}': {} landmarks, {} annotated images, {} files",
            cfg.project_dir, vocabulary.len(), samples.len(), files.len(),
        );

        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };

        let builder = DatasetBuilder::new(cfg.build.clone());
        let summary = builder
            .build(&samples, &files, &vocabulary, &project.training_dir(), &project.validation_dir(), &mut rng)
            .context("Dataset build failed")?;

        tracing::info!(
            "Built {} training samples ({} originals) and {} validation samples, dropped {} incomplete",
            summary.training_samples, summary.training_originals,
            summary.validation_samples, summary.dropped_incomplete,
        );
        Ok(summary)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::image_io::{write_gray, FloatImage};
    use crate::data::table::write_coordinate_table;
    use crate::domain::landmark::{Point, Vocabulary};
    use crate::domain::sample::Sample;
    use image::Luma;
    use std::{fs, path::Path};
    use tempfile::TempDir;

    /// A small annotated project: `n` 64×64 images, two landmarks
    /// near the centre, the last image missing one landmark.
    pub(crate) fn write_project(root: &Path, n: usize) {
        fs::create_dir_all(root.join("raw")).unwrap();
        fs::write(root.join("df_model.csv"), "name,target\nhead,x\ntail,x\n").unwrap();

        let mut files   = String::from("file name,full path,quality\n");
        let mut samples = Vec::new();
        for i in 0..n {
            let name = format!("img{i}.tif");
            let path = root.join("raw").join(&name);
            write_gray(&path, &FloatImage::from_fn(64, 64, |x, y| Luma([1.0 + ((x + y + i as u32) % 7) as f32]))).unwrap();
            files.push_str(&format!("{},{},good\n", name, path.display()));

            let tail = if i + 1 == n { None } else { Some(Point::new(36, 30 + (i % 3) as i64)) };
            samples.push(Sample::new(name, vec![Some(Point::new(28, 28)), tail]));
        }
        fs::write(root.join("df_files.csv"), files).unwrap();

        let vocab = Vocabulary::from_names(["head", "tail"]);
        write_coordinate_table(&root.join("df_landmarks.csv"), &vocab, &samples).unwrap();
    }

    #[test]
    fn test_prepare_builds_both_folders() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), 11);

        let config = PrepareConfig {
            project_dir: tmp.path().display().to_string(),
            build: BuildOptions { augmentations: 1, binning: Some(2), ..BuildOptions::default() },
            seed: Some(7),
        };
        let summary = PrepareUseCase::new(config).execute().unwrap();

        assert_eq!(summary.dropped_incomplete, 1);
        assert_eq!(summary.validation_samples, 2);
        assert_eq!(summary.training_samples, 16);
        assert!(tmp.path().join("training_data/df_landmarks.csv").exists());
        assert!(tmp.path().join("validation_data/df_landmarks.csv").exists());
    }

    #[test]
    fn test_prepare_without_vocabulary_fails() {
        let tmp    = TempDir::new().unwrap();
        let config = PrepareConfig { project_dir: tmp.path().display().to_string(), ..PrepareConfig::default() };
        let err    = PrepareUseCase::new(config).execute().unwrap_err();
        assert!(err.to_string().contains("Cannot read the landmark vocabulary"));
    }
}
