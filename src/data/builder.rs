// ============================================================
// Layer 4 — Dataset Builder
// ============================================================
// Turns the project's raw images and landmark table into two
// on-disk datasets ready for training:
//
//   raw samples
//       │  drop samples with any missing landmark
//       ▼
//   split_validation      → validation / training originals
//       │
//       ├── validation: bin → write
//       │
//       └── training:   bin → write
//                        └── k times: rotate → zoom → noise → write
//                                     landmarks: rotate → zoom
//
// Both folders are cleared first and receive their own
// df_landmarks.csv side-car table. Every image and its landmarks
// go through the same transform with the same parameters in the
// same step, so the two never drift apart.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::image_io::{read_gray, write_gray, FloatImage};
use crate::data::splitter::split_validation;
use crate::data::table::{write_coordinate_table, LANDMARK_TABLE};
use crate::data::transform::{
    add_gaussian_noise, downsample, downsample_point, image_center, rotate_image, rotate_point,
    scale_image, scale_point,
};
use crate::domain::error::{PipelineError, Result};
use crate::domain::landmark::Vocabulary;
use crate::domain::sample::{augmented_file_name, FileEntry, Sample};

/// Zoom is drawn on a 0.001 grid.
const ZOOM_STEPS_PER_UNIT: f64 = 1000.0;

// ─── Options ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Synthetic variants generated per training original
    pub augmentations: usize,

    /// Integer downsampling factor; `None` keeps full resolution
    pub binning: Option<u32>,

    /// Share of the complete originals drawn into validation
    pub validation_fraction: f64,

    /// Divide binned images by their positive mean
    pub normalize: bool,

    /// Standard deviation of the pixel noise added to augmentations
    pub noise_sigma: f32,

    /// Inclusive zoom range for augmentations
    pub zoom_range: (f64, f64),
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            augmentations:       16,
            binning:             Some(10),
            validation_fraction: 0.2,
            normalize:           true,
            noise_sigma:         0.02,
            zoom_range:          (0.7, 1.3),
        }
    }
}

impl BuildOptions {
    /// Reject settings no build could honour, before any folder
    /// is touched.
    pub fn validate(&self) -> Result<()> {
        let f = self.validation_fraction;
        if !(0.0..=1.0).contains(&f) {
            return Err(PipelineError::InvalidFraction(f));
        }
        if !self.noise_sigma.is_finite() || self.noise_sigma < 0.0 {
            return Err(PipelineError::InvalidNoise(self.noise_sigma));
        }
        let (lo, hi) = self.zoom_range;
        for zoom in [lo, hi] {
            if !zoom.is_finite() || zoom <= 0.0 {
                return Err(PipelineError::InvalidZoom(zoom));
            }
        }
        if self.binning == Some(0) {
            return Err(PipelineError::InvalidBinning { factor: 0, width: 0, height: 0 });
        }
        Ok(())
    }
}

/// Counts reported after a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSummary {
    pub training_originals: usize,
    pub training_samples:   usize,
    pub validation_samples: usize,
    pub dropped_incomplete: usize,
}

// ─── DatasetBuilder ───────────────────────────────────────────────────────────
pub struct DatasetBuilder {
    options: BuildOptions,
}

impl DatasetBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    /// Build the training and validation folders.
    ///
    /// `samples` is the raw coordinate table; `files` resolves each
    /// sample's file name to its image on disk. Incomplete samples
    /// are dropped, not imputed.
    pub fn build<R: Rng + ?Sized>(
        &self,
        samples:    &[Sample],
        files:      &[FileEntry],
        vocabulary: &Vocabulary,
        train_dir:  &Path,
        val_dir:    &Path,
        rng:        &mut R,
    ) -> Result<BuildSummary> {
        self.options.validate()?;
        clear_or_create(train_dir)?;
        clear_or_create(val_dir)?;

        let paths: HashMap<&str, &str> = files
            .iter()
            .map(|f| (f.file_name.as_str(), f.full_path.as_str()))
            .collect();

        let complete: Vec<Sample> = samples.iter().filter(|s| s.is_complete()).cloned().collect();
        let dropped = samples.len() - complete.len();
        if dropped > 0 {
            tracing::info!("Excluding {} samples with missing landmarks", dropped);
        }

        let (train, val) = split_validation(complete, self.options.validation_fraction, rng);
        tracing::info!(
            "Building dataset: {} training originals (+{} augmentations each), {} validation",
            train.len(),
            self.options.augmentations,
            val.len(),
        );

        // ── Training set ──────────────────────────────────────────────────────
        let mut originals = Vec::with_capacity(train.len());
        let mut augmented = Vec::with_capacity(train.len() * self.options.augmentations);

        for sample in &train {
            let (img, sample) = self.load_binned(sample, &paths)?;
            write_gray(&train_dir.join(&sample.file_name), &img)?;

            for index in 0..self.options.augmentations {
                let (aug_img, aug_sample) = self.augment(&img, &sample, index, rng)?;
                write_gray(&train_dir.join(&aug_sample.file_name), &aug_img)?;
                augmented.push(aug_sample);
            }
            originals.push(sample);
        }

        let training_originals = originals.len();
        originals.extend(augmented);
        write_coordinate_table(&train_dir.join(LANDMARK_TABLE), vocabulary, &originals)?;

        // ── Validation set ────────────────────────────────────────────────────
        let mut validation = Vec::with_capacity(val.len());
        for sample in &val {
            let (img, sample) = self.load_binned(sample, &paths)?;
            write_gray(&val_dir.join(&sample.file_name), &img)?;
            validation.push(sample);
        }
        write_coordinate_table(&val_dir.join(LANDMARK_TABLE), vocabulary, &validation)?;

        let summary = BuildSummary {
            training_originals,
            training_samples:   originals.len(),
            validation_samples: validation.len(),
            dropped_incomplete: dropped,
        };
        tracing::info!(
            "Dataset ready: {} training samples in '{}', {} validation samples in '{}'",
            summary.training_samples,
            train_dir.display(),
            summary.validation_samples,
            val_dir.display(),
        );
        Ok(summary)
    }

    /// Read the sample's image and apply binning to image and
    /// landmarks together.
    fn load_binned(&self, sample: &Sample, paths: &HashMap<&str, &str>) -> Result<(FloatImage, Sample)> {
        let path = paths
            .get(sample.file_name.as_str())
            .ok_or_else(|| PipelineError::MissingFileEntry(sample.file_name.clone()))?;
        let img = read_gray(Path::new(path))?;

        match self.options.binning {
            Some(factor) => {
                let binned = downsample(&img, factor, self.options.normalize)?;
                Ok((binned, sample.map_points(|p| downsample_point(p, factor))))
            }
            None => Ok((img, sample.clone())),
        }
    }

    /// One synthetic variant: rotate, zoom, then noise. Landmarks
    /// follow the same rotation then the same zoom.
    fn augment<R: Rng + ?Sized>(
        &self,
        img:    &FloatImage,
        sample: &Sample,
        index:  usize,
        rng:    &mut R,
    ) -> Result<(FloatImage, Sample)> {
        let angle = f64::from(rng.gen_range(0..=360i32));
        let zoom  = self.draw_zoom(rng);

        let rotated = rotate_image(img, angle)?;
        let scaled  = scale_image(&rotated, zoom)?;
        let noisy   = add_gaussian_noise(&scaled, self.options.noise_sigma, rng)?;

        let center = image_center(img.width(), img.height());
        let moved  = sample
            .map_points(|p| scale_point(rotate_point(p, angle, center), zoom, center))
            .renamed(augmented_file_name(index, &sample.file_name));

        tracing::debug!("{}: angle {}°, zoom {:.3}", moved.file_name, angle, zoom);
        Ok((noisy, moved))
    }

    fn draw_zoom<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let (lo, hi) = self.options.zoom_range;
        let lo_step  = (lo.min(hi) * ZOOM_STEPS_PER_UNIT).round() as i64;
        let hi_step  = (lo.max(hi) * ZOOM_STEPS_PER_UNIT).round() as i64;
        rng.gen_range(lo_step..=hi_step) as f64 / ZOOM_STEPS_PER_UNIT
    }
}

/// Create `dir`, or delete the files it already holds.
fn clear_or_create(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        return Ok(());
    }

    tracing::info!("Removing files from '{}'", dir.display());
    let files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    for file in files {
        fs::remove_file(file)?;
    }
    Ok(())
}
