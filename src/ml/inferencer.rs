// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Runs a trained LandmarkNet on raw project images:
//
//   image (any size) ─ normalise? ─ resize to (H, W) ─ forward
//        │                                               │
//        └── scale = (native_w / W, native_h / H) ───────┴─▶ points × scale
//
// The scale is computed per image and per axis, so one call
// can mix image sizes. Coordinates are rounded to pixels.
use anyhow::{bail, Result};
use burn::prelude::*;
use std::{collections::HashSet, path::Path};

use crate::data::batcher::LandmarkBatcher;
use crate::data::image_io::read_gray;
use crate::data::transform::{normalized, resize_preserving_range};
use crate::domain::landmark::{Point, Vocabulary};
use crate::domain::sample::{FileEntry, Sample};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{LandmarkNet, LandmarkNetConfig};
use crate::ml::trainer::DEFAULT_BATCH_SIZE;

/// Map flat model-space output `[x0, y0, x1, y1, ...]` back to the
/// native image by multiplying each axis by its resize factor.
pub fn rescale_predictions(flat: &[f32], scale: (f64, f64)) -> Vec<Point> {
    let (sx, sy) = scale;
    flat.chunks_exact(2)
        .map(|xy| Point::rounded(xy[0] as f64 * sx, xy[1] as f64 * sy))
        .collect()
}

pub struct Predictor<B: Backend> {
    model:      LandmarkNet<B>,
    config:     LandmarkNetConfig,
    device:     B::Device,
    batch_size: usize,
}

impl<B: Backend> Predictor<B> {
    pub fn new(model: LandmarkNet<B>, config: LandmarkNetConfig, device: B::Device) -> Self {
        Self { model, config, device, batch_size: DEFAULT_BATCH_SIZE }
    }

    pub fn from_checkpoint(checkpoints: &CheckpointManager, device: B::Device) -> Result<Self> {
        let (config, model) = checkpoints.load_model::<B>(&device)?;
        Ok(Self::new(model, config, device))
    }

    /// Predict every landmark of every unique image in `files`.
    pub fn predict(&self, files: &[FileEntry], vocabulary: &Vocabulary, normalize: bool) -> Result<Vec<Sample>> {
        if vocabulary.output_dim() != self.config.output_dim() {
            bail!(
                "Model predicts {} landmarks but the vocabulary has {}",
                self.config.n_landmarks,
                vocabulary.len()
            );
        }

        let (height, width) = (self.config.height, self.config.width);
        let batcher         = LandmarkBatcher::<B>::new(self.device.clone(), height, width);

        let mut seen    = HashSet::new();
        let unique: Vec<&FileEntry> = files.iter().filter(|f| seen.insert(f.full_path.as_str())).collect();
        let mut samples = Vec::with_capacity(unique.len());

        for chunk in unique.chunks(self.batch_size) {
            let mut pixels = Vec::with_capacity(chunk.len() * height * width);
            let mut scales = Vec::with_capacity(chunk.len());

            for entry in chunk {
                let mut img = read_gray(Path::new(&entry.full_path))?;
                if normalize {
                    img = normalized(&img)?;
                }
                scales.push((
                    img.width() as f64 / width as f64,
                    img.height() as f64 / height as f64,
                ));
                let resized = resize_preserving_range(&img, width as u32, height as u32);
                pixels.extend_from_slice(resized.as_raw());
            }

            let output = self
                .model
                .forward(batcher.images(pixels, chunk.len()))
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| anyhow::anyhow!("Cannot read model output: {e:?}"))?;

            let dim = self.config.output_dim();
            for ((entry, scale), row) in chunk.iter().zip(&scales).zip(output.chunks_exact(dim)) {
                let points = rescale_predictions(row, *scale);
                samples.push(Sample::new(entry.file_name.clone(), points.into_iter().map(Some).collect()));
            }
            tracing::info!("Predicted {}/{} images", samples.len(), unique.len());
        }

        Ok(samples)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::image_io::{write_gray, FloatImage};
    use burn::backend::NdArray;
    use image::Luma;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    #[test]
    fn test_rescale_to_native_size() {
        // 128×128 model, 256×256 image
        let points = rescale_predictions(&[64.0, 64.0, 10.4, 20.6], (2.0, 2.0));
        assert_eq!(points, vec![Point::new(128, 128), Point::new(21, 41)]);
    }

    #[test]
    fn test_rescale_axes_independently() {
        let points = rescale_predictions(&[10.0, 10.0], (3.0, 0.5));
        assert_eq!(points, vec![Point::new(30, 5)]);
    }

    #[test]
    fn test_predict_one_row_per_unique_image() {
        let tmp    = TempDir::new().unwrap();
        let device = Default::default();
        let config = LandmarkNetConfig::new(32, 32, 2);
        let model  = config.init::<TestBackend>(&device);

        let mut files = Vec::new();
        for (i, (w, h)) in [(64, 64), (40, 96)].into_iter().enumerate() {
            let path = tmp.path().join(format!("{i}.tif"));
            write_gray(&path, &FloatImage::from_fn(w, h, |x, _| Luma([1.0 + x as f32]))).unwrap();
            files.push(FileEntry::new(format!("{i}.tif"), path.display().to_string()));
        }
        files.push(files[0].clone());

        let predictor = Predictor::new(model, config, device);
        let vocab     = Vocabulary::from_names(["a", "b"]);
        let samples   = predictor.predict(&files, &vocab, true).unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].file_name, "1.tif");
        assert!(samples.iter().all(Sample::is_complete));
    }

    #[test]
    fn test_predict_rejects_vocabulary_mismatch() {
        let device    = Default::default();
        let config    = LandmarkNetConfig::new(32, 32, 2);
        let predictor = Predictor::new(config.init::<TestBackend>(&device), config, device);

        let result = predictor.predict(&[], &Vocabulary::from_names(["only"]), false);
        assert!(result.is_err());
    }
}
