// ============================================================
// Layer 4 — Landmark Batcher
// ============================================================
// Implements Burn's Batcher trait to stack LandmarkItems into
// tensors for the forward pass.
//
//   Input:  Vec of N items, each H×W pixels and 2L coordinates
//   Output: images  [N, 1, H, W]
//           targets [N, 2L]
//
// A single-channel NHWC image has the same memory layout as
// NCHW, so the row-major pixel buffers are stacked as they are.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::LandmarkItem;

// ─── LandmarkBatch ────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct LandmarkBatch<B: Backend> {
    /// Grayscale images, shape [batch_size, 1, height, width]
    pub images: Tensor<B, 4>,

    /// Ground-truth coordinates, shape [batch_size, 2 × n_landmarks]
    pub targets: Tensor<B, 2>,
}

// ─── LandmarkBatcher ──────────────────────────────────────────────────────────
/// Holds the target device and the image size of the dataset.
#[derive(Clone, Debug)]
pub struct LandmarkBatcher<B: Backend> {
    pub device: B::Device,
    pub height: usize,
    pub width:  usize,
}

impl<B: Backend> LandmarkBatcher<B> {
    pub fn new(device: B::Device, height: usize, width: usize) -> Self {
        Self { device, height, width }
    }

    /// Stack raw pixel rows into a `[n, 1, height, width]` tensor.
    pub fn images(&self, pixels: Vec<f32>, n: usize) -> Tensor<B, 4> {
        Tensor::from_data(TensorData::new(pixels, [n, 1, self.height, self.width]), &self.device)
    }
}

impl<B: Backend> Batcher<LandmarkItem, LandmarkBatch<B>> for LandmarkBatcher<B> {
    fn batch(&self, items: Vec<LandmarkItem>) -> LandmarkBatch<B> {
        let batch_size = items.len();
        let output_dim = items.first().map_or(0, |i| i.target.len());

        let pixels: Vec<f32> = items.iter().flat_map(|i| i.image.iter().copied()).collect();
        let coords: Vec<f32> = items.iter().flat_map(|i| i.target.iter().copied()).collect();

        let images  = self.images(pixels, batch_size);
        let targets = Tensor::from_data(TensorData::new(coords, [batch_size, output_dim]), &self.device);

        LandmarkBatch { images, targets }
    }
}
