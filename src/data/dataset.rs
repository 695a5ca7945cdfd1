use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::loader::LandmarkArrays;

/// One training pair: a row-major grayscale image and its
/// flattened landmark coordinates `[x0, y0, x1, y1, ...]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkItem {
    pub image:  Vec<f32>,
    pub target: Vec<f32>,
}

pub struct LandmarkDataset {
    arrays: LandmarkArrays,
}

impl LandmarkDataset {
    pub fn new(arrays: LandmarkArrays) -> Self { Self { arrays } }
}

impl Dataset<LandmarkItem> for LandmarkDataset {
    fn get(&self, index: usize) -> Option<LandmarkItem> {
        (index < self.arrays.n_samples()).then(|| LandmarkItem {
            image:  self.arrays.image(index).to_vec(),
            target: self.arrays.target(index).to_vec(),
        })
    }

    fn len(&self) -> usize {
        self.arrays.n_samples()
    }
}
