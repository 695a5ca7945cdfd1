// ============================================================
// Layer 3 — Sample Domain Type
// ============================================================
// A Sample pairs one image (identified by its file name) with
// its landmark positions. Original samples come from the
// project; augmented samples are derived from an original and
// named `{augmentation_index}_{original_file_name}`.
//
// Samples are values: every transformation returns a new
// Sample instead of editing a shared table in place.

use serde::{Deserialize, Serialize};

use crate::domain::landmark::{LandmarkSet, Point};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unique key of the sample inside its dataset
    pub file_name: String,

    /// Positions aligned with the vocabulary order
    pub landmarks: LandmarkSet,
}

impl Sample {
    pub fn new(file_name: impl Into<String>, landmarks: LandmarkSet) -> Self {
        Self { file_name: file_name.into(), landmarks }
    }

    /// True when every vocabulary landmark has a position.
    pub fn is_complete(&self) -> bool {
        self.landmarks.iter().all(Option::is_some)
    }

    /// All positions, or `None` if any landmark is missing.
    pub fn complete_points(&self) -> Option<Vec<Point>> {
        self.landmarks.iter().copied().collect()
    }

    /// Apply `f` to every annotated position, keeping the file name.
    pub fn map_points(&self, f: impl Fn(Point) -> Point) -> Self {
        Self {
            file_name: self.file_name.clone(),
            landmarks: self.landmarks.iter().map(|p| p.map(&f)).collect(),
        }
    }

    /// Same landmarks under a different file name.
    pub fn renamed(&self, file_name: impl Into<String>) -> Self {
        Self { file_name: file_name.into(), landmarks: self.landmarks.clone() }
    }
}

/// File name of the `index`-th augmentation of `original`.
pub fn augmented_file_name(index: usize, original: &str) -> String {
    format!("{index}_{original}")
}

/// One row of the project file table: the sample key and where
/// its image lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub file_name: String,
    pub full_path: String,
}

impl FileEntry {
    pub fn new(file_name: impl Into<String>, full_path: impl Into<String>) -> Self {
        Self { file_name: file_name.into(), full_path: full_path.into() }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completeness() {
        let full    = Sample::new("a.tif", vec![Some(Point::new(1, 2)), Some(Point::new(3, 4))]);
        let partial = Sample::new("b.tif", vec![Some(Point::new(1, 2)), None]);
        assert!(full.is_complete());
        assert!(!partial.is_complete());
        assert_eq!(partial.complete_points(), None);
        assert_eq!(full.complete_points().map(|p| p.len()), Some(2));
    }

    #[test]
    fn test_map_points_keeps_missing_entries() {
        let s = Sample::new("a.tif", vec![Some(Point::new(10, 20)), None]);
        let m = s.map_points(|p| Point::new(p.x / 2, p.y / 2));
        assert_eq!(m.landmarks, vec![Some(Point::new(5, 10)), None]);
        assert_eq!(m.file_name, "a.tif");
    }

    #[test]
    fn test_augmented_name() {
        assert_eq!(augmented_file_name(3, "fish_01.tif"), "3_fish_01.tif");
    }
}
