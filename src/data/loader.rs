// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Reads a dataset folder written by the DatasetBuilder (images
// plus df_landmarks.csv) into dense, model-ready arrays:
//
//   images  [n_samples, height, width, 1]   f32, row-major
//   coords  [n_samples, 2 × n_landmarks]    f32, x0 y0 x1 y1 ...
//
// Every image must share one shape. A folder with mixed sizes
// fails with PipelineError::NonUniformShape before any pixel
// is copied, so callers never see a partial or mis-shaped array.
//
// Sample order is the order of unique full paths in the file
// table, and the image row and coordinate row of a sample are
// always filled from the same key.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use crate::data::image_io::{read_dimensions, read_gray};
use crate::data::table::{read_coordinate_table, LANDMARK_TABLE};
use crate::domain::error::{PipelineError, Result};
use crate::domain::landmark::{Point, Vocabulary};
use crate::domain::sample::{FileEntry, Sample};

/// A whole dataset in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkArrays {
    pub file_names:  Vec<String>,
    pub images:      Vec<f32>,
    pub coords:      Vec<f32>,
    pub height:      usize,
    pub width:       usize,
    pub n_landmarks: usize,
}

impl LandmarkArrays {
    fn empty(n_landmarks: usize) -> Self {
        Self {
            file_names: Vec::new(),
            images:     Vec::new(),
            coords:     Vec::new(),
            height:     0,
            width:      0,
            n_landmarks,
        }
    }

    pub fn n_samples(&self) -> usize {
        self.file_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file_names.is_empty()
    }

    /// Pixels of sample `i`, row-major.
    pub fn image(&self, i: usize) -> &[f32] {
        let len = self.height * self.width;
        &self.images[i * len..(i + 1) * len]
    }

    /// Flattened coordinates of sample `i`.
    pub fn target(&self, i: usize) -> &[f32] {
        let len = 2 * self.n_landmarks;
        &self.coords[i * len..(i + 1) * len]
    }
}

// ─── Shape Check ──────────────────────────────────────────────────────────────

/// Common `(width, height)` of every image in `files`.
///
/// Returns `Ok(None)` for an empty table and
/// `NonUniformShape` as soon as one image differs from the first.
pub fn check_image_shape(files: &[FileEntry]) -> Result<Option<(u32, u32)>> {
    let mut expected: Option<(u32, u32)> = None;

    for entry in files {
        let found = read_dimensions(Path::new(&entry.full_path))?;
        match expected {
            None => expected = Some(found),
            Some((width, height)) if (width, height) != found => {
                return Err(PipelineError::NonUniformShape {
                    path: entry.full_path.clone(),
                    width,
                    height,
                    found_width:  found.0,
                    found_height: found.1,
                });
            }
            Some(_) => {}
        }
    }
    Ok(expected)
}

// ─── DatasetLoader ────────────────────────────────────────────────────────────
pub struct DatasetLoader<'a> {
    vocabulary: &'a Vocabulary,
}

impl<'a> DatasetLoader<'a> {
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        Self { vocabulary }
    }

    /// Load a folder written by the DatasetBuilder, using its
    /// `df_landmarks.csv` as both coordinate and file table.
    pub fn load_folder(&self, folder: &Path) -> Result<LandmarkArrays> {
        let coordinates = read_coordinate_table(&folder.join(LANDMARK_TABLE), self.vocabulary)?;
        let files: Vec<FileEntry> = coordinates
            .iter()
            .map(|s| FileEntry::new(s.file_name.clone(), folder.join(&s.file_name).display().to_string()))
            .collect();
        self.load(folder, &coordinates, &files)
    }

    /// Assemble the arrays for `files`, whose landmarks are looked
    /// up in `coordinates` (file names relative to `folder`).
    pub fn load(&self, folder: &Path, coordinates: &[Sample], files: &[FileEntry]) -> Result<LandmarkArrays> {
        let Some((width, height)) = check_image_shape(files)? else {
            tracing::warn!("Dataset '{}' is empty", folder.display());
            return Ok(LandmarkArrays::empty(self.vocabulary.len()));
        };

        let by_path: HashMap<PathBuf, &Sample> = coordinates
            .iter()
            .map(|s| (folder.join(&s.file_name), s))
            .collect();

        let mut seen   = HashSet::new();
        let mut arrays = LandmarkArrays {
            height: height as usize,
            width:  width as usize,
            ..LandmarkArrays::empty(self.vocabulary.len())
        };

        for entry in files {
            let path = PathBuf::from(&entry.full_path);
            if !seen.insert(path.clone()) {
                continue;
            }

            let sample = by_path
                .get(&path)
                .ok_or_else(|| PipelineError::MissingFileEntry(entry.file_name.clone()))?;
            let points = self.complete_points(sample)?;
            let img    = read_gray(&path)?;

            arrays.images.extend_from_slice(img.as_raw());
            arrays.coords.extend(points.iter().flat_map(|p| [p.x as f32, p.y as f32]));
            arrays.file_names.push(sample.file_name.clone());
        }

        tracing::info!(
            "Loaded {} samples of {}x{} from '{}'",
            arrays.n_samples(),
            width,
            height,
            folder.display(),
        );
        Ok(arrays)
    }

    fn complete_points(&self, sample: &Sample) -> Result<Vec<Point>> {
        sample.complete_points().ok_or_else(|| {
            let missing = sample
                .landmarks
                .iter()
                .position(Option::is_none)
                .and_then(|i| self.vocabulary.names().get(i))
                .cloned()
                .unwrap_or_default();
            PipelineError::MissingLandmark { file_name: sample.file_name.clone(), landmark: missing }
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::image_io::{write_gray, FloatImage};
    use crate::data::table::write_coordinate_table;
    use image::Luma;
    use tempfile::TempDir;

    fn write_dataset(dir: &Path, sizes: &[(u32, u32)]) -> Vocabulary {
        let vocab = Vocabulary::from_names(["a", "b"]);
        let mut rows = Vec::new();
        for (i, &(w, h)) in sizes.iter().enumerate() {
            let name = format!("s{i}.tif");
            let img  = FloatImage::from_fn(w, h, |x, y| Luma([(i * 100) as f32 + (y * w + x) as f32]));
            write_gray(&dir.join(&name), &img).unwrap();
            rows.push(Sample::new(
                name,
                vec![Some(Point::new(i as i64, 1)), Some(Point::new(2, 3 + i as i64))],
            ));
        }
        write_coordinate_table(&dir.join(LANDMARK_TABLE), &vocab, &rows).unwrap();
        vocab
    }

    #[test]
    fn test_load_folder_shapes_and_order() {
        let tmp    = TempDir::new().unwrap();
        let vocab  = write_dataset(tmp.path(), &[(6, 4), (6, 4), (6, 4)]);
        let arrays = DatasetLoader::new(&vocab).load_folder(tmp.path()).unwrap();

        assert_eq!((arrays.n_samples(), arrays.height, arrays.width), (3, 4, 6));
        assert_eq!(arrays.coords.len(), 3 * 4);
        assert_eq!(arrays.file_names, vec!["s0.tif", "s1.tif", "s2.tif"]);

        // Row i of both arrays belongs to the same sample
        assert_eq!(arrays.target(2), &[2.0, 1.0, 2.0, 5.0]);
        assert_eq!(arrays.image(2)[0], 200.0);
        assert_eq!(arrays.image(1)[7], 107.0);
    }

    #[test]
    fn test_non_uniform_shape_is_reported() {
        let tmp   = TempDir::new().unwrap();
        let vocab = write_dataset(tmp.path(), &[(6, 4), (6, 4), (5, 4)]);

        let result = DatasetLoader::new(&vocab).load_folder(tmp.path());
        match result {
            Err(PipelineError::NonUniformShape { width, found_width, .. }) => {
                assert_eq!((width, found_width), (6, 5));
            }
            other => panic!("expected NonUniformShape, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_dataset_loads_as_empty_arrays() {
        let tmp    = TempDir::new().unwrap();
        let vocab  = write_dataset(tmp.path(), &[]);
        let arrays = DatasetLoader::new(&vocab).load_folder(tmp.path()).unwrap();
        assert!(arrays.is_empty());
        assert_eq!(arrays.n_landmarks, 2);
    }

    #[test]
    fn test_incomplete_row_is_rejected() {
        let tmp   = TempDir::new().unwrap();
        let vocab = Vocabulary::from_names(["a", "b"]);
        write_gray(&tmp.path().join("x.tif"), &FloatImage::new(4, 4)).unwrap();
        let rows = vec![Sample::new("x.tif", vec![Some(Point::new(1, 1)), None])];
        write_coordinate_table(&tmp.path().join(LANDMARK_TABLE), &vocab, &rows).unwrap();

        let result = DatasetLoader::new(&vocab).load_folder(tmp.path());
        assert!(matches!(result, Err(PipelineError::MissingLandmark { ref landmark, .. }) if landmark == "b"));
    }
}
