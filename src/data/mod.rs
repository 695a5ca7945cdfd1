// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from the annotated project
// tables all the way to tensor batches.
//
// The pipeline flows in this order:
//
//   df_landmarks.csv + df_files.csv + images
//       │
//       ▼
//   table / image_io  → reads coordinates and float images
//       │
//       ▼
//   DatasetBuilder    → drops incomplete samples, splits,
//       │               bins, augments (transform), writes
//       │               training_data/ and validation_data/
//       ▼
//   DatasetLoader     → dataset folder → in-memory arrays
//       │
//       ▼
//   LandmarkDataset   → implements Burn's Dataset trait
//       │
//       ▼
//   LandmarkBatcher   → stacks samples into tensor batches
//
// Each module is responsible for exactly one step.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Grayscale float image reading and writing
pub mod image_io;

/// Geometric transforms on images and their landmarks
pub mod transform;

/// Coordinate, file and vocabulary CSV tables
pub mod table;

/// Shuffles and splits samples into train/validation sets
pub mod splitter;

/// Builds the training and validation folders
pub mod builder;

/// Loads a dataset folder into arrays
pub mod loader;

/// Implements Burn's Dataset trait for landmark samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
