// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one pipeline step (prepare, train or predict).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1); progress leaves
//     through callbacks
//   - Only workflow coordination over explicit configs

// Where project tables, datasets and models live
pub mod project;

// Build the training and validation folders
pub mod prepare_use_case;

// Train from scratch, resume or fine-tune
pub mod train_use_case;

// Predict landmarks for every project image
pub mod predict_use_case;
