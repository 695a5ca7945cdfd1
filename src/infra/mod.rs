// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting persistence used by the ML and application
// layers:
//
//   checkpoint.rs — Saving and loading the landmark network.
//                   Uses Burn's CompactRecorder for the weights
//                   and a JSON side-car for the architecture,
//                   so inference can rebuild the model.
//
//   metrics.rs    — Per-epoch metrics CSV, fed as a
//                   ProgressSink by the training monitor.

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
