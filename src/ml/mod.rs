// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The network, its training loop and inference.
//
// What's in this layer:
//
//   model.rs      — The landmark CNN
//                   • 12 conv blocks: conv 3×3 → LeakyReLU → BatchNorm
//                   • max-pool 2×2 after every second block but the last
//                   • dense 512 → ReLU → dense 2·L head
//                   • normalisation can be frozen for fine-tuning
//
//   trainer.rs    — train / fine_tune loops (MSE, Adam) and
//                   their background-thread runners
//
//   monitor.rs    — TrainingMonitor trait, the checkpoint
//                   policy and progress forwarding
//
//   inferencer.rs — Loads a checkpoint, resizes raw images,
//                   predicts and rescales to native pixels
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Landmark regression CNN architecture
pub mod model;

/// Training and fine-tuning loops
pub mod trainer;

/// Per-epoch monitoring and checkpoint policy
pub mod monitor;

/// Prediction on native-size images
pub mod inferencer;
