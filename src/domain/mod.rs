// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing landmarks,
// samples and training progress.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain data, pure functions and traits
//
// The landmark vocabulary fixes the order of every coordinate
// vector in the system; everything else refers to landmarks by
// their index in that vocabulary.

// Points, vocabulary and per-image landmark sets
pub mod landmark;

// One (image, landmarks) record keyed by file name
pub mod sample;

// Per-epoch metrics and training lifecycle events
pub mod training;

// Typed precondition failures of the data pipeline
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
