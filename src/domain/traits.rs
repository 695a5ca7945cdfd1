// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Training progress leaves the core through ProgressSink. The
// trainer never knows whether events end up in a channel, a
// CSV file or a terminal.
//
// Implementations:
//   - ChannelSink   → forwards events over an mpsc channel
//   - MetricsLogger → appends epoch metrics to a CSV file

use anyhow::Result;

use crate::domain::training::EpochLogs;

// ─── ProgressSink ─────────────────────────────────────────────────────────────
/// Observer of one training run.
///
/// Called from the training thread, hence `Send`.
pub trait ProgressSink: Send {
    /// The run has started and will last `total_epochs` epochs.
    fn run_started(&mut self, total_epochs: usize) -> Result<()>;

    /// An epoch completed; `epochs_left` counts the epochs still to run.
    fn epoch_finished(&mut self, epoch: usize, epochs_left: usize, logs: &EpochLogs) -> Result<()>;

    /// The run ended (all epochs done).
    fn run_finished(&mut self) -> Result<()>;
}
