//! Progress observation seam.
//!
//! The calculation and synchronization engines report entry counts at every
//! checkpoint through this trait; rendering (a progress bar, a log line,
//! nothing at all) lives with the caller.

/// Receiver for periodic progress updates.
pub trait ProgressObserver {
    /// Called at each checkpoint with entries processed so far and the total
    /// discovered so far. The total grows as directories are enumerated.
    fn on_progress(&mut self, done: u64, total: u64);
}

/// Observer that discards all updates.
pub struct NullProgress;

impl ProgressObserver for NullProgress {
    fn on_progress(&mut self, _done: u64, _total: u64) {}
}
