//! Progress reporting for the fetch phase.
//!
//! The scheduler reports finished fetch tasks through [`ProgressCallback`]
//! without knowing how (or whether) they are rendered. The CLI plugs in an
//! `indicatif` bar; tests and dry runs use [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from a long-running phase.
///
/// Implementations must be `Send + Sync` because updates arrive from
/// concurrently running fetch tasks.
pub trait ProgressCallback: Send + Sync {
    /// Sets the total expected units of work.
    fn set_total(&self, total: u64);

    /// Advances progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Updates the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks the phase as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
