//! Progress reporting for scoring runs.
//!
//! Defines a [`ProgressCallback`] trait that decouples progress reporting
//! from any rendering backend. The CLI renders it with `indicatif`;
//! library callers and tests use [`NullProgress`].

use std::sync::Arc;

/// Trait for reporting progress while points are being scored.
///
/// Implementations must be `Send + Sync` so a single reporter can be
/// shared by concurrently running scorer calls.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected number of points.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` points.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// A no-op [`ProgressCallback`].
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
