//! Step progress for pipeline runs.
//!
//! [`Pipeline`](crate::Pipeline) announces its step count with
//! [`ProgressCallback::set_total`], names each step with
//! [`ProgressCallback::set_message`] and advances one unit per finished
//! step. How that is shown is up to the implementation: a terminal bar
//! (see the CLI utilities crate), plain log lines ([`LogProgress`]), or
//! nothing ([`NullProgress`]).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Receives step progress from a pipeline run.
///
/// Shared as `Arc<dyn ProgressCallback>`, so implementations use interior
/// mutability.
pub trait ProgressCallback: Send + Sync {
    /// Number of steps the run will report.
    fn set_total(&self, total: u64);

    /// Jumps to an absolute step count.
    fn set_position(&self, pos: u64);

    /// Marks `delta` more steps as finished.
    fn inc(&self, delta: u64);

    /// Names the step now in progress.
    fn set_message(&self, msg: String);

    /// The run succeeded; `msg` summarizes it.
    fn finish(&self, msg: String);

    /// The run halted; drop any indicator without a final message.
    fn finish_and_clear(&self);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn set_position(&self, _pos: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// Shared [`NullProgress`], the default for [`Pipeline`](crate::Pipeline).
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}

/// Reports each step as a `log::info!` line prefixed with `[step/total]`.
///
/// For non-interactive runs where redrawing a bar would only add noise.
#[derive(Debug, Default)]
pub struct LogProgress {
    total: AtomicU64,
    position: AtomicU64,
}

impl LogProgress {
    /// Creates a reporter with no steps announced yet.
    #[must_use]
    pub fn shared() -> Arc<dyn ProgressCallback> {
        Arc::new(Self::default())
    }

    /// Steps finished so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Label for the step in progress, e.g. `[2/6]`.
    #[must_use]
    pub fn step_label(&self) -> String {
        let total = self.total.load(Ordering::Relaxed);
        let current = (self.position() + 1).min(total.max(1));
        format!("[{current}/{total}]")
    }
}

impl ProgressCallback for LogProgress {
    fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.position.store(0, Ordering::Relaxed);
    }

    fn set_position(&self, pos: u64) {
        self.position.store(pos, Ordering::Relaxed);
    }

    fn inc(&self, delta: u64) {
        self.position.fetch_add(delta, Ordering::Relaxed);
    }

    fn set_message(&self, msg: String) {
        log::info!("{} {msg}", self.step_label());
    }

    fn finish(&self, msg: String) {
        log::info!("{msg}");
    }

    fn finish_and_clear(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_progress_labels_current_step() {
        let progress = LogProgress::default();
        progress.set_total(6);
        assert_eq!(progress.step_label(), "[1/6]");

        progress.inc(1);
        progress.inc(2);
        assert_eq!(progress.position(), 3);
        assert_eq!(progress.step_label(), "[4/6]");

        progress.set_position(6);
        assert_eq!(progress.step_label(), "[6/6]");
    }

    #[test]
    fn new_total_resets_position() {
        let progress = LogProgress::default();
        progress.set_total(3);
        progress.inc(3);
        progress.set_total(3);
        assert_eq!(progress.position(), 0);
    }
}
