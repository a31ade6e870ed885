//! Observer trait for session events.
//!
//! Inject an [`Arc<dyn SessionObserver>`] via
//! [`crate::session::Session::with_observer`] to follow a job through its
//! states: drive a spinner, log to a file, or forward events to a UI thread.
//! The library knows nothing about how the host application renders them.
//!
//! # Example
//!
//! ```rust
//! use edgequake_bgremove::{JobId, JobState, SessionObserver};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingObserver {
//!     failures: AtomicUsize,
//! }
//!
//! impl SessionObserver for CountingObserver {
//!     fn on_transition(&self, _job: JobId, _from: JobState, to: JobState) {
//!         if to == JobState::Failed {
//!             self.failures.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//! ```

use crate::session::{JobId, JobState};
use std::sync::Arc;

/// Called by [`crate::session::Session`] after each state change.
///
/// Events are delivered after the session lock is released, in the order
/// the transitions were applied. All methods default to no-ops.
pub trait SessionObserver: Send + Sync {
    /// A job moved between states.
    fn on_transition(&self, job: JobId, from: JobState, to: JobState) {
        let _ = (job, from, to);
    }

    /// A successful result was appended to the history.
    fn on_result_stored(&self, filename: &str, history_len: usize) {
        let _ = (filename, history_len);
    }

    /// The oldest history record was dropped to make room.
    fn on_history_evicted(&self, filename: &str) {
        let _ = filename;
    }
}

/// Default observer.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Convenience alias for the type stored in a session.
pub type Observer = Arc<dyn SessionObserver>;
