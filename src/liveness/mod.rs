//! Subordinate liveness tracking.
//!
//! Each live session owns a [`Liveness`] flag that is shared with a
//! [`LivenessRegistry`]. The registry's notifier thread reaps child-state
//! changes after `SIGCHLD` and updates the flag; nothing else writes it once
//! the session is live. Readers must assume the flag can change between any
//! two statements.

mod notifier;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

pub use registry::LivenessRegistry;

/// Last child state reported for a subordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    /// Alive and accepting input.
    Running,
    /// Stopped by a signal; resumes on `SIGCONT`.
    Stopped,
    /// Exited or killed, and reaped.
    Exited,
}

/// Shared liveness flag for one subordinate.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<watch::Sender<ChildState>>);

impl Liveness {
    /// Create a flag in the `Running` state, as set after a completed handshake.
    #[must_use]
    pub fn running() -> Self {
        Self(Arc::new(watch::Sender::new(ChildState::Running)))
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ChildState {
        *self.0.borrow()
    }

    /// `true` while the subordinate is alive and not stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == ChildState::Running
    }

    /// `true` once the subordinate has been reaped.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.state() == ChildState::Exited
    }

    pub(crate) fn set(&self, state: ChildState) {
        // Exited is terminal; a late Continued report must not revive it.
        self.0.send_if_modified(|current| {
            if *current == state || *current == ChildState::Exited {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    /// Wait up to `timeout` for the flag to change, returning early when it does.
    pub(crate) async fn changed_within(&self, timeout: Duration) {
        let mut rx = self.0.subscribe();
        let _ = tokio::time::timeout(timeout, rx.changed()).await;
    }
}
