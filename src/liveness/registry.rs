//! Process-wide table of supervised subordinates, keyed by pid.
//!
//! Entries hold shared [`Liveness`] flags rather than references to sessions,
//! so a session dropped without deregistering leaves nothing dangling: the
//! notifier still reaps the pid and then removes the entry.
//!
//! Only pids present in the table are ever passed to `waitpid`, which keeps
//! the registry from stealing exit statuses of unrelated children (including
//! ones managed by `tokio::process`). Signals go through the table too, so
//! a reaped pid is never signalled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{notifier, ChildState, Liveness};

/// Fallback polling interval used while waiting on a specific pid.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

static GLOBAL: OnceLock<Arc<LivenessRegistry>> = OnceLock::new();

/// Table of live subordinates updated from child-state notifications.
#[derive(Debug, Default)]
pub struct LivenessRegistry {
    entries: Mutex<HashMap<i32, Liveness>>,
}

impl LivenessRegistry {
    /// The process-wide registry.
    ///
    /// The first call starts the `SIGCHLD` notifier thread; later calls
    /// return the same instance.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(Self::new))
    }

    /// A private registry with its own notifier thread.
    ///
    /// The notifier exits once the last `Arc` to the registry is dropped.
    #[must_use]
    pub fn new() -> Arc<Self> {
        let registry = Arc::new(Self::default());
        if let Err(err) = notifier::start(Arc::downgrade(&registry)) {
            // Waits still poll through `refresh`, so liveness stays observable.
            warn!(%err, "liveness: failed to start SIGCHLD notifier thread");
        }
        registry
    }

    /// Track `pid`, then reap any state change that happened before insertion.
    pub fn insert(&self, pid: i32, liveness: Liveness) {
        self.lock().insert(pid, liveness);
        debug!(pid, "liveness: registered subordinate");
        self.refresh(pid);
    }

    /// Stop tracking `pid`.
    #[must_use]
    pub fn remove(&self, pid: i32) -> Option<Liveness> {
        self.lock().remove(&pid)
    }

    /// Whether `pid` is currently tracked.
    #[must_use]
    pub fn contains(&self, pid: i32) -> bool {
        self.lock().contains_key(&pid)
    }

    /// Number of tracked subordinates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no subordinate is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Send `sig` to `pid` if it is still tracked.
    ///
    /// The check and the signal happen under the same lock that reaping
    /// holds, so a pid already reaped (and possibly reused) is never
    /// signalled. Returns `Ok(false)` when nothing was sent.
    ///
    /// # Errors
    ///
    /// Any `kill(2)` failure other than `ESRCH`.
    pub fn signal(&self, pid: i32, sig: Signal) -> nix::Result<bool> {
        let entries = self.lock();
        if !entries.contains_key(&pid) {
            return Ok(false);
        }
        match signal::kill(Pid::from_raw(pid), sig) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Reap pending state changes for one tracked pid.
    pub fn refresh(&self, pid: i32) {
        let mut entries = self.lock();
        reap(&mut entries, pid);
    }

    /// Reap pending state changes for every tracked pid.
    pub fn refresh_all(&self) {
        let mut entries = self.lock();
        let pids: Vec<i32> = entries.keys().copied().collect();
        for pid in pids {
            reap(&mut entries, pid);
        }
    }

    /// Wait up to `timeout` for `pid` to be reaped.
    ///
    /// Returns `true` once `liveness` reports [`ChildState::Exited`].
    pub async fn wait_for_exit(&self, pid: i32, liveness: &Liveness, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if liveness.has_exited() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            liveness
                .changed_within(remaining.min(WAIT_POLL_INTERVAL))
                .await;
            self.refresh(pid);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i32, Liveness>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drain every state change the kernel has queued for `pid`.
fn reap(entries: &mut HashMap<i32, Liveness>, pid: i32) {
    let Some(liveness) = entries.get(&pid).cloned() else {
        return;
    };

    let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
    loop {
        match waitpid(Pid::from_raw(pid), Some(flags)) {
            Ok(WaitStatus::StillAlive) => return,
            Ok(WaitStatus::Exited(_, code)) => {
                info!(pid, code, "liveness: subordinate exited");
                liveness.set(ChildState::Exited);
                entries.remove(&pid);
                return;
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                info!(pid, ?signal, "liveness: subordinate killed by signal");
                liveness.set(ChildState::Exited);
                entries.remove(&pid);
                return;
            }
            Ok(WaitStatus::Stopped(_, signal)) => {
                debug!(pid, ?signal, "liveness: subordinate stopped");
                liveness.set(ChildState::Stopped);
            }
            Ok(WaitStatus::Continued(_)) => {
                debug!(pid, "liveness: subordinate continued");
                liveness.set(ChildState::Running);
            }
            Ok(other) => {
                debug!(pid, ?other, "liveness: ignoring child state change");
                return;
            }
            Err(Errno::EINTR) => {}
            Err(Errno::ECHILD) => {
                // Reaped elsewhere or never ours; either way it is gone.
                warn!(pid, "liveness: pid is no longer a child of this process");
                liveness.set(ChildState::Exited);
                entries.remove(&pid);
                return;
            }
            Err(err) => {
                warn!(pid, %err, "liveness: waitpid failed");
                return;
            }
        }
    }
}
