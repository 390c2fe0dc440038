//! Graceful exit and the kill escalation ladder.
//!
//! `exit` asks the debugger to quit, closes the pipes, and waits one stop
//! timeout for the liveness registry to observe the exit. `kill` escalates:
//! close the pipes, then `SIGTERM`, then `SIGKILL`, re-checking liveness
//! before each stage so a stage that already worked ends the ladder.

use std::time::Duration;

use nix::sys::signal::Signal;
use tracing::{debug, info, info_span, warn, Instrument};

use super::{Session, SessionState, Subordinate};
use crate::protocol::MiCommand;

impl Session {
    /// Ask the subordinate to quit, escalating to [`Session::kill`] if it is
    /// still alive one stop timeout after the pipes are closed.
    ///
    /// Returns immediately if the session is not live.
    pub async fn exit(&mut self) {
        let Some(mut sub) = self.subordinate.take() else {
            return;
        };
        self.state = SessionState::Terminating;
        let span = info_span!("exit", pid = sub.pid);
        sub.exit(self.config.stop_timeout())
            .instrument(span)
            .await;
        self.finish(sub);
    }

    /// Terminate the subordinate by escalating from closing its pipes to
    /// `SIGTERM` to `SIGKILL`.
    ///
    /// Idempotent: on a session that is not live this returns immediately
    /// without sending any signal.
    pub async fn kill(&mut self) {
        let Some(mut sub) = self.subordinate.take() else {
            return;
        };
        self.state = SessionState::Terminating;
        let span = info_span!("kill", pid = sub.pid);
        sub.kill(self.config.stop_timeout())
            .instrument(span)
            .await;
        self.finish(sub);
    }

    /// Wait up to `timeout` for the subordinate to be reaped.
    ///
    /// Returns `true` if it has exited (or was never live).
    pub async fn wait_for_stop(&self, timeout: Duration) -> bool {
        match &self.subordinate {
            Some(sub) => sub.wait_for_stop(timeout).await,
            None => true,
        }
    }

    pub(super) fn finish(&mut self, sub: Subordinate) {
        if !sub.has_exited() {
            // SIGKILL was sent; the registry entry stays until the reap.
            warn!(pid = sub.pid, "subordinate not yet reaped after termination");
        }
        drop(sub);
        self.breakpoints.clear();
        self.state = SessionState::Terminated;
        info!(pid = self.pid, "session terminated");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let Some(mut sub) = self.subordinate.take() else {
            return;
        };
        if sub.has_exited() {
            return;
        }

        let stop_timeout = self.config.stop_timeout();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(pid = sub.pid, "session dropped while live, exiting in background");
                handle.spawn(async move { sub.exit(stop_timeout).await });
            }
            Err(_) => {
                // No runtime to drive the graceful path; Subordinate's drop
                // sends SIGKILL.
                warn!(pid = sub.pid, "session dropped outside a runtime, killing subordinate");
                sub.engine.close();
            }
        }
    }
}

impl Subordinate {
    async fn wait_for_stop(&self, timeout: Duration) -> bool {
        self.registry
            .wait_for_exit(self.pid, self.liveness(), timeout)
            .await
    }

    async fn exit(&mut self, stop_timeout: Duration) {
        if self.has_exited() {
            return;
        }

        match self.engine.send_command(&MiCommand::GdbExit).await {
            Ok(reply) => debug!(reply = %reply, "exit: confirmation received"),
            Err(err) => debug!(%err, "exit: no confirmation, closing pipes anyway"),
        }
        self.engine.close();

        if self.wait_for_stop(stop_timeout).await {
            info!("subordinate exited gracefully");
            return;
        }

        warn!(?stop_timeout, "subordinate still alive after exit, escalating");
        self.kill(stop_timeout).await;
    }

    async fn kill(&mut self, stop_timeout: Duration) {
        if self.has_exited() {
            return;
        }

        self.engine.close();
        if self.wait_for_stop(stop_timeout).await {
            info!("subordinate exited after its pipes closed");
            return;
        }

        self.signal(Signal::SIGTERM);
        if self.wait_for_stop(stop_timeout).await {
            info!("subordinate exited after SIGTERM");
            return;
        }

        // SIGKILL cannot be caught; the remaining wait is only for the reap.
        self.signal(Signal::SIGKILL);
        if self.wait_for_stop(stop_timeout).await {
            info!("subordinate killed");
        }
    }

    fn signal(&self, sig: Signal) {
        match self.registry.signal(self.pid, sig) {
            Ok(true) => info!(pid = self.pid, signal = %sig, "signal sent to subordinate"),
            Ok(false) => debug!(pid = self.pid, signal = %sig, "subordinate already reaped"),
            Err(err) => warn!(pid = self.pid, signal = %sig, %err, "failed to signal subordinate"),
        }
    }
}

impl Drop for Subordinate {
    fn drop(&mut self) {
        if !self.has_exited() {
            self.signal(Signal::SIGKILL);
        }
    }
}
