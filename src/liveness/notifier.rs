//! `SIGCHLD` notifier thread.
//!
//! The signal handler itself only wakes a stream; all reaping and table
//! mutation happens on this dedicated thread, outside signal context. The
//! thread owns a single-threaded runtime so it outlives any runtime the
//! caller happens to be using.

use std::io;
use std::sync::Weak;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, warn};

use super::LivenessRegistry;

/// Periodic sweep that catches state changes whose signal was coalesced or
/// arrived before the pid was registered.
const SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Start the notifier thread for `registry`.
pub(super) fn start(registry: Weak<LivenessRegistry>) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("gdbctl-sigchld".into())
        .spawn(move || runtime.block_on(run(registry)))?;

    Ok(())
}

async fn run(registry: Weak<LivenessRegistry>) {
    let mut sigchld = match signal(SignalKind::child()) {
        Ok(stream) => Some(stream),
        Err(err) => {
            warn!(%err, "liveness notifier: cannot listen for SIGCHLD, sweeping only");
            None
        }
    };
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        match sigchld.as_mut() {
            Some(stream) => {
                tokio::select! {
                    received = stream.recv() => {
                        if received.is_none() {
                            sigchld = None;
                        }
                    }
                    _ = sweep.tick() => {}
                }
            }
            None => {
                sweep.tick().await;
            }
        }

        let Some(registry) = registry.upgrade() else {
            debug!("liveness notifier: registry dropped, exiting");
            break;
        };
        registry.refresh_all();
    }
}
