//! Subordinate process creation and startup handshake.
//!
//! The debugger is started with `std::process::Command` rather than
//! `tokio::process`: tokio reaps dropped children through its own orphan
//! queue, which would race the liveness registry for the exit status. The
//! std handle never waits on its own, so the registry stays the only reaper
//! once the session is live. The pipe ends are then handed to tokio.

use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use nix::errno::Errno;
use tokio::process::{ChildStdin, ChildStdout};
use tracing::{debug, info, warn};

use crate::channel::{Inbound, PipeChannel};
use crate::config::SupervisorConfig;
use crate::protocol::{EXEC_FAILURE_SENTINEL, IDLE_PROMPT};
use crate::{GdbError, Result};

/// A subordinate that completed its startup handshake.
#[derive(Debug)]
pub(crate) struct Spawned {
    pub pid: i32,
    pub channel: PipeChannel,
}

/// Start the debugger against `program` and wait for its first idle prompt.
///
/// On any failure after process creation the child is killed and reaped
/// before returning, so nothing outlives a failed spawn.
///
/// # Errors
///
/// - [`GdbError::ExecFailure`]: the debugger binary is missing, not
///   executable, or printed the exec failure sentinel.
/// - [`GdbError::ForkFailure`]: any other process creation failure.
/// - [`GdbError::NoReply`]: a startup line did not arrive in time.
/// - [`GdbError::StartupProtocol`]: no idle prompt within the allowed lines.
pub(crate) async fn spawn_subordinate(
    config: &SupervisorConfig,
    program: &Path,
) -> Result<Spawned> {
    let mut cmd = Command::new(&config.debugger);
    cmd.args(&config.debugger_args)
        .arg(program)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = cmd.spawn().map_err(|err| classify_spawn_error(&config.debugger, &err))?;

    let pid = match i32::try_from(child.id()) {
        Ok(pid) => pid,
        Err(_) => {
            reap_failed(child).await;
            return Err(GdbError::ForkFailure("child pid out of range".into()));
        }
    };
    info!(pid, debugger = config.debugger, program = %program.display(), "subordinate spawned");

    let mut channel = match take_pipes(&mut child) {
        Ok(channel) => channel,
        Err(err) => {
            reap_failed(child).await;
            return Err(err);
        }
    };

    if let Err(err) = await_startup(
        &mut channel,
        config.startup_max_lines,
        config.reply_timeout(),
    )
    .await
    {
        warn!(pid, %err, "subordinate failed startup handshake");
        channel.close();
        reap_failed(child).await;
        return Err(err);
    }

    // The std handle is dropped without waiting; the liveness registry reaps
    // the pid from here on.
    drop(child);
    Ok(Spawned { pid, channel })
}

/// Read up to `max_lines` startup lines looking for the idle prompt.
///
/// # Errors
///
/// See [`spawn_subordinate`].
pub(crate) async fn await_startup(
    channel: &mut PipeChannel,
    max_lines: u32,
    timeout: Duration,
) -> Result<()> {
    let mut last_line = String::new();

    for _ in 0..max_lines {
        match channel.read_line(timeout).await? {
            Inbound::Line(line) => {
                if line.starts_with(IDLE_PROMPT) {
                    info!("handshake: idle prompt received");
                    return Ok(());
                }
                if is_exec_failure_sentinel(&line) {
                    return Err(GdbError::ExecFailure(
                        "subordinate reported that the debugger could not be executed".into(),
                    ));
                }
                debug!(line, "handshake: skipping startup line");
                last_line = line;
            }
            Inbound::TimedOut => {
                return Err(GdbError::NoReply(format!(
                    "no startup output within {timeout:?}"
                )));
            }
            Inbound::Closed => {
                return Err(GdbError::StartupProtocol(format!(
                    "subordinate closed its output during startup; last line: {last_line:?}"
                )));
            }
        }
    }

    Err(GdbError::StartupProtocol(format!(
        "no idle prompt within {max_lines} lines; last line: {last_line:?}"
    )))
}

fn is_exec_failure_sentinel(line: &str) -> bool {
    line.trim_matches(|c: char| c == '\0' || c.is_whitespace()) == EXEC_FAILURE_SENTINEL
}

fn classify_spawn_error(debugger: &str, err: &io::Error) -> GdbError {
    let exec_failed = matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
    ) || err.raw_os_error() == Some(Errno::ENOEXEC as i32);

    if exec_failed {
        GdbError::ExecFailure(format!("cannot execute {debugger}: {err}"))
    } else {
        GdbError::ForkFailure(format!("failed to spawn {debugger}: {err}"))
    }
}

fn take_pipes(child: &mut Child) -> Result<PipeChannel> {
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| GdbError::ForkFailure("failed to capture subordinate stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| GdbError::ForkFailure("failed to capture subordinate stdout".into()))?;

    let stdin = ChildStdin::from_std(stdin)
        .map_err(|err| GdbError::Io(format!("failed to register stdin pipe: {err}")))?;
    let stdout = ChildStdout::from_std(stdout)
        .map_err(|err| GdbError::Io(format!("failed to register stdout pipe: {err}")))?;

    Ok(PipeChannel::new(stdin, stdout))
}

/// Kill and reap a child that never became a live session.
async fn reap_failed(mut child: Child) {
    if let Err(err) = child.kill() {
        debug!(%err, "startup cleanup: kill failed, child likely already exited");
    }
    match tokio::task::spawn_blocking(move || child.wait()).await {
        Ok(Ok(status)) => debug!(?status, "startup cleanup: child reaped"),
        Ok(Err(err)) => warn!(%err, "startup cleanup: wait failed"),
        Err(err) => warn!(%err, "startup cleanup: reaper task panicked"),
    }
}
