//! Session supervisor for one subordinate debugger.
//!
//! A [`Session`] moves through [`SessionState`]: it spawns the debugger,
//! round-trips commands through its [`ProtocolEngine`], hands out
//! [`BreakpointHandle`]s, and drives the subordinate to termination. Any
//! protocol failure that leaves the pipe out of step (a missed deadline, a
//! closed stream, an I/O error) kills the subordinate before the error is
//! returned.

mod breakpoint;
mod spawner;
mod terminate;

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::SupervisorConfig;
use crate::liveness::{Liveness, LivenessRegistry};
use crate::protocol::{MiCommand, ProtocolEngine, Reply, IDLE_PROMPT};
use crate::{GdbError, Result};

pub use breakpoint::{Breakpoint, BreakpointHandle};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Never spawned, or the last spawn failed.
    Unstarted,
    /// Spawn and handshake in progress.
    Starting,
    /// Handshake completed and the subordinate has not been reaped.
    Live,
    /// `exit` or `kill` in progress.
    Terminating,
    /// The subordinate is gone.
    Terminated,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unstarted => write!(f, "unstarted"),
            Self::Starting => write!(f, "starting"),
            Self::Live => write!(f, "live"),
            Self::Terminating => write!(f, "terminating"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// A live subordinate: its pid, the engine that owns its pipes, and the
/// registry that reaps it.
#[derive(Debug)]
struct Subordinate {
    pid: i32,
    engine: ProtocolEngine,
    registry: Arc<LivenessRegistry>,
}

impl Subordinate {
    fn liveness(&self) -> &Liveness {
        self.engine.liveness()
    }

    fn has_exited(&self) -> bool {
        self.liveness().has_exited()
    }
}

/// Supervisor for one subordinate debugger process.
#[derive(Debug)]
pub struct Session {
    config: SupervisorConfig,
    registry: Arc<LivenessRegistry>,
    state: SessionState,
    pid: Option<i32>,
    subordinate: Option<Subordinate>,
    breakpoints: HashMap<u32, Breakpoint>,
}

impl Session {
    /// Create an unstarted session tracked by the process-wide registry.
    #[must_use]
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_registry(config, LivenessRegistry::global())
    }

    /// Create an unstarted session tracked by `registry`.
    #[must_use]
    pub fn with_registry(config: SupervisorConfig, registry: Arc<LivenessRegistry>) -> Self {
        Self {
            config,
            registry,
            state: SessionState::Unstarted,
            pid: None,
            subordinate: None,
            breakpoints: HashMap::new(),
        }
    }

    /// Configuration the session was created with.
    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Current lifecycle state.
    ///
    /// A live session whose subordinate has been reaped reports
    /// [`SessionState::Terminated`] even before any further call observes it.
    #[must_use]
    pub fn state(&self) -> SessionState {
        match (&self.subordinate, self.state) {
            (Some(sub), SessionState::Live) if sub.has_exited() => SessionState::Terminated,
            (_, state) => state,
        }
    }

    /// Process id of the most recently spawned subordinate.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid.and_then(|pid| u32::try_from(pid).ok())
    }

    /// Whether the subordinate is alive and not stopped.
    ///
    /// The answer can change at any moment as child-state notifications
    /// arrive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.subordinate
            .as_ref()
            .is_some_and(|sub| sub.liveness().is_running())
    }

    /// Spawn the debugger against `program` and complete the startup
    /// handshake. Does nothing if the session is already live.
    ///
    /// # Errors
    ///
    /// - [`GdbError::ExecFailure`], [`GdbError::ForkFailure`]: process
    ///   creation failed.
    /// - [`GdbError::NoReply`], [`GdbError::StartupProtocol`]: the
    ///   handshake failed. The child has been reaped and the session is
    ///   left unstarted.
    pub async fn spawn(&mut self, program: impl AsRef<Path>) -> Result<()> {
        self.collect_exited();
        if self.subordinate.is_some() {
            debug!(pid = self.pid, "spawn: session already live");
            return Ok(());
        }

        let program = program.as_ref();
        self.state = SessionState::Starting;
        let spawned = match spawner::spawn_subordinate(&self.config, program).await {
            Ok(spawned) => spawned,
            Err(err) => {
                self.state = SessionState::Unstarted;
                return Err(err);
            }
        };

        let liveness = Liveness::running();
        self.registry.insert(spawned.pid, liveness.clone());
        self.subordinate = Some(Subordinate {
            pid: spawned.pid,
            engine: ProtocolEngine::new(spawned.channel, liveness, self.config.reply_timeout()),
            registry: Arc::clone(&self.registry),
        });
        self.pid = Some(spawned.pid);
        self.state = SessionState::Live;
        info!(pid = spawned.pid, program = %program.display(), "session live");
        Ok(())
    }

    /// Write a raw command and await a line starting with `terminator`.
    ///
    /// # Errors
    ///
    /// - [`GdbError::NotRunning`] without writing if the subordinate is not
    ///   running.
    /// - [`GdbError::InvalidCommand`] if `command` contains a line break. The
    ///   session stays live.
    /// - [`GdbError::NoReply`] or [`GdbError::Io`]: the subordinate has been
    ///   killed before the error is returned.
    pub async fn send(&mut self, command: &str, terminator: &str) -> Result<Reply> {
        let sub = self.subordinate.as_mut().ok_or(GdbError::NotRunning)?;
        let result = sub.engine.send(command, terminator).await;
        self.settle(result).await
    }

    /// Await a line starting with `terminator` without writing anything.
    ///
    /// Useful after [`Session::cont`] to drain the stop output that follows
    /// the `^running` acknowledgement.
    ///
    /// # Errors
    ///
    /// Same as [`Session::send`].
    pub async fn await_reply(&mut self, terminator: &str) -> Result<Reply> {
        if !self.is_running() {
            return self.settle(Err(GdbError::NotRunning)).await;
        }
        let sub = self.subordinate.as_mut().ok_or(GdbError::NotRunning)?;
        let result = sub.engine.await_reply(terminator).await;
        self.settle(result).await
    }

    /// Start the target program and wait for it to stop or exit.
    ///
    /// Two prompts are awaited: the one acknowledging `-exec-run`, and the
    /// one following the execution output.
    ///
    /// # Errors
    ///
    /// [`GdbError::CommandRejected`] if the subordinate refuses to run, plus
    /// the errors of [`Session::send`].
    pub async fn run(&mut self) -> Result<Reply> {
        let mut reply = self.request(&MiCommand::ExecRun).await?;
        reply.ensure_accepted()?;
        let drained = self.await_reply(IDLE_PROMPT).await?;
        reply.extend(drained);
        Ok(reply)
    }

    /// Resume the target after a stop.
    ///
    /// # Errors
    ///
    /// [`GdbError::CommandRejected`] if the subordinate refuses, plus the
    /// errors of [`Session::send`].
    pub async fn cont(&mut self) -> Result<Reply> {
        let reply = self.request(&MiCommand::ExecContinue).await?;
        reply.ensure_accepted()?;
        Ok(reply)
    }

    /// Insert a breakpoint at `file:line`.
    ///
    /// The returned handle reflects what the subordinate reported, which may
    /// differ from the requested location.
    ///
    /// # Errors
    ///
    /// - [`GdbError::CommandRejected`] if the subordinate answers `^error`.
    /// - [`GdbError::MalformedReply`] if the reply lacks `number`, `file` or
    ///   `line`.
    /// - The errors of [`Session::send`].
    pub async fn add_breakpoint(&mut self, file: &str, line: u32) -> Result<BreakpointHandle<'_>> {
        let reply = self
            .request(&MiCommand::BreakInsert {
                file: file.to_owned(),
                line,
            })
            .await?;
        let breakpoint = Breakpoint::from_insert_reply(&reply)?;
        let id = breakpoint.id();
        info!(
            id,
            file = breakpoint.file(),
            line = breakpoint.line(),
            "breakpoint inserted"
        );
        self.breakpoints.insert(id, breakpoint);
        Ok(BreakpointHandle::new(self, id))
    }

    /// Delete breakpoint `id`.
    ///
    /// Returns whether the session was tracking that id. The local entry is
    /// dropped even if the subordinate rejects the delete.
    ///
    /// # Errors
    ///
    /// [`GdbError::CommandRejected`] if the subordinate answers `^error`,
    /// plus the errors of [`Session::send`].
    pub async fn remove_breakpoint(&mut self, id: u32) -> Result<bool> {
        let reply = self.request(&MiCommand::BreakDelete(id)).await?;
        let tracked = self.breakpoints.remove(&id).is_some();
        reply.ensure_accepted()?;
        debug!(id, tracked, "breakpoint deleted");
        Ok(tracked)
    }

    /// Snapshot of a tracked breakpoint.
    #[must_use]
    pub fn breakpoint(&self, id: u32) -> Option<&Breakpoint> {
        self.breakpoints.get(&id)
    }

    /// Handle for editing a tracked breakpoint's action list.
    pub fn breakpoint_mut(&mut self, id: u32) -> Option<BreakpointHandle<'_>> {
        if self.breakpoints.contains_key(&id) {
            Some(BreakpointHandle::new(self, id))
        } else {
            None
        }
    }

    /// All tracked breakpoints, in no particular order.
    pub fn breakpoints(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.values()
    }

    /// Apply `edit` to a copy of a breakpoint's action list and push it.
    ///
    /// The tracked list is replaced only once the subordinate accepts the
    /// push. Returns `Ok(false)` without contacting the subordinate when
    /// `edit` reports that it changed nothing.
    async fn update_commands(
        &mut self,
        id: u32,
        edit: impl FnOnce(&mut Vec<String>) -> bool,
    ) -> Result<bool> {
        if !self.is_running() {
            return Err(GdbError::NotRunning);
        }
        let mut actions = self
            .breakpoints
            .get(&id)
            .ok_or_else(|| GdbError::NotFound(format!("breakpoint {id}")))?
            .commands
            .clone();
        if !edit(&mut actions) {
            return Ok(false);
        }

        let command = MiCommand::BreakCommands {
            id,
            actions: actions.clone(),
        };
        let reply = self.request(&command).await?;
        reply.ensure_accepted()?;

        if let Some(breakpoint) = self.breakpoints.get_mut(&id) {
            breakpoint.commands = actions;
        }
        Ok(true)
    }

    async fn request(&mut self, command: &MiCommand) -> Result<Reply> {
        let sub = self.subordinate.as_mut().ok_or(GdbError::NotRunning)?;
        let result = sub.engine.send_command(command).await;
        self.settle(result).await
    }

    /// Kill the subordinate if `result` means the protocol is out of step.
    ///
    /// [`GdbError::InvalidCommand`] is refused before writing, so the pipe is
    /// still in step and the subordinate is left running.
    async fn settle(&mut self, result: Result<Reply>) -> Result<Reply> {
        match result {
            Err(err @ (GdbError::NoReply(_) | GdbError::Io(_))) => {
                warn!(pid = self.pid, %err, "protocol failure, killing subordinate");
                self.kill().await;
                Err(err)
            }
            Err(GdbError::NotRunning) => {
                self.collect_exited();
                Err(GdbError::NotRunning)
            }
            other => other,
        }
    }

    /// Finish teardown of a subordinate that exited on its own.
    fn collect_exited(&mut self) {
        if self.subordinate.as_ref().is_some_and(Subordinate::has_exited) {
            if let Some(sub) = self.subordinate.take() {
                info!(pid = sub.pid, "subordinate exited unexpectedly");
                self.finish(sub);
            }
        }
    }
}
