//! Request/reply driver over the pipe channel.
//!
//! The subordinate's protocol is strictly request-then-reply: a command is
//! written, and every line up to and including the first one that starts with
//! the expected terminator belongs to its reply. Each line must arrive within
//! the reply timeout; the engine itself never kills anything, it reports
//! [`GdbError::NoReply`] and leaves escalation to the session.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use tracing::{debug, warn};

use super::commands::MiCommand;
use super::record::Record;
use crate::channel::{Inbound, PipeChannel};
use crate::liveness::Liveness;
use crate::{GdbError, Result};

/// Every line read while awaiting a terminator, terminator line included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    lines: Vec<String>,
}

impl Reply {
    /// Build a reply from already-read lines.
    #[must_use]
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Lines in arrival order.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines joined with `\n`.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Append the lines of a later reply.
    pub fn extend(&mut self, later: Reply) {
        self.lines.extend(later.lines);
    }

    /// The first `^` result record, parsed.
    ///
    /// Returns `None` when the reply has no result record at all.
    #[must_use]
    pub fn result_record(&self) -> Option<Result<Record>> {
        self.lines
            .iter()
            .find(|line| line.trim_start_matches(|c: char| c.is_ascii_digit()).starts_with('^'))
            .map(|line| Record::parse(line))
    }

    /// Fail with [`GdbError::CommandRejected`] if the subordinate answered
    /// `^error`.
    ///
    /// # Errors
    ///
    /// - [`GdbError::CommandRejected`] carrying the record's `msg`.
    /// - [`GdbError::MalformedReply`] if the result record does not parse.
    pub fn ensure_accepted(&self) -> Result<()> {
        match self.result_record() {
            Some(Ok(record)) if record.is_error() => {
                Err(GdbError::CommandRejected(record.error_message().to_owned()))
            }
            Some(Err(err)) => Err(err),
            Some(Ok(_)) | None => Ok(()),
        }
    }
}

impl Display for Reply {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text())
    }
}

/// Synchronous command/reply driver for one subordinate.
#[derive(Debug)]
pub struct ProtocolEngine {
    channel: PipeChannel,
    liveness: Liveness,
    reply_timeout: Duration,
}

impl ProtocolEngine {
    /// Drive `channel`, refusing to write unless `liveness` reports running.
    #[must_use]
    pub fn new(channel: PipeChannel, liveness: Liveness, reply_timeout: Duration) -> Self {
        Self {
            channel,
            liveness,
            reply_timeout,
        }
    }

    /// The liveness flag consulted before each write.
    #[must_use]
    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    /// Write a typed command and await its terminator.
    ///
    /// # Errors
    ///
    /// See [`ProtocolEngine::send`].
    pub async fn send_command(&mut self, command: &MiCommand) -> Result<Reply> {
        self.send(&command.to_string(), command.terminator()).await
    }

    /// Write `command`, then await a line starting with `terminator`.
    ///
    /// # Errors
    ///
    /// - [`GdbError::NotRunning`] without writing anything if the subordinate
    ///   is not running or the pipes are closed.
    /// - [`GdbError::InvalidCommand`] if `command` contains a line break.
    /// - [`GdbError::Io`] if the write fails.
    /// - Any error from [`ProtocolEngine::await_reply`].
    pub async fn send(&mut self, command: &str, terminator: &str) -> Result<Reply> {
        if !self.liveness.is_running() || !self.channel.is_open() {
            return Err(GdbError::NotRunning);
        }

        debug!(command, terminator, "protocol: sending command");
        self.channel.write_line(command).await?;
        self.await_reply(terminator).await
    }

    /// Read lines until one starts with `terminator`.
    ///
    /// # Errors
    ///
    /// - [`GdbError::NoReply`] if a line does not arrive within the reply
    ///   timeout, or the subordinate closes its output first.
    /// - [`GdbError::Io`] on a read failure.
    pub async fn await_reply(&mut self, terminator: &str) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            match self.channel.read_line(self.reply_timeout).await? {
                Inbound::Line(line) => {
                    let done = line.starts_with(terminator);
                    lines.push(line);
                    if done {
                        debug!(terminator, lines = lines.len(), "protocol: reply complete");
                        return Ok(Reply::from_lines(lines));
                    }
                }
                Inbound::TimedOut => {
                    warn!(
                        terminator,
                        timeout = ?self.reply_timeout,
                        "protocol: subordinate unresponsive"
                    );
                    return Err(GdbError::NoReply(format!(
                        "no line within {:?} while awaiting {terminator:?}",
                        self.reply_timeout
                    )));
                }
                Inbound::Closed => {
                    warn!(terminator, "protocol: subordinate closed its output");
                    return Err(GdbError::NoReply(format!(
                        "output closed while awaiting {terminator:?}"
                    )));
                }
            }
        }
    }

    /// Close both pipe ends. Later sends fail with [`GdbError::NotRunning`].
    pub fn close(&mut self) {
        self.channel.close();
    }
}
