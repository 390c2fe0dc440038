//! Subordinate-side breakpoints and their action lists.

use serde::Serialize;

use super::Session;
use crate::protocol::{Reply, Value};
use crate::{GdbError, Result};

/// One breakpoint as reported by the subordinate.
///
/// `id`, `file` and `line` come from the insert reply and never change. The
/// action list mirrors what was last pushed with `-break-commands`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breakpoint {
    id: u32,
    file: String,
    line: u32,
    pub(super) commands: Vec<String>,
}

impl Breakpoint {
    /// Build a breakpoint from the reply to `-break-insert`.
    ///
    /// # Errors
    ///
    /// - [`GdbError::CommandRejected`] if the reply is `^error`.
    /// - [`GdbError::MalformedReply`] if there is no result record or the
    ///   `bkpt` tuple lacks a numeric `number`, a `file`, or a numeric `line`.
    pub fn from_insert_reply(reply: &Reply) -> Result<Self> {
        let record = reply.result_record().ok_or_else(|| {
            GdbError::MalformedReply("breakpoint insert reply has no result record".into())
        })??;
        if record.is_error() {
            return Err(GdbError::CommandRejected(record.error_message().to_owned()));
        }

        let bkpt = record
            .get("bkpt")
            .ok_or_else(|| GdbError::MalformedReply("insert reply has no bkpt tuple".into()))?;
        let field = |key: &str| {
            bkpt.get(key)
                .and_then(Value::as_str)
                .ok_or_else(|| GdbError::MalformedReply(format!("bkpt has no {key} field")))
        };
        let number = |key: &str| {
            field(key)?.parse::<u32>().map_err(|err| {
                GdbError::MalformedReply(format!("bkpt {key} is not a number: {err}"))
            })
        };

        Ok(Self {
            id: number("number")?,
            file: field("file")?.to_owned(),
            line: number("line")?,
            commands: Vec::new(),
        })
    }

    /// Breakpoint number assigned by the subordinate.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Source file as reported by the subordinate.
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Source line as reported by the subordinate.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Actions run each time the breakpoint fires.
    #[must_use]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }
}

/// Mutable access to one breakpoint of a live [`Session`].
///
/// Every edit is pushed to the subordinate before the call returns; there is
/// no staged local state. Edits on a session that is no longer running fail
/// with [`GdbError::NotRunning`].
#[derive(Debug)]
pub struct BreakpointHandle<'a> {
    session: &'a mut Session,
    id: u32,
}

impl<'a> BreakpointHandle<'a> {
    pub(super) fn new(session: &'a mut Session, id: u32) -> Self {
        Self { session, id }
    }

    /// Breakpoint number.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Current snapshot, or `None` once the session has dropped it.
    #[must_use]
    pub fn get(&self) -> Option<&Breakpoint> {
        self.session.breakpoint(self.id)
    }

    /// Append `command` to the action list and push the full list.
    ///
    /// # Errors
    ///
    /// - [`GdbError::NotRunning`] if the session is not running.
    /// - [`GdbError::NotFound`] if the breakpoint has been deleted.
    /// - [`GdbError::CommandRejected`] if the subordinate refuses the list.
    pub async fn add_command(&mut self, command: impl Into<String>) -> Result<()> {
        let command = command.into();
        self.session
            .update_commands(self.id, move |commands| {
                commands.push(command);
                true
            })
            .await
            .map(|_| ())
    }

    /// Remove the first action equal to `command` and push the result.
    ///
    /// Returns `Ok(false)` without contacting the subordinate if no action
    /// matches.
    ///
    /// # Errors
    ///
    /// Same as [`BreakpointHandle::add_command`].
    pub async fn remove_command(&mut self, command: &str) -> Result<bool> {
        self.session
            .update_commands(self.id, |commands| {
                match commands.iter().position(|existing| existing == command) {
                    Some(index) => {
                        commands.remove(index);
                        true
                    }
                    None => false,
                }
            })
            .await
    }

    /// Empty the action list and push it.
    ///
    /// # Errors
    ///
    /// Same as [`BreakpointHandle::add_command`].
    pub async fn clear_commands(&mut self) -> Result<()> {
        self.session
            .update_commands(self.id, |commands| {
                commands.clear();
                true
            })
            .await
            .map(|_| ())
    }
}
