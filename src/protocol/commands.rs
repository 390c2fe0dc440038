//! GDB/MI commands issued by the supervisor and the terminators they await.

use std::fmt::{Display, Formatter, Write as _};

/// Prefix of the idle prompt the subordinate prints when ready for input.
pub const IDLE_PROMPT: &str = "(gdb)";

/// Prefix of the record confirming `-gdb-exit`.
pub const EXIT_TERMINATOR: &str = "^exit";

/// Line printed on the child's standard output when the debugger image could
/// not be executed.
pub const EXEC_FAILURE_SENTINEL: &str = "EXECVP_ERROR";

/// A command understood by the subordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiCommand {
    /// `-exec-run`: start the target program.
    ExecRun,
    /// `-exec-continue`: resume the target after a stop.
    ExecContinue,
    /// `-break-insert <file>:<line>`.
    BreakInsert {
        /// Source file as passed by the caller.
        file: String,
        /// One-based source line.
        line: u32,
    },
    /// `-break-delete <id>`.
    BreakDelete(u32),
    /// `-break-commands <id> "<action>"...`: replace a breakpoint's action list.
    BreakCommands {
        /// Breakpoint number assigned by the subordinate.
        id: u32,
        /// Actions run each time the breakpoint fires, in order.
        actions: Vec<String>,
    },
    /// `-gdb-exit`.
    GdbExit,
}

impl MiCommand {
    /// Prefix of the line that ends this command's reply.
    #[must_use]
    pub fn terminator(&self) -> &'static str {
        match self {
            Self::GdbExit => EXIT_TERMINATOR,
            _ => IDLE_PROMPT,
        }
    }
}

impl Display for MiCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExecRun => f.write_str("-exec-run"),
            Self::ExecContinue => f.write_str("-exec-continue"),
            Self::BreakInsert { file, line } => write!(f, "-break-insert {file}:{line}"),
            Self::BreakDelete(id) => write!(f, "-break-delete {id}"),
            Self::BreakCommands { id, actions } => {
                write!(f, "-break-commands {id}")?;
                for action in actions {
                    write!(f, " {}", quote(action))?;
                }
                Ok(())
            }
            Self::GdbExit => f.write_str("-gdb-exit"),
        }
    }
}

/// Quote `text` as an MI c-string.
#[must_use]
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\{:03o}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
