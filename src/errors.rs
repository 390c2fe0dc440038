//! Error types shared across the supervisor.

use std::fmt::{Display, Formatter};

/// Shared supervisor result type.
pub type Result<T> = std::result::Result<T, GdbError>;

/// Supervisor error enumeration covering every failure mode of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GdbError {
    /// Operation attempted on a session that never started or has terminated.
    NotRunning,
    /// The subordinate did not produce a line before the readiness deadline,
    /// or closed its output; the session has been force-terminated.
    NoReply(String),
    /// The subordinate could not replace its process image with the debugger.
    ExecFailure(String),
    /// The startup handshake produced neither the idle prompt nor the exec
    /// failure sentinel.
    StartupProtocol(String),
    /// Process creation itself failed.
    ForkFailure(String),
    /// The subordinate answered a command with an `^error` record.
    CommandRejected(String),
    /// A command was refused before any byte reached the subordinate.
    InvalidCommand(String),
    /// A reply did not have the shape the command expects.
    MalformedReply(String),
    /// Requested breakpoint is not tracked by the session.
    NotFound(String),
    /// Configuration parsing or validation failure.
    Config(String),
    /// Pipe or other I/O failure.
    Io(String),
}

impl Display for GdbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotRunning => write!(f, "not running: debugger session is not live"),
            Self::NoReply(msg) => write!(f, "no reply: {msg}"),
            Self::ExecFailure(msg) => write!(f, "exec failure: {msg}"),
            Self::StartupProtocol(msg) => write!(f, "startup protocol: {msg}"),
            Self::ForkFailure(msg) => write!(f, "fork failure: {msg}"),
            Self::CommandRejected(msg) => write!(f, "command rejected: {msg}"),
            Self::InvalidCommand(msg) => write!(f, "invalid command: {msg}"),
            Self::MalformedReply(msg) => write!(f, "malformed reply: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for GdbError {}

impl GdbError {
    /// Whether the error leaves behind a session the caller may still inspect.
    ///
    /// `NotRunning` and `NoReply` mean the subordinate is gone but the
    /// session object is intact; startup failures mean it never became usable.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::ExecFailure(_) | Self::StartupProtocol(_) | Self::ForkFailure(_)
        )
    }
}

impl From<toml::de::Error> for GdbError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for GdbError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
