//! Supervisor-side ends of the subordinate's pipe pair.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::process::{ChildStdin, ChildStdout};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace};

use super::codec::MiCodec;
use crate::{GdbError, Result};

/// Outcome of a single bounded line read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A complete line, without its terminator.
    Line(String),
    /// The subordinate closed its standard output.
    Closed,
    /// No complete line arrived before the deadline.
    TimedOut,
}

/// The two pipe ends the supervisor keeps after the child is created.
///
/// Both ends are move-only handles. [`PipeChannel::close`] drops them, so a
/// descriptor can never be closed twice; later writes fail with
/// [`GdbError::NotRunning`] and later reads report [`Inbound::Closed`].
#[derive(Debug)]
pub struct PipeChannel {
    to_subordinate: Option<FramedWrite<ChildStdin, MiCodec>>,
    from_subordinate: Option<FramedRead<ChildStdout, MiCodec>>,
}

impl PipeChannel {
    /// Take ownership of the child's standard input and output pipes.
    #[must_use]
    pub fn new(stdin: ChildStdin, stdout: ChildStdout) -> Self {
        Self {
            to_subordinate: Some(FramedWrite::new(stdin, MiCodec::new())),
            from_subordinate: Some(FramedRead::new(stdout, MiCodec::new())),
        }
    }

    /// Whether either pipe end is still held.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.to_subordinate.is_some() || self.from_subordinate.is_some()
    }

    /// Write one command line and flush it to the subordinate.
    ///
    /// # Errors
    ///
    /// - [`GdbError::NotRunning`] if the channel has been closed.
    /// - [`GdbError::InvalidCommand`] if the command contains a line break;
    ///   nothing is written.
    /// - [`GdbError::Io`] if the write fails.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let writer = self.to_subordinate.as_mut().ok_or(GdbError::NotRunning)?;
        trace!(line, "pipe: writing command");
        writer.send(line.to_owned()).await
    }

    /// Read the next line, waiting at most `timeout` for it to arrive.
    ///
    /// # Errors
    ///
    /// Returns [`GdbError::Io`] on a read failure or an over-long line.
    pub async fn read_line(&mut self, timeout: Duration) -> Result<Inbound> {
        let Some(reader) = self.from_subordinate.as_mut() else {
            return Ok(Inbound::Closed);
        };

        match tokio::time::timeout(timeout, reader.next()).await {
            Err(_elapsed) => Ok(Inbound::TimedOut),
            Ok(None) => Ok(Inbound::Closed),
            Ok(Some(line)) => {
                let line = line?;
                trace!(line, "pipe: read line");
                Ok(Inbound::Line(line))
            }
        }
    }

    /// Drop both pipe ends. Safe to call more than once.
    pub fn close(&mut self) {
        if self.to_subordinate.take().is_some() {
            debug!("pipe: closed write end");
        }
        if self.from_subordinate.take().is_some() {
            debug!("pipe: closed read end");
        }
    }
}
