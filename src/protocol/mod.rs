//! GDB/MI line protocol.
//!
//! - `commands`: typed commands, their wire form, and reply terminators.
//! - `record`: parser for `^`/`*`/`+`/`=` output records.
//! - `engine`: the request/reply driver over a pipe channel.

pub mod commands;
pub mod engine;
pub mod record;

pub use commands::{MiCommand, EXEC_FAILURE_SENTINEL, EXIT_TERMINATOR, IDLE_PROMPT};
pub use engine::{ProtocolEngine, Reply};
pub use record::{Record, RecordKind, Value};
