#![forbid(unsafe_code)]

//! Typed supervisor for a GDB/MI subordinate process.
//!
//! A [`Session`] spawns the debugger with its standard streams bound to a
//! pair of anonymous pipes, drives the line protocol request by request, and
//! tracks the subordinate's liveness through asynchronous child-state
//! notification.

pub mod channel;
pub mod config;
pub mod errors;
pub mod liveness;
pub mod protocol;
pub mod session;

pub use config::SupervisorConfig;
pub use errors::{GdbError, Result};
pub use session::{Breakpoint, BreakpointHandle, Session, SessionState};
