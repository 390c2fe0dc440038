//! Pipe channel between the supervisor and its subordinate debugger.
//!
//! - `codec`: bounded line framing, `\r\n` on the way out.
//! - `pipe`: the supervisor's write end of "to-subordinate" and read end of
//!   "from-subordinate", with bounded line reads.

pub mod codec;
pub mod pipe;

pub use codec::MiCodec;
pub use pipe::{Inbound, PipeChannel};
