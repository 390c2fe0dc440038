//! Line codec for the GDB/MI pipe pair.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a bounded maximum line length
//! so a subordinate that never emits a newline cannot exhaust memory.
//!
//! Inbound lines are split on `\n` with any trailing `\r` removed. Outbound
//! commands are terminated with `\r\n`, which is what the debugger's command
//! reader expects from a terminal-like peer.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::{GdbError, Result};

/// Maximum inbound line length accepted by [`MiCodec`]: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Command terminator written after every outbound line.
pub const COMMAND_TERMINATOR: &str = "\r\n";

/// Codec for both directions of the subordinate's line protocol.
///
/// # Decoder
///
/// Inbound lines longer than [`MAX_LINE_BYTES`] return
/// [`GdbError::Io`]`("line too long: …")` instead of allocating.
///
/// # Encoder
///
/// Outbound strings are written as `item\r\n`. An item that already carries
/// its own line break is rejected with [`GdbError::InvalidCommand`], since the
/// subordinate would read it as two commands.
#[derive(Debug)]
pub struct MiCodec(LinesCodec);

impl MiCodec {
    /// Create a new `MiCodec` with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }
}

impl Default for MiCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MiCodec {
    type Item = String;
    type Error = GdbError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

impl Encoder<String> for MiCodec {
    type Error = GdbError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        if item.contains(['\n', '\r']) {
            return Err(GdbError::InvalidCommand(format!(
                "command contains an embedded line break: {item:?}"
            )));
        }
        dst.reserve(item.len() + COMMAND_TERMINATOR.len());
        dst.put(item.as_bytes());
        dst.put(COMMAND_TERMINATOR.as_bytes());
        Ok(())
    }
}

fn map_codec_error(e: LinesCodecError) -> GdbError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            GdbError::Io(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(io_err) => GdbError::Io(io_err.to_string()),
    }
}
