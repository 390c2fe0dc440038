//! Unit tests for the MI line codec.
//!
//! Covers:
//! - CRLF and LF terminated lines decode to the bare line
//! - partial lines are buffered until their newline arrives
//! - an over-long line is an error instead of an allocation
//! - commands are encoded with a trailing `\r\n`
//! - commands carrying their own line break are refused

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use gdbctl::channel::codec::{MiCodec, COMMAND_TERMINATOR, MAX_LINE_BYTES};
use gdbctl::GdbError;

#[test]
fn crlf_and_lf_lines_decode_without_terminator() {
    let mut codec = MiCodec::new();
    let mut buf = BytesMut::from("^done\r\n(gdb) \n");

    assert_eq!(codec.decode(&mut buf).unwrap(), Some("^done".to_owned()));
    assert_eq!(codec.decode(&mut buf).unwrap(), Some("(gdb) ".to_owned()));
    assert_eq!(codec.decode(&mut buf).unwrap(), None);
}

#[test]
fn partial_line_is_buffered_until_newline() {
    let mut codec = MiCodec::new();
    let mut buf = BytesMut::from("*stopped,reason=");

    assert_eq!(codec.decode(&mut buf).unwrap(), None, "no newline yet");

    buf.extend_from_slice(b"\"exited-normally\"\n");
    assert_eq!(
        codec.decode(&mut buf).unwrap(),
        Some("*stopped,reason=\"exited-normally\"".to_owned())
    );
}

#[test]
fn unterminated_trailing_line_is_returned_at_eof() {
    let mut codec = MiCodec::new();
    let mut buf = BytesMut::from("EXECVP_ERROR");

    assert_eq!(codec.decode(&mut buf).unwrap(), None);
    assert_eq!(
        codec.decode_eof(&mut buf).unwrap(),
        Some("EXECVP_ERROR".to_owned())
    );
}

#[test]
fn over_long_line_is_an_io_error() {
    let mut codec = MiCodec::new();
    let mut buf = BytesMut::from(vec![b'x'; MAX_LINE_BYTES + 1].as_slice());

    let err = codec.decode(&mut buf).unwrap_err();

    assert!(
        matches!(err, GdbError::Io(ref msg) if msg.contains("line too long")),
        "got {err:?}"
    );
}

#[test]
fn command_is_encoded_with_crlf() {
    let mut codec = MiCodec::new();
    let mut dst = BytesMut::new();

    codec.encode("-exec-run".to_owned(), &mut dst).unwrap();

    assert_eq!(&dst[..], format!("-exec-run{COMMAND_TERMINATOR}").as_bytes());
    assert_eq!(&dst[..], b"-exec-run\r\n");
}

#[test]
fn command_with_embedded_line_break_is_refused() {
    let mut codec = MiCodec::new();
    let mut dst = BytesMut::new();

    for bad in ["-exec-run\n-gdb-exit", "-exec-run\r"] {
        let err = codec.encode(bad.to_owned(), &mut dst).unwrap_err();
        assert!(matches!(err, GdbError::InvalidCommand(_)), "got {err:?}");
    }
    assert!(dst.is_empty(), "nothing encoded for a refused command");
}
