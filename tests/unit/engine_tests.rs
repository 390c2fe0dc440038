//! Unit tests for the pipe channel and protocol engine against `cat`, which
//! echoes every command back as its own reply.

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tokio::process::{ChildStdin, ChildStdout};

use gdbctl::channel::{Inbound, PipeChannel};
use gdbctl::liveness::Liveness;
use gdbctl::protocol::{MiCommand, ProtocolEngine};
use gdbctl::GdbError;

const TIMEOUT: Duration = Duration::from_millis(300);

fn spawn(program: &str, args: &[&str]) -> (Child, PipeChannel) {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn helper");
    let stdin = ChildStdin::from_std(child.stdin.take().unwrap()).unwrap();
    let stdout = ChildStdout::from_std(child.stdout.take().unwrap()).unwrap();
    (child, PipeChannel::new(stdin, stdout))
}

fn reap(mut child: Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[tokio::test]
async fn channel_round_trips_a_line() {
    let (child, mut channel) = spawn("cat", &[]);

    channel.write_line("-list-features").await.unwrap();

    assert_eq!(
        channel.read_line(TIMEOUT).await.unwrap(),
        Inbound::Line("-list-features".into()),
        "cat echoes the line with its CR stripped"
    );
    channel.close();
    reap(child);
}

#[tokio::test]
async fn channel_read_times_out_on_silence() {
    let (child, mut channel) = spawn("cat", &[]);

    assert_eq!(
        channel.read_line(Duration::from_millis(50)).await.unwrap(),
        Inbound::TimedOut
    );
    channel.close();
    reap(child);
}

#[tokio::test]
async fn channel_reports_closed_output() {
    let (child, mut channel) = spawn("true", &[]);

    assert_eq!(channel.read_line(TIMEOUT).await.unwrap(), Inbound::Closed);
    reap(child);
}

#[tokio::test]
async fn closed_channel_refuses_writes_and_reads_closed() {
    let (child, mut channel) = spawn("cat", &[]);

    channel.close();
    channel.close();

    assert!(!channel.is_open());
    assert_eq!(
        channel.write_line("-exec-run").await.unwrap_err(),
        GdbError::NotRunning
    );
    assert_eq!(channel.read_line(TIMEOUT).await.unwrap(), Inbound::Closed);
    reap(child);
}

#[tokio::test]
async fn engine_collects_lines_through_the_terminator() {
    let (child, channel) = spawn("sh", &["-c", "read -r _; printf 'a\\nb\\n(gdb) \\nlate\\n'"]);
    let mut engine = ProtocolEngine::new(channel, Liveness::running(), TIMEOUT);

    let reply = engine.send("-exec-continue", "(gdb)").await.unwrap();

    assert_eq!(reply.lines(), ["a", "b", "(gdb) "]);
    engine.close();
    reap(child);
}

#[tokio::test]
async fn typed_command_without_a_prompt_is_no_reply() {
    let (child, channel) = spawn("cat", &[]);
    let mut engine = ProtocolEngine::new(channel, Liveness::running(), TIMEOUT);

    let err = engine
        .send_command(&MiCommand::BreakDelete(3))
        .await
        .unwrap_err();

    // cat echoes the command but never the prompt.
    assert!(matches!(err, GdbError::NoReply(_)), "got {err:?}");
    engine.close();
    reap(child);
}

#[tokio::test]
async fn engine_terminator_matches_line_prefix() {
    let (child, channel) = spawn("cat", &[]);
    let mut engine = ProtocolEngine::new(channel, Liveness::running(), TIMEOUT);

    let reply = engine.send("-break-delete 3", "-break").await.unwrap();

    assert_eq!(reply.lines(), ["-break-delete 3"]);
    engine.close();
    reap(child);
}

#[tokio::test]
#[serial_test::serial(timing)]
async fn engine_times_out_per_line() {
    let (child, channel) = spawn(
        "sh",
        &["-c", "read -r _; echo one; sleep 0.1; echo two; sleep 5"],
    );
    let mut engine = ProtocolEngine::new(channel, Liveness::running(), Duration::from_millis(500));

    let err = engine.send("go", "(gdb)").await.unwrap_err();

    assert!(
        matches!(err, GdbError::NoReply(ref msg) if msg.contains("(gdb)")),
        "got {err:?}"
    );
    engine.close();
    reap(child);
}

#[tokio::test]
async fn engine_reports_closed_output_as_no_reply() {
    let (child, channel) = spawn("sh", &["-c", "read -r _; echo partial"]);
    let mut engine = ProtocolEngine::new(channel, Liveness::running(), TIMEOUT);

    let err = engine.send("go", "(gdb)").await.unwrap_err();

    assert!(
        matches!(err, GdbError::NoReply(ref msg) if msg.contains("closed")),
        "got {err:?}"
    );
    reap(child);
}

#[tokio::test]
async fn engine_refuses_to_write_after_close() {
    let (child, channel) = spawn("cat", &[]);
    let mut engine = ProtocolEngine::new(channel, Liveness::running(), TIMEOUT);

    engine.close();

    assert_eq!(engine.send("go", "(gdb)").await.unwrap_err(), GdbError::NotRunning);
    reap(child);
}
