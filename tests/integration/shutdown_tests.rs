//! Integration tests for graceful exit and the kill escalation ladder.

use std::time::{Duration, Instant};

use gdbctl::liveness::LivenessRegistry;
use gdbctl::{Session, SessionState};

use super::test_helpers::{FakeGdb, STUBBORN_GDB, UNTERMINABLE_GDB};

#[tokio::test]
async fn exit_sends_gdb_exit_and_reaps() {
    let registry = LivenessRegistry::new();
    let fake = FakeGdb::new();
    let mut session = Session::with_registry(fake.config(), registry.clone());
    session.spawn(fake.program()).await.expect("spawn");
    assert!(session.is_running());

    session.exit().await;

    assert!(!session.is_running());
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(fake.commands(), ["-gdb-exit"]);
    assert!(registry.is_empty(), "graceful exit is reaped before returning");
}

#[tokio::test]
#[serial_test::serial(timing)]
async fn exit_and_kill_are_idempotent() {
    let fake = FakeGdb::new();
    let mut session = Session::new(fake.config());

    session.exit().await;
    session.kill().await;
    assert_eq!(session.state(), SessionState::Unstarted, "nothing to stop");

    session.spawn(fake.program()).await.expect("spawn");
    session.kill().await;
    assert_eq!(session.state(), SessionState::Terminated);

    let started = Instant::now();
    session.kill().await;
    session.exit().await;
    assert!(started.elapsed() < Duration::from_millis(100), "no signals, no waits");
    assert_eq!(session.state(), SessionState::Terminated);
}

#[tokio::test]
#[serial_test::serial(timing)]
async fn kill_closing_pipes_is_enough_for_a_cooperative_subordinate() {
    let fake = FakeGdb::new();
    let config = fake.config();
    let bound = config.stop_timeout();
    let mut session = Session::new(config);
    session.spawn(fake.program()).await.expect("spawn");

    let started = Instant::now();
    session.kill().await;

    assert!(!session.is_running());
    assert!(started.elapsed() < bound, "EOF ends the fake's read loop");
    assert!(fake.commands().is_empty(), "kill writes nothing");
}

#[tokio::test]
#[serial_test::serial(timing)]
async fn stubborn_subordinate_is_escalated_to_signals() {
    let registry = LivenessRegistry::new();
    let fake = FakeGdb::with_script(STUBBORN_GDB);
    let config = fake.config();
    let bound = config.reply_timeout() + config.stop_timeout() * 4 + Duration::from_secs(1);
    let mut session = Session::with_registry(config, registry.clone());
    session.spawn(fake.program()).await.expect("spawn");
    let pid = i32::try_from(session.pid().unwrap()).unwrap();

    let started = Instant::now();
    session.exit().await;

    assert!(started.elapsed() < bound, "took {:?}", started.elapsed());
    assert!(!session.is_running());
    assert_eq!(session.state(), SessionState::Terminated);
    assert!(!registry.contains(pid), "escalation ends with a reap");
}

#[tokio::test]
#[serial_test::serial(timing)]
async fn kill_ignoring_sigterm_ends_with_sigkill() {
    let registry = LivenessRegistry::new();
    let fake = FakeGdb::with_script(UNTERMINABLE_GDB);
    let config = fake.config();
    let floor = config.stop_timeout() * 2;
    let bound = config.stop_timeout() * 3 + Duration::from_secs(1);
    let mut session = Session::with_registry(config, registry.clone());
    session.spawn(fake.program()).await.expect("spawn");
    let pid = i32::try_from(session.pid().unwrap()).unwrap();

    let started = Instant::now();
    session.kill().await;

    let elapsed = started.elapsed();
    assert!(elapsed >= floor, "EOF and SIGTERM both waited out, took {elapsed:?}");
    assert!(elapsed < bound, "took {elapsed:?}");
    assert!(!session.is_running());
    assert_eq!(session.state(), SessionState::Terminated);
    assert!(!registry.contains(pid), "SIGKILL is followed by a reap");
}
