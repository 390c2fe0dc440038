//! Integration tests for liveness as seen through a session: stop and
//! continue, external kills, respawn after termination.

use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use gdbctl::liveness::LivenessRegistry;
use gdbctl::{GdbError, Session, SessionState};

use super::test_helpers::{eventually, FakeGdb};

fn signal_session(session: &Session, sig: Signal) {
    let pid = session.pid().expect("spawned");
    kill(Pid::from_raw(i32::try_from(pid).unwrap()), sig).expect("signal delivered");
}

#[tokio::test]
async fn external_kill_is_observed_without_any_call() {
    let registry = LivenessRegistry::new();
    let fake = FakeGdb::new();
    let mut session = Session::with_registry(fake.config(), registry.clone());
    session.spawn(fake.program()).await.expect("spawn");
    let pid = i32::try_from(session.pid().unwrap()).unwrap();

    signal_session(&session, Signal::SIGKILL);

    assert!(
        eventually(Duration::from_secs(2), || !session.is_running()).await,
        "SIGKILL must be observed"
    );
    assert_eq!(session.state(), SessionState::Terminated);
    assert!(
        eventually(Duration::from_secs(1), || !registry.contains(pid)).await,
        "reaped pid leaves the registry"
    );

    let err = session.send("-list-features", "(gdb)").await.unwrap_err();
    assert_eq!(err, GdbError::NotRunning);
    assert_eq!(session.state(), SessionState::Terminated);
}

#[tokio::test]
async fn stopped_subordinate_is_not_running_until_continued() {
    let fake = FakeGdb::new();
    let mut session = Session::new(fake.config());
    session.spawn(fake.program()).await.expect("spawn");

    signal_session(&session, Signal::SIGSTOP);
    assert!(
        eventually(Duration::from_secs(2), || !session.is_running()).await,
        "stop must be observed"
    );
    assert_eq!(session.state(), SessionState::Live, "stopped is still live");

    let err = session.send("-list-features", "(gdb)").await.unwrap_err();
    assert_eq!(err, GdbError::NotRunning, "no write to a stopped subordinate");

    signal_session(&session, Signal::SIGCONT);
    assert!(
        eventually(Duration::from_secs(2), || session.is_running()).await,
        "continue must be observed"
    );

    let reply = session.send("-list-features", "(gdb)").await.expect("resumed");
    assert_eq!(reply.lines()[0], "^done");

    session.exit().await;
}

#[tokio::test]
async fn kill_of_a_stopped_subordinate_still_completes() {
    let fake = FakeGdb::new();
    let mut session = Session::new(fake.config());
    session.spawn(fake.program()).await.expect("spawn");

    signal_session(&session, Signal::SIGSTOP);
    assert!(eventually(Duration::from_secs(2), || !session.is_running()).await);

    session.kill().await;

    assert_eq!(session.state(), SessionState::Terminated);
    assert!(!session.is_running());
}

#[tokio::test]
async fn session_can_respawn_after_termination() {
    let fake = FakeGdb::new();
    let mut session = Session::new(fake.config());
    session.spawn(fake.program()).await.expect("first spawn");
    let first = session.pid();
    session.exit().await;
    assert_eq!(session.state(), SessionState::Terminated);

    session.spawn(fake.program()).await.expect("second spawn");

    assert_eq!(session.state(), SessionState::Live);
    assert_ne!(session.pid(), first);
    session.exit().await;
}

#[tokio::test]
async fn dropping_a_live_session_terminates_the_subordinate() {
    let registry = LivenessRegistry::new();
    let fake = FakeGdb::new();
    let mut session = Session::with_registry(fake.config(), registry.clone());
    session.spawn(fake.program()).await.expect("spawn");
    let pid = i32::try_from(session.pid().unwrap()).unwrap();

    drop(session);

    assert!(
        eventually(Duration::from_secs(3), || !registry.contains(pid)).await,
        "dropped session's subordinate must be reaped"
    );
    assert!(fake.commands().iter().any(|c| c == "-gdb-exit"));
}
