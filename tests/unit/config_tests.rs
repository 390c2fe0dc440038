//! Unit tests for supervisor configuration parsing and validation.

use std::io::Write;
use std::time::Duration;

use gdbctl::{GdbError, SupervisorConfig};

#[test]
fn defaults_match_the_stock_debugger_invocation() {
    let config = SupervisorConfig::default();

    assert_eq!(config.debugger, "gdb");
    assert_eq!(config.debugger_args, ["--interpreter=mi", "-n", "-q"]);
    assert_eq!(config.reply_timeout(), Duration::from_secs(3));
    assert_eq!(config.stop_timeout(), Duration::from_secs(1));
    assert_eq!(config.startup_max_lines, 5);
}

#[test]
fn empty_document_yields_defaults() {
    let config = SupervisorConfig::from_toml_str("").expect("empty config is valid");
    assert_eq!(config, SupervisorConfig::default());
}

#[test]
fn fields_override_defaults() {
    let config = SupervisorConfig::from_toml_str(
        r#"
debugger = "/usr/local/bin/gdb"
debugger_args = ["--interpreter=mi3", "-nx"]
reply_timeout_ms = 250
stop_timeout_ms = 75
startup_max_lines = 12
"#,
    )
    .expect("valid config");

    assert_eq!(config.debugger, "/usr/local/bin/gdb");
    assert_eq!(config.debugger_args, ["--interpreter=mi3", "-nx"]);
    assert_eq!(config.reply_timeout(), Duration::from_millis(250));
    assert_eq!(config.stop_timeout(), Duration::from_millis(75));
    assert_eq!(config.startup_max_lines, 12);
}

#[test]
fn partial_document_keeps_remaining_defaults() {
    let config = SupervisorConfig::from_toml_str("reply_timeout_ms = 100").expect("valid");

    assert_eq!(config.reply_timeout_ms, 100);
    assert_eq!(config.debugger, "gdb");
    assert_eq!(config.stop_timeout_ms, 1000);
}

#[test]
fn invalid_values_are_rejected() {
    let cases = [
        ("debugger = \"  \"", "debugger must not be empty"),
        ("reply_timeout_ms = 0", "reply_timeout_ms must be greater than zero"),
        ("stop_timeout_ms = 0", "stop_timeout_ms must be greater than zero"),
        ("startup_max_lines = 0", "startup_max_lines must be greater than zero"),
    ];
    for (raw, expected) in cases {
        let err = SupervisorConfig::from_toml_str(raw).unwrap_err();
        assert_eq!(err, GdbError::Config(expected.into()), "for {raw:?}");
    }
}

#[test]
fn wrong_types_are_config_errors() {
    let err = SupervisorConfig::from_toml_str("reply_timeout_ms = \"soon\"").unwrap_err();
    assert!(matches!(err, GdbError::Config(_)), "got {err:?}");
}

#[test]
fn load_from_path_reads_a_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "debugger = \"gdb-multiarch\"").expect("write config");

    let config = SupervisorConfig::load_from_path(file.path()).expect("load");

    assert_eq!(config.debugger, "gdb-multiarch");
}

#[test]
fn load_from_missing_path_is_config_error() {
    let dir = tempfile::tempdir().expect("temp dir");

    let err = SupervisorConfig::load_from_path(dir.path().join("absent.toml")).unwrap_err();

    assert!(
        matches!(err, GdbError::Config(ref msg) if msg.starts_with("failed to read config")),
        "got {err:?}"
    );
}
