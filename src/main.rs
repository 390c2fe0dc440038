#![forbid(unsafe_code)]

//! `gdbctl`: drive a supervised GDB/MI session from the command line.
//!
//! Spawns the debugger against a program, inserts the requested breakpoints
//! with their action lists, runs the program until it stops or exits, prints
//! the debugger's output, and shuts the session down.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use gdbctl::{GdbError, Result, Session, SupervisorConfig};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "gdbctl", about = "Supervise a GDB/MI session", version, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the debugger binary from the configuration.
    #[arg(long)]
    debugger: Option<String>,

    /// Insert a breakpoint before running; may be repeated.
    #[arg(long = "break", value_name = "FILE:LINE")]
    breakpoints: Vec<String>,

    /// Action attached to every breakpoint; may be repeated.
    #[arg(long = "command", value_name = "TEXT")]
    commands: Vec<String>,

    /// Print breakpoints as JSON lines.
    #[arg(long)]
    json: bool,

    /// Program to debug.
    program: PathBuf,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| GdbError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SupervisorConfig::load_from_path(path)?,
        None => SupervisorConfig::default(),
    };
    if let Some(debugger) = &args.debugger {
        config.debugger.clone_from(debugger);
    }

    let locations = args
        .breakpoints
        .iter()
        .map(|raw| parse_location(raw))
        .collect::<Result<Vec<_>>>()?;

    let mut session = Session::new(config);
    session.spawn(&args.program).await?;
    info!(pid = session.pid(), "debugger ready");

    let outcome = tokio::select! {
        outcome = drive(&mut session, &locations, &args.commands, args.json) => outcome,
        () = shutdown_signal() => {
            info!("interrupted, shutting down debugger");
            Ok(())
        }
    };
    if let Err(err) = &outcome {
        error!(%err, "debugger session failed");
    }

    session.exit().await;
    outcome
}

async fn drive(
    session: &mut Session,
    locations: &[(String, u32)],
    commands: &[String],
    json: bool,
) -> Result<()> {
    for (file, line) in locations {
        let mut breakpoint = session.add_breakpoint(file, *line).await?;
        for command in commands {
            breakpoint.add_command(command.clone()).await?;
        }
    }

    for breakpoint in session.breakpoints() {
        if json {
            let line = serde_json::to_string(breakpoint)
                .map_err(|err| GdbError::Io(format!("failed to encode breakpoint: {err}")))?;
            println!("{line}");
        } else {
            println!(
                "breakpoint {} at {}:{} ({} actions)",
                breakpoint.id(),
                breakpoint.file(),
                breakpoint.line(),
                breakpoint.commands().len()
            );
        }
    }

    let reply = session.run().await?;
    println!("{reply}");
    Ok(())
}

fn parse_location(raw: &str) -> Result<(String, u32)> {
    let (file, line) = raw
        .rsplit_once(':')
        .ok_or_else(|| GdbError::Config(format!("breakpoint {raw:?} is not FILE:LINE")))?;
    let line = line
        .parse()
        .map_err(|err| GdbError::Config(format!("breakpoint {raw:?} has a bad line: {err}")))?;
    if file.is_empty() {
        return Err(GdbError::Config(format!("breakpoint {raw:?} has no file")));
    }
    Ok((file.to_owned(), line))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(err) => {
            warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
            let _ = ctrl_c.await;
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| GdbError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| GdbError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
