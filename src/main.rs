//! Thin wiring: parse the CLI, resolve paths, and dispatch to the daemon
//! (foreground worker pool) or the viewer client.
//!
//! CLI parsing, environment-variable precedence, fork/exec daemonization,
//! and terminal rendering are non-core per spec section 1; this module
//! only wires them to the `twofortyeight-core`/`-engine`/`-daemon` crates.

mod cli;
mod viewer;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use cli::{Cli, Paths};
use twofortyeight_core::Tables;
use twofortyeight_daemon::{probe_running, wait_for_socket, Store, WorkerPool};

const DAEMON_WAIT_TIMEOUT: Duration = Duration::from_secs(20);
const VIEWER_TICK: Duration = Duration::from_millis(200);

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let paths = Paths::from_env();

    if let Some(k) = cli.workers {
        if k < 1 {
            bail!("-n requires a worker count >= 1");
        }
    }

    let daemon_running = probe_running(&paths.log, &paths.snapshot);

    if cli.stop {
        return stop_daemon(daemon_running, &paths);
    }

    if daemon_running {
        if cli.daemon {
            bail!("2048 daemon is already running");
        }
        return viewer::run(&paths.socket, VIEWER_TICK);
    }

    if cli.daemon {
        return run_daemon_foreground(&cli, &paths);
    }

    spawn_daemon_background(&cli, &paths)?;
    if !wait_for_socket(&paths.socket, true, DAEMON_WAIT_TIMEOUT) {
        bail!("timed out waiting for 2048 daemon to start");
    }
    info!("2048 daemon started");
    viewer::run(&paths.socket, VIEWER_TICK)
}

fn stop_daemon(daemon_running: bool, paths: &Paths) -> Result<()> {
    if !daemon_running {
        bail!("2048 daemon is not running");
    }
    viewer::send_quit(&paths.socket).context("failed to send quit command")?;
    if !wait_for_socket(&paths.socket, false, DAEMON_WAIT_TIMEOUT) {
        bail!("timed out waiting for 2048 daemon to stop");
    }
    info!("2048 daemon stopped");
    Ok(())
}

fn worker_count(cli: &Cli) -> usize {
    cli.workers.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| (n.get() / 4).max(1))
            .unwrap_or(1)
    })
}

fn run_daemon_foreground(cli: &Cli, paths: &Paths) -> Result<()> {
    let tables = Tables::new();
    let store = Store::open(&paths.log, &paths.snapshot)
        .context("failed to open log/snapshot files (is another daemon running?)")?;
    let pool = WorkerPool::new(worker_count(cli), tables, store);
    pool.run(&paths.socket).context("worker pool failed")?;
    Ok(())
}

fn spawn_daemon_background(cli: &Cli, paths: &Paths) -> Result<()> {
    let exe = std::env::current_exe().context("resolving own executable path")?;
    let mut command = std::process::Command::new(exe);
    command.arg("-d");
    if let Some(k) = cli.workers {
        command.arg("-n").arg(k.to_string());
    }
    command
        .env("RUN2048_LOG_FILE", &paths.log)
        .env("RUN2048_SNAPSHOT_FILE", &paths.snapshot)
        .env("RUN2048_SOCKET_PATH", &paths.socket)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    command.spawn().context("failed to start 2048 daemon process")?;
    Ok(())
}
