//! The CLI surface: flags named in the external-interface spec, plus the
//! three environment-variable path overrides.
//!
//! CLI parsing itself is thin wiring around the daemon/engine crates, not a
//! re-specified component -- see the root binary's module docs.

use std::path::PathBuf;

use clap::Parser;

const ENV_LOG_FILE: &str = "RUN2048_LOG_FILE";
const ENV_SNAPSHOT_FILE: &str = "RUN2048_SNAPSHOT_FILE";
const ENV_SOCKET_PATH: &str = "RUN2048_SOCKET_PATH";

const DEFAULT_LOG_FILE: &str = "2048.log";
const DEFAULT_SNAPSHOT_FILE: &str = "2048.snapshot";
const DEFAULT_SOCKET_PATH: &str = ".2048-run.socket";

/// A long-running 2048 solver daemon and its terminal viewer.
#[derive(Parser, Debug)]
#[command(name = "twofortyeight", version, about)]
pub struct Cli {
    /// Start the daemon; never enter the viewer.
    #[arg(short = 'd', long = "daemon")]
    pub daemon: bool,

    /// Send a quit command to a running daemon and wait for it to stop.
    #[arg(short = 's', long = "stop")]
    pub stop: bool,

    /// Number of worker games to run concurrently (K >= 1).
    #[arg(short = 'n', long = "workers", value_name = "K")]
    pub workers: Option<usize>,
}

/// The three filesystem paths the daemon and viewer agree on, each
/// overridable by an environment variable.
pub struct Paths {
    pub log: PathBuf,
    pub snapshot: PathBuf,
    pub socket: PathBuf,
}

impl Paths {
    /// Resolve paths from the environment, falling back to the historical
    /// defaults of this daemon family.
    pub fn from_env() -> Paths {
        Paths {
            log: path_from_env(ENV_LOG_FILE, DEFAULT_LOG_FILE),
            snapshot: path_from_env(ENV_SNAPSHOT_FILE, DEFAULT_SNAPSHOT_FILE),
            socket: path_from_env(ENV_SOCKET_PATH, DEFAULT_SOCKET_PATH),
        }
    }
}

fn path_from_env(key: &str, default: &str) -> PathBuf {
    std::env::var_os(key).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(default))
}
