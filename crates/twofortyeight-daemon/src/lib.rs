//! The game-play daemon: worker pool, snapshot/log persistence, and the
//! control server that a terminal viewer connects to.

mod control;
mod error;
mod pool;
mod store;
mod worker;

pub use control::{wait_for_socket, ControlServer, MAX_CONNECTIONS};
pub use error::DaemonError;
pub use pool::WorkerPool;
pub use store::{probe_running, Store};
pub use worker::WorkerState;
