//! The control server: a local Unix-domain stream socket serving `view`/
//! `quit` commands to external clients (the terminal viewer among them).
//!
//! Grounded on the donor's `socket_handler`/`session_handler`/
//! `output_board_all` (`fileio.c`): a `select()`-driven poll loop over a
//! fixed-size client-fd array, replaced here with a short-sleep poll loop
//! over a `Vec` of non-blocking `UnixStream`s, matching the newer
//! socket-based variant of the source named in the design notes.

use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::DaemonError;
use crate::pool::WorkerPool;

/// Maximum number of concurrent control-endpoint clients.
pub const MAX_CONNECTIONS: usize = 16;

/// How long the accept/poll loop sleeps between passes.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A bound, not-yet-running control endpoint.
pub struct ControlServer {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlServer {
    /// Bind a fresh socket at `path`, removing any stale socket file left
    /// behind by a prior unclean shutdown.
    pub fn bind(path: &Path) -> Result<ControlServer, DaemonError> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path)?;
        listener.set_nonblocking(true)?;
        Ok(ControlServer {
            listener,
            path: path.to_path_buf(),
        })
    }

    /// Run the accept/dispatch loop until `pool` stops running.
    ///
    /// Accepts up to [`MAX_CONNECTIONS`] concurrent clients; each is read
    /// one command byte at a time and dispatched per the control protocol.
    /// A client whose read yields EOF or a real error (not would-block) is
    /// closed; other clients and the pool continue.
    pub fn run(&self, pool: &WorkerPool) {
        let mut clients: Vec<UnixStream> = Vec::new();
        while pool.is_running() {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    if clients.len() < MAX_CONNECTIONS {
                        if stream.set_nonblocking(true).is_ok() {
                            clients.push(stream);
                        }
                    }
                    // Over the connection limit: drop the stream, closing it.
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {}
                Err(err) => warn!(%err, "control endpoint accept failed"),
            }

            clients.retain_mut(|client| handle_client(client, pool));
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Poll until the socket at `path` appears (`want_present = true`, used
/// while starting a daemon) or disappears (`want_present = false`, used
/// while waiting for one to stop), up to `timeout`. Returns `false` on
/// timeout. Grounded on the donor's `wait_daemon`, which polls the same
/// socket path rather than the lock files directly.
pub fn wait_for_socket(path: &Path, want_present: bool, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    loop {
        if path.exists() == want_present {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Service one pending command byte on `client`. Returns `false` if the
/// connection should be closed.
fn handle_client(client: &mut UnixStream, pool: &WorkerPool) -> bool {
    let mut cmd = [0u8; 1];
    match client.read(&mut cmd) {
        Ok(0) => false,
        Ok(_) => dispatch(cmd[0], client, pool),
        Err(err) if err.kind() == ErrorKind::WouldBlock => true,
        Err(_) => false,
    }
}

fn dispatch(cmd: u8, client: &mut UnixStream, pool: &WorkerPool) -> bool {
    match cmd {
        b'q' | b'Q' => {
            debug!("control endpoint received quit command");
            pool.stop();
            false
        }
        b'b' | b'B' => {
            let dump = pool.render_boards();
            if let Err(err) = client.write_all(dump.as_bytes()) {
                warn!(%err, "failed to write board dump to client");
                return false;
            }
            true
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use twofortyeight_core::Tables;

    use crate::store::Store;

    fn socket_path(dir: &Path) -> PathBuf {
        dir.join(".2048-test.socket")
    }

    fn spawn_pool(worker_count: usize, dir: &Path) -> (WorkerPool, PathBuf) {
        let store = Store::open(&dir.join("2048.log"), &dir.join("2048.snapshot")).unwrap();
        let pool = WorkerPool::new(worker_count, Tables::new(), store);
        (pool, socket_path(dir))
    }

    // After start-up with N=2, "b" returns "2\n" then 2 well-formed lines.
    #[test]
    fn board_dump_reply_shape() {
        let dir = tempfile::tempdir().unwrap();
        let (pool, sock_path) = spawn_pool(2, dir.path());
        let server = ControlServer::bind(&sock_path).unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| server.run(&pool));

            // Give the accept loop a moment to come up, then connect.
            let mut stream = connect_retrying(&sock_path);
            stream.write_all(b"b").unwrap();

            let mut reader = BufReader::new(stream);
            let mut first_line = String::new();
            reader.read_line(&mut first_line).unwrap();
            assert_eq!(first_line, "2\n");

            for _ in 0..2 {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let fields: Vec<&str> = line.trim_end().split(',').collect();
                assert_eq!(fields.len(), 4);
                assert_eq!(fields[3].len(), 16);
            }

            pool.stop();
        });
    }

    #[test]
    fn quit_command_stops_the_pool() {
        let dir = tempfile::tempdir().unwrap();
        let (pool, sock_path) = spawn_pool(1, dir.path());
        let server = ControlServer::bind(&sock_path).unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| server.run(&pool));
            let mut stream = connect_retrying(&sock_path);
            stream.write_all(b"q").unwrap();

            let start = std::time::Instant::now();
            while pool.is_running() && start.elapsed() < Duration::from_secs(2) {
                std::thread::sleep(Duration::from_millis(5));
            }
            assert!(!pool.is_running());
        });
    }

    fn connect_retrying(path: &Path) -> UnixStream {
        let start = std::time::Instant::now();
        loop {
            if let Ok(stream) = UnixStream::connect(path) {
                return stream;
            }
            if start.elapsed() > Duration::from_secs(2) {
                panic!("timed out connecting to control endpoint");
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}
