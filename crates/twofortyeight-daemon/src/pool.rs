//! The worker pool: shared tables, a flat arena of per-worker states, and
//! the N+2 long-lived tasks (N game loops, one snapshotter, one control
//! server) that make up a running daemon.
//!
//! Grounded on the donor's `worker_t`/`worker_init`/`worker_start`/
//! `worker_stop` (`worker.c`), reimplemented as the arena-of-locks pattern:
//! the pool owns a flat `Vec<RwLock<WorkerState>>` instead of a
//! pointer-linked array of thread data, and each worker task receives only
//! its numeric index plus a shared reference to the pool -- no back-pointers.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, info};

use twofortyeight_core::{max_rank, true_score, Board, Tables};

use crate::control::ControlServer;
use crate::error::DaemonError;
use crate::store::Store;
use crate::worker::{take_turn, Turn, WorkerState};

/// Derive worker `i`'s PRNG seed from the pool's one-time OS-entropy seed,
/// via a SplitMix64-style mix -- independent per-worker seeds without an
/// OS-entropy draw per worker.
fn mix_seed(root: u64, i: u64) -> u64 {
    let mut z = root.wrapping_add(i.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Owns the lookup tables, one reader-writer lock per worker, the
/// snapshot/log store, and the cooperative shutdown flag.
pub struct WorkerPool {
    tables: Tables,
    states: Vec<RwLock<WorkerState>>,
    seeds: Vec<u64>,
    store: Store,
    running: AtomicBool,
}

impl WorkerPool {
    /// Build a pool of `worker_count` workers sharing `tables`, seeding each
    /// worker's PRNG from one OS-entropy draw and each board from a fresh
    /// seed board, then overlaying whatever the snapshot supplies.
    pub fn new(worker_count: usize, tables: Tables, store: Store) -> WorkerPool {
        assert!(worker_count >= 1, "worker pool needs at least one worker");

        let root_seed = rand::rngs::OsRng.next_u64();
        let seeds: Vec<u64> = (0..worker_count as u64)
            .map(|i| mix_seed(root_seed, i))
            .collect();

        let mut states: Vec<RwLock<WorkerState>> = seeds
            .iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                RwLock::new(WorkerState::seeded(&mut rng))
            })
            .collect();

        for (state, record) in states.iter_mut().zip(store.read_snapshot_records(worker_count)) {
            if let Some((moveno, score_offset, board)) = record {
                *state.get_mut().expect("worker lock poisoned") = WorkerState {
                    moveno,
                    score_offset,
                    board,
                };
            }
        }

        WorkerPool {
            tables,
            states,
            seeds,
            store,
            running: AtomicBool::new(true),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.states.len()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Request cooperative shutdown: the game loops, snapshotter, and
    /// control server each exit at their next iteration boundary.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Render the `"b"` control-command reply: `"<N>\n"` followed by one
    /// `"<i>,<moveno>,<score>,<board_hex16>\n"` line per worker, each read
    /// under that worker's own lock.
    pub fn render_boards(&self) -> String {
        let mut out = format!("{}\n", self.states.len());
        for (i, state) in self.states.iter().enumerate() {
            let s = state.read().expect("worker lock poisoned");
            let score = true_score(&self.tables, s.board).saturating_sub(s.score_offset);
            out.push_str(&format!("{i},{},{score},{:016x}\n", s.moveno, s.board.raw()));
        }
        out
    }

    fn snapshot_records(&self) -> Vec<(u32, u32, Board)> {
        self.states
            .iter()
            .map(|s| {
                let s = s.read().expect("worker lock poisoned");
                (s.moveno, s.score_offset, s.board)
            })
            .collect()
    }

    /// Spawn the N worker threads and the snapshot thread, run the control
    /// server on the calling thread until shutdown, then join everything and
    /// write one final snapshot.
    pub fn run(&self, socket_path: &Path) -> Result<(), DaemonError> {
        let server = ControlServer::bind(socket_path)?;
        info!(workers = self.worker_count(), "worker pool starting");

        std::thread::scope(|scope| {
            for index in 0..self.worker_count() {
                scope.spawn(move || self.worker_loop(index));
            }
            scope.spawn(|| self.snapshot_loop());
            server.run(self);
        });

        self.store.write_snapshot(&self.snapshot_records());
        info!("worker pool stopped");
        Ok(())
    }

    fn worker_loop(&self, index: usize) {
        let mut rng = StdRng::seed_from_u64(self.seeds[index]);
        while self.is_running() {
            let board = self.states[index].read().expect("worker lock poisoned").board;
            match take_turn(&self.tables, board, &mut rng) {
                Turn::Moved { board, spawned_rank2 } => {
                    let mut s = self.states[index].write().expect("worker lock poisoned");
                    s.board = board;
                    s.moveno += 1;
                    if spawned_rank2 {
                        s.score_offset += 4;
                    }
                }
                Turn::Ended => {
                    let (moveno, score_offset, board) = {
                        let s = self.states[index].read().expect("worker lock poisoned");
                        (s.moveno, s.score_offset, s.board)
                    };
                    let score = true_score(&self.tables, board).saturating_sub(score_offset);
                    let max_tile: u16 = 1u16.checked_shl(max_rank(board)).unwrap_or(u16::MAX);
                    // A worker can resume onto an already-terminal snapshot board and end
                    // before ever moving; moveno 0 means no game was actually played.
                    if moveno != 0 {
                        self.store.append_completed_game(moveno, score, max_tile, board);
                        debug!(worker = index, moveno, score, max_tile, "game completed");
                    }

                    let mut s = self.states[index].write().expect("worker lock poisoned");
                    *s = WorkerState::seeded(&mut rng);
                }
            }
        }
    }

    fn snapshot_loop(&self) {
        while self.is_running() {
            self.store.write_snapshot(&self.snapshot_records());
            std::thread::sleep(Duration::from_secs(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pool(worker_count: usize) -> WorkerPool {
        let dir = tempdir().unwrap();
        let store = Store::open(
            &dir.path().join("2048.log"),
            &dir.path().join("2048.snapshot"),
        )
        .unwrap();
        let pool = WorkerPool::new(worker_count, Tables::new(), store);
        std::mem::forget(dir); // keep the tempdir alive for the store's open fds
        pool
    }

    #[test]
    fn new_pool_has_requested_worker_count() {
        let pool = pool(3);
        assert_eq!(pool.worker_count(), 3);
    }

    #[test]
    fn fresh_pool_workers_start_with_two_tiles() {
        let pool = pool(2);
        for state in &pool.states {
            let s = state.read().unwrap();
            let occupied = (0..16).filter(|&i| s.board.get_cell(i) != 0).count();
            assert_eq!(occupied, 2);
            assert_eq!(s.moveno, 0);
            assert_eq!(s.score_offset, 0);
        }
    }

    // render_boards' first line is "<N>\n", then N well-formed lines.
    #[test]
    fn render_boards_matches_protocol_shape() {
        let pool = pool(2);
        let rendered = pool.render_boards();
        let mut lines = rendered.lines();
        assert_eq!(lines.next(), Some("2"));
        let rest: Vec<&str> = lines.collect();
        assert_eq!(rest.len(), 2);
        for line in rest {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields.len(), 4);
            assert!(fields[0].parse::<u32>().is_ok());
            assert!(fields[1].parse::<u32>().is_ok());
            assert!(fields[2].parse::<u32>().is_ok());
            assert_eq!(fields[3].len(), 16);
            assert!(u64::from_str_radix(fields[3], 16).is_ok());
        }
    }

    #[test]
    fn stop_flips_running_flag() {
        let pool = pool(1);
        assert!(pool.is_running());
        pool.stop();
        assert!(!pool.is_running());
    }

    // A worker resumed straight onto an already-terminal snapshot board ends
    // its "game" with moveno still 0; that is not a played game and must not
    // produce a log line.
    #[test]
    fn resuming_onto_terminal_board_does_not_log() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("2048.log");
        let snap_path = dir.path().join("2048.snapshot");

        // Checkerboard of two alternating ranks: no empty cells, and no two
        // adjacent cells share a rank in either row or column direction.
        let stuck = (0..16u32).fold(Board::EMPTY, |b, i| {
            let (r, c) = (i / 4, i % 4);
            let rank = if (r + c) % 2 == 0 { 1 } else { 2 };
            b.set(r, c, rank)
        });
        std::fs::write(&snap_path, format!("0,0,{:016x}\n", stuck.raw())).unwrap();

        let store = Store::open(&log_path, &snap_path).unwrap();
        let pool = WorkerPool::new(1, Tables::new(), store);
        {
            let s = pool.states[0].read().unwrap();
            assert_eq!(s.moveno, 0);
            assert_eq!(s.board, stuck);
        }

        std::thread::scope(|scope| {
            let sock_path = dir.path().join(".2048-resume-test.socket");
            scope.spawn(|| pool.run(&sock_path).unwrap());
            std::thread::sleep(Duration::from_millis(100));
            pool.stop();
        });

        let log_contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(log_contents.is_empty());
    }
}
