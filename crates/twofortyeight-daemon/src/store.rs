//! Snapshot/log persistence and single-instance advisory locking.
//!
//! Grounded on the donor daemon's `fileio.c`: `init_files`/`close_files` for
//! the exclusive non-blocking `flock()` pair, `read_snapshot`/
//! `write_snapshot` for the line formats, and `test_running` for the
//! non-destructive liveness probe. `flock()` itself is replaced by the
//! `fs2` crate's `FileExt`, which wraps the same OS primitive.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use fs2::FileExt;
use tracing::warn;

use twofortyeight_core::Board;

use crate::error::DaemonError;

/// Holds the daemon's two persistent files, each under an exclusive
/// non-blocking advisory lock for the process's whole lifetime.
pub struct Store {
    log: Mutex<File>,
    snapshot: Mutex<File>,
}

impl Store {
    /// Open (creating if needed) and exclusively lock both files.
    ///
    /// Fails with [`DaemonError::AlreadyRunning`] if either lock is already
    /// held, and with [`DaemonError::FileIO`] on any other open failure.
    pub fn open(log_path: &Path, snapshot_path: &Path) -> Result<Store, DaemonError> {
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        lock_exclusive(&log)?;

        let snapshot = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(snapshot_path)?;
        lock_exclusive(&snapshot)?;

        Ok(Store {
            log: Mutex::new(log),
            snapshot: Mutex::new(snapshot),
        })
    }

    /// Append one completed-game record and flush immediately. A write
    /// failure is logged, not propagated: per the error-handling policy,
    /// workers keep playing even if the log can't be written.
    pub fn append_completed_game(&self, moveno: u32, score: u32, max_tile: u16, board: Board) {
        let mut file = self.log.lock().expect("log mutex poisoned");
        let result = (|| -> std::io::Result<()> {
            writeln!(file, "{moveno},{score},{max_tile},{:016x}", board.raw())?;
            file.flush()
        })();
        if let Err(err) = result {
            warn!(%err, "failed to append completed-game record");
        }
    }

    /// Read up to `count` snapshot lines, returning `None` for any worker
    /// whose line is missing, short, or unparsable (that worker keeps its
    /// default initial state). Parse errors are logged, not fatal.
    pub fn read_snapshot_records(&self, count: usize) -> Vec<Option<(u32, u32, Board)>> {
        let mut out = vec![None; count];
        let mut file = self.snapshot.lock().expect("snapshot mutex poisoned");
        if let Err(err) = file.seek(SeekFrom::Start(0)) {
            warn!(%err, "failed to seek snapshot file for read");
            return out;
        }
        let reader = BufReader::new(&*file);
        for (i, line) in reader.lines().enumerate() {
            if i >= count {
                break;
            }
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(%err, line = i, "failed reading snapshot line");
                    break;
                }
            };
            match parse_snapshot_line(&line) {
                Ok(record) => out[i] = Some(record),
                Err(err) => warn!(%err, line = i, "corrupt snapshot line, using default state"),
            }
        }
        out
    }

    /// Truncate and rewrite the snapshot file with one line per record, in
    /// worker-index order. A write failure is logged, not propagated.
    pub fn write_snapshot(&self, records: &[(u32, u32, Board)]) {
        let mut file = self.snapshot.lock().expect("snapshot mutex poisoned");
        let result = (|| -> std::io::Result<()> {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            for &(moveno, score_offset, board) in records {
                writeln!(file, "{moveno},{score_offset},{:016x}", board.raw())?;
            }
            file.flush()
        })();
        if let Err(err) = result {
            warn!(%err, "failed to write snapshot");
        }
    }
}

fn lock_exclusive(file: &File) -> Result<(), DaemonError> {
    file.try_lock_exclusive().map_err(|_| DaemonError::AlreadyRunning)
}

fn parse_snapshot_line(line: &str) -> Result<(u32, u32, Board), DaemonError> {
    let mut fields = line.trim().splitn(3, ',');
    let corrupt = || DaemonError::Corrupt(line.to_string());

    let moveno: u32 = fields.next().ok_or_else(corrupt)?.parse().map_err(|_| corrupt())?;
    let score_offset: u32 = fields.next().ok_or_else(corrupt)?.parse().map_err(|_| corrupt())?;
    let hex = fields.next().ok_or_else(corrupt)?;
    let board = Board::from_hex(hex).ok_or_else(corrupt)?;
    Ok((moveno, score_offset, board))
}

/// Non-destructively probe whether a daemon instance already holds either
/// lock, without disturbing a process that does hold it.
pub fn probe_running(log_path: &Path, snapshot_path: &Path) -> bool {
    probe_one(log_path) || probe_one(snapshot_path)
}

fn probe_one(path: &Path) -> bool {
    let Ok(file) = OpenOptions::new().read(true).write(true).open(path) else {
        return false;
    };
    match file.try_lock_exclusive() {
        Ok(()) => {
            let _ = FileExt::unlock(&file);
            false
        }
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_and_locks_both_files() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("2048.log");
        let snap = dir.path().join("2048.snapshot");
        let store = Store::open(&log, &snap).unwrap();
        assert!(log.exists());
        assert!(snap.exists());
        drop(store);
    }

    #[test]
    fn second_open_fails_already_running() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("2048.log");
        let snap = dir.path().join("2048.snapshot");
        let _first = Store::open(&log, &snap).unwrap();
        let second = Store::open(&log, &snap);
        assert!(matches!(second, Err(DaemonError::AlreadyRunning)));
    }

    #[test]
    fn probe_running_true_while_locked() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("2048.log");
        let snap = dir.path().join("2048.snapshot");
        let _store = Store::open(&log, &snap).unwrap();
        assert!(probe_running(&log, &snap));
    }

    #[test]
    fn probe_running_false_when_missing() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("2048.log");
        let snap = dir.path().join("2048.snapshot");
        assert!(!probe_running(&log, &snap));
    }

    // Snapshot round-trip is bit-identical.
    #[test]
    fn snapshot_roundtrip() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("2048.log");
        let snap = dir.path().join("2048.snapshot");
        let store = Store::open(&log, &snap).unwrap();

        let records = vec![
            (12u32, 340u32, Board::new(0x0012_3400_0000_0021)),
            (0, 0, Board::EMPTY.set(0, 0, 1)),
        ];
        store.write_snapshot(&records);

        let reloaded = store.read_snapshot_records(records.len());
        for (expected, got) in records.iter().zip(reloaded) {
            assert_eq!(got, Some(*expected));
        }
    }

    #[test]
    fn read_snapshot_short_file_leaves_remainder_none() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("2048.log");
        let snap = dir.path().join("2048.snapshot");
        let store = Store::open(&log, &snap).unwrap();
        store.write_snapshot(&[(1, 0, Board::EMPTY.set(0, 0, 1))]);

        let reloaded = store.read_snapshot_records(3);
        assert!(reloaded[0].is_some());
        assert_eq!(reloaded[1], None);
        assert_eq!(reloaded[2], None);
    }

    #[test]
    fn corrupt_line_yields_none_not_error() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("2048.log");
        let snap = dir.path().join("2048.snapshot");
        {
            let mut f = OpenOptions::new()
                .create(true)
                .write(true)
                .open(&snap)
                .unwrap();
            writeln!(f, "not,a,valid,snapshot,line").unwrap();
        }
        let store = Store::open(&log, &snap).unwrap();
        let reloaded = store.read_snapshot_records(1);
        assert_eq!(reloaded[0], None);
    }

    // Appending one completed-game record with max_tile 32768.
    #[test]
    fn completed_game_record_format() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("2048.log");
        let snap = dir.path().join("2048.snapshot");
        let store = Store::open(&log, &snap).unwrap();
        let board = Board::EMPTY.set(3, 3, 15);
        store.append_completed_game(42, 100_000, 32768, board);

        let contents = std::fs::read_to_string(&log).unwrap();
        let line = contents.lines().next().unwrap();
        assert_eq!(line, format!("42,100000,32768,{:016x}", board.raw()));
    }
}
