//! Per-worker game state and the pure game-step logic that drives it.
//!
//! Grounded on the donor daemon's `worker.c`: `draw_tile`/`insert_tile_rand`
//! for tile spawning, and `play_game`'s per-move body (search, apply, spawn,
//! abort on an illegal move). The lock-acquisition choreography itself lives
//! in [`crate::pool`]; this module only computes values.

use rand::rngs::StdRng;
use rand::Rng;
use tracing::error;

use twofortyeight_core::{count_empty, execute_move, max_rank, Board, Direction, Tables};
use twofortyeight_engine::find_best_move;

/// One worker's in-progress game: move count, cumulative spawned-tile score
/// discount, and the current board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerState {
    pub moveno: u32,
    pub score_offset: u32,
    pub board: Board,
}

impl WorkerState {
    /// A fresh worker state with a board seeded by `rng`.
    pub fn seeded(rng: &mut StdRng) -> WorkerState {
        WorkerState {
            moveno: 0,
            score_offset: 0,
            board: seed_board(rng),
        }
    }
}

impl Default for WorkerState {
    fn default() -> WorkerState {
        WorkerState {
            moveno: 0,
            score_offset: 0,
            board: Board::EMPTY,
        }
    }
}

/// Draw a tile rank: rank 1 with probability 0.9, rank 2 with probability 0.1.
pub(crate) fn draw_tile(rng: &mut StdRng) -> u32 {
    if rng.gen_bool(0.9) {
        1
    } else {
        2
    }
}

/// Insert `rank` at a uniformly random empty cell of `board`.
///
/// Panics if `board` has no empty cell; callers only reach here after
/// confirming `count_empty(board) > 0`.
pub(crate) fn insert_tile_rand(rng: &mut StdRng, board: Board, rank: u32) -> Board {
    let empty: Vec<u32> = board.empty_cells().collect();
    let cell = empty[rng.gen_range(0..empty.len())];
    board.set(cell / 4, cell % 4, rank)
}

/// Build a fresh seed board: one random tile at a random cell, then a
/// second tile inserted into a random empty cell.
pub(crate) fn seed_board(rng: &mut StdRng) -> Board {
    let first_rank = draw_tile(rng);
    let first_cell = rng.gen_range(0..16u32);
    let board = Board::EMPTY.set(first_cell / 4, first_cell % 4, first_rank);
    let second_rank = draw_tile(rng);
    insert_tile_rand(rng, board, second_rank)
}

/// True once the board is stuck (no empty cell and no move changes it) or
/// the board is saturated at rank 15 with nowhere left to spawn. Checked
/// before invoking the (parallel) search, per the game loop's step 2.
fn game_should_end(tables: &Tables, board: Board) -> bool {
    let no_empty = count_empty(board) == 0;
    let blocked =
        no_empty && Direction::ALL.iter().all(|&dir| execute_move(tables, dir, board) == board);
    let capped = max_rank(board) == 15 && no_empty;
    blocked || capped
}

/// The outcome of one game-loop turn.
pub(crate) enum Turn {
    /// The game continues: the post-move, post-spawn board, and whether the
    /// spawned tile was rank 2 (which adds 4 to `score_offset`).
    Moved { board: Board, spawned_rank2: bool },
    /// The game has ended; the worker should log and reinitialize.
    Ended,
}

/// Compute one turn of the game loop for `board`: search, apply the best
/// move, and spawn a new tile. Does not touch any shared state; the caller
/// owns locking.
///
/// # Panics
///
/// Panics if the search returns a move that does not change the board --
/// per the error-handling policy, this is a search/table bug and must
/// crash loudly rather than be swallowed.
pub(crate) fn take_turn(tables: &Tables, board: Board, rng: &mut StdRng) -> Turn {
    if game_should_end(tables, board) {
        return Turn::Ended;
    }
    let Some(dir) = find_best_move(tables, board) else {
        return Turn::Ended;
    };
    let newboard = execute_move(tables, dir, board);
    if newboard == board {
        error!(?dir, board = %board.to_hex(), "search returned a move that did not change the board");
        panic!("search returned a move that did not change the board");
    }
    let rank = draw_tile(rng);
    let board = insert_tile_rand(rng, newboard, rank);
    Turn::Moved {
        board,
        spawned_rank2: rank == 2,
    }
}
