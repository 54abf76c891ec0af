//! The move-node / tile-choose-node recursion at the heart of the search.
//!
//! A move node is a maximizer over the four directions; a tile-choose node
//! is an expectation over where and which rank the next spawned tile lands.
//! Both are driven by a single mutable [`SearchState`] that tracks the
//! current recursion depth and owns the per-invocation transposition cache.

use twofortyeight_core::{
    count_empty, distinct_nonzero_ranks, execute_move, transpose, Board, Direction, Tables,
};

use crate::cache::Cache;

/// Cumulative-probability threshold below which a tile-choose node is not
/// expanded further; its static heuristic is returned instead.
pub const CPROB_THRESHOLD: f64 = 1e-4;

/// Search depth below which the transposition cache is consulted and
/// populated. At or beyond this depth every node is evaluated fresh.
pub const CACHE_DEPTH_LIMIT: u8 = 15;

/// `max(3, distinct_nonzero_ranks(board) - 2)`, the per-top-level-call depth
/// limit.
pub fn depth_limit_for(board: Board) -> u8 {
    let distinct = distinct_nonzero_ranks(board) as i32;
    (distinct - 2).max(3) as u8
}

/// Static heuristic of `board`: the row heuristic applied both to the board
/// and to its transpose, so that column runs are scored the same way row
/// runs are.
pub fn static_eval(tables: &Tables, board: Board) -> f64 {
    row_heur_sum(tables, board) + row_heur_sum(tables, transpose(board))
}

fn row_heur_sum(tables: &Tables, board: Board) -> f64 {
    let raw = board.raw();
    (0..4u32)
        .map(|r| {
            let row = ((raw >> (16 * r)) & 0xFFFF) as u16;
            tables.heur[row as usize] as f64
        })
        .sum()
}

/// Per-invocation search state: the tables handle, the depth limit computed
/// once at the top of the call, the current recursion depth, and a private
/// transposition cache. One instance is created per root-move task and
/// never shared across tasks.
pub(crate) struct SearchState<'a> {
    pub(crate) tables: &'a Tables,
    pub(crate) depth_limit: u8,
    pub(crate) curdepth: u8,
    pub(crate) cache: Cache,
}

impl<'a> SearchState<'a> {
    pub(crate) fn new(tables: &'a Tables, board: Board) -> SearchState<'a> {
        SearchState {
            tables,
            depth_limit: depth_limit_for(board),
            curdepth: 0,
            cache: Cache::new(),
        }
    }
}

/// Expectation node: evaluate every way a new tile could spawn on `board`,
/// weighted by rank probability (0.9 for rank 1, 0.1 for rank 2) and by the
/// uniform chance of landing on any of the empty cells.
pub(crate) fn tile_choose_node(state: &mut SearchState, board: Board, cprob: f64) -> f64 {
    if cprob < CPROB_THRESHOLD || state.curdepth >= state.depth_limit {
        return static_eval(state.tables, board);
    }
    if state.curdepth < CACHE_DEPTH_LIMIT {
        if let Some(value) = state.cache.probe(board.raw(), state.curdepth) {
            return value;
        }
    }

    let num_open = count_empty(board) as f64;
    let p = cprob / num_open;

    let mut res = 0.0;
    for i in board.empty_cells() {
        let (r, c) = (i / 4, i % 4);
        let with_rank1 = board.set(r, c, 1);
        let with_rank2 = board.set(r, c, 2);
        res += move_node(state, with_rank1, p * 0.9) * 0.9;
        res += move_node(state, with_rank2, p * 0.1) * 0.1;
    }
    res /= num_open;

    if state.curdepth < CACHE_DEPTH_LIMIT {
        state.cache.store(board.raw(), state.curdepth, res);
    }
    res
}

/// Maximizer node: the best of the four moves from `board`, or `0.0` if
/// none of them change the board.
pub(crate) fn move_node(state: &mut SearchState, board: Board, cprob: f64) -> f64 {
    let mut best = 0.0f64;
    state.curdepth += 1;
    for &dir in &Direction::ALL {
        let newboard = execute_move(state.tables, dir, board);
        if newboard != board {
            let value = tile_choose_node(state, newboard, cprob);
            if value > best {
                best = value;
            }
        }
    }
    state.curdepth -= 1;
    best
}

/// Evaluate a single root move: apply `dir` to `board`, and if it changes
/// the board, score the resulting tile-choose node at `cprob = 1.0` with a
/// fresh search state; otherwise `0.0` (an illegal/no-op move never wins the
/// root comparison). A small epsilon disambiguates a legal zero-valued move
/// from an illegal one.
pub(crate) fn eval_root_move(tables: &Tables, board: Board, dir: Direction) -> f64 {
    let newboard = execute_move(tables, dir, board);
    if newboard == board {
        return 0.0;
    }
    let mut state = SearchState::new(tables, board);
    tile_choose_node(&mut state, newboard, 1.0) + 1e-6
}
