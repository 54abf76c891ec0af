//! Root-level parallel fan-out: one search task per direction.
//!
//! Mirrors the donor engine's Lazy-SMP root fan-out (`ThreadPool::search`'s
//! `std::thread::scope` spawn-and-join), but with four fixed tasks instead
//! of N helper threads, and a private, non-shared cache per task rather than
//! one shared transposition table -- there is no concurrent writer here to
//! design a lockless structure against.

use twofortyeight_core::{execute_move, Board, Direction, Tables};

use crate::search::eval_root_move;

/// Find the best move for `board`, or `None` if every direction is a no-op.
///
/// Launches four scoped threads, one per direction, each with its own
/// [`crate::search::SearchState`]; blocks until all four return, then picks
/// the direction with the greatest value.
pub fn find_best_move(tables: &Tables, board: Board) -> Option<Direction> {
    if !has_move(tables, board) {
        return None;
    }

    let mut scores = [0.0f64; Direction::COUNT];
    std::thread::scope(|scope| {
        let handles: Vec<_> = Direction::ALL
            .iter()
            .map(|&dir| scope.spawn(move || eval_root_move(tables, board, dir)))
            .collect();
        for (slot, handle) in scores.iter_mut().zip(handles) {
            *slot = handle.join().expect("root search thread panicked");
        }
    });

    let (best_index, _) = scores
        .iter()
        .enumerate()
        .fold((0usize, f64::MIN), |(best_i, best_v), (i, &v)| {
            if v > best_v {
                (i, v)
            } else {
                (best_i, best_v)
            }
        });
    Some(Direction::ALL[best_index])
}

fn has_move(tables: &Tables, board: Board) -> bool {
    Direction::ALL
        .iter()
        .any(|&dir| execute_move(tables, dir, board) != board)
}

#[cfg(test)]
mod tests {
    use super::*;

    // The empty board has no legal move.
    #[test]
    fn empty_board_has_no_best_move() {
        let tables = Tables::new();
        assert_eq!(find_best_move(&tables, Board::EMPTY), None);
    }

    // find_best_move returns None iff no direction changes the board.
    #[test]
    fn none_iff_no_legal_move() {
        let tables = Tables::new();
        // Checkerboard of two alternating ranks: no empty cells, and no two
        // adjacent cells share a rank in either row or column direction.
        let stuck = (0..16u32).fold(Board::EMPTY, |b, i| {
            let (r, c) = (i / 4, i % 4);
            let rank = if (r + c) % 2 == 0 { 1 } else { 2 };
            b.set(r, c, rank)
        });
        assert_eq!(has_move(&tables, stuck), false);
        assert_eq!(find_best_move(&tables, stuck), None);
    }

    #[test]
    fn finds_a_move_on_a_sparse_board() {
        let tables = Tables::new();
        let b = Board::EMPTY.set(0, 0, 1).set(0, 1, 1);
        assert!(find_best_move(&tables, b).is_some());
    }

    // Running find_best_move twice on the same board is deterministic.
    #[test]
    fn deterministic_across_repeated_calls() {
        let tables = Tables::new();
        let b = Board::EMPTY
            .set(0, 0, 1)
            .set(0, 1, 2)
            .set(1, 1, 1)
            .set(2, 2, 3);
        let first = find_best_move(&tables, b);
        let second = find_best_move(&tables, b);
        assert_eq!(first, second);
    }
}
