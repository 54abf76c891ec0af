//! Core board representation, move tables, and primitives for 2048.

mod board;
mod direction;
mod error;
mod tables;

pub use board::{
    count_empty, distinct_nonzero_ranks, execute_move, max_rank, transpose, true_score, Board,
};
pub use direction::Direction;
pub use error::GameError;
pub use tables::Tables;
