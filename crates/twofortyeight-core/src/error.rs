//! Invariant-violation errors for the core board representation.
//!
//! Most board operations are infallible by construction: the packed
//! representation only has 16 slots and a rank never exceeds 15 once
//! [`Board::try_set`] has validated it. This type exists for the few
//! call sites (tile insertion from external input, snapshot reload) that
//! need to reject a value without panicking.

use thiserror::Error;

/// A violation of a core board invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GameError {
    /// A rank greater than 15 was supplied; it cannot fit in a 4-bit nibble.
    #[error("rank {rank} does not fit in a 4-bit nibble (max 15)")]
    RankOverflow { rank: u32 },
    /// A cell index outside 0..16 was supplied.
    #[error("cell index {cell} is out of range (expected 0..16)")]
    CellOutOfRange { cell: u32 },
}
