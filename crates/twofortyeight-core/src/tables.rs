//! Precomputed per-row lookup tables.
//!
//! Six arrays of 65536 entries, built once at startup and shared by
//! reference thereafter. Building them is a runtime loop over every row
//! index (each entry needs a slide-and-merge simulation), unlike a
//! const-evaluated table: there is no `const fn` shortcut for the
//! simulation, so construction happens at [`Tables::new`] call time rather
//! than at compile time.

use tracing::debug;

use crate::board::{pack_row, reverse_row, slide_left, unpack_row};

/// Bonus per empty cell. Dominates early-game evaluation.
const HEUR_EMPTY: f32 = 270.0;
/// Weight applied to the row's monotonicity score (positive when monotone).
const HEUR_MONO: f32 = 47.0;
/// Weight applied to the count of adjacent equal-rank pairs (kept negative:
/// a row still needing merges is worse, all else equal).
const HEUR_MERGE: f32 = -11.0;
/// Weight applied to the sum of tile values on the row (subtracted).
const HEUR_SUM: f32 = 11.0;

/// Immutable move/score/heuristic tables indexed by packed row value.
pub struct Tables {
    /// `row_left[r] = r ^ newrow` under a left slide; zero means no-op.
    pub row_left: Box<[u16]>,
    /// `row_right[r] = r ^ newrow` under a right slide; zero means no-op.
    pub row_right: Box<[u16]>,
    /// Column-up XOR mask, pre-widened to 64 bits at column 0's nibble
    /// offsets (0, 16, 32, 48); shift left by `4*c` to apply to column `c`.
    pub col_up: Box<[u64]>,
    /// Column-down XOR mask, same widening as [`Tables::col_up`].
    pub col_down: Box<[u64]>,
    /// True game score contributed by a row, independent of slide direction.
    pub score: Box<[u32]>,
    /// Heuristic value of a row, used by the search's static evaluation.
    pub heur: Box<[f32]>,
}

impl Tables {
    /// Build all six tables by simulating every one of the 65536 rows.
    pub fn new() -> Tables {
        let mut row_left = vec![0u16; 65536].into_boxed_slice();
        let mut row_right = vec![0u16; 65536].into_boxed_slice();
        let mut col_up = vec![0u64; 65536].into_boxed_slice();
        let mut col_down = vec![0u64; 65536].into_boxed_slice();
        let mut score = vec![0u32; 65536].into_boxed_slice();
        let mut heur = vec![0f32; 65536].into_boxed_slice();

        for r in 0..65536u32 {
            let row = r as u16;
            let nibbles = unpack_row(row);

            let new_left = pack_row(slide_left(nibbles));
            row_left[r as usize] = row ^ new_left;
            col_up[r as usize] = widen_to_column(row) ^ widen_to_column(new_left);

            let rev = reverse_row(row);
            let new_rev = pack_row(slide_left(unpack_row(rev)));
            let new_right = reverse_row(new_rev);
            row_right[r as usize] = row ^ new_right;
            col_down[r as usize] = widen_to_column(row) ^ widen_to_column(new_right);

            score[r as usize] = row_score(nibbles);
            heur[r as usize] = row_heuristic(nibbles);
        }

        debug!("built move tables: 6 arrays x 65536 entries");

        Tables {
            row_left,
            row_right,
            col_up,
            col_down,
            score,
            heur,
        }
    }
}

impl Default for Tables {
    fn default() -> Tables {
        Tables::new()
    }
}

/// Place each of a row's four nibbles at column-position offsets
/// (0, 16, 32, 48), forming the 64-bit XOR mask for column 0.
#[inline]
fn widen_to_column(row: u16) -> u64 {
    let n = unpack_row(row);
    (n[0] as u64) | ((n[1] as u64) << 16) | ((n[2] as u64) << 32) | ((n[3] as u64) << 48)
}

/// `f(0) = f(1) = 0`, `f(k) = (k-1)*2^k` for `k >= 2`, summed over the row.
fn row_score(nibbles: [u32; 4]) -> u32 {
    nibbles
        .iter()
        .map(|&k| if k >= 2 { (k - 1) * (1u32 << k) } else { 0 })
        .sum()
}

/// Number of adjacent equal non-zero-rank pairs in the row.
fn potential_merges(nibbles: [u32; 4]) -> f32 {
    nibbles
        .windows(2)
        .filter(|w| w[0] != 0 && w[0] == w[1])
        .count() as f32
}

/// Positive when the row is strictly monotone, otherwise a penalty
/// proportional to the sum of absolute differences between neighbors.
fn monotonicity(nibbles: [u32; 4]) -> f32 {
    let increasing = nibbles.windows(2).all(|w| w[0] < w[1] || w[0] == 0);
    let decreasing = nibbles.windows(2).all(|w| w[0] > w[1] || w[1] == 0);
    if increasing || decreasing {
        1.0
    } else {
        let penalty: i32 = nibbles
            .windows(2)
            .map(|w| (w[1] as i32 - w[0] as i32).abs())
            .sum();
        -(penalty as f32)
    }
}

fn row_heuristic(nibbles: [u32; 4]) -> f32 {
    let empty = nibbles.iter().filter(|&&k| k == 0).count() as f32;
    let sum: f32 = nibbles.iter().map(|&k| (1u32 << k) as f32).sum();

    HEUR_EMPTY * empty + HEUR_MONO * monotonicity(nibbles) + HEUR_MERGE * potential_merges(nibbles)
        - HEUR_SUM * sum
}
