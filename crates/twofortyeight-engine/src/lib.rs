//! Expectimax search for 2048: move/tile-choose nodes, a per-invocation
//! transposition cache, and root-level parallel move evaluation.

mod cache;
mod pool;
mod search;

pub use pool::find_best_move;
pub use search::{depth_limit_for, static_eval, CPROB_THRESHOLD, CACHE_DEPTH_LIMIT};
