//! Adversarial search for the machine opponent.

mod heuristic;
mod minimax;

pub use heuristic::Heuristic;
pub use minimax::Searcher;
