//! Pure checkers rules: board, plies, legal-move generation, results.
//!
//! Nothing in here knows about sessions, channels or time; the concurrent
//! runtime drives a [`Game`] exclusively through [`Game::do_ply`].

mod board;
mod game;
mod ply;

pub use board::{Board, Color, Piece, PieceKind, Pos};
pub use game::{EngineError, Game, GameResult};
pub use ply::{legal_plies, perform, Instruction, Ply};
