//! The deterministic rules engine consumed by the concurrent runtime.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::board::{Board, Color, PieceKind};
use super::ply::{self, Ply};

/// Plies without a capture or a man move before the game is drawn.
const QUIET_PLY_LIMIT: u32 = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameResult {
    InProgress,
    WhiteWon,
    BlackWon,
    Draw,
}

impl GameResult {
    pub fn is_terminal(self) -> bool {
        self != GameResult::InProgress
    }

    pub fn winner(self) -> Option<Color> {
        match self {
            GameResult::WhiteWon => Some(Color::White),
            GameResult::BlackWon => Some(Color::Black),
            _ => None,
        }
    }

    fn won_by(color: Color) -> GameResult {
        match color {
            Color::White => GameResult::WhiteWon,
            Color::Black => GameResult::BlackWon,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("ply is not legal in the current position")]
    IllegalPly,
}

/// A running game. Mutation goes through [`Game::do_ply`] only; everything
/// else is read access. `Clone` produces an independent deep copy, which is
/// what the searcher operates on.
#[derive(Clone, Debug)]
pub struct Game {
    board: Board,
    to_play: Color,
    result: GameResult,
    legal: Vec<Ply>,
    quiet_plies: u32,
}

impl Default for Game {
    fn default() -> Self {
        Game::new()
    }
}

impl Game {
    pub fn new() -> Game {
        Game::from_position(Board::initial(), Color::White)
    }

    /// Start from an arbitrary position. A position where `to_play` has no
    /// ply is already decided against them.
    pub fn from_position(board: Board, to_play: Color) -> Game {
        let legal = ply::legal_plies(&board, to_play);
        let result = if legal.is_empty() {
            GameResult::won_by(to_play.opposite())
        } else {
            GameResult::InProgress
        };
        Game {
            board,
            to_play,
            result,
            legal,
            quiet_plies: 0,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn to_play(&self) -> Color {
        self.to_play
    }

    pub fn result(&self) -> GameResult {
        self.result
    }

    /// Legal plies for the current position. Empty exactly when the game
    /// is over.
    pub fn legal_plies(&self) -> &[Ply] {
        &self.legal
    }

    /// Apply one ply. The ply must be one of [`Game::legal_plies`] (compared
    /// by instruction sequence).
    pub fn do_ply(&mut self, candidate: &Ply) -> Result<(), EngineError> {
        if self.result.is_terminal() || !self.legal.contains(candidate) {
            return Err(EngineError::IllegalPly);
        }

        let progress = candidate.is_capture() || self.moves_a_man(candidate);
        ply::perform(&mut self.board, candidate);
        self.quiet_plies = if progress { 0 } else { self.quiet_plies + 1 };
        self.to_play = self.to_play.opposite();

        self.legal = ply::legal_plies(&self.board, self.to_play);
        if self.legal.is_empty() {
            // No piece or no move left: the side to play has lost.
            self.result = GameResult::won_by(self.to_play.opposite());
        } else if self.quiet_plies >= QUIET_PLY_LIMIT {
            self.result = GameResult::Draw;
            self.legal.clear();
        }
        Ok(())
    }

    fn moves_a_man(&self, candidate: &Ply) -> bool {
        candidate
            .origin()
            .and_then(|pos| self.board.get(pos))
            .is_some_and(|piece| piece.kind == PieceKind::Man)
    }
}
