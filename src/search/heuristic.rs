//! Board evaluation functions, selected by name on game creation.

use crate::engine::{Board, Color, PieceKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Heuristic {
    /// Plain material count.
    PieceCount,
    /// Material count with kings worth more than men.
    WeightedCount,
    /// Weighted material plus a small bonus for advanced men.
    WeightedCountDistance,
}

impl Heuristic {
    pub fn from_name(name: &str) -> Option<Heuristic> {
        match name {
            "PieceCount" => Some(Heuristic::PieceCount),
            "WeightedCount" => Some(Heuristic::WeightedCount),
            "WeightedCountDistance" => Some(Heuristic::WeightedCountDistance),
            _ => None,
        }
    }

    /// Score the position from `perspective`'s point of view; positive is
    /// better for `perspective`.
    pub fn evaluate(self, board: &Board, perspective: Color) -> i32 {
        self.side_score(board, perspective) - self.side_score(board, perspective.opposite())
    }

    fn side_score(self, board: &Board, color: Color) -> i32 {
        board
            .pieces(color)
            .map(|(pos, piece)| match self {
                Heuristic::PieceCount => 100,
                Heuristic::WeightedCount => match piece.kind {
                    PieceKind::Man => 100,
                    PieceKind::King => 250,
                },
                Heuristic::WeightedCountDistance => {
                    let base = match piece.kind {
                        PieceKind::Man => 100,
                        PieceKind::King => 250,
                    };
                    let advancement = if piece.kind == PieceKind::Man {
                        let home = match color {
                            Color::Black => 0i32,
                            Color::White => 7i32,
                        };
                        (pos.row as i32 - home).abs() * 4
                    } else {
                        0
                    };
                    base + advancement
                }
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Piece, Pos};

    #[test]
    fn names_round_trip() {
        assert_eq!(
            Heuristic::from_name("WeightedCount"),
            Some(Heuristic::WeightedCount)
        );
        assert_eq!(Heuristic::from_name("weightedcount"), None);
        assert_eq!(Heuristic::from_name(""), None);
    }

    #[test]
    fn initial_position_is_balanced() {
        let board = Board::initial();
        for h in [
            Heuristic::PieceCount,
            Heuristic::WeightedCount,
            Heuristic::WeightedCountDistance,
        ] {
            assert_eq!(h.evaluate(&board, Color::White), 0);
        }
    }

    #[test]
    fn kings_outweigh_men() {
        let mut board = Board::empty();
        board.set(Pos::new(3, 4), Some(Piece::king(Color::White)));
        board.set(Pos::new(4, 3), Some(Piece::man(Color::Black)));
        assert_eq!(Heuristic::PieceCount.evaluate(&board, Color::White), 0);
        assert!(Heuristic::WeightedCount.evaluate(&board, Color::White) > 0);
    }

    #[test]
    fn advancement_counts_for_men() {
        let mut near = Board::empty();
        near.set(Pos::new(1, 2), Some(Piece::man(Color::White)));
        let mut far = Board::empty();
        far.set(Pos::new(6, 1), Some(Piece::man(Color::White)));
        assert!(
            Heuristic::WeightedCountDistance.evaluate(&near, Color::White)
                > Heuristic::WeightedCountDistance.evaluate(&far, Color::White)
        );
    }
}
