//! Board representation for 8x8 checkers.
//!
//! Pieces live on the dark squares only. Black occupies rows 0-2 and advances
//! toward row 7; White occupies rows 5-7 and advances toward row 0.

use serde::{Deserialize, Serialize};

pub const BOARD_SIZE: u8 = 8;

/// Side identifier, also used as an index into per-role pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Stable index for length-2 arrays keyed by color.
    pub fn index(self) -> usize {
        match self {
            Color::White => 0,
            Color::Black => 1,
        }
    }

    /// Row direction this color's men advance in.
    pub fn forward(self) -> i8 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }

    /// Row on which this color's men are crowned.
    pub fn crown_row(self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => BOARD_SIZE - 1,
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Man,
    King,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
}

impl Piece {
    pub fn man(color: Color) -> Piece {
        Piece {
            color,
            kind: PieceKind::Man,
        }
    }

    pub fn king(color: Color) -> Piece {
        Piece {
            color,
            kind: PieceKind::King,
        }
    }

    fn glyph(self) -> char {
        match (self.color, self.kind) {
            (Color::White, PieceKind::Man) => 'w',
            (Color::White, PieceKind::King) => 'W',
            (Color::Black, PieceKind::Man) => 'b',
            (Color::Black, PieceKind::King) => 'B',
        }
    }
}

/// A square position. Row 0 is the Black back rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pos {
    pub row: u8,
    pub col: u8,
}

impl Pos {
    pub fn new(row: u8, col: u8) -> Pos {
        Pos { row, col }
    }

    pub fn is_dark(self) -> bool {
        (self.row + self.col) % 2 == 1
    }

    /// Offset by a diagonal step, `None` when it leaves the board.
    pub fn offset(self, dr: i8, dc: i8) -> Option<Pos> {
        let row = self.row as i8 + dr;
        let col = self.col as i8 + dc;
        if (0..BOARD_SIZE as i8).contains(&row) && (0..BOARD_SIZE as i8).contains(&col) {
            Some(Pos::new(row as u8, col as u8))
        } else {
            None
        }
    }
}

/// Plain value board; copied freely into snapshots.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Board {
    squares: [[Option<Piece>; BOARD_SIZE as usize]; BOARD_SIZE as usize],
}

impl Default for Board {
    fn default() -> Self {
        Board::empty()
    }
}

impl Board {
    pub fn empty() -> Board {
        Board {
            squares: [[None; BOARD_SIZE as usize]; BOARD_SIZE as usize],
        }
    }

    /// Standard starting position: twelve men per side on the dark squares.
    pub fn initial() -> Board {
        let mut board = Board::empty();
        for row in 0..BOARD_SIZE {
            for col in 0..BOARD_SIZE {
                let pos = Pos::new(row, col);
                if !pos.is_dark() {
                    continue;
                }
                if row < 3 {
                    board.set(pos, Some(Piece::man(Color::Black)));
                } else if row >= BOARD_SIZE - 3 {
                    board.set(pos, Some(Piece::man(Color::White)));
                }
            }
        }
        board
    }

    pub fn get(&self, pos: Pos) -> Option<Piece> {
        self.squares[pos.row as usize][pos.col as usize]
    }

    pub fn set(&mut self, pos: Pos, piece: Option<Piece>) {
        self.squares[pos.row as usize][pos.col as usize] = piece;
    }

    pub fn take(&mut self, pos: Pos) -> Option<Piece> {
        self.squares[pos.row as usize][pos.col as usize].take()
    }

    pub fn pieces(&self, color: Color) -> impl Iterator<Item = (Pos, Piece)> + '_ {
        (0..BOARD_SIZE).flat_map(move |row| {
            (0..BOARD_SIZE).filter_map(move |col| {
                let pos = Pos::new(row, col);
                self.get(pos)
                    .filter(|p| p.color == color)
                    .map(|p| (pos, p))
            })
        })
    }

    /// Wire serialization: 64 characters, row 0 first, `.` for an empty
    /// square, `b`/`B`/`w`/`W` for men and kings.
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(64);
        for row in 0..BOARD_SIZE {
            for col in 0..BOARD_SIZE {
                match self.get(Pos::new(row, col)) {
                    Some(piece) => out.push(piece.glyph()),
                    None => out.push('.'),
                }
            }
        }
        out
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = self.serialize();
        for row in 0..BOARD_SIZE as usize {
            writeln!(f, "{}", &text[row * 8..row * 8 + 8])?;
        }
        Ok(())
    }
}
