//! Plies and legal-move generation.
//!
//! A ply is an ordered list of board instructions. Clients replay the
//! instructions verbatim, so the sequence is part of the wire contract:
//! a jump is a `Move` followed by the `Capture` it made, and a man that
//! reaches its crown row ends the ply with a `Crown`.

use serde::{Deserialize, Serialize};

use super::board::{Board, Color, Piece, PieceKind, Pos};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Instruction {
    Move { from: Pos, to: Pos },
    Capture { at: Pos, piece: Piece },
    Crown { at: Pos },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ply(pub Vec<Instruction>);

impl Ply {
    pub fn instructions(&self) -> &[Instruction] {
        &self.0
    }

    pub fn is_capture(&self) -> bool {
        self.0
            .iter()
            .any(|i| matches!(i, Instruction::Capture { .. }))
    }

    /// The square the ply starts from.
    pub fn origin(&self) -> Option<Pos> {
        self.0.iter().find_map(|i| match i {
            Instruction::Move { from, .. } => Some(*from),
            _ => None,
        })
    }
}

/// Apply a ply's instructions to the board. Assumes the ply was produced for
/// this exact position.
pub fn perform(board: &mut Board, ply: &Ply) {
    for instruction in ply.instructions() {
        match *instruction {
            Instruction::Move { from, to } => {
                let piece = board.take(from);
                board.set(to, piece);
            }
            Instruction::Capture { at, .. } => {
                board.set(at, None);
            }
            Instruction::Crown { at } => {
                if let Some(piece) = board.get(at) {
                    board.set(at, Some(Piece::king(piece.color)));
                }
            }
        }
    }
}

/// All legal plies for `to_play`. Captures are mandatory: when any capture
/// sequence exists, only capture plies are returned. A capture sequence runs
/// until no further jump is available, except that crowning ends it.
pub fn legal_plies(board: &Board, to_play: Color) -> Vec<Ply> {
    let mut captures = Vec::new();
    for (pos, piece) in board.pieces(to_play) {
        capture_plies(board, pos, piece, &mut captures);
    }
    if !captures.is_empty() {
        return captures;
    }

    let mut moves = Vec::new();
    for (pos, piece) in board.pieces(to_play) {
        simple_moves(board, pos, piece, &mut moves);
    }
    moves
}

fn step_dirs(piece: Piece) -> &'static [(i8, i8)] {
    const ALL: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];
    const UP: [(i8, i8); 2] = [(-1, -1), (-1, 1)];
    const DOWN: [(i8, i8); 2] = [(1, -1), (1, 1)];
    match (piece.kind, piece.color) {
        (PieceKind::King, _) => &ALL,
        (PieceKind::Man, Color::White) => &UP,
        (PieceKind::Man, Color::Black) => &DOWN,
    }
}

fn simple_moves(board: &Board, from: Pos, piece: Piece, out: &mut Vec<Ply>) {
    for &(dr, dc) in step_dirs(piece) {
        let Some(to) = from.offset(dr, dc) else {
            continue;
        };
        if board.get(to).is_some() {
            continue;
        }
        let mut instructions = vec![Instruction::Move { from, to }];
        if piece.kind == PieceKind::Man && to.row == piece.color.crown_row() {
            instructions.push(Instruction::Crown { at: to });
        }
        out.push(Ply(instructions));
    }
}

fn capture_plies(board: &Board, from: Pos, piece: Piece, out: &mut Vec<Ply>) {
    let mut sim = *board;
    sim.set(from, None);
    let mut steps = Vec::new();
    extend_captures(&sim, from, piece, &mut steps, out);
}

/// Depth-first enumeration of capture chains. `sim` holds the board with the
/// moving piece lifted off and previously captured pieces removed.
fn extend_captures(
    sim: &Board,
    cur: Pos,
    piece: Piece,
    steps: &mut Vec<Instruction>,
    out: &mut Vec<Ply>,
) {
    let mut extended = false;
    for &(dr, dc) in step_dirs(piece) {
        let Some(mid) = cur.offset(dr, dc) else {
            continue;
        };
        let Some(to) = cur.offset(2 * dr, 2 * dc) else {
            continue;
        };
        let Some(victim) = sim.get(mid) else {
            continue;
        };
        if victim.color == piece.color || sim.get(to).is_some() {
            continue;
        }

        extended = true;
        steps.push(Instruction::Move { from: cur, to });
        steps.push(Instruction::Capture {
            at: mid,
            piece: victim,
        });

        if piece.kind == PieceKind::Man && to.row == piece.color.crown_row() {
            // Crowning ends the ply even if further jumps would exist.
            steps.push(Instruction::Crown { at: to });
            out.push(Ply(steps.clone()));
            steps.pop();
        } else {
            let mut next = *sim;
            next.set(mid, None);
            extend_captures(&next, to, piece, steps, out);
        }

        steps.pop();
        steps.pop();
    }

    if !extended && !steps.is_empty() {
        out.push(Ply(steps.clone()));
    }
}
