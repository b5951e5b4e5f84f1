//! Time-limited adversarial search.
//!
//! Iterative-deepening negamax with alpha-beta pruning over an independent
//! copy of the game. The searcher never touches shared state; the caller
//! hands it a deep copy and applies the returned ply itself.

use std::time::{Duration, Instant};

use crate::engine::{Color, Game, GameResult, Ply};

use super::heuristic::Heuristic;

const WIN_SCORE: i32 = 1_000_000;
const INFINITY: i32 = i32::MAX - 1;
const MAX_DEPTH: u32 = 32;

#[derive(Clone, Debug)]
pub struct Searcher {
    /// The side this searcher plays for.
    pub to_max: Color,
    pub heuristic: Heuristic,
    pub time_limit: Duration,
}

impl Searcher {
    pub fn new(to_max: Color, heuristic: Heuristic, time_limit: Duration) -> Searcher {
        Searcher {
            to_max,
            heuristic,
            time_limit,
        }
    }

    /// Pick a ply for the current position, spending at most the configured
    /// time budget. Returns `None` only when the position has no legal ply.
    pub fn search(&self, game: &Game) -> Option<Ply> {
        let legal = game.legal_plies();
        if legal.is_empty() {
            return None;
        }

        let deadline = Instant::now() + self.time_limit;
        let mut best = legal[0].clone();

        for depth in 1..=MAX_DEPTH {
            match self.search_root(game, depth, deadline) {
                Some((ply, score)) => {
                    best = ply;
                    if score >= WIN_SCORE - MAX_DEPTH as i32 {
                        break;
                    }
                }
                // Out of time mid-depth; keep the previous depth's choice.
                None => break,
            }
            if Instant::now() >= deadline {
                break;
            }
        }
        Some(best)
    }

    fn search_root(&self, game: &Game, depth: u32, deadline: Instant) -> Option<(Ply, i32)> {
        let mut best: Option<(Ply, i32)> = None;
        let mut alpha = -INFINITY;
        for ply in game.legal_plies() {
            let mut child = game.clone();
            if child.do_ply(ply).is_err() {
                continue;
            }
            let score = -self.negamax(&child, depth - 1, -INFINITY, -alpha, 1, deadline)?;
            if best.as_ref().is_none_or(|(_, s)| score > *s) {
                best = Some((ply.clone(), score));
            }
            alpha = alpha.max(score);
        }
        best
    }

    fn negamax(
        &self,
        game: &Game,
        depth: u32,
        mut alpha: i32,
        beta: i32,
        from_root: i32,
        deadline: Instant,
    ) -> Option<i32> {
        if Instant::now() >= deadline {
            return None;
        }

        match game.result() {
            GameResult::InProgress => {}
            GameResult::Draw => return Some(0),
            result => {
                // The side to move at a decided position is the loser;
                // prefer wins that are closer to the root.
                let score = if result.winner() == Some(game.to_play()) {
                    WIN_SCORE - from_root
                } else {
                    from_root - WIN_SCORE
                };
                return Some(score);
            }
        }

        if depth == 0 {
            return Some(self.heuristic.evaluate(game.board(), game.to_play()));
        }

        let mut best = -INFINITY;
        for ply in game.legal_plies() {
            let mut child = game.clone();
            if child.do_ply(ply).is_err() {
                continue;
            }
            let score = -self.negamax(&child, depth - 1, -beta, -alpha, from_root + 1, deadline)?;
            best = best.max(score);
            alpha = alpha.max(score);
            if alpha >= beta {
                break;
            }
        }
        Some(best)
    }
}
