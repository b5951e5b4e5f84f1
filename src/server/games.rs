//! Game composites: identity, credentials and presence bundled with a
//! [`ConcurrentGame`].

use std::time::Duration;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::engine::Color;
use crate::search::{Heuristic, Searcher};

use super::concurrent::ConcurrentGame;
use super::presence::PresenceCounter;

/// Bytes of entropy behind each player token.
const TOKEN_BYTES: usize = 36;

/// An opaque player credential, hex-encoded. Compared for equality only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn generate() -> Result<Token> {
        let mut bytes = [0u8; TOKEN_BYTES];
        getrandom::getrandom(&mut bytes).context("gathering token entropy")?;
        Ok(Token(hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, presented: &str) -> bool {
        self.0 == presented
    }
}

/// A two-player game. One token per role; whoever presents a token plays
/// that role.
pub struct HumanGame {
    pub id: Uuid,
    pub game: ConcurrentGame,
    tokens: [Token; 2],
    presence: [PresenceCounter; 2],
}

impl HumanGame {
    pub fn new() -> Result<HumanGame> {
        Ok(HumanGame {
            id: Uuid::new_v4(),
            game: ConcurrentGame::new(),
            tokens: [Token::generate()?, Token::generate()?],
            presence: [PresenceCounter::new(), PresenceCounter::new()],
        })
    }

    pub fn token(&self, color: Color) -> &Token {
        &self.tokens[color.index()]
    }

    pub fn presence(&self, color: Color) -> &PresenceCounter {
        &self.presence[color.index()]
    }

    /// The color whose token matches, if any.
    pub fn authenticate(&self, presented: &str) -> Option<Color> {
        if self.tokens[Color::White.index()].matches(presented) {
            Some(Color::White)
        } else if self.tokens[Color::Black.index()].matches(presented) {
            Some(Color::Black)
        } else {
            None
        }
    }
}

/// A game against the machine. Only the human role has presence; the
/// machine is always considered present.
pub struct MachineGame {
    pub id: Uuid,
    pub game: ConcurrentGame,
    pub human_color: Color,
    pub machine_color: Color,
    pub searcher: Searcher,
    pub presence: PresenceCounter,
}

impl MachineGame {
    pub fn new(human_color: Color, heuristic: Heuristic, time_limit: Duration) -> MachineGame {
        let machine_color = human_color.opposite();
        MachineGame {
            id: Uuid::new_v4(),
            game: ConcurrentGame::new(),
            human_color,
            machine_color,
            searcher: Searcher::new(machine_color, heuristic, time_limit),
            presence: PresenceCounter::new(),
        }
    }
}
