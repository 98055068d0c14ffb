//! Game ID generation and parsing
//!
//! Game ids are the four-digit codes players type to join a lobby. They are
//! generated randomly within a fixed range and parsed strictly so that a
//! malformed code and an out-of-range code produce distinct errors.

use std::{fmt::Display, str::FromStr};

use serde::Serialize;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

use crate::constants::game_id::{MAX_VALUE, MIN_VALUE, RANDOM_ATTEMPTS};

/// A unique identifier for a game
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct GameId(u16);

/// Errors that can occur while parsing a game id
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The code contains something other than decimal digits
    #[error("the game id must only contain digits")]
    InvalidFormat,
    /// The code is numeric but outside the range of generated ids
    #[error("the game id must be between 1000 and 9999")]
    OutOfRange,
}

impl GameId {
    /// Creates a new random game id
    pub fn new() -> Self {
        Self(fastrand::u16(MIN_VALUE..=MAX_VALUE))
    }

    /// Creates a random game id that `taken` does not already hold
    ///
    /// Falls back to the first free id once random draws keep colliding.
    /// Returns `None` when every id is taken.
    pub fn unused(taken: impl Fn(&GameId) -> bool) -> Option<Self> {
        std::iter::repeat_with(Self::new)
            .take(RANDOM_ATTEMPTS)
            .chain((MIN_VALUE..=MAX_VALUE).map(Self))
            .find(|id| !taken(id))
    }
}

impl Default for GameId {
    /// Creates a new random game id (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GameId {
    type Err = Error;

    /// Parses a game id typed by a player
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// * `Error::InvalidFormat` - The input is empty or not purely numeric
    /// * `Error::OutOfRange` - The number is outside `MIN_VALUE..=MAX_VALUE`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidFormat);
        }
        match s.parse::<u16>() {
            Ok(value) if (MIN_VALUE..=MAX_VALUE).contains(&value) => Ok(Self(value)),
            _ => Err(Error::OutOfRange),
        }
    }
}
