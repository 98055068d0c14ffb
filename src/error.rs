//! Error taxonomy and request acknowledgements
//!
//! No error ever crosses the game boundary as a panic. Requests addressed
//! to a connection resolve into a [`Response`] which carries either the
//! success payload or the `Display` of an [`Error`].

use serde::Serialize;
use thiserror::Error;

use crate::{game_id, names};

/// Reasons a client request can be refused
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No game matches the requested id, or it is no longer joinable
    #[error("no game found")]
    NoGameFound,
    /// The connection is not part of any game
    #[error("not in a game")]
    NotInGame,
    /// The lobby is locked to new players
    #[error("the game is locked")]
    GameLocked,
    /// The game already holds the maximum number of players
    #[error("the game is full")]
    GameFull,
    /// The requested quiz could not be loaded or is invalid
    #[error("the quiz could not be loaded")]
    QuizUnavailable,
    /// Every game id is held by a running game
    #[error("no game id is available")]
    NoGameIdAvailable,
    /// The game cannot start in its current state
    #[error("the game cannot start yet")]
    CannotStart,
    /// The game id could not be parsed
    #[error(transparent)]
    GameId(#[from] game_id::Error),
    /// The username was refused
    #[error(transparent)]
    Username(#[from] names::Error),
}

/// Acknowledgement returned for every request that expects one
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    /// Whether the request was carried out
    pub success: bool,
    /// Error description on failure, optional payload on success
    pub message: Option<String>,
}

impl Response {
    /// A successful response without payload
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// A successful response carrying a payload such as a game id
    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    /// A failed response describing the error
    pub fn failure(error: Error) -> Self {
        Self {
            success: false,
            message: Some(error.to_string()),
        }
    }
}

impl From<Result<(), Error>> for Response {
    fn from(result: Result<(), Error>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::failure(e),
        }
    }
}

impl From<Result<String, Error>> for Response {
    fn from(result: Result<String, Error>) -> Self {
        match result {
            Ok(message) => Self::ok_with(message),
            Err(e) => Self::failure(e),
        }
    }
}
