//! Game history contract
//!
//! History storage lives outside the game. Sessions describe what should be
//! recorded as [`HistoryCommand`]s and the [`crate::manager::GameManager`]
//! hands them to a [`HistoryStore`] once the triggering event is processed.

use serde::Serialize;
use web_time::SystemTime;

use crate::game_id::GameId;

/// What the history keeps about a game
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Title of the quiz played
    pub quiz_title: String,
    /// When the quiz started
    pub started_at: SystemTime,
    /// Number of players who took part
    pub player_count: usize,
    /// Score of the winner
    pub best_score: f64,
}

/// External store of played games
pub trait HistoryStore {
    /// A game began and should appear as in progress
    fn register_to_history(&mut self, game: GameId, entry: &HistoryEntry);

    /// A game finished and its outcome is final
    fn save_game_to_history(&mut self, game: GameId, entry: HistoryEntry);

    /// A game was interrupted before its end
    fn unregister_from_history(&mut self, game: GameId);
}

/// A pending call on the [`HistoryStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryCommand {
    /// See [`HistoryStore::register_to_history`]
    Register(GameId, HistoryEntry),
    /// See [`HistoryStore::save_game_to_history`]
    Save(GameId, HistoryEntry),
    /// See [`HistoryStore::unregister_from_history`]
    Unregister(GameId),
}

impl HistoryCommand {
    /// Carries out the command against a store
    pub fn apply<H: HistoryStore>(self, store: &mut H) {
        match self {
            Self::Register(game, entry) => store.register_to_history(game, &entry),
            Self::Save(game, entry) => store.save_game_to_history(game, entry),
            Self::Unregister(game) => store.unregister_from_history(game),
        }
    }
}

/// A store that forgets everything
impl HistoryStore for () {
    fn register_to_history(&mut self, _game: GameId, _entry: &HistoryEntry) {}

    fn save_game_to_history(&mut self, _game: GameId, _entry: HistoryEntry) {}

    fn unregister_from_history(&mut self, _game: GameId) {}
}
