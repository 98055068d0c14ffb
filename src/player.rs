//! Connection identities and the player roster
//!
//! This module tracks the players of a lobby or session: their display
//! name, their per-question answer state and their running score. A player
//! who leaves mid-game is kept in the roster with [`AnswerState::LeftGame`]
//! so that statistics about the questions already played stay consistent.

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use enum_map::{Enum, EnumMap};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

/// A unique identifier for a connection
///
/// The transport layer assigns one to every remote party; the game only
/// ever holds the id, never the connection itself.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random connection id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    /// Creates a new random connection id (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Where a player stands on the current question
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnswerState {
    /// Has not interacted with the question yet
    #[default]
    NoAnswer,
    /// Has started selecting or typing an answer
    Answering,
    /// Has submitted, or was force-closed when the question ended
    Answered,
    /// Left the game; kept for statistics only
    LeftGame,
}

/// A player taking part in a game
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Connection of the player
    pub id: Id,
    /// Display name, unique within the game
    pub name: String,
    /// Status on the current question
    pub answer_state: AnswerState,
    /// Running total of points
    pub score: f64,
    /// Number of first-to-answer bonuses earned
    pub bonus_count: u32,
}

impl Player {
    /// Creates a player with a blank record
    pub fn new(id: Id, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            answer_state: AnswerState::NoAnswer,
            score: 0.,
            bonus_count: 0,
        }
    }

    /// Whether the player still takes part in the game
    pub fn is_active(&self) -> bool {
        self.answer_state != AnswerState::LeftGame
    }
}

/// The players of a game, in joining order
#[derive(Debug, Default, Clone)]
pub struct Roster {
    /// Primary mapping from player id to their record
    mapping: HashMap<Id, Player>,
    /// Joining order, used for every listing
    order: Vec<Id>,
    /// Reverse mapping organized by answer state for cheap counting
    reverse_mapping: EnumMap<AnswerState, HashSet<Id>>,
}

impl Roster {
    /// Adds a player at the end of the roster
    ///
    /// Re-adding an existing id replaces the record in place.
    pub fn add(&mut self, player: Player) {
        let id = player.id;
        if let Some(previous) = self.mapping.get(&id) {
            self.reverse_mapping[previous.answer_state].remove(&id);
        } else {
            self.order.push(id);
        }
        self.reverse_mapping[player.answer_state].insert(id);
        self.mapping.insert(id, player);
    }

    /// Removes a player entirely, returning their record
    pub fn remove(&mut self, id: Id) -> Option<Player> {
        let player = self.mapping.remove(&id)?;
        self.order.retain(|x| *x != id);
        self.reverse_mapping[player.answer_state].remove(&id);
        Some(player)
    }

    /// Gets a player by id
    pub fn get(&self, id: Id) -> Option<&Player> {
        self.mapping.get(&id)
    }

    /// Whether the roster holds this id
    pub fn contains(&self, id: Id) -> bool {
        self.mapping.contains_key(&id)
    }

    /// Changes the answer state of a player
    ///
    /// # Returns
    ///
    /// `true` if the state actually changed. A player who left the game
    /// never changes state again.
    pub fn set_answer_state(&mut self, id: Id, state: AnswerState) -> bool {
        let Some(player) = self.mapping.get_mut(&id) else {
            return false;
        };
        if player.answer_state == state || player.answer_state == AnswerState::LeftGame {
            return false;
        }
        self.reverse_mapping[player.answer_state].remove(&id);
        self.reverse_mapping[state].insert(id);
        player.answer_state = state;
        true
    }

    /// Adds points to a player's score
    pub fn add_points(&mut self, id: Id, points: f64) {
        if let Some(player) = self.mapping.get_mut(&id) {
            player.score += points;
        }
    }

    /// Records a first-to-answer bonus for a player
    pub fn add_bonus(&mut self, id: Id, points: f64) {
        if let Some(player) = self.mapping.get_mut(&id) {
            player.score += points;
            player.bonus_count += 1;
        }
    }

    /// Resets every active player to [`AnswerState::NoAnswer`]
    pub fn reset_answer_states(&mut self) {
        for id in self.active_ids() {
            self.set_answer_state(id, AnswerState::NoAnswer);
        }
    }

    /// Iterates over all players in joining order, including those who left
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.order.iter().filter_map(|id| self.mapping.get(id))
    }

    /// Iterates over players who are still in the game
    pub fn active(&self) -> impl Iterator<Item = &Player> {
        self.iter().filter(|p| p.is_active())
    }

    /// Ids of players who are still in the game
    pub fn active_ids(&self) -> Vec<Id> {
        self.active().map(|p| p.id).collect_vec()
    }

    /// Number of players who are still in the game
    pub fn active_count(&self) -> usize {
        self.mapping.len() - self.reverse_mapping[AnswerState::LeftGame].len()
    }

    /// Number of players currently in a given answer state
    #[cfg(test)]
    pub fn count_in(&self, state: AnswerState) -> usize {
        self.reverse_mapping[state].len()
    }

    /// Total number of records, including players who left
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// Whether the roster has no record at all
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Active players ranked by score, ties broken by name
    pub fn ranking(&self) -> Vec<Player> {
        self.active()
            .sorted_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.name.cmp(&b.name)))
            .cloned()
            .collect_vec()
    }
}
