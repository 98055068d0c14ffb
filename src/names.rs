//! Player name management and validation
//!
//! This module handles the assignment and validation of player names within
//! a lobby. It ensures names are unique regardless of case, keeps the
//! organizer's name reserved, remembers banned names and filters
//! inappropriate content.

use std::collections::{HashMap, HashSet, hash_map::Entry};

use rustrict::CensorStr;
use serde::Serialize;
use thiserror::Error;

use crate::{
    constants::{game::ORGANIZER_NAME, names::MAX_LENGTH},
    player::Id,
};

/// Errors that can occur during name validation and assignment
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The requested name is already in use by another player
    #[error("name already in-use")]
    Used,
    /// The player already has an assigned name
    #[error("player has an existing name")]
    Assigned,
    /// The name is empty or contains only whitespace
    #[error("name cannot be empty")]
    Empty,
    /// The name contains inappropriate content
    #[error("name is inappropriate")]
    Sinful,
    /// The name exceeds the maximum allowed length
    #[error("name is too long")]
    TooLong,
    /// The name belongs to the organizer
    #[error("name is reserved")]
    Reserved,
    /// The name was banned from this game
    #[error("name is banned")]
    Banned,
}

/// Manages player names, reservations and bans for one lobby
///
/// Comparisons are case-insensitive: "Alice" and "alice" are the same
/// name as far as uniqueness and bans are concerned.
#[derive(Debug, Default, Clone)]
pub struct Names {
    /// Mapping from player id to the name as typed (trimmed)
    mapping: HashMap<Id, String>,
    /// Lowercase names currently in use
    existing: HashSet<String>,
    /// Lowercase names that may not join again
    banned: HashSet<String>,
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
}

impl Names {
    /// Assigns a name to a player after validation
    ///
    /// # Returns
    ///
    /// The cleaned and assigned name on success.
    ///
    /// # Errors
    ///
    /// * `Error::TooLong` - Name exceeds the maximum length after trimming
    /// * `Error::Empty` - Name is empty after trimming whitespace
    /// * `Error::Reserved` - Name is the organizer's
    /// * `Error::Banned` - Name was banned by the organizer
    /// * `Error::Sinful` - Name contains inappropriate content
    /// * `Error::Used` - Name is already taken by another player
    /// * `Error::Assigned` - Player already has a name assigned
    pub fn set_name(&mut self, id: Id, name: &str) -> Result<String, Error> {
        let name = rustrict::trim_whitespace(name.trim());
        if name.is_empty() {
            return Err(Error::Empty);
        }
        if name.chars().count() > MAX_LENGTH {
            return Err(Error::TooLong);
        }
        let key = normalize(name);
        if key == normalize(ORGANIZER_NAME) {
            return Err(Error::Reserved);
        }
        if self.banned.contains(&key) {
            return Err(Error::Banned);
        }
        if name.is_inappropriate() {
            return Err(Error::Sinful);
        }
        if self.existing.contains(&key) {
            return Err(Error::Used);
        }
        match self.mapping.entry(id) {
            Entry::Occupied(_) => Err(Error::Assigned),
            Entry::Vacant(v) => {
                v.insert(name.to_owned());
                self.existing.insert(key);
                Ok(name.to_owned())
            }
        }
    }

    /// Frees the name held by a player
    pub fn release(&mut self, id: &Id) -> Option<String> {
        let name = self.mapping.remove(id)?;
        self.existing.remove(&normalize(&name));
        Some(name)
    }

    /// Bans a name from being used again in this lobby
    pub fn ban(&mut self, name: &str) {
        self.banned.insert(normalize(name.trim()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_set_claims_name() {
        let mut names = Names::default();
        let id = Id::new();

        assert_eq!(names.set_name(id, "TestPlayer"), Ok("TestPlayer".to_owned()));
        assert_eq!(names.set_name(Id::new(), "TestPlayer"), Err(Error::Used));
    }

    #[test]
    fn test_names_too_long() {
        let mut names = Names::default();
        let id = Id::new();

        assert_eq!(names.set_name(id, &"a".repeat(MAX_LENGTH + 1)), Err(Error::TooLong));
        assert!(names.set_name(id, &"a".repeat(MAX_LENGTH)).is_ok());
    }

    #[test]
    fn test_names_empty_name() {
        let mut names = Names::default();
        let id = Id::new();

        assert_eq!(names.set_name(id, ""), Err(Error::Empty));
        assert_eq!(names.set_name(id, "   "), Err(Error::Empty));
        assert_eq!(names.set_name(id, "\t\n"), Err(Error::Empty));
    }

    #[test]
    fn test_names_whitespace_trimming() {
        let mut names = Names::default();
        let id = Id::new();

        assert_eq!(names.set_name(id, "  TestPlayer  "), Ok("TestPlayer".to_owned()));
    }

    #[test]
    fn test_names_duplicate_is_case_insensitive() {
        let mut names = Names::default();

        names.set_name(Id::new(), "Player").unwrap();
        assert_eq!(names.set_name(Id::new(), "player"), Err(Error::Used));
        assert_eq!(names.set_name(Id::new(), "  PLAYER "), Err(Error::Used));
    }

    #[test]
    fn test_names_organizer_is_reserved() {
        let mut names = Names::default();

        assert_eq!(names.set_name(Id::new(), ORGANIZER_NAME), Err(Error::Reserved));
        assert_eq!(names.set_name(Id::new(), "organisateur"), Err(Error::Reserved));
    }

    #[test]
    fn test_names_already_assigned_error() {
        let mut names = Names::default();
        let id = Id::new();

        names.set_name(id, "FirstName").unwrap();
        assert_eq!(names.set_name(id, "SecondName"), Err(Error::Assigned));
        assert_eq!(names.set_name(Id::new(), "FirstName"), Err(Error::Used));
        assert!(names.set_name(Id::new(), "SecondName").is_ok());
    }

    #[test]
    fn test_names_banned() {
        let mut names = Names::default();
        let id = Id::new();
        names.set_name(id, "Mallory").unwrap();
        names.release(&id);
        names.ban("Mallory");

        assert_eq!(names.set_name(Id::new(), "mallory"), Err(Error::Banned));
        assert_eq!(names.set_name(Id::new(), " MALLORY "), Err(Error::Banned));
    }

    #[test]
    fn test_names_release_frees_name() {
        let mut names = Names::default();
        let id = Id::new();
        names.set_name(id, "Player").unwrap();

        assert_eq!(names.release(&id), Some("Player".to_owned()));
        assert!(names.set_name(Id::new(), "Player").is_ok());
    }

    #[test]
    fn test_names_inappropriate_content() {
        let mut names = Names::default();

        for name in ["fuck", "shit"] {
            assert_eq!(
                names.set_name(Id::new(), name),
                Err(Error::Sinful),
                "Expected '{name}' to be flagged as inappropriate"
            );
        }
    }

    #[test]
    fn test_error_display() {
        assert_eq!(Error::Used.to_string(), "name already in-use");
        assert_eq!(Error::Empty.to_string(), "name cannot be empty");
        assert_eq!(Error::Reserved.to_string(), "name is reserved");
        assert_eq!(Error::Banned.to_string(), "name is banned");
    }
}
