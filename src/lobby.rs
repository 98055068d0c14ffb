//! Pre-game waiting rooms
//!
//! A [`GameLobby`] gathers players around an organizer before the quiz
//! starts. It is converted into exactly one
//! [`GameSession`](crate::session::GameSession) when the organizer starts the
//! game, and never the other way around.

use itertools::Itertools;

use crate::{
    channel::{EventChannels, GameEvent, RemovalReason},
    error::Error,
    game_id::GameId,
    names::Names,
    player::{Id, Player, Roster},
    protocol::GameInfo,
    quiz::Quiz,
    session::GameMode,
};

/// A game waiting for its players
#[derive(Debug)]
pub struct GameLobby {
    /// Code to join the game
    pub id: GameId,
    /// Variant of the game to start
    pub mode: GameMode,
    /// Quiz to play
    pub quiz: Quiz,
    /// Connection that created the lobby
    pub organizer: Id,
    /// Players who picked a name
    pub roster: Roster,
    names: Names,
    locked: bool,
    removed: bool,
    max_players: usize,
    /// Event channels of the lobby
    pub channels: EventChannels,
}

impl GameLobby {
    /// Creates an unlocked, empty lobby
    pub fn new(id: GameId, mode: GameMode, quiz: Quiz, organizer: Id, max_players: usize) -> Self {
        Self {
            id,
            mode,
            quiz,
            organizer,
            roster: Roster::default(),
            names: Names::default(),
            locked: false,
            removed: false,
            max_players,
            channels: EventChannels::default(),
        }
    }

    /// Locks or unlocks the lobby, returning the new state
    pub fn toggle_lock(&mut self) -> bool {
        self.locked = !self.locked;
        tracing::debug!(game = %self.id, locked = self.locked, "lobby lock toggled");
        self.locked
    }

    /// Checks that another player may join
    ///
    /// # Errors
    ///
    /// * `Error::GameLocked` - The lobby is locked
    /// * `Error::GameFull` - The lobby holds the maximum number of players
    pub fn check_open(&self) -> Result<(), Error> {
        if self.locked {
            Err(Error::GameLocked)
        } else if self.roster.len() >= self.max_players {
            Err(Error::GameFull)
        } else {
            Ok(())
        }
    }

    /// Adds a player under the requested name
    ///
    /// # Returns
    ///
    /// The cleaned name on success.
    ///
    /// # Errors
    ///
    /// Lock and capacity errors from [`Self::check_open`], or the username
    /// error explaining why the name was refused.
    pub fn add_player(&mut self, id: Id, name: &str) -> Result<String, Error> {
        self.check_open()?;
        let name = self.names.set_name(id, name)?;
        self.roster.add(Player::new(id, name.clone()));
        self.channels.emit(GameEvent::PlayerAdded {
            player: id,
            name: name.clone(),
        });
        Ok(name)
    }

    /// Removes a player, freeing their name
    pub fn remove_player(&mut self, id: Id, reason: RemovalReason) -> Option<Player> {
        let player = self.roster.remove(id)?;
        self.names.release(&id);
        self.channels.emit(GameEvent::PlayerRemoved {
            player: id,
            name: player.name.clone(),
            reason,
        });
        Some(player)
    }

    /// Bans a name and removes the player holding it, if any
    pub fn ban(&mut self, name: &str) -> Option<Player> {
        let id = self
            .roster
            .iter()
            .find(|p| p.name.to_lowercase() == name.trim().to_lowercase())
            .map(|p| p.id);
        self.names.ban(name);
        let player = self.remove_player(id?, RemovalReason::Banned)?;
        tracing::info!(game = %self.id, name = %player.name, "player banned");
        Some(player)
    }

    /// Whether the organizer may start the game
    ///
    /// The lobby must be locked, and a normal game needs at least one player.
    pub fn can_start(&self) -> bool {
        self.locked && (self.mode == GameMode::Random || !self.roster.is_empty())
    }

    /// Marks the lobby as started
    pub fn start(&mut self) {
        self.channels.emit(GameEvent::GameStarted);
    }

    /// Tears the lobby down
    ///
    /// Only the first call has an effect.
    pub fn remove(&mut self, reason: RemovalReason) {
        if self.removed {
            return;
        }
        tracing::info!(game = %self.id, ?reason, "lobby removed");
        self.removed = true;
        self.channels.emit(GameEvent::GameRemoved(reason));
    }

    /// Whether the lobby was torn down
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Everyone who picked a name, plus the organizer
    pub fn recipients(&self) -> Vec<Id> {
        std::iter::once(self.organizer)
            .chain(self.roster.iter().map(|p| p.id))
            .collect_vec()
    }

    /// Summary of the lobby
    pub fn info(&self) -> GameInfo {
        GameInfo {
            game_id: self.id,
            title: self.quiz.title.clone(),
            mode: self.mode,
            locked: self.locked,
            players: self.roster.iter().map(|p| p.name.clone()).collect_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::{GameEventKind, Subscriber},
        names,
        quiz::tests::{qcm, quiz},
    };

    fn lobby() -> GameLobby {
        GameLobby::new(
            GameId::new(),
            GameMode::Normal,
            quiz(vec![qcm("1", 10, &[0], 2)]),
            Id::new(),
            2,
        )
    }

    fn events(lobby: &mut GameLobby) -> Vec<GameEvent> {
        lobby.channels.subscribe_all(
            &[GameEventKind::PlayerAdded, GameEventKind::PlayerRemoved],
            Subscriber::Client(lobby.organizer),
        );
        std::iter::from_fn(|| lobby.channels.next_delivery())
            .map(|(_, e)| e)
            .collect_vec()
    }

    #[test]
    fn test_add_player_announces() {
        let mut lobby = lobby();
        lobby.channels.subscribe(GameEventKind::PlayerAdded, Subscriber::Client(lobby.organizer));
        let id = Id::new();

        assert_eq!(lobby.add_player(id, " Alice "), Ok("Alice".to_owned()));
        assert_eq!(
            lobby.channels.next_delivery().map(|(_, e)| e),
            Some(GameEvent::PlayerAdded {
                player: id,
                name: "Alice".to_owned()
            })
        );
    }

    #[test]
    fn test_locked_and_full() {
        let mut lobby = lobby();
        lobby.toggle_lock();
        assert_eq!(lobby.add_player(Id::new(), "A"), Err(Error::GameLocked));
        lobby.toggle_lock();

        lobby.add_player(Id::new(), "A").unwrap();
        lobby.add_player(Id::new(), "B").unwrap();
        assert_eq!(lobby.add_player(Id::new(), "C"), Err(Error::GameFull));
    }

    #[test]
    fn test_name_errors_surface() {
        let mut lobby = lobby();
        lobby.add_player(Id::new(), "A").unwrap();
        assert_eq!(
            lobby.add_player(Id::new(), "a"),
            Err(Error::Username(names::Error::Used))
        );
        assert_eq!(
            lobby.add_player(Id::new(), "organisateur"),
            Err(Error::Username(names::Error::Reserved))
        );
    }

    #[test]
    fn test_ban_removes_and_blocks() {
        let mut lobby = lobby();
        let id = Id::new();
        lobby.add_player(id, "Mallory").unwrap();

        let banned = lobby.ban("mallory").unwrap();
        assert_eq!(banned.id, id);
        assert!(lobby.roster.is_empty());
        assert_eq!(
            lobby.add_player(Id::new(), "Mallory"),
            Err(Error::Username(names::Error::Banned))
        );
        assert_eq!(
            events(&mut lobby).last(),
            Some(&GameEvent::PlayerRemoved {
                player: id,
                name: "Mallory".to_owned(),
                reason: RemovalReason::Banned
            })
        );
    }

    #[test]
    fn test_leaving_frees_name() {
        let mut lobby = lobby();
        let id = Id::new();
        lobby.add_player(id, "Alice").unwrap();
        lobby.remove_player(id, RemovalReason::Left);

        assert!(lobby.add_player(Id::new(), "Alice").is_ok());
    }

    #[test]
    fn test_start_requires_lock_and_players() {
        let mut lobby = lobby();
        assert!(!lobby.can_start());
        lobby.toggle_lock();
        assert!(!lobby.can_start());
        lobby.toggle_lock();
        lobby.add_player(Id::new(), "A").unwrap();
        lobby.toggle_lock();
        assert!(lobby.can_start());
    }

    #[test]
    fn test_random_lobby_starts_alone() {
        let mut lobby = lobby();
        lobby.mode = GameMode::Random;
        lobby.toggle_lock();
        assert!(lobby.can_start());
    }

    #[test]
    fn test_remove_once() {
        let mut lobby = lobby();
        lobby.channels.subscribe(GameEventKind::GameRemoved, Subscriber::Client(lobby.organizer));
        lobby.remove(RemovalReason::OrganizerLeft);
        lobby.remove(RemovalReason::OrganizerLeft);

        assert!(lobby.is_removed());
        assert!(lobby.channels.next_delivery().is_some());
        assert!(lobby.channels.next_delivery().is_none());
    }
}
