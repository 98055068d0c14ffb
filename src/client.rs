//! Per-connection state machine
//!
//! A connection is always in exactly one [`ClientState`]. Each state
//! registers the set of [`ClientEventKind`]s the connection may send while
//! in it; [`Client::clear_state`] deregisters exactly that set and cancels
//! every channel subscription taken for the state, so nothing leaks across
//! transitions.

use enum_map::EnumMap;

use crate::{
    channel::{EventChannels, GameEvent, GameEventKind, RemovalReason, Subscriber, SubscriptionId},
    game_id::GameId,
    player::Id,
    protocol::{ClientEventKind, ServerEvent},
    tunnel::Outbox,
};

/// Channels a connection follows while attached to a lobby
pub const LOBBY_EVENTS: [GameEventKind; 4] = [
    GameEventKind::PlayerAdded,
    GameEventKind::PlayerRemoved,
    GameEventKind::GameStarted,
    GameEventKind::GameRemoved,
];

/// Channels a connection follows while attached to a running session
pub const SESSION_EVENTS: [GameEventKind; 4] = [
    GameEventKind::PlayerAdded,
    GameEventKind::PlayerRemoved,
    GameEventKind::QuizEnded,
    GameEventKind::GameRemoved,
];

/// Channels a connection follows while viewing the final leaderboard
pub const LEADERBOARD_EVENTS: [GameEventKind; 2] =
    [GameEventKind::PlayerRemoved, GameEventKind::GameRemoved];

/// What a connection currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Not in a game
    Default,
    /// Drives a game
    GameOrganizer {
        /// The game driven
        game: GameId,
    },
    /// Plays in a game, or waits in its lobby for a name
    GamePlayer {
        /// The game joined
        game: GameId,
    },
    /// Views the outcome of a finished game
    GameLeaderboard {
        /// The game viewed
        game: GameId,
    },
}

impl ClientState {
    /// The game this state is attached to
    pub fn game(self) -> Option<GameId> {
        match self {
            Self::Default => None,
            Self::GameOrganizer { game }
            | Self::GamePlayer { game }
            | Self::GameLeaderboard { game } => Some(game),
        }
    }

    /// Events a connection may send in this state
    pub fn listeners(self) -> &'static [ClientEventKind] {
        use ClientEventKind::*;
        match self {
            Self::Default => &[JoinGameLobby, CreateGameLobby, CreateGameTest, CreateGameRandom],
            Self::GameOrganizer { .. } => &[
                ToggleLock,
                BanPlayer,
                StartGame,
                NextQuestion,
                ToggleTimerPause,
                StartTimerPanic,
                SendAnswersCorrected,
                PlayerLeftGame,
            ],
            Self::GamePlayer { .. } => &[
                SetUsername,
                ToggleAnswerChoices,
                UpdateAnswerResponse,
                SubmitAnswer,
                PlayerLeftGame,
            ],
            Self::GameLeaderboard { .. } => &[PlayerLeftGame],
        }
    }
}

/// A remote party as seen by the game
#[derive(Debug)]
pub struct Client {
    id: Id,
    state: ClientState,
    listeners: EnumMap<ClientEventKind, bool>,
    registered: Vec<ClientEventKind>,
    subscriptions: Vec<SubscriptionId>,
}

impl Client {
    /// A fresh connection, not in any game
    pub fn new(id: Id) -> Self {
        let mut client = Self {
            id,
            state: ClientState::Default,
            listeners: EnumMap::default(),
            registered: Vec::new(),
            subscriptions: Vec::new(),
        };
        client.register_listeners();
        client
    }

    /// Connection id
    pub fn id(&self) -> Id {
        self.id
    }

    /// Current state
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Whether the connection may currently send this kind of event
    pub fn listens_to(&self, kind: ClientEventKind) -> bool {
        self.listeners[kind]
    }

    /// Number of live channel subscriptions held
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn register_listeners(&mut self) {
        for kind in self.state.listeners() {
            self.listeners[*kind] = true;
            self.registered.push(*kind);
        }
    }

    /// Deregisters the current state's listeners and subscriptions
    ///
    /// `channels` are those of the game the subscriptions were taken on; if
    /// the game is already gone the subscriptions are simply forgotten.
    pub fn clear_state(&mut self, channels: Option<&mut EventChannels>) {
        for kind in self.registered.drain(..) {
            self.listeners[kind] = false;
        }
        match channels {
            Some(channels) => channels.unsubscribe_all(&mut self.subscriptions),
            None => self.subscriptions.clear(),
        }
    }

    /// Enters a state after [`Self::clear_state`]
    pub fn enter(&mut self, state: ClientState) {
        tracing::info!(client = %self.id, from = ?self.state, to = ?state, "client transition");
        self.state = state;
        self.register_listeners();
    }

    /// Leaves the current state for another one on the same game
    pub fn transition(&mut self, state: ClientState, channels: Option<&mut EventChannels>) {
        self.clear_state(channels);
        self.enter(state);
    }

    /// Follows channels of the attached game
    pub fn subscribe(&mut self, channels: &mut EventChannels, kinds: &[GameEventKind]) {
        self.subscriptions
            .extend(channels.subscribe_all(kinds, Subscriber::Client(self.id)));
    }

    /// Reacts to a delivery from the attached game
    pub fn on_game_event(
        &mut self,
        event: &GameEvent,
        channels: &mut EventChannels,
        outbox: &mut Outbox,
    ) {
        match event {
            GameEvent::PlayerAdded { player, name } if *player != self.id => {
                outbox.send(self.id, ServerEvent::SendPlayerJoined(name.clone()));
            }
            GameEvent::PlayerRemoved { player, reason, .. } if *player == self.id => {
                let notification = match reason {
                    RemovalReason::Left => ServerEvent::PlayerRemovedFromGame(String::new()),
                    reason => ServerEvent::KickedOutFromGame(reason.message().to_owned()),
                };
                outbox.send(self.id, notification);
                self.transition(ClientState::Default, Some(channels));
            }
            GameEvent::PlayerRemoved { name, .. } => {
                outbox.send(self.id, ServerEvent::SendPlayerLeft(name.clone()));
            }
            GameEvent::GameRemoved(reason) => {
                outbox.send(
                    self.id,
                    ServerEvent::KickedOutFromGame(reason.message().to_owned()),
                );
                self.transition(ClientState::Default, Some(channels));
            }
            GameEvent::QuizEnded => {
                if let Some(game) = self.state.game() {
                    self.transition(ClientState::GameLeaderboard { game }, Some(channels));
                    self.subscribe(channels, &LEADERBOARD_EVENTS);
                }
            }
            _ => {}
        }
    }
}
