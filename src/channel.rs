//! Per-game event channels
//!
//! A lobby or session announces what happens to it through a fixed set of
//! semantic events. Interested parties subscribe per [`GameEventKind`]
//! without the aggregate knowing who they are, and cancel their
//! subscription explicitly when they are done.
//!
//! Delivery is run-to-completion: [`EventChannels::emit`] only queues the
//! event. The owner of the aggregate then pulls deliveries one by one with
//! [`EventChannels::next_delivery`] and routes each to its subscriber.
//! Events are delivered in emission order; an event emitted while another
//! is being delivered waits until every subscriber of the first one got it.
//! The subscriber list of an event is captured when its delivery begins, and
//! a subscription cancelled in the meantime is skipped.

use std::collections::VecDeque;

use enum_map::{Enum, EnumMap};
use itertools::Itertools;

use crate::player::Id;

/// Why a party, or a whole game, was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// The party asked to leave
    Left,
    /// The organizer banned the player
    Banned,
    /// The organizer left, closing the game
    OrganizerLeft,
    /// Every player left a running game
    AllPlayersLeft,
    /// No connection is attached to the game anymore
    Abandoned,
    /// The game started before the player chose a name
    GameAlreadyStarted,
}

impl RemovalReason {
    /// Human readable reason sent along with a kick
    pub fn message(self) -> &'static str {
        match self {
            Self::Left => "",
            Self::Banned => "You have been banned from the game",
            Self::OrganizerLeft => "The organizer has left the game",
            Self::AllPlayersLeft => "All players have left the game",
            Self::Abandoned => "The game was abandoned",
            Self::GameAlreadyStarted => "The game has already started",
        }
    }
}

/// Something that happened to a lobby or session
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// A player picked a name and joined
    PlayerAdded {
        /// Connection of the player
        player: Id,
        /// Name of the player
        name: String,
    },
    /// A player is no longer part of the game
    PlayerRemoved {
        /// Connection of the player
        player: Id,
        /// Name of the player
        name: String,
        /// Why the player was removed
        reason: RemovalReason,
    },
    /// The answer state or score of at least one player changed
    PlayersModified,
    /// The organizer started the lobby
    GameStarted,
    /// The session began playing
    QuizStarted,
    /// The question at this index opened
    QuestionStarted(usize),
    /// The question at this index closed
    QuestionEnded(usize),
    /// The last question was played
    QuizEnded,
    /// The game is being torn down
    GameRemoved(RemovalReason),
}

/// Channel selector of a [`GameEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum)]
#[allow(missing_docs)]
pub enum GameEventKind {
    PlayerAdded,
    PlayerRemoved,
    PlayersModified,
    GameStarted,
    QuizStarted,
    QuestionStarted,
    QuestionEnded,
    QuizEnded,
    GameRemoved,
}

impl GameEvent {
    /// The channel this event is published on
    pub fn kind(&self) -> GameEventKind {
        match self {
            Self::PlayerAdded { .. } => GameEventKind::PlayerAdded,
            Self::PlayerRemoved { .. } => GameEventKind::PlayerRemoved,
            Self::PlayersModified => GameEventKind::PlayersModified,
            Self::GameStarted => GameEventKind::GameStarted,
            Self::QuizStarted => GameEventKind::QuizStarted,
            Self::QuestionStarted(_) => GameEventKind::QuestionStarted,
            Self::QuestionEnded(_) => GameEventKind::QuestionEnded,
            Self::QuizEnded => GameEventKind::QuizEnded,
            Self::GameRemoved(_) => GameEventKind::GameRemoved,
        }
    }
}

/// Who receives a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subscriber {
    /// A connection's state machine
    Client(Id),
    /// The session's timer controller
    Timer,
    /// The session's answer collector
    AnswerCollector,
    /// The session's active player tracking
    ActivePlayers,
    /// The session's player state broadcasting
    PlayerStates,
    /// The session's question delivery
    Questions,
    /// The session's history recording
    History,
}

/// Token returned by [`EventChannels::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// An event being delivered, with the subscribers still to reach
#[derive(Debug)]
struct Delivery {
    event: GameEvent,
    remaining: VecDeque<(SubscriptionId, Subscriber)>,
}

/// The event registry of one game
#[derive(Debug, Default)]
pub struct EventChannels {
    subscribers: EnumMap<GameEventKind, Vec<(SubscriptionId, Subscriber)>>,
    next_id: u64,
    pending: VecDeque<GameEvent>,
    current: Option<Delivery>,
}

impl EventChannels {
    /// Subscribes to one channel
    pub fn subscribe(&mut self, kind: GameEventKind, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers[kind].push((id, subscriber));
        id
    }

    /// Subscribes to several channels at once
    pub fn subscribe_all(
        &mut self,
        kinds: &[GameEventKind],
        subscriber: Subscriber,
    ) -> Vec<SubscriptionId> {
        kinds
            .iter()
            .map(|kind| self.subscribe(*kind, subscriber))
            .collect_vec()
    }

    /// Cancels a subscription
    ///
    /// # Returns
    ///
    /// `false` if the subscription was not live.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for (_, list) in &mut self.subscribers {
            if let Some(position) = list.iter().position(|(x, _)| *x == id) {
                list.remove(position);
                return true;
            }
        }
        false
    }

    /// Cancels every subscription in `ids`, leaving it empty
    pub fn unsubscribe_all(&mut self, ids: &mut Vec<SubscriptionId>) {
        for id in ids.drain(..) {
            self.unsubscribe(id);
        }
    }

    /// Whether a subscription is still live
    pub fn is_live(&self, id: SubscriptionId) -> bool {
        self.subscribers
            .values()
            .any(|list| list.iter().any(|(x, _)| *x == id))
    }

    /// Queues an event for delivery
    pub fn emit(&mut self, event: GameEvent) {
        tracing::trace!(?event, "event emitted");
        self.pending.push_back(event);
    }

    /// Pops the next delivery to perform
    pub fn next_delivery(&mut self) -> Option<(Subscriber, GameEvent)> {
        loop {
            if let Some(mut delivery) = self.current.take() {
                while let Some((id, subscriber)) = delivery.remaining.pop_front() {
                    if self.is_live(id) {
                        let event = delivery.event.clone();
                        self.current = Some(delivery);
                        return Some((subscriber, event));
                    }
                }
            }
            let event = self.pending.pop_front()?;
            let remaining = self.subscribers[event.kind()].iter().copied().collect();
            self.current = Some(Delivery { event, remaining });
        }
    }

    /// Number of distinct connections subscribed to any channel
    pub fn client_count(&self) -> usize {
        self.subscribers
            .values()
            .flatten()
            .filter_map(|(_, s)| match s {
                Subscriber::Client(id) => Some(*id),
                _ => None,
            })
            .unique()
            .count()
    }

    /// Total number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.subscribers.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(channels: &mut EventChannels) -> Vec<(Subscriber, GameEvent)> {
        std::iter::from_fn(|| channels.next_delivery()).collect_vec()
    }

    #[test]
    fn test_delivers_in_subscription_order() {
        let mut channels = EventChannels::default();
        channels.subscribe(GameEventKind::QuizEnded, Subscriber::Timer);
        channels.subscribe(GameEventKind::QuizEnded, Subscriber::History);
        channels.subscribe(GameEventKind::QuizStarted, Subscriber::Questions);
        channels.emit(GameEvent::QuizEnded);

        assert_eq!(
            drain(&mut channels),
            vec![
                (Subscriber::Timer, GameEvent::QuizEnded),
                (Subscriber::History, GameEvent::QuizEnded)
            ]
        );
    }

    #[test]
    fn test_events_keep_emission_order() {
        let mut channels = EventChannels::default();
        channels.subscribe(GameEventKind::QuestionStarted, Subscriber::Timer);
        channels.subscribe(GameEventKind::QuestionStarted, Subscriber::Questions);
        channels.emit(GameEvent::QuestionStarted(0));

        let first = channels.next_delivery().unwrap();
        assert_eq!(first, (Subscriber::Timer, GameEvent::QuestionStarted(0)));

        // emitted while the first event is still being delivered
        channels.emit(GameEvent::QuestionStarted(1));
        assert_eq!(
            drain(&mut channels),
            vec![
                (Subscriber::Questions, GameEvent::QuestionStarted(0)),
                (Subscriber::Timer, GameEvent::QuestionStarted(1)),
                (Subscriber::Questions, GameEvent::QuestionStarted(1)),
            ]
        );
    }

    #[test]
    fn test_cancelled_subscription_is_skipped_mid_delivery() {
        let mut channels = EventChannels::default();
        let id = Id::new();
        channels.subscribe(GameEventKind::GameRemoved, Subscriber::Timer);
        let client = channels.subscribe(GameEventKind::GameRemoved, Subscriber::Client(id));
        channels.emit(GameEvent::GameRemoved(RemovalReason::Abandoned));

        assert!(channels.next_delivery().is_some());
        assert!(channels.unsubscribe(client));
        assert!(channels.next_delivery().is_none());
    }

    #[test]
    fn test_unsubscribe_only_once() {
        let mut channels = EventChannels::default();
        let ids = channels.subscribe_all(
            &[GameEventKind::PlayerAdded, GameEventKind::PlayerRemoved],
            Subscriber::PlayerStates,
        );
        assert_eq!(channels.subscription_count(), 2);
        assert!(channels.is_live(ids[0]));

        assert!(channels.unsubscribe(ids[0]));
        assert!(!channels.unsubscribe(ids[0]));
        assert!(!channels.is_live(ids[0]));
        assert_eq!(channels.subscription_count(), 1);
    }

    #[test]
    fn test_client_count_is_distinct() {
        let mut channels = EventChannels::default();
        let id = Id::new();
        channels.subscribe_all(
            &[GameEventKind::PlayerAdded, GameEventKind::GameRemoved],
            Subscriber::Client(id),
        );
        channels.subscribe(GameEventKind::GameRemoved, Subscriber::History);

        assert_eq!(channels.client_count(), 1);
    }

    #[test]
    fn test_removal_messages() {
        assert_eq!(RemovalReason::Left.message(), "");
        assert!(!RemovalReason::OrganizerLeft.message().is_empty());
    }
}
