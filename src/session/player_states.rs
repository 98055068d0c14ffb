//! Mirrors player answer states to the organizer

use itertools::Itertools;

use crate::{
    channel::{EventChannels, GameEvent, GameEventKind, Subscriber, SubscriptionId},
    protocol::{GameState, PlayerInfo, ServerEvent},
    tunnel::Outbox,
};

use super::SessionCore;

const EVENTS: [GameEventKind; 6] = [
    GameEventKind::PlayerAdded,
    GameEventKind::PlayerRemoved,
    GameEventKind::PlayersModified,
    GameEventKind::QuestionStarted,
    GameEventKind::QuizEnded,
    GameEventKind::GameRemoved,
];

/// Keeps the organizer's player list current and publishes the final ranking
#[derive(Debug)]
pub struct PlayerStateManager {
    subscriptions: Vec<SubscriptionId>,
}

impl PlayerStateManager {
    /// Creates the manager bound to a session's channels
    pub fn new(channels: &mut EventChannels) -> Self {
        Self {
            subscriptions: channels.subscribe_all(&EVENTS, Subscriber::PlayerStates),
        }
    }

    /// Reacts to the session's lifecycle
    pub fn on_event(&mut self, core: &mut SessionCore, event: &GameEvent, outbox: &mut Outbox) {
        match event {
            GameEvent::QuestionStarted(_) => {
                core.roster.reset_answer_states();
                self.publish(core, outbox);
            }
            GameEvent::PlayerAdded { .. }
            | GameEvent::PlayerRemoved { .. }
            | GameEvent::PlayersModified => self.publish(core, outbox),
            GameEvent::QuizEnded => {
                let ranking = core.roster.ranking().iter().map(PlayerInfo::from).collect_vec();
                core.send_all(&ServerEvent::SendPlayerStats(ranking), outbox);
                core.send_all(&ServerEvent::SendGameResults(core.stats.clone()), outbox);
                core.send_all(&ServerEvent::UpdateGameState(GameState::Leaderboard), outbox);
                core.channels.unsubscribe_all(&mut self.subscriptions);
            }
            GameEvent::GameRemoved(_) => core.channels.unsubscribe_all(&mut self.subscriptions),
            _ => {}
        }
    }

    fn publish(&self, core: &SessionCore, outbox: &mut Outbox) {
        if let Some(organizer) = core.organizer {
            outbox.send(organizer, ServerEvent::SendPlayerStats(core.player_infos()));
        }
    }
}
