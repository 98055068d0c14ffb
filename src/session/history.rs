//! Forwards the session lifecycle to the history store

use crate::{
    channel::{EventChannels, GameEvent, GameEventKind, Subscriber, SubscriptionId},
    history::{HistoryCommand, HistoryEntry},
    tunnel::Outbox,
};

use super::{GameMode, SessionCore};

const EVENTS: [GameEventKind; 3] = [
    GameEventKind::QuizStarted,
    GameEventKind::QuizEnded,
    GameEventKind::GameRemoved,
];

/// Records played games; practice games are never recorded
#[derive(Debug)]
pub struct HistoryObserver {
    subscriptions: Vec<SubscriptionId>,
    registered: bool,
}

impl HistoryObserver {
    /// Creates the observer bound to a session's channels
    pub fn new(channels: &mut EventChannels) -> Self {
        Self {
            subscriptions: channels.subscribe_all(&EVENTS, Subscriber::History),
            registered: false,
        }
    }

    /// Reacts to the session's lifecycle
    pub fn on_event(&mut self, core: &mut SessionCore, event: &GameEvent, outbox: &mut Outbox) {
        match event {
            GameEvent::QuizStarted if core.mode != GameMode::Test => {
                self.registered = true;
                outbox.record(HistoryCommand::Register(core.id, entry(core)));
            }
            GameEvent::QuizEnded => {
                if self.registered {
                    self.registered = false;
                    outbox.record(HistoryCommand::Save(core.id, entry(core)));
                }
                core.channels.unsubscribe_all(&mut self.subscriptions);
            }
            GameEvent::GameRemoved(_) => {
                if self.registered {
                    self.registered = false;
                    outbox.record(HistoryCommand::Unregister(core.id));
                }
                core.channels.unsubscribe_all(&mut self.subscriptions);
            }
            _ => {}
        }
    }
}

fn entry(core: &SessionCore) -> HistoryEntry {
    HistoryEntry {
        quiz_title: core.quiz.title.clone(),
        started_at: core.started_at,
        player_count: core.roster.len(),
        best_score: core
            .roster
            .active()
            .map(|p| p.score)
            .fold(0., f64::max),
    }
}
