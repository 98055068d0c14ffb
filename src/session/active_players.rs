//! Live engagement on free-text questions
//!
//! A player counts as active for a fixed number of one-second ticks after
//! each edit of their answer. The organizer sees how many players are
//! active and inactive; identical counts are never sent twice in a row.

use std::collections::HashMap;

use crate::{
    Alarm,
    channel::{EventChannels, GameEvent, GameEventKind, Subscriber, SubscriptionId},
    constants::timer::ONE_SECOND,
    player::Id,
    protocol::{ActivityStats, ServerEvent},
    quiz::QuestionType,
    tunnel::Outbox,
};

use super::SessionCore;

const EVENTS: [GameEventKind; 4] = [
    GameEventKind::QuestionStarted,
    GameEventKind::QuestionEnded,
    GameEventKind::QuizEnded,
    GameEventKind::GameRemoved,
];

/// Tracks which players edited their answer recently
#[derive(Debug)]
pub struct ActivePlayerService {
    subscriptions: Vec<SubscriptionId>,
    /// Remaining active ticks per player
    active: HashMap<Id, u32>,
    question: Option<usize>,
    last_sent: Option<ActivityStats>,
}

impl ActivePlayerService {
    /// Creates the service bound to a session's channels
    pub fn new(channels: &mut EventChannels) -> Self {
        Self {
            subscriptions: channels.subscribe_all(&EVENTS, Subscriber::ActivePlayers),
            active: HashMap::new(),
            question: None,
            last_sent: None,
        }
    }

    /// Reacts to the session's lifecycle
    pub fn on_event(&mut self, core: &mut SessionCore, event: &GameEvent, outbox: &mut Outbox) {
        match event {
            GameEvent::QuestionStarted(index) => {
                self.active.clear();
                self.last_sent = None;
                let is_free_text = core.question().is_some_and(|q| q.kind == QuestionType::Qrl);
                self.question = is_free_text.then_some(*index);
                if is_free_text {
                    self.push(core, outbox);
                    core.schedule(Alarm::ActivityTick { question: *index }, ONE_SECOND, outbox);
                }
            }
            GameEvent::QuestionEnded(_) => {
                self.question = None;
                self.active.clear();
            }
            GameEvent::QuizEnded | GameEvent::GameRemoved(_) => {
                self.question = None;
                core.channels.unsubscribe_all(&mut self.subscriptions);
            }
            _ => {}
        }
    }

    /// Records an edit from a player
    pub fn on_player_activity(&mut self, core: &SessionCore, id: Id, outbox: &mut Outbox) {
        if self.question.is_none() {
            return;
        }
        self.active.insert(id, core.settings.time_active);
        self.push(core, outbox);
    }

    /// Handles the per-second tick of the current question
    pub fn tick(&mut self, core: &mut SessionCore, question: usize, outbox: &mut Outbox) {
        if self.question != Some(question) || !core.question_open {
            tracing::debug!(game = %core.id, question, "stale activity tick");
            return;
        }
        self.active.retain(|_, remaining| {
            *remaining = remaining.saturating_sub(1);
            *remaining > 0
        });
        self.push(core, outbox);
        core.schedule(Alarm::ActivityTick { question }, ONE_SECOND, outbox);
    }

    /// Current counts, without sending them
    pub fn stats(&self, core: &SessionCore) -> Option<ActivityStats> {
        let question_index = self.question?;
        let active = core
            .roster
            .active()
            .filter(|p| self.active.contains_key(&p.id))
            .count();
        Some(ActivityStats {
            question_index,
            bar_counts: [active, core.roster.active_count() - active],
        })
    }

    fn push(&mut self, core: &SessionCore, outbox: &mut Outbox) {
        let (Some(stats), Some(organizer)) = (self.stats(core), core.organizer) else {
            return;
        };
        if self.last_sent == Some(stats) {
            return;
        }
        self.last_sent = Some(stats);
        outbox.send(organizer, ServerEvent::SendActivityStats(stats));
    }
}
