//! Question delivery and correct-answer reveals

use crate::{
    channel::{EventChannels, GameEvent, GameEventKind, Subscriber, SubscriptionId},
    protocol::{GameState, QuestionPayload, ServerEvent},
    tunnel::Outbox,
};

use super::SessionCore;

const EVENTS: [GameEventKind; 5] = [
    GameEventKind::QuizStarted,
    GameEventKind::QuestionStarted,
    GameEventKind::QuestionEnded,
    GameEventKind::QuizEnded,
    GameEventKind::GameRemoved,
];

/// Pushes the current question to everyone, once per question
#[derive(Debug)]
pub struct QuestionManager {
    subscriptions: Vec<SubscriptionId>,
    last_pushed: Option<usize>,
}

impl QuestionManager {
    /// Creates the manager bound to a session's channels
    pub fn new(channels: &mut EventChannels) -> Self {
        Self {
            subscriptions: channels.subscribe_all(&EVENTS, Subscriber::Questions),
            last_pushed: None,
        }
    }

    /// Reacts to the session's lifecycle
    pub fn on_event(&mut self, core: &mut SessionCore, event: &GameEvent, outbox: &mut Outbox) {
        match event {
            GameEvent::QuizStarted | GameEvent::QuestionStarted(_) => self.push(core, outbox),
            GameEvent::QuestionEnded(_) => {
                let correct = core
                    .question()
                    .map(crate::quiz::Question::correct_choices)
                    .unwrap_or_default();
                for id in core.roster.active_ids() {
                    outbox.send(id, ServerEvent::SendCorrectAnswer(correct.clone()));
                }
            }
            GameEvent::QuizEnded | GameEvent::GameRemoved(_) => {
                core.channels.unsubscribe_all(&mut self.subscriptions);
            }
            _ => {}
        }
    }

    fn push(&mut self, core: &SessionCore, outbox: &mut Outbox) {
        let (Some(index), Some(question)) = (core.current_question, core.question()) else {
            return;
        };
        if self.last_pushed == Some(index) {
            return;
        }
        self.last_pushed = Some(index);

        let payload = QuestionPayload::new(question, index, core.quiz.len(), core.question_duration());
        core.send_all(&ServerEvent::QuestionData(payload), outbox);
        core.send_all(&ServerEvent::UpdateGameState(GameState::Question), outbox);
    }
}
