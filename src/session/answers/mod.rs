//! Answer collection and correction
//!
//! [`AnswerCollector`] is the question-type agnostic front door: it accepts
//! at most one submission per player and question, closes the question once
//! every active player submitted, and force-closes the rest when the
//! question ends. Scoring is delegated to an [`AnswerManager`] strategy
//! chosen from the question type and the game mode. Every strategy funnels
//! into the same completion step, which reopens the next-question gate and
//! publishes the scores.

pub mod qcm;
pub mod qrl;

use crate::{
    Alarm,
    channel::{EventChannels, GameEvent, GameEventKind, Subscriber, SubscriptionId},
    player::{AnswerState, Id},
    protocol::{AnswerToCorrect, GameState, PlayerInfo, QuestionStats, ServerEvent},
    quiz::{Question, QuestionType},
    session::{GameMode, SessionCore},
    tunnel::Outbox,
};

use self::{qcm::QcmAnswers, qrl::QrlAnswers};

/// Scoring strategy of the current question
#[derive(Debug)]
pub enum AnswerManager {
    /// Multiple choice, scored automatically
    Qcm(QcmAnswers),
    /// Free text, graded by the organizer
    Qrl(QrlAnswers),
    /// Free text in games without a grader; full points for everyone
    QrlTest(QrlAnswers),
}

/// Result of closing a question
#[derive(Debug)]
pub enum Correction {
    /// Scores are final
    Finished(QuestionStats),
    /// Waiting for the organizer's grades
    Pending,
}

impl AnswerManager {
    /// Picks the strategy for a question
    pub fn new(kind: QuestionType, mode: GameMode) -> Self {
        match (kind, mode) {
            (QuestionType::Qcm, _) => Self::Qcm(QcmAnswers::default()),
            (QuestionType::Qrl, GameMode::Normal) => Self::Qrl(QrlAnswers::default()),
            (QuestionType::Qrl, GameMode::Test | GameMode::Random) => {
                Self::QrlTest(QrlAnswers::default())
            }
        }
    }

    /// Closes the question and scores what can be scored
    pub fn finalize(
        &mut self,
        core: &mut SessionCore,
        question: &Question,
        question_index: usize,
        submitted: &[Id],
        outbox: &mut Outbox,
    ) -> Correction {
        match self {
            Self::Qcm(answers) => {
                Correction::Finished(answers.finalize(core, question, question_index, submitted))
            }
            Self::Qrl(answers) => {
                if answers.request_correction(core, outbox) {
                    Correction::Pending
                } else {
                    Correction::Finished(QrlAnswers::empty_stats(core, question, question_index))
                }
            }
            Self::QrlTest(answers) => Correction::Finished(answers.award_full(
                core,
                question,
                question_index,
                submitted,
                outbox,
            )),
        }
    }
}

const EVENTS: [GameEventKind; 4] = [
    GameEventKind::QuestionStarted,
    GameEventKind::QuestionEnded,
    GameEventKind::QuizEnded,
    GameEventKind::GameRemoved,
];

/// Gathers submissions and drives correction
#[derive(Debug)]
pub struct AnswerCollector {
    subscriptions: Vec<SubscriptionId>,
    /// Explicit submitters of the current question, in submission order
    submitted: Vec<Id>,
    manager: Option<AnswerManager>,
    question: Option<(usize, Question)>,
}

impl AnswerCollector {
    /// Creates the collector bound to a session's channels
    pub fn new(channels: &mut EventChannels) -> Self {
        Self {
            subscriptions: channels.subscribe_all(&EVENTS, Subscriber::AnswerCollector),
            submitted: Vec::new(),
            manager: None,
            question: None,
        }
    }

    /// Reacts to the session's lifecycle
    pub fn on_event(&mut self, core: &mut SessionCore, event: &GameEvent, outbox: &mut Outbox) {
        match event {
            GameEvent::QuestionStarted(index) => {
                self.submitted.clear();
                self.question = core.question().map(|q| (*index, q.clone()));
                self.manager = self
                    .question
                    .as_ref()
                    .map(|(_, q)| AnswerManager::new(q.kind, core.mode));
            }
            GameEvent::QuestionEnded(_) => self.finalize(core, outbox),
            GameEvent::QuizEnded | GameEvent::GameRemoved(_) => {
                self.manager = None;
                core.channels.unsubscribe_all(&mut self.subscriptions);
            }
            _ => {}
        }
    }

    /// Whether a player may still submit on the current question
    pub fn can_player_submit(&self, core: &SessionCore, id: Id) -> bool {
        core.question_open
            && self.manager.is_some()
            && core.roster.get(id).is_some_and(|p| p.is_active())
            && !self.submitted.contains(&id)
    }

    /// Accepts the first submission of a player on the current question
    ///
    /// Later submissions are dropped without acknowledgement. The question
    /// closes as soon as every active player submitted.
    pub fn submit(&mut self, core: &mut SessionCore, id: Id, outbox: &mut Outbox) {
        if !self.can_player_submit(core, id) {
            tracing::debug!(game = %core.id, %id, "dropping submission");
            return;
        }
        self.submitted.push(id);
        core.mark(id, AnswerState::Answered);
        outbox.send(id, ServerEvent::AnswerCollected);

        if core
            .roster
            .active()
            .all(|p| self.submitted.contains(&p.id))
        {
            core.end_question();
        }
    }

    /// Selects or deselects a choice of the current multiple choice question
    pub fn toggle_choice(&mut self, core: &mut SessionCore, id: Id, index: usize, outbox: &mut Outbox) {
        if !self.can_player_submit(core, id) {
            return;
        }
        if let (Some(AnswerManager::Qcm(answers)), Some((_, question))) =
            (&mut self.manager, &self.question)
        {
            answers.toggle_choice(core, question, id, index, outbox);
        }
    }

    /// Replaces the draft of the current free-text question
    ///
    /// # Returns
    ///
    /// `true` if the edit was accepted and counts as activity.
    pub fn update_response(&mut self, core: &mut SessionCore, id: Id, text: &str) -> bool {
        if !self.can_player_submit(core, id) {
            return false;
        }
        match &mut self.manager {
            Some(AnswerManager::Qrl(answers) | AnswerManager::QrlTest(answers)) => {
                answers.update_response(core, id, text);
                true
            }
            _ => false,
        }
    }

    fn finalize(&mut self, core: &mut SessionCore, outbox: &mut Outbox) {
        for id in core.roster.active_ids() {
            if !self.submitted.contains(&id) {
                core.mark(id, AnswerState::Answered);
            }
        }

        let (Some(manager), Some((index, question))) = (&mut self.manager, &self.question) else {
            return;
        };
        match manager.finalize(core, question, *index, &self.submitted, outbox) {
            Correction::Finished(stats) => self.on_correction_finished(core, stats, outbox),
            Correction::Pending => {
                core.send_all(&ServerEvent::UpdateGameState(GameState::Correction), outbox);
            }
        }
    }

    /// Applies the organizer's grades to the pending free-text answers
    ///
    /// Ignored unless the sender is the organizer and answers are pending.
    pub fn correct(
        &mut self,
        core: &mut SessionCore,
        id: Id,
        grades: &[AnswerToCorrect],
        outbox: &mut Outbox,
    ) {
        if core.organizer != Some(id) {
            tracing::debug!(game = %core.id, %id, "corrections from a non organizer");
            return;
        }
        let (Some(AnswerManager::Qrl(answers)), Some((index, question))) =
            (&mut self.manager, &self.question)
        else {
            return;
        };
        if !answers.is_pending() {
            tracing::debug!(game = %core.id, "no answer waiting for correction");
            return;
        }
        let stats = answers.apply_grades(core, question, *index, grades, outbox);
        self.on_correction_finished(core, stats, outbox);
    }

    fn on_correction_finished(
        &mut self,
        core: &mut SessionCore,
        stats: QuestionStats,
        outbox: &mut Outbox,
    ) {
        self.submitted.clear();
        let index = stats.question_index;
        core.stats.push(stats);
        core.can_go_next = true;

        for player in core.roster.active() {
            outbox.send(player.id, ServerEvent::SendPlayerScore(PlayerInfo::from(player)));
        }
        core.channels.emit(GameEvent::PlayersModified);
        core.send_all(&ServerEvent::UpdateGameState(GameState::QuestionResults), outbox);

        if let Some(organizer) = core.organizer {
            outbox.send(organizer, ServerEvent::CanGoToNextQuestion(true));
        }
        if core.mode.advances_automatically() {
            let delay = core.settings.transition_delay;
            core.schedule(Alarm::AdvanceQuestion { question: index }, delay, outbox);
        }
    }
}
