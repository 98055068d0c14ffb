//! Running game sessions
//!
//! A [`GameSession`] is the live aggregate of a game: the quiz being played,
//! the players with their scores, the countdown and the event channels. It
//! is built once from a lobby (or directly, for practice games) and owns a
//! fixed set of observers. Each observer subscribes to the channels it
//! needs when the session is created and releases its subscriptions itself
//! when the quiz ends or the game is removed.

pub mod active_players;
pub mod answers;
pub mod history;
pub mod player_states;
pub mod questions;
pub mod timer;

use std::time::Duration;

use itertools::Itertools;
use serde::Serialize;
use web_time::SystemTime;

use crate::{
    Alarm, ScheduledAlarm,
    channel::{EventChannels, GameEvent, RemovalReason, Subscriber},
    config::Settings,
    constants::game::ORGANIZER_NAME,
    game_id::GameId,
    lobby::GameLobby,
    player::{AnswerState, Id, Player, Roster},
    protocol::{AnswerToCorrect, GameInfo, PlayerInfo, QuestionStats, ServerEvent},
    quiz::{Question, Quiz},
    tunnel::Outbox,
};

use self::{
    active_players::ActivePlayerService, answers::AnswerCollector, history::HistoryObserver,
    player_states::PlayerStateManager, questions::QuestionManager, timer::TimerController,
};

/// Variant of a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GameMode {
    /// The organizer drives the quiz and grades free-text answers
    Normal,
    /// Single-player practice, without organizer
    Test,
    /// The organizer plays along on a quiz picked at random
    Random,
}

impl GameMode {
    /// Whether questions follow each other without the organizer
    pub fn advances_automatically(self) -> bool {
        matches!(self, Self::Test | Self::Random)
    }
}

/// State shared by every observer of a session
#[derive(Debug)]
pub struct SessionCore {
    /// Code of the game
    pub id: GameId,
    /// Variant of the game
    pub mode: GameMode,
    /// Quiz being played
    pub quiz: Quiz,
    /// Connection that created the game
    pub host: Id,
    /// Connection driving the game, absent when nobody does
    pub organizer: Option<Id>,
    /// Players, including those who left
    pub roster: Roster,
    /// Index of the question being played
    pub current_question: Option<usize>,
    /// Whether the current question accepts answers
    pub question_open: bool,
    /// Whether the organizer may move to the next question
    pub can_go_next: bool,
    /// Whether the last question was played
    pub quiz_ended: bool,
    removed: bool,
    /// Countdown of the current question
    pub timer: timer::Timer,
    /// Event channels of the session
    pub channels: EventChannels,
    /// Tunables of the hosting manager
    pub settings: Settings,
    /// Outcome of every question played
    pub stats: Vec<QuestionStats>,
    /// When the session was created
    pub started_at: SystemTime,
}

impl SessionCore {
    /// The question being played
    pub fn question(&self) -> Option<&Question> {
        self.quiz.questions.get(self.current_question?)
    }

    /// Countdown length of the current question, in seconds
    pub fn question_duration(&self) -> u32 {
        self.question()
            .map_or(0, |q| self.quiz.question_duration(q, self.settings.qrl_duration))
    }

    /// Everyone attached to the game: the organizer and active players
    pub fn recipients(&self) -> Vec<Id> {
        self.organizer
            .into_iter()
            .chain(self.roster.active().map(|p| p.id))
            .unique()
            .collect_vec()
    }

    /// Queues an event for everyone attached to the game
    pub fn send_all(&self, event: &ServerEvent, outbox: &mut Outbox) {
        outbox.send_many(self.recipients(), event);
    }

    /// Public view of every player, in joining order
    pub fn player_infos(&self) -> Vec<PlayerInfo> {
        self.roster.iter().map(PlayerInfo::from).collect_vec()
    }

    /// Summary of the game
    pub fn info(&self) -> GameInfo {
        GameInfo {
            game_id: self.id,
            title: self.quiz.title.clone(),
            mode: self.mode,
            locked: true,
            players: self.roster.active().map(|p| p.name.clone()).collect_vec(),
        }
    }

    /// Asks the host to deliver an alarm to this session later
    pub fn schedule(&self, alarm: Alarm, delay: Duration, outbox: &mut Outbox) {
        outbox.schedule(ScheduledAlarm { game: self.id, alarm }, delay);
    }

    /// Schedules the next countdown tick, if the countdown is moving
    pub fn schedule_tick(&self, outbox: &mut Outbox) {
        if let Some((alarm, delay)) = self.timer.pending_tick() {
            self.schedule(alarm, delay, outbox);
        }
    }

    /// Changes a player's answer state, announcing the change
    pub fn mark(&mut self, id: Id, state: AnswerState) {
        if self.roster.set_answer_state(id, state) {
            self.channels.emit(GameEvent::PlayersModified);
        }
    }

    /// Closes the current question
    ///
    /// Does nothing if no question is open.
    pub fn end_question(&mut self) {
        if !self.question_open {
            return;
        }
        self.question_open = false;
        self.timer.stop();
        if let Some(index) = self.current_question {
            self.channels.emit(GameEvent::QuestionEnded(index));
        }
    }

    /// Opens the next question, or ends the quiz after the last one
    pub fn next_question(&mut self) {
        if self.quiz_ended || self.removed {
            return;
        }
        self.can_go_next = false;
        let next = self.current_question.map_or(0, |i| i + 1);
        if next < self.quiz.len() {
            tracing::debug!(game = %self.id, question = next, "question started");
            self.current_question = Some(next);
            self.question_open = true;
            self.channels.emit(GameEvent::QuestionStarted(next));
        } else {
            tracing::info!(game = %self.id, "quiz ended");
            self.quiz_ended = true;
            self.channels.emit(GameEvent::QuizEnded);
        }
    }

    /// Tears the session down
    ///
    /// Only the first call has an effect.
    pub fn remove(&mut self, reason: RemovalReason) {
        if self.removed {
            return;
        }
        tracing::info!(game = %self.id, ?reason, "game removed");
        self.removed = true;
        self.question_open = false;
        self.timer.stop();
        self.channels.emit(GameEvent::GameRemoved(reason));
    }

    /// Whether the session was torn down
    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

/// A running game and its observers
#[derive(Debug)]
pub struct GameSession {
    core: SessionCore,
    timer: TimerController,
    answers: AnswerCollector,
    active_players: ActivePlayerService,
    player_states: PlayerStateManager,
    questions: QuestionManager,
    history: HistoryObserver,
}

impl GameSession {
    fn new(
        id: GameId,
        mode: GameMode,
        quiz: Quiz,
        host: Id,
        roster: Roster,
        settings: Settings,
    ) -> Self {
        let mut channels = EventChannels::default();
        let timer = TimerController::new(&mut channels);
        let answers = AnswerCollector::new(&mut channels);
        let active_players = ActivePlayerService::new(&mut channels);
        let player_states = PlayerStateManager::new(&mut channels);
        let questions = QuestionManager::new(&mut channels);
        let history = HistoryObserver::new(&mut channels);

        Self {
            core: SessionCore {
                id,
                mode,
                quiz,
                host,
                organizer: (mode == GameMode::Normal).then_some(host),
                roster,
                current_question: None,
                question_open: false,
                can_go_next: false,
                quiz_ended: false,
                removed: false,
                timer: timer::Timer::default(),
                channels,
                settings,
                stats: Vec::new(),
                started_at: SystemTime::now(),
            },
            timer,
            answers,
            active_players,
            player_states,
            questions,
            history,
        }
    }

    /// Builds the session of a started lobby
    ///
    /// In random games the organizer joins the players under the reserved
    /// organizer name.
    pub fn from_lobby(lobby: GameLobby, settings: Settings) -> Self {
        let GameLobby {
            id,
            mode,
            quiz,
            organizer,
            mut roster,
            ..
        } = lobby;
        if mode == GameMode::Random {
            roster.add(Player::new(organizer, ORGANIZER_NAME));
        }
        Self::new(id, mode, quiz, organizer, roster, settings)
    }

    /// Builds a practice session whose creator is the sole player
    pub fn new_test(id: GameId, quiz: Quiz, host: Id, settings: Settings) -> Self {
        let mut roster = Roster::default();
        roster.add(Player::new(host, ORGANIZER_NAME));
        Self::new(id, GameMode::Test, quiz, host, roster, settings)
    }

    /// Starts playing the first question
    pub fn start(&mut self) {
        tracing::info!(game = %self.core.id, mode = ?self.core.mode, "quiz started");
        self.core.channels.emit(GameEvent::QuizStarted);
        self.core.next_question();
    }

    /// Shared state of the session
    pub fn core(&self) -> &SessionCore {
        &self.core
    }

    /// Event channels of the session
    pub fn channels_mut(&mut self) -> &mut EventChannels {
        &mut self.core.channels
    }

    /// Routes a delivery to the observer it is addressed to
    pub fn deliver(&mut self, subscriber: Subscriber, event: &GameEvent, outbox: &mut Outbox) {
        let core = &mut self.core;
        match subscriber {
            Subscriber::Timer => self.timer.on_event(core, event, outbox),
            Subscriber::AnswerCollector => self.answers.on_event(core, event, outbox),
            Subscriber::ActivePlayers => self.active_players.on_event(core, event, outbox),
            Subscriber::PlayerStates => self.player_states.on_event(core, event, outbox),
            Subscriber::Questions => self.questions.on_event(core, event, outbox),
            Subscriber::History => self.history.on_event(core, event, outbox),
            Subscriber::Client(_) => {}
        }
    }

    /// Handles an alarm scheduled by this session
    pub fn receive_alarm(&mut self, alarm: Alarm, outbox: &mut Outbox) {
        let core = &mut self.core;
        match alarm {
            Alarm::TimerTick { generation } => self.timer.on_tick(core, generation, outbox),
            Alarm::PanicDeadline { generation } => {
                self.timer.on_panic_deadline(core, generation, outbox);
            }
            Alarm::ActivityTick { question } => self.active_players.tick(core, question, outbox),
            Alarm::AdvanceQuestion { question } => {
                if core.current_question == Some(question) && core.can_go_next {
                    core.next_question();
                }
            }
        }
    }

    /// Moves to the next question on the organizer's request
    ///
    /// Ignored until the current question is corrected.
    pub fn request_next_question(&mut self, id: Id) {
        if self.core.organizer != Some(id) || !self.core.can_go_next {
            tracing::debug!(game = %self.core.id, "ignoring next question request");
            return;
        }
        self.core.next_question();
    }

    /// See [`TimerController::toggle_pause`]
    pub fn toggle_timer_pause(&mut self, id: Id, outbox: &mut Outbox) {
        self.timer.toggle_pause(&mut self.core, id, outbox);
    }

    /// See [`TimerController::start_panic`]
    pub fn start_timer_panic(&mut self, id: Id, outbox: &mut Outbox) {
        self.timer.start_panic(&mut self.core, id, outbox);
    }

    /// See [`AnswerCollector::toggle_choice`]
    pub fn toggle_answer_choice(&mut self, id: Id, index: usize, outbox: &mut Outbox) {
        self.answers.toggle_choice(&mut self.core, id, index, outbox);
    }

    /// Updates a free-text draft and records the activity
    pub fn update_answer_response(&mut self, id: Id, text: &str, outbox: &mut Outbox) {
        if self.answers.update_response(&mut self.core, id, text) {
            self.active_players.on_player_activity(&self.core, id, outbox);
        }
    }

    /// See [`AnswerCollector::submit`]
    pub fn submit_answer(&mut self, id: Id, outbox: &mut Outbox) {
        self.answers.submit(&mut self.core, id, outbox);
    }

    /// See [`AnswerCollector::correct`]
    pub fn send_answers_corrected(
        &mut self,
        id: Id,
        grades: &[AnswerToCorrect],
        outbox: &mut Outbox,
    ) {
        self.answers.correct(&mut self.core, id, grades, outbox);
    }

    /// Marks a player as gone without deleting their record
    ///
    /// A running game that loses its last player is removed. If every
    /// remaining player already submitted, the current question closes.
    pub fn remove_player(&mut self, id: Id, reason: RemovalReason) {
        let core = &mut self.core;
        let Some(name) = core.roster.get(id).filter(|p| p.is_active()).map(|p| p.name.clone())
        else {
            return;
        };
        core.roster.set_answer_state(id, AnswerState::LeftGame);
        core.channels.emit(GameEvent::PlayerRemoved {
            player: id,
            name,
            reason,
        });

        if core.quiz_ended {
            return;
        }
        if core.roster.active_count() == 0 {
            core.remove(RemovalReason::AllPlayersLeft);
        } else if core.question_open
            && core
                .roster
                .active()
                .all(|p| p.answer_state == AnswerState::Answered)
        {
            core.end_question();
        }
    }

    /// Tears the session down, see [`SessionCore::remove`]
    pub fn remove(&mut self, reason: RemovalReason) {
        self.core.remove(reason);
    }

    /// Delivers every queued event to the observers, skipping connections
    #[cfg(test)]
    pub fn settle(&mut self, outbox: &mut Outbox) {
        while let Some((subscriber, event)) = self.core.channels.next_delivery() {
            self.deliver(subscriber, &event, outbox);
        }
    }

    /// Read access to the timer controls
    #[cfg(test)]
    pub fn timer_controller(&self) -> &TimerController {
        &self.timer
    }
}
