//! Wire events exchanged with remote parties
//!
//! Every event travels as an adjacently tagged JSON object,
//! `{"event": "<name>", "data": <payload>}`, with camelCase event names.
//! [`ClientEvent`] is what a connection may send; [`ServerEvent`] is what
//! the game pushes back.

use enum_map::Enum;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    game_id::GameId,
    player::{AnswerState, Player},
    quiz::{Question, QuestionType},
    session::GameMode,
};

/// A graded or to-be-graded free-text answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerToCorrect {
    /// Display name of the author
    pub player_name: String,
    /// Text submitted by the author
    #[serde(default)]
    pub answer: String,
    /// Fraction of the points granted, between 0 and 1
    #[serde(default)]
    pub score: f64,
}

/// Events a connection may send
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Join the lobby with the given game id
    JoinGameLobby(String),
    /// Create a lobby for the given quiz id
    CreateGameLobby(String),
    /// Start a single-player practice session for the given quiz id
    CreateGameTest(String),
    /// Create a lobby playing a quiz picked by the quiz store
    CreateGameRandom,
    /// Choose a display name after joining a lobby
    SetUsername(String),
    /// Lock or unlock the lobby
    ToggleLock,
    /// Convert the lobby into a running session
    StartGame,
    /// Move on once the current question is corrected
    NextQuestion,
    /// Remove a player by name and block the name
    BanPlayer(String),
    /// Pause or resume the countdown
    ToggleTimerPause,
    /// Accelerate the countdown
    StartTimerPanic,
    /// Select or deselect a choice of a multiple choice question
    ToggleAnswerChoices(usize),
    /// Replace the draft of a free-text answer
    UpdateAnswerResponse(String),
    /// Lock in the current answer
    SubmitAnswer,
    /// Return the graded free-text answers
    SendAnswersCorrected(Vec<AnswerToCorrect>),
    /// Leave the current game
    PlayerLeftGame,
}

/// Discriminant of a [`ClientEvent`], used as a listener key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum)]
#[allow(missing_docs)]
pub enum ClientEventKind {
    JoinGameLobby,
    CreateGameLobby,
    CreateGameTest,
    CreateGameRandom,
    SetUsername,
    ToggleLock,
    StartGame,
    NextQuestion,
    BanPlayer,
    ToggleTimerPause,
    StartTimerPanic,
    ToggleAnswerChoices,
    UpdateAnswerResponse,
    SubmitAnswer,
    SendAnswersCorrected,
    PlayerLeftGame,
}

impl ClientEvent {
    /// The listener key of this event
    pub fn kind(&self) -> ClientEventKind {
        match self {
            Self::JoinGameLobby(_) => ClientEventKind::JoinGameLobby,
            Self::CreateGameLobby(_) => ClientEventKind::CreateGameLobby,
            Self::CreateGameTest(_) => ClientEventKind::CreateGameTest,
            Self::CreateGameRandom => ClientEventKind::CreateGameRandom,
            Self::SetUsername(_) => ClientEventKind::SetUsername,
            Self::ToggleLock => ClientEventKind::ToggleLock,
            Self::StartGame => ClientEventKind::StartGame,
            Self::NextQuestion => ClientEventKind::NextQuestion,
            Self::BanPlayer(_) => ClientEventKind::BanPlayer,
            Self::ToggleTimerPause => ClientEventKind::ToggleTimerPause,
            Self::StartTimerPanic => ClientEventKind::StartTimerPanic,
            Self::ToggleAnswerChoices(_) => ClientEventKind::ToggleAnswerChoices,
            Self::UpdateAnswerResponse(_) => ClientEventKind::UpdateAnswerResponse,
            Self::SubmitAnswer => ClientEventKind::SubmitAnswer,
            Self::SendAnswersCorrected(_) => ClientEventKind::SendAnswersCorrected,
            Self::PlayerLeftGame => ClientEventKind::PlayerLeftGame,
        }
    }
}

/// Screen a party should display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    /// Waiting room
    Lobby,
    /// A question is open for answers
    Question,
    /// Free-text answers are being graded by the organizer
    Correction,
    /// Scores of the last question are shown
    QuestionResults,
    /// The quiz is over
    Leaderboard,
}

/// A question as shown to players, without correctness
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    /// Position of the question in the quiz
    pub index: usize,
    /// Number of questions in the quiz
    pub count: usize,
    /// Identifier of the question
    pub id: String,
    /// Statement
    pub text: String,
    /// Kind of answer expected
    #[serde(rename = "type")]
    pub kind: QuestionType,
    /// Points for a fully correct answer
    pub points: u32,
    /// Text of each choice
    pub choices: Vec<String>,
    /// Countdown in seconds
    pub duration: u32,
}

impl QuestionPayload {
    /// Projects a question for the wire
    pub fn new(question: &Question, index: usize, count: usize, duration: u32) -> Self {
        Self {
            index,
            count,
            id: question.id.clone(),
            text: question.text.clone(),
            kind: question.kind,
            points: question.points,
            choices: question.choices.iter().map(|c| c.text.clone()).collect_vec(),
            duration,
        }
    }
}

/// Public view of a player
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    /// Display name
    pub name: String,
    /// Status on the current question
    pub answer_state: AnswerState,
    /// Running score
    pub score: f64,
    /// Number of bonuses earned
    pub bonus_count: u32,
}

impl From<&Player> for PlayerInfo {
    fn from(player: &Player) -> Self {
        Self {
            name: player.name.clone(),
            answer_state: player.answer_state,
            score: player.score,
            bonus_count: player.bonus_count,
        }
    }
}

/// Lobby or session summary
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    /// Code to join the game
    pub game_id: GameId,
    /// Title of the quiz
    pub title: String,
    /// Variant of the game
    pub mode: GameMode,
    /// Whether new players are refused
    pub locked: bool,
    /// Names of the players, in joining order
    pub players: Vec<String>,
}

/// Engagement on a free-text question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    /// Question the counts refer to
    pub question_index: usize,
    /// Number of active and inactive players
    pub bar_counts: [usize; 2],
}

/// Outcome of one question, sent at the end of the quiz
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStats {
    /// Position of the question in the quiz
    pub question_index: usize,
    /// Statement
    pub text: String,
    /// Kind of question
    #[serde(rename = "type")]
    pub kind: QuestionType,
    /// Per-choice selection counts, or counts of 0%, partial and 100% grades
    pub counts: Vec<usize>,
}

/// Events pushed to remote parties
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Availability of the pause control
    CanToggleTimerPause(bool),
    /// Availability of the panic control
    CanStartTimerPanic(bool),
    /// The countdown was accelerated
    OnPanicModeStarted,
    /// Remaining seconds on the countdown
    TimerValue(u32),
    /// The countdown was paused or resumed
    TimerPaused(bool),
    /// The question to display
    QuestionData(QuestionPayload),
    /// Summary of the game
    SendGameInfo(GameInfo),
    /// Screen to display
    UpdateGameState(GameState),
    /// The submission was recorded
    AnswerCollected,
    /// Indices of the correct choices
    SendCorrectAnswer(Vec<usize>),
    /// Free-text answers waiting for a grade
    SendAnswerToCorrect(Vec<AnswerToCorrect>),
    /// Feedback on the grade received
    SendCorrectionMessage(String),
    /// Every player of the game
    SendPlayerStats(Vec<PlayerInfo>),
    /// The receiving player's own record
    SendPlayerScore(PlayerInfo),
    /// Live selection counts per choice
    SendAnswerStats(Vec<usize>),
    /// Live engagement on a free-text question
    SendActivityStats(ActivityStats),
    /// Another player joined
    SendPlayerJoined(String),
    /// Another player left
    SendPlayerLeft(String),
    /// Availability of the next-question control
    CanGoToNextQuestion(bool),
    /// Per-question outcome of the quiz
    SendGameResults(Vec<QuestionStats>),
    /// The receiver was removed from the game
    KickedOutFromGame(String),
    /// The receiver's own leave request was carried out
    PlayerRemovedFromGame(String),
}

impl ServerEvent {
    /// Converts the event to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_wire_format() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"joinGameLobby","data":"1234"}"#).unwrap();
        assert_eq!(event, ClientEvent::JoinGameLobby("1234".to_owned()));
        assert_eq!(event.kind(), ClientEventKind::JoinGameLobby);

        let event: ClientEvent = serde_json::from_str(r#"{"event":"submitAnswer"}"#).unwrap();
        assert_eq!(event, ClientEvent::SubmitAnswer);
    }

    #[test]
    fn test_corrections_deserialize() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"sendAnswersCorrected","data":[{"playerName":"A","answer":"x","score":0.5}]}"#,
        )
        .unwrap();

        let ClientEvent::SendAnswersCorrected(list) = event else {
            panic!("unexpected event");
        };
        assert_eq!(list[0].player_name, "A");
        assert!((list[0].score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_server_event_wire_format() {
        assert_eq!(
            ServerEvent::CanStartTimerPanic(true).to_message(),
            r#"{"event":"canStartTimerPanic","data":true}"#
        );
        assert_eq!(
            ServerEvent::UpdateGameState(GameState::QuestionResults).to_message(),
            r#"{"event":"updateGameState","data":"QUESTION_RESULTS"}"#
        );
        assert_eq!(
            ServerEvent::SendActivityStats(ActivityStats {
                question_index: 2,
                bar_counts: [1, 0]
            })
            .to_message(),
            r#"{"event":"sendActivityStats","data":{"questionIndex":2,"barCounts":[1,0]}}"#
        );
    }

    #[test]
    fn test_question_payload_hides_correctness() {
        let question = crate::quiz::tests::qcm("a", 10, &[1], 3);
        let payload = QuestionPayload::new(&question, 0, 2, 20);
        let json = serde_json::to_string(&payload).unwrap();

        assert!(!json.contains("isCorrect"));
        assert_eq!(payload.choices.len(), 3);
        assert!(json.contains(r#""type":"QCM""#));
    }
}
