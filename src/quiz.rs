//! Quiz definitions and the quiz store contract
//!
//! Quizzes are authored and stored elsewhere; a game only reads them through
//! [`QuizStore`]. Every quiz is validated with `garde` before a game is
//! created from it, so the session code can rely on well-formed questions.

use std::collections::HashMap;

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::constants::{qcm, quiz};

/// Type of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    /// Multiple choice question with a closed answer set
    #[serde(rename = "QCM")]
    Qcm,
    /// Free-text question graded by the organizer
    #[serde(rename = "QRL")]
    Qrl,
}

/// One choice of a multiple choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    /// Text displayed to players
    #[garde(length(min = 1, max = quiz::MAX_TEXT_LENGTH))]
    pub text: String,
    /// Whether selecting this choice is part of the correct answer
    #[garde(skip)]
    #[serde(default)]
    pub is_correct: bool,
}

/// A single question of a quiz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Identifier assigned by the quiz store
    #[garde(skip)]
    pub id: String,
    /// Statement of the question
    #[garde(length(min = 1, max = quiz::MAX_TEXT_LENGTH))]
    pub text: String,
    /// Kind of answer expected
    #[garde(skip)]
    #[serde(rename = "type")]
    pub kind: QuestionType,
    /// Points granted for a fully correct answer
    #[garde(custom(validate_points))]
    pub points: u32,
    /// Choices offered, empty for free-text questions
    #[garde(dive, custom(|choices: &Vec<Choice>, _ctx: &()| validate_choices(self.kind, choices)))]
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// A complete quiz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    /// Identifier assigned by the quiz store
    #[garde(skip)]
    pub id: String,
    /// Title shown in the lobby
    #[garde(length(min = 1, max = quiz::MAX_TITLE_LENGTH))]
    pub title: String,
    /// Countdown of multiple choice questions, in seconds
    #[garde(range(min = quiz::MIN_DURATION, max = quiz::MAX_DURATION))]
    pub duration: u32,
    /// Questions, played in order
    #[garde(length(min = 1, max = quiz::MAX_QUESTION_COUNT), dive)]
    pub questions: Vec<Question>,
}

fn validate_points(points: &u32, _ctx: &()) -> garde::Result {
    if (quiz::MIN_POINTS..=quiz::MAX_POINTS).contains(points) && points % quiz::POINTS_STEP == 0 {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "points must be a multiple of {} between {} and {}",
            quiz::POINTS_STEP,
            quiz::MIN_POINTS,
            quiz::MAX_POINTS
        )))
    }
}

fn validate_choices(kind: QuestionType, choices: &[Choice]) -> garde::Result {
    if kind == QuestionType::Qrl {
        return Ok(());
    }
    if !(qcm::MIN_CHOICE_COUNT..=qcm::MAX_CHOICE_COUNT).contains(&choices.len()) {
        return Err(garde::Error::new(format!(
            "a multiple choice question needs between {} and {} choices",
            qcm::MIN_CHOICE_COUNT,
            qcm::MAX_CHOICE_COUNT
        )));
    }
    let correct = choices.iter().filter(|c| c.is_correct).count();
    if correct == 0 || correct == choices.len() {
        return Err(garde::Error::new(
            "a multiple choice question needs a correct and an incorrect choice",
        ));
    }
    Ok(())
}

impl Question {
    /// Indices of the correct choices, in ascending order
    pub fn correct_choices(&self) -> Vec<usize> {
        self.choices
            .iter()
            .positions(|c| c.is_correct)
            .collect_vec()
    }

    /// Whether a selection is exactly the set of correct choices
    pub fn is_exactly_correct(&self, selection: &[usize]) -> bool {
        let correct = self.correct_choices();
        selection.len() == correct.len() && selection.iter().sorted().eq(correct.iter())
    }
}

impl Quiz {
    /// Returns the number of questions in this quiz
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Checks if this quiz contains any question
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Countdown of a question in seconds
    pub fn question_duration(&self, question: &Question, qrl_duration: u32) -> u32 {
        match question.kind {
            QuestionType::Qcm => self.duration,
            QuestionType::Qrl => qrl_duration,
        }
    }
}

/// Read access to the quizzes a game can be created from
pub trait QuizStore {
    /// Loads a quiz by id
    fn get_quiz(&self, id: &str) -> Option<Quiz>;

    /// Builds a quiz for random mode, if the store supports it
    fn random_quiz(&self) -> Option<Quiz> {
        None
    }
}

impl QuizStore for HashMap<String, Quiz> {
    fn get_quiz(&self, id: &str) -> Option<Quiz> {
        self.get(id).cloned()
    }

    fn random_quiz(&self) -> Option<Quiz> {
        let keys = self.keys().sorted().collect_vec();
        if keys.is_empty() {
            return None;
        }
        self.get(keys[fastrand::usize(..keys.len())]).cloned()
    }
}
