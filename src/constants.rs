//! Configuration constants for the live quiz system
//!
//! This module contains the limits and timing constants used throughout
//! the game sessions. Runtime-tunable values are mirrored in
//! [`crate::config::Settings`], which uses these as defaults.

use std::time::Duration;

/// Game-wide limits
pub mod game {
    /// Maximum number of players allowed in a single game
    pub const MAX_PLAYER_COUNT: usize = 200;
    /// Name given to the organizer when they also play (random and test modes)
    pub const ORGANIZER_NAME: &str = "Organisateur";
}

/// Game id configuration
pub mod game_id {
    /// Smallest valid game id
    pub const MIN_VALUE: u16 = 1000;
    /// Largest valid game id
    pub const MAX_VALUE: u16 = 9999;
    /// Random draws tried before scanning for a free id
    pub const RANDOM_ATTEMPTS: usize = 100;
}

/// Username configuration
pub mod names {
    /// Maximum length of a username in characters
    pub const MAX_LENGTH: usize = 20;
}

/// Quiz configuration constants
pub mod quiz {
    /// Maximum length of a quiz title
    pub const MAX_TITLE_LENGTH: usize = 200;
    /// Maximum number of questions in a quiz
    pub const MAX_QUESTION_COUNT: usize = 100;
    /// Minimum time in seconds for a multiple choice question
    pub const MIN_DURATION: u32 = 10;
    /// Maximum time in seconds for a multiple choice question
    pub const MAX_DURATION: u32 = 60;
    /// Minimum points for a question
    pub const MIN_POINTS: u32 = 10;
    /// Maximum points for a question
    pub const MAX_POINTS: u32 = 100;
    /// Points must be a multiple of this step
    pub const POINTS_STEP: u32 = 10;
    /// Maximum length of a question statement
    pub const MAX_TEXT_LENGTH: usize = 500;
}

/// Multiple choice (QCM) configuration constants
pub mod qcm {
    /// Minimum number of choices
    pub const MIN_CHOICE_COUNT: usize = 2;
    /// Maximum number of choices
    pub const MAX_CHOICE_COUNT: usize = 4;
    /// Remaining seconds under which panic mode can no longer start
    pub const TIME_LIMIT_PANIC_MODE: u32 = 10;
    /// Fraction of the question points granted as first-to-answer bonus
    pub const BONUS_FACTOR: f64 = 0.2;
}

/// Long answer (QRL) configuration constants
pub mod qrl {
    /// Time in seconds allowed for a long answer question
    pub const DURATION: u32 = 60;
    /// Remaining seconds under which panic mode can no longer start
    pub const TIME_LIMIT_PANIC_MODE: u32 = 20;
    /// Maximum length of a long answer
    pub const MAX_ANSWER_LENGTH: usize = 200;
    /// Number of one-second ticks a player stays active after an edit
    pub const TIME_ACTIVE: u32 = 5;
}

/// Timer tick intervals
pub mod timer {
    use super::Duration;

    /// Regular countdown interval
    pub const ONE_SECOND: Duration = Duration::from_secs(1);
    /// Countdown interval while panic mode is on
    pub const QUARTER_SECOND: Duration = Duration::from_millis(250);
    /// Delay before auto-advancing to the next question (test and random modes)
    pub const TRANSITION_DELAY: Duration = Duration::from_secs(3);
}
