//! Runtime settings for game sessions
//!
//! [`Settings`] gathers the tunable values of a game session. Every field
//! defaults to its counterpart in [`crate::constants`], so a partially
//! specified JSON document deserializes into a complete configuration.

use std::time::Duration;

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{constants, quiz::QuestionType};

/// Tunables shared by every game hosted by a [`crate::manager::GameManager`]
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Remaining seconds under which panic mode is refused on QCM questions
    #[garde(range(min = 1))]
    pub qcm_panic_limit: u32,
    /// Remaining seconds under which panic mode is refused on QRL questions
    #[garde(range(min = 1))]
    pub qrl_panic_limit: u32,
    /// Countdown length of a QRL question in seconds
    #[garde(range(min = 5, max = 300))]
    pub qrl_duration: u32,
    /// Activity window of a QRL player, in one-second ticks
    #[garde(range(min = 1, max = 60))]
    pub time_active: u32,
    /// Fraction of the question points given as the first-to-answer bonus
    #[garde(range(min = 0.0, max = 1.0))]
    pub bonus_factor: f64,
    /// Maximum number of players in one game
    #[garde(range(min = 1, max = 10_000))]
    pub max_players: usize,
    /// Delay before a test or random game moves to the next question
    #[garde(skip)]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub transition_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            qcm_panic_limit: constants::qcm::TIME_LIMIT_PANIC_MODE,
            qrl_panic_limit: constants::qrl::TIME_LIMIT_PANIC_MODE,
            qrl_duration: constants::qrl::DURATION,
            time_active: constants::qrl::TIME_ACTIVE,
            bonus_factor: constants::qcm::BONUS_FACTOR,
            max_players: constants::game::MAX_PLAYER_COUNT,
            transition_delay: constants::timer::TRANSITION_DELAY,
        }
    }
}

impl Settings {
    /// Remaining time under which panic mode is no longer available
    pub fn panic_limit(&self, kind: QuestionType) -> u32 {
        match kind {
            QuestionType::Qcm => self.qcm_panic_limit,
            QuestionType::Qrl => self.qrl_panic_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"timeActive": 3, "transitionDelay": 500}"#).unwrap();

        assert_eq!(settings.time_active, 3);
        assert_eq!(settings.transition_delay, Duration::from_millis(500));
        assert_eq!(settings.qrl_duration, constants::qrl::DURATION);
    }

    #[test]
    fn test_invalid_bonus_rejected() {
        let settings = Settings {
            bonus_factor: 1.5,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_panic_limit_by_type() {
        let settings = Settings::default();
        assert!(settings.panic_limit(QuestionType::Qrl) > settings.panic_limit(QuestionType::Qcm));
    }
}
