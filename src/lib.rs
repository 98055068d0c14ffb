//! # Quizlive
//!
//! This library provides the server-side logic of a live trivia game: an
//! organizer drives a quiz through its questions while connected players
//! answer in real time, see corrections and accumulate scores. It handles
//! connection states, lobbies, running sessions and their observers, timed
//! events and the wire protocol, on top of an abstract transport.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};

pub mod channel;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod game_id;
pub mod history;
pub mod lobby;
pub mod manager;
pub mod names;
pub mod player;
pub mod protocol;
pub mod quiz;
pub mod session;
pub mod tunnel;

#[cfg(test)]
mod testing;

/// Timed events a session asks its host to deliver later
///
/// Timer alarms carry the generation of the countdown that scheduled them,
/// so an alarm outliving its countdown is recognized and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Alarm {
    /// One step of the question countdown
    TimerTick {
        /// Countdown the tick belongs to
        generation: u64,
    },
    /// End of the window in which panic mode may start
    PanicDeadline {
        /// Countdown the deadline belongs to
        generation: u64,
    },
    /// One second of player activity tracking
    ActivityTick {
        /// Question being tracked
        question: usize,
    },
    /// Automatic move to the next question
    AdvanceQuestion {
        /// Question to move on from
        question: usize,
    },
}

/// An [`Alarm`] addressed to a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledAlarm {
    /// Game the alarm is for
    pub game: game_id::GameId,
    /// What is due
    pub alarm: Alarm,
}
