//! Free-text answers and their correction round-trip

use std::collections::HashMap;

use itertools::Itertools;

use crate::{
    constants::qrl::MAX_ANSWER_LENGTH,
    player::{AnswerState, Id},
    protocol::{AnswerToCorrect, QuestionStats, ServerEvent},
    quiz::Question,
    session::{GameMode, SessionCore},
    tunnel::Outbox,
};

/// Grade buckets reported in the game results
const ZERO: usize = 0;
const PARTIAL: usize = 1;
const FULL: usize = 2;

/// Drafts of every player on one free-text question
#[derive(Debug, Default)]
pub struct QrlAnswers {
    drafts: HashMap<Id, String>,
    /// Answers sent to the organizer and not graded yet
    pending: Vec<(Id, AnswerToCorrect)>,
}

impl QrlAnswers {
    /// Replaces the draft of a player
    pub fn update_response(&mut self, core: &mut SessionCore, id: Id, text: &str) {
        let text = text.chars().take(MAX_ANSWER_LENGTH).collect::<String>();
        self.drafts.insert(id, text);
        core.mark(id, AnswerState::Answering);
    }

    /// Whether answers are waiting for a grade
    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Sends the drafts of active players to the organizer, sorted by name
    ///
    /// # Returns
    ///
    /// `false` if there was nothing to correct.
    pub fn request_correction(&mut self, core: &SessionCore, outbox: &mut Outbox) -> bool {
        self.pending = self
            .drafts
            .iter()
            .filter_map(|(id, answer)| {
                let player = core.roster.get(*id).filter(|p| p.is_active())?;
                Some((
                    *id,
                    AnswerToCorrect {
                        player_name: player.name.clone(),
                        answer: answer.clone(),
                        score: 0.,
                    },
                ))
            })
            .sorted_by(|(_, a), (_, b)| a.player_name.cmp(&b.player_name))
            .collect_vec();

        let Some(organizer) = core.organizer else {
            self.pending.clear();
            return false;
        };
        if self.pending.is_empty() {
            return false;
        }
        outbox.send(
            organizer,
            ServerEvent::SendAnswerToCorrect(self.pending.iter().map(|(_, a)| a.clone()).collect_vec()),
        );
        true
    }

    /// Applies the organizer's grades
    ///
    /// Each pending author earns `points * score`, with the score clamped
    /// to `[0, 1]`. Authors missing from `grades` earn nothing. Active
    /// players who never wrote anything count as 0% in the statistics.
    pub fn apply_grades(
        &mut self,
        core: &mut SessionCore,
        question: &Question,
        question_index: usize,
        grades: &[AnswerToCorrect],
        outbox: &mut Outbox,
    ) -> QuestionStats {
        let points = f64::from(question.points);
        let mut counts = vec![0; 3];

        for grade in grades {
            if !self.pending.iter().any(|(_, a)| a.player_name == grade.player_name) {
                tracing::warn!(game = %core.id, name = %grade.player_name, "grade for an unknown answer");
            }
        }

        for (id, answer) in self.pending.drain(..) {
            let score = grades
                .iter()
                .find(|g| g.player_name == answer.player_name)
                .map_or(0., |g| g.score.clamp(0., 1.));
            core.roster.add_points(id, points * score);
            outbox.send(id, ServerEvent::SendCorrectionMessage(percentage_message(score)));
            counts[bucket(score)] += 1;
        }
        counts[ZERO] += core
            .roster
            .active()
            .filter(|p| !self.drafts.contains_key(&p.id))
            .count();

        QuestionStats {
            question_index,
            text: question.text.clone(),
            kind: question.kind,
            counts,
        }
    }

    /// Grants full points without a correction round-trip
    ///
    /// Used in practice and random games, where nobody grades answers. The
    /// practice player always earns the points; in random games only players
    /// who wrote or submitted something do.
    pub fn award_full(
        &mut self,
        core: &mut SessionCore,
        question: &Question,
        question_index: usize,
        submitted: &[Id],
        outbox: &mut Outbox,
    ) -> QuestionStats {
        let points = f64::from(question.points);
        let mut counts = vec![0; 3];
        for id in core.roster.active_ids() {
            let participated = core.mode == GameMode::Test
                || self.drafts.contains_key(&id)
                || submitted.contains(&id);
            let message = if participated {
                core.roster.add_points(id, points);
                counts[FULL] += 1;
                "Practice mode: you received 100% of the points".to_owned()
            } else {
                counts[ZERO] += 1;
                percentage_message(0.)
            };
            outbox.send(id, ServerEvent::SendCorrectionMessage(message));
        }
        QuestionStats {
            question_index,
            text: question.text.clone(),
            kind: question.kind,
            counts,
        }
    }

    /// Statistics when nobody wrote anything
    pub fn empty_stats(core: &SessionCore, question: &Question, question_index: usize) -> QuestionStats {
        QuestionStats {
            question_index,
            text: question.text.clone(),
            kind: question.kind,
            counts: vec![core.roster.active_count(), 0, 0],
        }
    }
}

fn bucket(score: f64) -> usize {
    if score <= 0. {
        ZERO
    } else if score >= 1. {
        FULL
    } else {
        PARTIAL
    }
}

fn percentage_message(score: f64) -> String {
    format!("You received {}% of the points", (score * 100.).round() as u32)
}
