//! Multiple choice answers

use std::collections::HashMap;

use crate::{
    player::{AnswerState, Id},
    protocol::{QuestionStats, ServerEvent},
    quiz::Question,
    session::{GameMode, SessionCore},
    tunnel::Outbox,
};

/// Selections of every player on one multiple choice question
#[derive(Debug, Default)]
pub struct QcmAnswers {
    selections: HashMap<Id, Vec<usize>>,
    /// Who claimed the first-to-answer bonus on this question
    bonus: Option<Id>,
}

impl QcmAnswers {
    /// Selects or deselects a choice for a player
    ///
    /// The live selection counts are pushed to the organizer.
    pub fn toggle_choice(
        &mut self,
        core: &mut SessionCore,
        question: &Question,
        id: Id,
        index: usize,
        outbox: &mut Outbox,
    ) {
        if index >= question.choices.len() {
            tracing::debug!(game = %core.id, index, "choice out of range");
            return;
        }
        let selection = self.selections.entry(id).or_default();
        if let Some(position) = selection.iter().position(|x| *x == index) {
            selection.remove(position);
        } else {
            selection.push(index);
        }

        core.mark(id, AnswerState::Answering);
        if let Some(organizer) = core.organizer {
            outbox.send(
                organizer,
                ServerEvent::SendAnswerStats(self.choice_counts(question.choices.len())),
            );
        }
    }

    /// Current selection of a player
    pub fn selection(&self, id: Id) -> &[usize] {
        self.selections.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Number of players currently selecting each choice
    pub fn choice_counts(&self, choice_count: usize) -> Vec<usize> {
        let mut counts = vec![0; choice_count];
        for index in self.selections.values().flatten() {
            if let Some(count) = counts.get_mut(*index) {
                *count += 1;
            }
        }
        counts
    }

    /// Scores every active player
    ///
    /// A player earns the question's points when their selection is exactly
    /// the set of correct choices. The bonus goes to the earliest explicit
    /// submitter with a correct selection; in a practice game the sole
    /// player earns it whenever they are correct.
    pub fn finalize(
        &mut self,
        core: &mut SessionCore,
        question: &Question,
        question_index: usize,
        submitted: &[Id],
    ) -> QuestionStats {
        let points = f64::from(question.points);
        let is_correct = |id: &Id| question.is_exactly_correct(self.selection(*id));

        let active = core.roster.active_ids();
        for id in active.iter().filter(|id| is_correct(id)) {
            core.roster.add_points(*id, points);
        }

        let candidate = if core.mode == GameMode::Test {
            active.first().copied().filter(|id| is_correct(id))
        } else {
            submitted
                .iter()
                .copied()
                .find(|id| active.contains(id) && is_correct(id))
        };
        if let Some(id) = candidate
            && self.bonus.is_none()
        {
            self.bonus = Some(id);
            core.roster.add_bonus(id, points * core.settings.bonus_factor);
        }

        QuestionStats {
            question_index,
            text: question.text.clone(),
            kind: question.kind,
            counts: self.choice_counts(question.choices.len()),
        }
    }
}
