//! Question countdown and the organizer's timer controls
//!
//! Every tick is an alarm scheduled through the host. Alarms carry the
//! generation of the countdown that scheduled them; pausing, accelerating or
//! stopping the countdown bumps the generation so that alarms already in
//! flight are recognized as stale and ignored.

use std::time::Duration;

use crate::{
    Alarm,
    channel::{EventChannels, GameEvent, GameEventKind, Subscriber, SubscriptionId},
    constants::timer::{ONE_SECOND, QUARTER_SECOND},
    player::Id,
    protocol::ServerEvent,
    tunnel::Outbox,
};

use super::SessionCore;

/// A countdown in whole seconds
#[derive(Debug, Clone)]
pub struct Timer {
    remaining: u32,
    interval: Duration,
    paused: bool,
    running: bool,
    generation: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self {
            remaining: 0,
            interval: ONE_SECOND,
            paused: false,
            running: false,
            generation: 0,
        }
    }
}

impl Timer {
    /// Starts a fresh countdown at the regular pace
    ///
    /// # Returns
    ///
    /// Whether a pause left over from the previous countdown was lifted.
    pub fn start(&mut self, seconds: u32) -> bool {
        let was_paused = std::mem::replace(&mut self.paused, false);
        self.remaining = seconds;
        self.interval = ONE_SECOND;
        self.running = seconds > 0;
        self.generation += 1;
        was_paused
    }

    /// Stops the countdown, invalidating pending ticks
    ///
    /// A pause stays recorded until the next [`Self::start`].
    pub fn stop(&mut self) {
        self.running = false;
        self.generation += 1;
    }

    /// Counts one second down
    ///
    /// # Returns
    ///
    /// The remaining seconds, or `None` if the tick is stale.
    pub fn tick(&mut self, generation: u64) -> Option<u32> {
        if !self.running || self.paused || generation != self.generation {
            return None;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.running = false;
        }
        Some(self.remaining)
    }

    /// Pauses or resumes a running countdown
    ///
    /// # Returns
    ///
    /// The new paused flag, or `None` if nothing is counting down.
    pub fn toggle_pause(&mut self) -> Option<bool> {
        if !self.running {
            return None;
        }
        self.paused = !self.paused;
        self.generation += 1;
        Some(self.paused)
    }

    /// Switches to the fast pace for the rest of the countdown
    pub fn accelerate(&mut self) {
        self.interval = QUARTER_SECOND;
        self.generation += 1;
    }

    /// The next tick to schedule, if the countdown is moving
    pub fn pending_tick(&self) -> Option<(Alarm, Duration)> {
        (self.running && !self.paused).then_some((
            Alarm::TimerTick {
                generation: self.generation,
            },
            self.interval,
        ))
    }

    /// Whether the countdown is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the countdown is moving or paused
    pub fn is_running(&self) -> bool {
        self.running
    }
}

const EVENTS: [GameEventKind; 4] = [
    GameEventKind::QuestionStarted,
    GameEventKind::QuestionEnded,
    GameEventKind::QuizEnded,
    GameEventKind::GameRemoved,
];

/// Drives the countdown of every question and gates the organizer controls
#[derive(Debug)]
pub struct TimerController {
    subscriptions: Vec<SubscriptionId>,
    can_toggle_pause: bool,
    can_start_panic: bool,
    panic_deadline: Option<u64>,
    deadlines: u64,
}

impl TimerController {
    /// Creates the controller bound to a session's channels
    pub fn new(channels: &mut EventChannels) -> Self {
        Self {
            subscriptions: channels.subscribe_all(&EVENTS, Subscriber::Timer),
            can_toggle_pause: false,
            can_start_panic: false,
            panic_deadline: None,
            deadlines: 0,
        }
    }

    /// Whether the organizer may pause
    pub fn can_toggle_pause(&self) -> bool {
        self.can_toggle_pause
    }

    /// Whether the organizer may start panic mode
    pub fn can_start_panic(&self) -> bool {
        self.can_start_panic
    }

    /// Reacts to the session's lifecycle
    pub fn on_event(&mut self, core: &mut SessionCore, event: &GameEvent, outbox: &mut Outbox) {
        match event {
            GameEvent::QuestionStarted(_) => self.on_question_started(core, outbox),
            GameEvent::QuestionEnded(_) => self.disable(core, outbox),
            GameEvent::QuizEnded | GameEvent::GameRemoved(_) => {
                core.timer.stop();
                self.panic_deadline = None;
                self.can_toggle_pause = false;
                self.can_start_panic = false;
                core.channels.unsubscribe_all(&mut self.subscriptions);
            }
            _ => {}
        }
    }

    fn on_question_started(&mut self, core: &mut SessionCore, outbox: &mut Outbox) {
        let Some(question) = core.question() else {
            return;
        };
        let kind = question.kind;
        let duration = core.question_duration();

        if core.timer.start(duration) {
            core.send_all(&ServerEvent::TimerPaused(false), outbox);
        }
        core.send_all(&ServerEvent::TimerValue(duration), outbox);
        core.schedule_tick(outbox);

        let Some(organizer) = core.organizer else {
            return;
        };
        self.can_toggle_pause = true;
        let limit = core.settings.panic_limit(kind);
        self.can_start_panic = duration > limit;
        if self.can_start_panic {
            self.deadlines += 1;
            self.panic_deadline = Some(self.deadlines);
            core.schedule(
                Alarm::PanicDeadline {
                    generation: self.deadlines,
                },
                ONE_SECOND * (duration - limit),
                outbox,
            );
        }
        outbox.send(organizer, ServerEvent::CanToggleTimerPause(true));
        outbox.send(organizer, ServerEvent::CanStartTimerPanic(self.can_start_panic));
    }

    fn disable(&mut self, core: &SessionCore, outbox: &mut Outbox) {
        self.panic_deadline = None;
        let Some(organizer) = core.organizer else {
            return;
        };
        if self.can_toggle_pause {
            self.can_toggle_pause = false;
            outbox.send(organizer, ServerEvent::CanToggleTimerPause(false));
        }
        if self.can_start_panic {
            self.can_start_panic = false;
            outbox.send(organizer, ServerEvent::CanStartTimerPanic(false));
        }
    }

    /// Pauses or resumes the countdown on the organizer's request
    ///
    /// Ignored when the control is disabled.
    pub fn toggle_pause(&mut self, core: &mut SessionCore, id: Id, outbox: &mut Outbox) {
        if core.organizer != Some(id) || !self.can_toggle_pause {
            tracing::debug!(game = %core.id, "ignoring pause request");
            return;
        }
        if let Some(paused) = core.timer.toggle_pause() {
            core.send_all(&ServerEvent::TimerPaused(paused), outbox);
            core.schedule_tick(outbox);
        }
    }

    /// Accelerates the countdown on the organizer's request
    ///
    /// Ignored when the control is disabled. Panic mode can only be started
    /// once per question.
    pub fn start_panic(&mut self, core: &mut SessionCore, id: Id, outbox: &mut Outbox) {
        if core.organizer != Some(id) || !self.can_start_panic {
            tracing::debug!(game = %core.id, "ignoring panic request");
            return;
        }
        core.timer.accelerate();
        core.schedule_tick(outbox);
        core.send_all(&ServerEvent::OnPanicModeStarted, outbox);

        self.can_start_panic = false;
        self.panic_deadline = None;
        outbox.send(id, ServerEvent::CanStartTimerPanic(false));
    }

    /// Handles a countdown tick alarm
    pub fn on_tick(&mut self, core: &mut SessionCore, generation: u64, outbox: &mut Outbox) {
        let Some(remaining) = core.timer.tick(generation) else {
            tracing::debug!(game = %core.id, generation, "stale timer tick");
            return;
        };
        core.send_all(&ServerEvent::TimerValue(remaining), outbox);
        if remaining == 0 {
            core.end_question();
        } else {
            core.schedule_tick(outbox);
        }
    }

    /// Handles the end of the panic eligibility window
    pub fn on_panic_deadline(&mut self, core: &SessionCore, generation: u64, outbox: &mut Outbox) {
        if self.panic_deadline != Some(generation) {
            tracing::debug!(game = %core.id, generation, "stale panic deadline");
            return;
        }
        self.panic_deadline = None;
        if self.can_start_panic {
            self.can_start_panic = false;
            if let Some(organizer) = core.organizer {
                outbox.send(organizer, ServerEvent::CanStartTimerPanic(false));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown_reaches_zero() {
        let mut timer = Timer::default();
        timer.start(2);
        let Some((Alarm::TimerTick { generation }, interval)) = timer.pending_tick() else {
            panic!("expected a pending tick");
        };
        assert_eq!(interval, ONE_SECOND);

        assert_eq!(timer.tick(generation), Some(1));
        assert_eq!(timer.tick(generation), Some(0));
        assert!(!timer.is_running());
        assert_eq!(timer.tick(generation), None);
        assert!(!timer.start(3));
    }

    #[test]
    fn test_restart_lifts_pause_of_stopped_countdown() {
        let mut timer = Timer::default();
        timer.start(10);
        assert_eq!(timer.toggle_pause(), Some(true));
        timer.stop();
        assert!(timer.pending_tick().is_none());

        assert!(timer.start(10));
        assert!(!timer.is_paused());
        assert!(timer.pending_tick().is_some());
    }

    #[test]
    fn test_pause_invalidates_pending_tick() {
        let mut timer = Timer::default();
        timer.start(10);
        let (Alarm::TimerTick { generation }, _) = timer.pending_tick().unwrap() else {
            panic!("expected a tick");
        };

        assert_eq!(timer.toggle_pause(), Some(true));
        assert!(timer.pending_tick().is_none());
        assert_eq!(timer.tick(generation), None);

        assert_eq!(timer.toggle_pause(), Some(false));
        let (Alarm::TimerTick { generation }, _) = timer.pending_tick().unwrap() else {
            panic!("expected a tick");
        };
        assert_eq!(timer.tick(generation), Some(9));
    }

    #[test]
    fn test_accelerate_uses_quarter_second() {
        let mut timer = Timer::default();
        timer.start(10);
        timer.accelerate();
        assert_eq!(timer.pending_tick().map(|(_, d)| d), Some(QUARTER_SECOND));
    }

    #[test]
    fn test_pause_requires_running_timer() {
        let mut timer = Timer::default();
        assert_eq!(timer.toggle_pause(), None);
        timer.start(5);
        timer.stop();
        assert_eq!(timer.toggle_pause(), None);
    }
}
