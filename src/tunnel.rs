//! Transport abstraction and buffered side effects
//!
//! The game never owns a connection. It reaches a remote party through a
//! [`Tunnel`] looked up by [`Id`] at the moment a message is delivered, and
//! it asks the host to call it back later through a scheduling closure.
//! While an event is being processed every side effect is buffered in an
//! [`Outbox`], which is flushed once the aggregate is consistent again.

use std::time::Duration;

use crate::{ScheduledAlarm, history::HistoryCommand, player::Id, protocol::ServerEvent};

/// Trait for sending events through a communication tunnel
///
/// Implementations might use WebSockets, Server-Sent Events, or any other
/// real-time transport.
pub trait Tunnel {
    /// Sends an event to the remote party
    fn send_event(&self, event: &ServerEvent);
}

/// Side effects produced while handling one request or alarm
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<(Id, ServerEvent)>,
    alarms: Vec<(ScheduledAlarm, Duration)>,
    history: Vec<HistoryCommand>,
}

impl Outbox {
    /// Queues an event for one party
    pub fn send(&mut self, id: Id, event: ServerEvent) {
        self.messages.push((id, event));
    }

    /// Queues the same event for several parties
    pub fn send_many<I: IntoIterator<Item = Id>>(&mut self, ids: I, event: &ServerEvent) {
        for id in ids {
            self.messages.push((id, event.clone()));
        }
    }

    /// Queues an alarm to be delivered after `delay`
    pub fn schedule(&mut self, alarm: ScheduledAlarm, delay: Duration) {
        self.alarms.push((alarm, delay));
    }

    /// Queues a call on the history store
    pub fn record(&mut self, command: HistoryCommand) {
        self.history.push(command);
    }

    /// Events queued so far
    pub fn messages(&self) -> &[(Id, ServerEvent)] {
        &self.messages
    }

    /// Alarms queued so far
    pub fn alarms(&self) -> &[(ScheduledAlarm, Duration)] {
        &self.alarms
    }

    /// Delivers the queued events and alarms
    ///
    /// Parties whose tunnel cannot be found anymore are skipped.
    ///
    /// # Returns
    ///
    /// The history commands, for the caller to apply.
    pub fn flush<T, F, S>(self, tunnel_finder: F, mut schedule_message: S) -> Vec<HistoryCommand>
    where
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(ScheduledAlarm, Duration),
    {
        for (id, event) in self.messages {
            if let Some(tunnel) = tunnel_finder(id) {
                tunnel.send_event(&event);
            } else {
                tracing::debug!(%id, "dropping event for a party without tunnel");
            }
        }
        for (alarm, delay) in self.alarms {
            schedule_message(alarm, delay);
        }
        self.history
    }
}
