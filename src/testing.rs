//! Helpers shared by the unit tests

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use tracing_subscriber::EnvFilter;

use crate::{
    Alarm,
    player::Id,
    protocol::ServerEvent,
    tunnel::{Outbox, Tunnel},
};

/// Routes log output through the test harness; set `RUST_LOG` to see it
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Records every event sent to every party
#[derive(Debug, Clone, Default)]
pub struct MockTunnel {
    target: Option<Id>,
    inbox: Rc<RefCell<HashMap<Id, Vec<ServerEvent>>>>,
}

impl MockTunnel {
    /// A tunnel to `id` sharing this recorder
    pub fn for_id(&self, id: Id) -> Self {
        Self {
            target: Some(id),
            inbox: self.inbox.clone(),
        }
    }

    /// Everything `id` received so far
    pub fn received(&self, id: Id) -> Vec<ServerEvent> {
        self.inbox.borrow().get(&id).cloned().unwrap_or_default()
    }

    /// Everything `id` received since the last call
    pub fn take(&self, id: Id) -> Vec<ServerEvent> {
        self.inbox.borrow_mut().remove(&id).unwrap_or_default()
    }
}

impl Tunnel for MockTunnel {
    fn send_event(&self, event: &ServerEvent) {
        if let Some(id) = self.target {
            self.inbox
                .borrow_mut()
                .entry(id)
                .or_default()
                .push(event.clone());
        }
    }
}

/// Events queued for `id` in an outbox
pub fn received(outbox: &Outbox, id: Id) -> Vec<ServerEvent> {
    outbox
        .messages()
        .iter()
        .filter(|(to, _)| *to == id)
        .map(|(_, event)| event.clone())
        .collect()
}

/// Generation of the last countdown tick queued in an outbox
pub fn last_timer_generation(outbox: &Outbox) -> Option<u64> {
    outbox.alarms().iter().rev().find_map(|(scheduled, _)| match scheduled.alarm {
        Alarm::TimerTick { generation } => Some(generation),
        _ => None,
    })
}
