use serde::Serialize;

use crate::clock::Millis;

/// One recorded emission, stamped with the runtime time it happened at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event<E> {
    pub seq: u64,
    pub at: Millis,
    pub payload: E,
}

/// Append-only, ordered record of typed emissions.
///
/// Drivers push every outbound command here so hosts (and tests) can replay
/// exactly what was sent to the renderer and when.
#[derive(Debug)]
pub struct EventBus<E> {
    next_seq: u64,
    events: Vec<Event<E>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            events: Vec::new(),
        }
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, at: Millis, payload: E) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(Event { seq, at, payload });
        seq
    }

    pub fn events(&self) -> &[Event<E>] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event<E>> {
        self.events
    }
}
