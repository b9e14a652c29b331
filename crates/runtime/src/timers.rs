//! Deterministic one-shot timer queue for cooperative drivers.
//!
//! Key properties:
//! - Total ordering on `(due, id)`: timers due at the same instant fire in
//!   scheduling order.
//! - Cancellation does not perturb the order of remaining timers.
//! - Nothing fires until the owner asks with a `now`; there are no hidden
//!   threads or callbacks.

use crate::clock::Millis;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    due: Millis,
    id: TimerId,
}

#[derive(Debug)]
struct Entry<T> {
    key: Key,
    payload: T,
}

#[derive(Debug)]
pub struct TimerQueue<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn schedule(&mut self, due: Millis, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.push(Entry {
            key: Key { due, id },
            payload,
        });
        id
    }

    /// Drops every timer whose payload matches `pred`; returns how many.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !pred(&e.payload));
        before - self.entries.len()
    }

    /// Earliest due instant, if any timer is pending.
    pub fn next_due(&self) -> Option<Millis> {
        self.entries.iter().map(|e| e.key.due).min()
    }

    /// Removes and returns the earliest timer due at or before `now`.
    pub fn pop_due(&mut self, now: Millis) -> Option<(TimerId, Millis, T)> {
        let mut best: Option<usize> = None;
        for (idx, e) in self.entries.iter().enumerate() {
            if e.key.due > now {
                continue;
            }
            match best {
                None => best = Some(idx),
                Some(b) if e.key < self.entries[b].key => best = Some(idx),
                Some(_) => {}
            }
        }
        let idx = best?;
        let e = self.entries.remove(idx);
        Some((e.key.id, e.key.due, e.payload))
    }

    /// Removes every timer due at or before `now`, in firing order.
    pub fn drain_due(&mut self, now: Millis) -> Vec<(TimerId, T)> {
        let mut out = Vec::new();
        while let Some((id, _due, payload)) = self.pop_due(now) {
            out.push((id, payload));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::TimerQueue;
    use crate::clock::Millis;

    #[test]
    fn fires_in_due_order() {
        let mut q = TimerQueue::new();
        q.schedule(Millis(300), "late");
        q.schedule(Millis(100), "early");
        q.schedule(Millis(200), "mid");

        let fired: Vec<_> = q.drain_due(Millis(1_000)).into_iter().map(|(_, v)| v).collect();
        assert_eq!(fired, vec!["early", "mid", "late"]);
    }

    #[test]
    fn same_instant_is_scheduling_order() {
        let mut q = TimerQueue::new();
        q.schedule(Millis(10), "a");
        q.schedule(Millis(10), "b");
        let fired: Vec<_> = q.drain_due(Millis(10)).into_iter().map(|(_, v)| v).collect();
        assert_eq!(fired, vec!["a", "b"]);
    }

    #[test]
    fn not_due_stays_queued() {
        let mut q = TimerQueue::new();
        q.schedule(Millis(500), "x");
        assert!(q.pop_due(Millis(499)).is_none());
        assert_eq!(q.next_due(), Some(Millis(500)));
        assert!(q.pop_due(Millis(500)).is_some());
        assert!(q.is_empty());
    }

    #[test]
    fn cancel_where_keeps_remaining_order() {
        let mut q = TimerQueue::new();
        q.schedule(Millis(3), 1u32);
        q.schedule(Millis(2), 2u32);
        q.schedule(Millis(3), 3u32);
        q.schedule(Millis(1), 4u32);
        assert_eq!(q.cancel_where(|v| v % 2 == 0), 2);
        let fired: Vec<_> = q.drain_due(Millis(10)).into_iter().map(|(_, v)| v).collect();
        assert_eq!(fired, vec![1, 3]);
    }
}
