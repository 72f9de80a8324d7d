//! Snapshot-based undo/redo.
//!
//! DESIGN
//! ======
//! Each entry is a full copy of the rendered shape list taken *before* a
//! user mutation. Undo hands back the previous list; the caller turns it into
//! durable writes. Those writes echo back through the store subscription and
//! would normally trigger fresh snapshots, so undo/redo raise a replay guard
//! that suppresses snapshots until the caller calls [`History::end_replay`].
//!
//! Snapshots are stored without lock state: locks are not part of the
//! document history and replaying them would steal or drop other actors'
//! locks.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::collections::VecDeque;

use crate::consts::HISTORY_CAP;
use crate::doc::Shape;

/// One undo/redo entry.
pub type Snapshot = Vec<Shape>;

/// Bounded undo/redo stacks.
#[derive(Debug, Clone)]
pub struct History {
    past: VecDeque<Snapshot>,
    future: VecDeque<Snapshot>,
    cap: usize,
    replaying: bool,
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_CAP)
    }
}

fn normalize(state: &[Shape]) -> Snapshot {
    state
        .iter()
        .map(|shape| Shape { locked_by: None, updated_at: 0, ..shape.clone() })
        .collect()
}

fn push_capped(stack: &mut VecDeque<Snapshot>, entry: Snapshot, cap: usize) {
    stack.push_back(entry);
    while stack.len() > cap {
        stack.pop_front();
    }
}

impl History {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self { past: VecDeque::new(), future: VecDeque::new(), cap, replaying: false }
    }

    /// Record `state` as an undo point and clear the redo stack.
    ///
    /// Skipped while a replay is in flight, and when `state` matches the newest undo
    /// point. Returns whether an entry was recorded.
    pub fn take_snapshot(&mut self, state: &[Shape]) -> bool {
        if self.replaying {
            return false;
        }
        let snapshot = normalize(state);
        if self.past.back() == Some(&snapshot) {
            return false;
        }
        push_capped(&mut self.past, snapshot, self.cap);
        self.future.clear();
        true
    }

    /// Step back. `current` is pushed onto the redo stack and the previous state is
    /// returned. The replay guard stays up until [`History::end_replay`].
    pub fn undo(&mut self, current: &[Shape]) -> Option<Snapshot> {
        let previous = self.past.pop_back()?;
        push_capped(&mut self.future, normalize(current), self.cap);
        self.replaying = true;
        Some(previous)
    }

    /// Step forward. Mirror of [`History::undo`].
    pub fn redo(&mut self, current: &[Shape]) -> Option<Snapshot> {
        let next = self.future.pop_back()?;
        push_capped(&mut self.past, normalize(current), self.cap);
        self.replaying = true;
        Some(next)
    }

    /// Lower the replay guard once the replayed writes have been dispatched.
    pub fn end_replay(&mut self) {
        self.replaying = false;
    }

    #[must_use]
    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    #[must_use]
    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    #[must_use]
    pub fn future_len(&self) -> usize {
        self.future.len()
    }
}
