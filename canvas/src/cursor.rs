//! Remote cursor bookkeeping and the online/self filter.
//!
//! The cursor channel delivers the full `actor -> position` map on every
//! change. `CursorBoard` remembers when each entry last changed so silent
//! peers fade out, and filters the map against the presence roster before it
//! reaches the UI.

#[cfg(test)]
#[path = "cursor_test.rs"]
mod cursor_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::doc::ActorId;
use crate::presence::PresenceTracker;

/// Cursor value carried on the ephemeral channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
    /// Client timestamp (ms) at publish time.
    #[serde(default)]
    pub ts: i64,
}

/// A cursor ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCursor {
    pub actor_id: ActorId,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone)]
struct Tracked {
    position: CursorPosition,
    received_at: i64,
}

/// Latest known cursor per remote actor.
#[derive(Debug, Clone)]
pub struct CursorBoard {
    self_actor: ActorId,
    stale_after_ms: i64,
    cursors: HashMap<ActorId, Tracked>,
}

impl CursorBoard {
    #[must_use]
    pub fn new(self_actor: impl Into<ActorId>, stale_after_ms: i64) -> Self {
        Self { self_actor: self_actor.into(), stale_after_ms, cursors: HashMap::new() }
    }

    /// Replace the cursor map with the channel's latest full map.
    ///
    /// Entries whose position did not change keep their original receive time, so an
    /// unrelated peer's movement does not keep a frozen cursor alive.
    pub fn apply_remote(&mut self, incoming: HashMap<ActorId, CursorPosition>, now_ms: i64) {
        let mut next = HashMap::with_capacity(incoming.len());
        for (actor, position) in incoming {
            if actor == self.self_actor {
                continue;
            }
            let received_at = match self.cursors.get(&actor) {
                Some(prev) if prev.position == position => prev.received_at,
                _ => now_ms,
            };
            next.insert(actor, Tracked { position, received_at });
        }
        self.cursors = next;
    }

    /// Cursors to render: remote, fresh, and (once the roster is known) online.
    ///
    /// Before the first roster delivery every fresh remote cursor is shown.
    #[must_use]
    pub fn visible(&self, presence: &PresenceTracker, now_ms: i64) -> Vec<RemoteCursor> {
        let filter_online = presence.is_roster_loaded();
        let mut out: Vec<RemoteCursor> = self
            .cursors
            .iter()
            .filter(|(_, tracked)| now_ms.saturating_sub(tracked.received_at) <= self.stale_after_ms)
            .filter(|(actor, _)| !filter_online || presence.is_online(actor, now_ms))
            .map(|(actor, tracked)| RemoteCursor {
                actor_id: actor.clone(),
                x: tracked.position.x,
                y: tracked.position.y,
            })
            .collect();
        out.sort_by(|a, b| a.actor_id.cmp(&b.actor_id));
        out
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}
