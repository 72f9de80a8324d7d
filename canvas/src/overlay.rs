//! Override layers stacked on top of the durable base.
//!
//! DESIGN
//! ======
//! - `EphemeralLayer` holds previews published by *other* actors during their
//!   gestures. It is replaced wholesale whenever the channel delivers a new
//!   map, and filtered against the presence roster so a peer that dropped
//!   mid-drag does not leave a ghost behind. An entry that has not changed
//!   for `stale_after_ms` of local time is hidden as well, so a preview whose
//!   clear never arrived cannot outlive its gesture by much.
//! - A preview is also superseded by the next durable write: once the base
//!   shape's `updated_at` reaches the preview's `ts`, the base wins (see
//!   [`EphemeralOverride::is_superseded_by`]).
//! - `OptimisticLayer` holds this actor's own edits from the moment they are
//!   requested until the durable write that carries them is acknowledged.
//!   Every write gets a sequence number; an acknowledgment only clears the
//!   entry when it belongs to the newest write for that shape, so a slow ack
//!   for an older write never strips a newer in-flight value.

#[cfg(test)]
#[path = "overlay_test.rs"]
mod overlay_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::doc::{ActorId, Shape, ShapeId, ShapePatch};
use crate::presence::PresenceTracker;

// =============================================================================
// EPHEMERAL (REMOTE PREVIEWS)
// =============================================================================

/// In-gesture preview published on the ephemeral channel, keyed by shape id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemeralOverride {
    pub actor_id: ActorId,
    pub patch: ShapePatch,
    /// Publisher's clock (ms) at publish time. Comparable with `Shape::updated_at`
    /// because a commit stamps the shape with the same clock.
    pub ts: i64,
}

impl EphemeralOverride {
    /// Whether a durable write at or after this preview has reached the base layer.
    #[must_use]
    pub fn is_superseded_by(&self, base: &Shape) -> bool {
        base.updated_at >= self.ts
    }
}

/// Remote previews currently applied to the render.
#[derive(Debug, Clone)]
pub struct EphemeralLayer {
    self_actor: ActorId,
    stale_after_ms: i64,
    raw: HashMap<ShapeId, EphemeralOverride>,
    /// Local time each raw entry last changed.
    received_at: HashMap<ShapeId, i64>,
    effective: HashMap<ShapeId, EphemeralOverride>,
}

impl EphemeralLayer {
    #[must_use]
    pub fn new(self_actor: impl Into<ActorId>, stale_after_ms: i64) -> Self {
        Self {
            self_actor: self_actor.into(),
            stale_after_ms,
            raw: HashMap::new(),
            received_at: HashMap::new(),
            effective: HashMap::new(),
        }
    }

    /// Replace the layer with the channel's latest full map.
    ///
    /// Own entries are skipped (the optimistic layer already shows them). Arrival order
    /// decides: the newest delivered map wins regardless of embedded timestamps.
    pub fn apply_remote(
        &mut self,
        incoming: HashMap<ShapeId, EphemeralOverride>,
        presence: &PresenceTracker,
        now_ms: i64,
    ) {
        self.received_at.retain(|id, _| incoming.contains_key(id));
        for (shape_id, entry) in &incoming {
            if self.raw.get(shape_id) == Some(entry) {
                continue;
            }
            self.received_at.insert(shape_id.clone(), now_ms);
            if entry.actor_id != self.self_actor {
                trace!(
                    shape_id = %shape_id,
                    actor_id = %entry.actor_id,
                    latency_ms = now_ms.saturating_sub(entry.ts),
                    "ephemeral override received"
                );
            }
        }
        self.raw = incoming;
        self.refilter(presence, now_ms);
    }

    /// Recompute the effective layer against the roster and the staleness window.
    /// Returns whether anything changed.
    pub fn refilter(&mut self, presence: &PresenceTracker, now_ms: i64) -> bool {
        let filter_online = presence.is_roster_loaded();
        let effective: HashMap<ShapeId, EphemeralOverride> = self
            .raw
            .iter()
            .filter(|(_, entry)| entry.actor_id != self.self_actor)
            .filter(|(_, entry)| !filter_online || presence.is_online(&entry.actor_id, now_ms))
            .filter(|(id, _)| {
                self.received_at
                    .get(*id)
                    .is_some_and(|at| now_ms.saturating_sub(*at) <= self.stale_after_ms)
            })
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();
        if effective == self.effective {
            return false;
        }
        self.effective = effective;
        true
    }

    #[must_use]
    pub fn as_map(&self) -> &HashMap<ShapeId, EphemeralOverride> {
        &self.effective
    }

    #[must_use]
    pub fn get(&self, shape_id: &str) -> Option<&EphemeralOverride> {
        self.effective.get(shape_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.effective.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effective.is_empty()
    }
}

// =============================================================================
// OPTIMISTIC (LOCAL, UNACKNOWLEDGED)
// =============================================================================

/// A local edit awaiting its durable acknowledgment.
#[derive(Debug, Clone, PartialEq)]
pub enum Optimistic {
    /// Shape created locally; the store has not confirmed it yet.
    Created(Shape),
    /// Field overrides on an existing shape.
    Patched(ShapePatch),
    /// Shape deleted locally; hidden until the store confirms.
    Deleted,
}

/// Handle identifying one durable write, returned to the host with the write and
/// handed back on acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteTicket {
    pub shape_id: ShapeId,
    pub seq: u64,
}

/// Local edits not yet confirmed by the durable store.
#[derive(Debug, Clone, Default)]
pub struct OptimisticLayer {
    entries: HashMap<ShapeId, Optimistic>,
    latest_seq: HashMap<ShapeId, u64>,
    next_seq: u64,
}

impl OptimisticLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&mut self, shape_id: &str) -> WriteTicket {
        self.next_seq += 1;
        self.latest_seq.insert(shape_id.to_owned(), self.next_seq);
        WriteTicket { shape_id: shape_id.to_owned(), seq: self.next_seq }
    }

    /// Record a local creation.
    pub fn create(&mut self, shape: Shape) -> WriteTicket {
        let ticket = self.issue(&shape.id);
        self.entries.insert(shape.id.clone(), Optimistic::Created(shape));
        ticket
    }

    /// Record a local field update, folding it into any pending entry for the shape.
    pub fn patch(&mut self, shape_id: &str, patch: &ShapePatch) -> WriteTicket {
        let ticket = self.issue(shape_id);
        match self.entries.get_mut(shape_id) {
            Some(Optimistic::Created(shape)) => shape.apply(patch),
            Some(Optimistic::Patched(pending)) => pending.merge(patch),
            Some(Optimistic::Deleted) => {}
            None => {
                self.entries
                    .insert(shape_id.to_owned(), Optimistic::Patched(patch.clone()));
            }
        }
        ticket
    }

    /// Hold an in-gesture value locally without a durable write behind it.
    ///
    /// The sequence still advances so that an acknowledgment for an earlier write
    /// cannot strip the preview mid-gesture.
    pub fn hold(&mut self, shape_id: &str, patch: &ShapePatch) {
        self.patch(shape_id, patch);
    }

    /// Record a local deletion.
    pub fn delete(&mut self, shape_id: &str) -> WriteTicket {
        let ticket = self.issue(shape_id);
        self.entries.insert(shape_id.to_owned(), Optimistic::Deleted);
        ticket
    }

    /// Settle a write. The entry is dropped only if `ticket` is the newest write for its
    /// shape; success and failure settle the same way because the store subscription is
    /// what re-asserts the truth either way. Returns whether the entry was dropped.
    pub fn settle(&mut self, ticket: &WriteTicket) -> bool {
        // EDGE: keep the override if a newer write for the same shape is still in flight.
        if self.latest_seq.get(&ticket.shape_id) != Some(&ticket.seq) {
            return false;
        }
        self.latest_seq.remove(&ticket.shape_id);
        self.entries.remove(&ticket.shape_id).is_some()
    }

    /// Drop the entry for a shape without waiting for an acknowledgment.
    pub fn discard(&mut self, shape_id: &str) {
        self.latest_seq.remove(shape_id);
        self.entries.remove(shape_id);
    }

    #[must_use]
    pub fn get(&self, shape_id: &str) -> Option<&Optimistic> {
        self.entries.get(shape_id)
    }

    #[must_use]
    pub fn as_map(&self) -> &HashMap<ShapeId, Optimistic> {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
