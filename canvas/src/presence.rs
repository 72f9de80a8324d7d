//! Presence tracking: the local actor's heartbeat and the roster of everyone else.
//!
//! SYSTEM CONTEXT
//! ==============
//! The roster feeds two consumers: the lock reclamation sweep (who has been
//! gone long enough to lose their locks) and the cursor/preview filters (whose
//! ephemeral state should still be shown). Records are never removed; actors
//! only flip to offline.
//!
//! An actor counts as online only when its record says so *and* its last
//! heartbeat is recent. A client that vanished without writing `online =
//! false` therefore ages out on its own.
//!
//! The local actor is removed when, after the roster has shown its own record
//! online, that record turns offline while the page is visible. Only the owner
//! writes such a record, so the tracker stops heartbeating until the next
//! mount.

#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::doc::ActorId;

/// Canvas role of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    #[default]
    Collaborator,
}

/// Presence document for one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: ActorId,
    pub online: bool,
    /// Milliseconds since Unix epoch of the last heartbeat or state change.
    pub last_seen: i64,
    #[serde(default)]
    pub role: Role,
}

/// Local view of who is on the canvas.
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    actor: ActorId,
    role: Role,
    visible: bool,
    mounted: bool,
    heartbeat_ms: i64,
    stale_after_ms: i64,
    last_heartbeat: Option<i64>,
    roster: HashMap<ActorId, PresenceRecord>,
    roster_loaded: bool,
    /// The roster has shown our own record online since the last announcement.
    announced: bool,
    removed: bool,
}

impl PresenceTracker {
    #[must_use]
    pub fn new(actor: impl Into<ActorId>, heartbeat_ms: i64, stale_after_ms: i64) -> Self {
        Self {
            actor: actor.into(),
            role: Role::Collaborator,
            visible: true,
            mounted: false,
            heartbeat_ms,
            stale_after_ms,
            last_heartbeat: None,
            roster: HashMap::new(),
            roster_loaded: false,
            announced: false,
            removed: false,
        }
    }

    #[must_use]
    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    fn own_record(&self, online: bool, now_ms: i64) -> PresenceRecord {
        PresenceRecord { user_id: self.actor.clone(), online, last_seen: now_ms, role: self.role }
    }

    // --- Local actor ---

    /// Session start: announce the local actor as online.
    pub fn mount(&mut self, now_ms: i64) -> PresenceRecord {
        self.mounted = true;
        self.announced = false;
        self.removed = false;
        self.last_heartbeat = Some(now_ms);
        self.own_record(self.visible, now_ms)
    }

    /// Session end: announce the local actor as offline.
    pub fn unmount(&mut self, now_ms: i64) -> PresenceRecord {
        self.mounted = false;
        self.last_heartbeat = None;
        self.own_record(false, now_ms)
    }

    /// Page visibility changed. Hidden pages go offline and stop heartbeating.
    pub fn set_visible(&mut self, visible: bool, now_ms: i64) -> Option<PresenceRecord> {
        if self.visible == visible || !self.mounted || self.removed {
            self.visible = visible;
            return None;
        }
        self.visible = visible;
        self.announced = false;
        self.last_heartbeat = Some(now_ms);
        Some(self.own_record(visible, now_ms))
    }

    /// The heartbeat record to publish, if one is due.
    pub fn heartbeat_due(&mut self, now_ms: i64) -> Option<PresenceRecord> {
        if !self.mounted || !self.visible || self.removed {
            return None;
        }
        if let Some(last) = self.last_heartbeat {
            if now_ms.saturating_sub(last) < self.heartbeat_ms {
                return None;
            }
        }
        self.last_heartbeat = Some(now_ms);
        Some(self.own_record(true, now_ms))
    }

    // --- Roster ---

    /// Replace the roster with the latest presence documents.
    ///
    /// Returns `true` when this roster removes the local actor.
    pub fn apply_roster(&mut self, records: Vec<PresenceRecord>) -> bool {
        self.roster.clear();
        for record in records {
            self.roster.insert(record.user_id.clone(), record);
        }
        self.roster_loaded = true;

        if !self.mounted || !self.visible || self.removed {
            return false;
        }
        match self.roster.get(&self.actor).map(|r| r.online) {
            Some(true) => self.announced = true,
            Some(false) if self.announced => {
                self.removed = true;
                return true;
            }
            _ => {}
        }
        false
    }

    /// Whether the owner removed the local actor during this mount.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Whether the roster subscription has delivered at least once.
    #[must_use]
    pub fn is_roster_loaded(&self) -> bool {
        self.roster_loaded
    }

    #[must_use]
    pub fn record(&self, actor: &str) -> Option<&PresenceRecord> {
        self.roster.get(actor)
    }

    fn is_fresh(&self, record: &PresenceRecord, now_ms: i64) -> bool {
        record.online && now_ms.saturating_sub(record.last_seen) <= self.stale_after_ms
    }

    /// Whether `actor` is online at `now_ms`.
    #[must_use]
    pub fn is_online(&self, actor: &str, now_ms: i64) -> bool {
        self.roster
            .get(actor)
            .is_some_and(|record| self.is_fresh(record, now_ms))
    }

    /// How long `actor` has been offline, or `None` while online.
    ///
    /// Actors missing from a loaded roster have never been seen and count as offline
    /// for an unbounded time.
    #[must_use]
    pub fn offline_for(&self, actor: &str, now_ms: i64) -> Option<i64> {
        match self.roster.get(actor) {
            Some(record) if self.is_fresh(record, now_ms) => None,
            Some(record) => Some(now_ms.saturating_sub(record.last_seen).max(0)),
            None => Some(i64::MAX),
        }
    }

    /// Online actors, ordered by id.
    #[must_use]
    pub fn online_users(&self, now_ms: i64) -> Vec<PresenceRecord> {
        let mut users: Vec<PresenceRecord> = self
            .roster
            .values()
            .filter(|record| self.is_fresh(record, now_ms))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        users
    }

    /// Offline record for an actor removed by the owner.
    #[must_use]
    pub fn kicked_record(&self, target: &str, now_ms: i64) -> PresenceRecord {
        let role = self.roster.get(target).map_or(Role::Collaborator, |r| r.role);
        PresenceRecord { user_id: target.to_owned(), online: false, last_seen: now_ms, role }
    }
}
