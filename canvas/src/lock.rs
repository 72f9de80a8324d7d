//! Advisory shape locks: edit permission, lock arbitration, and stale-lock
//! reclamation.
//!
//! SYSTEM CONTEXT
//! ==============
//! Locks live on the shape document (`locked_by`) in the durable store. They
//! are advisory: this module decides whether *this* client may edit, but a
//! racing write from another instance still lands (store wins per field).
//!
//! A holder that disconnects without unlocking leaves its shapes stuck. The
//! reclamation sweep finds locks whose holder has been offline past a grace
//! window and releases them. Every instance runs the sweep, so a shape
//! released here goes into a short-lived "recently unlocked" cache and is
//! skipped until the cache entry expires; that keeps two ticks (or a tick and
//! a late store echo) from unlocking the same shape twice.

#[cfg(test)]
#[path = "lock_test.rs"]
mod lock_test;

use crate::doc::{ActorId, Shape, ShapeId};
use crate::expiring::ExpiringSet;
use crate::presence::PresenceTracker;
use crate::selection::Selection;

/// Lock arbitration failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("shape {shape_id} is locked by {holder}")]
    AlreadyLocked { shape_id: ShapeId, holder: ActorId },
    #[error("only the canvas owner may {action}")]
    PermissionDenied { action: &'static str },
}

/// Whether `actor` may edit `shape`: unlocked, locked by `actor`, or `actor` owns the canvas.
#[must_use]
pub fn can_edit(shape: &Shape, actor: &str, is_owner: bool) -> bool {
    match shape.locked_by.as_deref() {
        None => true,
        Some(holder) => holder == actor || is_owner,
    }
}

/// Check that `actor` may take the lock on `shape`.
///
/// A lock held by someone else blocks only while that holder is online; a lock left
/// behind by an offline actor may be taken over.
///
/// # Errors
///
/// Returns [`LockError::AlreadyLocked`] when another online actor holds the lock.
pub fn check_lock(
    shape: &Shape,
    actor: &str,
    presence: &PresenceTracker,
    now_ms: i64,
) -> Result<(), LockError> {
    match shape.locked_by.as_deref() {
        Some(holder) if holder != actor && presence.is_online(holder, now_ms) => {
            Err(LockError::AlreadyLocked { shape_id: shape.id.clone(), holder: holder.to_owned() })
        }
        _ => Ok(()),
    }
}

/// Check that the local actor may perform an owner-only action.
///
/// # Errors
///
/// Returns [`LockError::PermissionDenied`] when `is_owner` is false.
pub fn require_owner(is_owner: bool, action: &'static str) -> Result<(), LockError> {
    if is_owner { Ok(()) } else { Err(LockError::PermissionDenied { action }) }
}

/// Inputs to one reclamation sweep.
pub struct SweepContext<'a> {
    pub self_actor: &'a str,
    pub presence: &'a PresenceTracker,
    pub selection: &'a Selection,
    pub grace_ms: i64,
    pub now_ms: i64,
}

/// Shapes whose locks should be released by this sweep tick.
///
/// A lock qualifies when its holder is someone else, has been offline longer than
/// the grace window, the shape is not selected locally, and the shape is not in the
/// recently-unlocked cache. Returned shapes are added to the cache immediately, so
/// calling this twice in a row yields each shape at most once.
///
/// Before the presence roster has loaded nobody can be judged offline and the sweep
/// yields nothing.
pub fn sweep<'s>(
    shapes: impl IntoIterator<Item = &'s Shape>,
    ctx: &SweepContext<'_>,
    recently_unlocked: &mut ExpiringSet<ShapeId>,
) -> Vec<ShapeId> {
    if !ctx.presence.is_roster_loaded() {
        return Vec::new();
    }

    let mut released = Vec::new();
    for shape in shapes {
        let Some(holder) = shape.locked_by.as_deref() else {
            continue;
        };
        if holder == ctx.self_actor || ctx.selection.contains(&shape.id) {
            continue;
        }
        let Some(offline_ms) = ctx.presence.offline_for(holder, ctx.now_ms) else {
            continue;
        };
        if offline_ms <= ctx.grace_ms {
            continue;
        }
        if recently_unlocked.contains(&shape.id, ctx.now_ms) {
            continue;
        }
        recently_unlocked.insert(shape.id.clone(), ctx.now_ms);
        released.push(shape.id.clone());
    }
    released.sort();
    released
}

/// Shapes whose lock is held by `actor`.
pub fn held_by<'s>(shapes: impl IntoIterator<Item = &'s Shape>, actor: &str) -> Vec<ShapeId> {
    let mut ids: Vec<ShapeId> = shapes
        .into_iter()
        .filter(|shape| shape.locked_by.as_deref() == Some(actor))
        .map(|shape| shape.id.clone())
        .collect();
    ids.sort();
    ids
}
