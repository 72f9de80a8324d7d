//! Lock writes against the durable store.
//!
//! Arbitration (who may lock what, which locks are stale) lives in the engine.
//! This module only executes the resulting writes. User-initiated writes return
//! their error so the session can roll back and notify; sweep releases log and
//! swallow theirs.

#[cfg(test)]
#[path = "lock_test.rs"]
mod lock_test;

use tracing::{debug, info, warn};

use crate::adapters::DurableStore;
use crate::error::{ErrorCode, SessionError, StoreError};

/// A lock write requested by the local actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockWrite {
    Acquire,
    Release,
    Override,
}

/// Run one lock write for `actor` on `shape_id`.
///
/// # Errors
///
/// Returns the store's error unchanged.
pub async fn write(
    store: &dyn DurableStore,
    kind: LockWrite,
    shape_id: &str,
    actor: &str,
) -> Result<(), StoreError> {
    let result = match kind {
        LockWrite::Acquire => store.lock_shape(shape_id, actor).await,
        LockWrite::Release => store.unlock_shape(shape_id).await,
        LockWrite::Override => store.override_lock(shape_id, actor).await,
    };
    match &result {
        Ok(()) => debug!(shape_id, actor, ?kind, "lock write applied"),
        Err(e) => warn!(shape_id, actor, ?kind, code = e.error_code(), error = %e, "lock write failed"),
    }
    result
}

/// Release an abandoned lock found by the sweep. Never fails.
pub async fn release_stale(store: &dyn DurableStore, shape_id: &str) {
    match store.unlock_shape(shape_id).await {
        Ok(()) => {
            let healed = SessionError::StaleLock { shape_id: shape_id.to_owned() };
            info!(shape_id, code = healed.error_code(), "{healed}");
        }
        Err(e) => warn!(shape_id, code = e.error_code(), error = %e, "stale lock release failed"),
    }
}
