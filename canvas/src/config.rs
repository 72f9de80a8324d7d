//! Engine tuning knobs.

use crate::consts::{
    CURSOR_STALE_MS, CURSOR_THROTTLE_MS, HISTORY_CAP, LOCK_GRACE_MS, LOCK_SWEEP_INTERVAL_MS,
    PRESENCE_HEARTBEAT_MS, PRESENCE_STALE_MS, PREVIEW_STALE_MS, SHAPE_THROTTLE_MS, UNLOCK_COOLDOWN_MS,
};

/// Timing and behavior settings for [`crate::engine::EngineCore`]. All durations in ms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub cursor_throttle_ms: i64,
    pub shape_throttle_ms: i64,
    pub lock_sweep_interval_ms: i64,
    pub lock_grace_ms: i64,
    pub unlock_cooldown_ms: i64,
    pub presence_heartbeat_ms: i64,
    pub presence_stale_ms: i64,
    pub cursor_stale_ms: i64,
    pub preview_stale_ms: i64,
    pub history_cap: usize,
    /// Acquire locks when shapes are selected and release them on deselect.
    pub lock_on_select: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cursor_throttle_ms: CURSOR_THROTTLE_MS,
            shape_throttle_ms: SHAPE_THROTTLE_MS,
            lock_sweep_interval_ms: LOCK_SWEEP_INTERVAL_MS,
            lock_grace_ms: LOCK_GRACE_MS,
            unlock_cooldown_ms: UNLOCK_COOLDOWN_MS,
            presence_heartbeat_ms: PRESENCE_HEARTBEAT_MS,
            presence_stale_ms: PRESENCE_STALE_MS,
            cursor_stale_ms: CURSOR_STALE_MS,
            preview_stale_ms: PREVIEW_STALE_MS,
            history_cap: HISTORY_CAP,
            lock_on_select: true,
        }
    }
}
