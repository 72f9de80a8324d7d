//! Session configuration from the environment.
//!
//! Every knob falls back to the engine default when the variable is missing
//! or does not parse.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use canvas::config::EngineConfig;

/// How often the session drives [`canvas::engine::EngineCore::tick`].
pub const DEFAULT_TICK_MS: u64 = 25;

/// Host-side settings: the engine's knobs plus the session's tick cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub engine: EngineConfig,
    pub tick_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { engine: EngineConfig::default(), tick_ms: DEFAULT_TICK_MS }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let d = EngineConfig::default();
        let engine = EngineConfig {
            cursor_throttle_ms: env_parse("CURSOR_THROTTLE_MS", d.cursor_throttle_ms),
            shape_throttle_ms: env_parse("SHAPE_THROTTLE_MS", d.shape_throttle_ms),
            lock_sweep_interval_ms: env_parse("LOCK_SWEEP_INTERVAL_MS", d.lock_sweep_interval_ms),
            lock_grace_ms: env_parse("LOCK_GRACE_MS", d.lock_grace_ms),
            unlock_cooldown_ms: env_parse("UNLOCK_COOLDOWN_MS", d.unlock_cooldown_ms),
            presence_heartbeat_ms: env_parse("PRESENCE_HEARTBEAT_MS", d.presence_heartbeat_ms),
            presence_stale_ms: env_parse("PRESENCE_STALE_MS", d.presence_stale_ms),
            cursor_stale_ms: env_parse("CURSOR_STALE_MS", d.cursor_stale_ms),
            preview_stale_ms: env_parse("PREVIEW_STALE_MS", d.preview_stale_ms),
            history_cap: env_parse("HISTORY_CAP", d.history_cap),
            lock_on_select: env_parse("LOCK_ON_SELECT", d.lock_on_select),
        };
        Self { engine, tick_ms: env_parse("TICK_MS", DEFAULT_TICK_MS).max(1) }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
