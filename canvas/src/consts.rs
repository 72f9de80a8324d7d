//! Shared numeric constants for the canvas crate.
//!
//! Durations are milliseconds. Every timing value here is only a default;
//! hosts override them through [`crate::config::EngineConfig`].

// ── Throttling ──────────────────────────────────────────────────

/// Minimum spacing between two cursor broadcasts.
pub const CURSOR_THROTTLE_MS: i64 = 50;

/// Minimum spacing between two live-preview broadcasts for the same shape.
pub const SHAPE_THROTTLE_MS: i64 = 50;

// ── Locks ───────────────────────────────────────────────────────

/// How often the reclamation sweep runs.
pub const LOCK_SWEEP_INTERVAL_MS: i64 = 30_000;

/// How long a lock holder must be offline before the sweep may release its locks.
pub const LOCK_GRACE_MS: i64 = 10_000;

/// How long a sweep-released shape is skipped by later sweeps.
pub const UNLOCK_COOLDOWN_MS: i64 = 60_000;

// ── Presence ────────────────────────────────────────────────────

/// Interval between presence heartbeats for the local actor.
pub const PRESENCE_HEARTBEAT_MS: i64 = 15_000;

/// An `online` record whose heartbeat is older than this is treated as offline.
pub const PRESENCE_STALE_MS: i64 = 45_000;

/// Remote cursors not refreshed within this window are hidden.
pub const CURSOR_STALE_MS: i64 = 30_000;

/// Remote previews not refreshed within this window are hidden.
pub const PREVIEW_STALE_MS: i64 = 1_500;

// ── History ─────────────────────────────────────────────────────

/// Maximum entries kept on each of the undo and redo stacks.
pub const HISTORY_CAP: usize = 50;

// ── Geometry ────────────────────────────────────────────────────

/// Font size used when a text shape does not store one.
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// Line height as a multiple of the font size, for text bounds estimation.
pub const TEXT_LINE_HEIGHT: f64 = 1.2;

/// Average glyph advance as a multiple of the font size, for text width estimation.
pub const TEXT_GLYPH_WIDTH: f64 = 0.6;
