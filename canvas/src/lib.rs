//! State-synchronization and locking core for a collaborative shape canvas.
//!
//! Several actors edit one shared canvas at once. A durable store owns the
//! authoritative shape list; a low-latency ephemeral channel carries
//! in-gesture previews and cursors. This crate merges those sources with the
//! local actor's unacknowledged edits into one rendered view, arbitrates
//! per-shape advisory locks, throttles outbound broadcasts, and keeps a
//! bounded undo/redo history.
//!
//! Nothing here performs I/O or reads a clock. The host feeds deliveries and
//! user input into [`engine::EngineCore`] and executes the
//! [`engine::Action`]s it returns.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | [`engine::EngineCore`]: every layer wired together |
//! | [`doc`] | Shape model, sparse patches, and the durable base layer |
//! | [`overlay`] | Optimistic (local) and ephemeral (remote) override layers |
//! | [`reconcile`] | Pure three-layer merge into draw order |
//! | [`lock`] | Edit permission, lock arbitration, stale-lock sweep |
//! | [`expiring`] | Time-windowed membership set |
//! | [`history`] | Snapshot undo/redo with replay guard |
//! | [`selection`] | Selection set and multi-shape drag |
//! | [`hit`] | Shape bounds, box selection, point hit-test |
//! | [`throttle`] | Last-value-wins rate limiting for broadcasts |
//! | [`presence`] | Heartbeat and online roster |
//! | [`cursor`] | Remote cursor freshness and filtering |
//! | [`config`] | Engine tuning knobs |
//! | [`consts`] | Default timings and geometry constants |

pub mod config;
pub mod consts;
pub mod cursor;
pub mod doc;
pub mod engine;
pub mod expiring;
pub mod hit;
pub mod history;
pub mod lock;
pub mod overlay;
pub mod presence;
pub mod reconcile;
pub mod selection;
pub mod throttle;
