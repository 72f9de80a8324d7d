//! Engine core: every layer wired together behind one owner.
//!
//! SYSTEM CONTEXT
//! ==============
//! `EngineCore` is synchronous and never performs I/O. Store and channel
//! deliveries come in through the `apply_*` methods; user intents come in
//! through the request methods. Anything that must reach the outside world is
//! returned as an [`Action`] for the host to execute. Durable writes carry a
//! [`WriteTicket`] which the host hands back to [`EngineCore::settle`] once the
//! write finishes, successfully or not.
//!
//! Time is always passed in as `now_ms`; the engine never reads a clock.
//!
//! GESTURES
//! ========
//! Move, resize and rotate run in two phases. `Phase::Preview` updates the
//! optimistic layer and schedules a throttled ephemeral broadcast, without
//! touching the durable store. `Phase::Commit` writes the final value
//! durably and clears the broadcast. The history snapshot is taken once, at
//! the first event of a gesture.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::cursor::{CursorBoard, CursorPosition, RemoteCursor};
use crate::doc::{ActorId, CanvasMetadata, DocStore, Shape, ShapeId, ShapeKind, ShapePatch};
use crate::expiring::ExpiringSet;
use crate::hit::{self, Bounds, Point};
use crate::history::{History, Snapshot};
use crate::lock::{self, LockError, SweepContext};
use crate::overlay::{EphemeralLayer, EphemeralOverride, OptimisticLayer, WriteTicket};
use crate::presence::{PresenceRecord, PresenceTracker, Role};
use crate::reconcile::reconcile;
use crate::selection::{self, Selection};
use crate::throttle::{KeyedThrottle, Throttle};

/// Side effects returned from engine methods for the host to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Durable create. Settle `ticket` when done.
    CreateShape { ticket: WriteTicket, shape: Shape },
    /// Durable field update on `ticket.shape_id`.
    UpdateShape { ticket: WriteTicket, patch: ShapePatch },
    /// Durable delete of `ticket.shape_id`.
    DeleteShape { ticket: WriteTicket },
    /// Set `locked_by` to the local actor.
    LockShape { ticket: WriteTicket },
    /// Clear `locked_by`.
    UnlockShape { ticket: WriteTicket },
    /// Owner takeover of a lock held by someone else.
    OverrideLock { ticket: WriteTicket },
    /// Background release of an abandoned lock. Failures are not surfaced.
    ReleaseStaleLock { shape_id: ShapeId },
    /// Broadcast an in-gesture preview.
    PublishPreview { shape_id: ShapeId, preview: EphemeralOverride },
    /// Withdraw an in-gesture preview.
    ClearPreview { shape_id: ShapeId },
    PublishCursor(CursorPosition),
    ClearCursor,
    /// Write a presence document (own heartbeat, or a kicked actor).
    SetPresence(PresenceRecord),
}

/// Stage of an interactive gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Pointer still down: update locally and broadcast a preview.
    Preview,
    /// Pointer released: write durably.
    Commit,
}

/// Why a local edit request was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("shape {shape_id} not found")]
    NotFound { shape_id: ShapeId },
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// All synchronization state for one actor on one canvas.
pub struct EngineCore {
    actor: ActorId,
    config: EngineConfig,
    doc: DocStore,
    optimistic: OptimisticLayer,
    ephemeral: EphemeralLayer,
    rendered: Vec<Shape>,
    selection: Selection,
    history: History,
    presence: PresenceTracker,
    cursors: CursorBoard,
    recently_unlocked: ExpiringSet<ShapeId>,
    previews: KeyedThrottle<ShapeId, EphemeralOverride>,
    cursor_gate: Throttle<CursorPosition>,
    gesture: Option<BTreeSet<ShapeId>>,
    replay_tickets: HashSet<WriteTicket>,
    metadata: Option<CanvasMetadata>,
    last_sweep: Option<i64>,
}

impl EngineCore {
    #[must_use]
    pub fn new(actor: impl Into<ActorId>, config: EngineConfig) -> Self {
        let actor = actor.into();
        Self {
            presence: PresenceTracker::new(
                actor.clone(),
                config.presence_heartbeat_ms,
                config.presence_stale_ms,
            ),
            cursors: CursorBoard::new(actor.clone(), config.cursor_stale_ms),
            ephemeral: EphemeralLayer::new(actor.clone(), config.preview_stale_ms),
            recently_unlocked: ExpiringSet::new(config.unlock_cooldown_ms),
            previews: KeyedThrottle::new(config.shape_throttle_ms),
            cursor_gate: Throttle::new(config.cursor_throttle_ms),
            history: History::new(config.history_cap),
            doc: DocStore::new(),
            optimistic: OptimisticLayer::new(),
            rendered: Vec::new(),
            selection: Selection::new(),
            gesture: None,
            replay_tickets: HashSet::new(),
            metadata: None,
            last_sweep: None,
            actor,
            config,
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The reconciled shape list in draw order.
    #[must_use]
    pub fn shapes(&self) -> &[Shape] {
        &self.rendered
    }

    #[must_use]
    pub fn shape(&self, id: &str) -> Option<&Shape> {
        self.rendered.iter().find(|s| s.id == id)
    }

    /// Whether the durable store has delivered its first snapshot.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.doc.is_loaded()
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&CanvasMetadata> {
        self.metadata.as_ref()
    }

    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.owner_id == self.actor)
    }

    /// Whether the local actor may edit `shape`.
    #[must_use]
    pub fn can_edit(&self, shape: &Shape) -> bool {
        lock::can_edit(shape, &self.actor, self.is_owner())
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    #[must_use]
    pub fn is_replaying(&self) -> bool {
        self.history.is_replaying()
    }

    /// Number of shapes with a local edit still waiting for the store.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.optimistic.len()
    }

    #[must_use]
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Whether the owner removed the local actor from the canvas.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.presence.is_removed()
    }

    #[must_use]
    pub fn cursors(&self, now_ms: i64) -> Vec<RemoteCursor> {
        self.cursors.visible(&self.presence, now_ms)
    }

    #[must_use]
    pub fn online_users(&self, now_ms: i64) -> Vec<PresenceRecord> {
        self.presence.online_users(now_ms)
    }

    /// Front-most rendered shape under `pt`.
    #[must_use]
    pub fn hit_test(&self, pt: Point) -> Option<&Shape> {
        hit::hit_test(&self.rendered, pt)
    }

    // =========================================================================
    // STORE AND CHANNEL DELIVERIES
    // =========================================================================

    /// Replace the base layer with the store's latest shape list.
    pub fn apply_shapes(&mut self, shapes: Vec<Shape>) {
        self.doc.load_snapshot(shapes);
        self.refresh();
    }

    pub fn apply_metadata(&mut self, metadata: CanvasMetadata) {
        let role = if metadata.owner_id == self.actor { Role::Owner } else { Role::Collaborator };
        self.presence.set_role(role);
        self.metadata = Some(metadata);
    }

    /// Replace the presence roster. Previews from actors who went offline disappear.
    pub fn apply_presence(&mut self, records: Vec<PresenceRecord>, now_ms: i64) {
        if self.presence.apply_roster(records) {
            info!(actor = %self.actor, "removed from the canvas by the owner");
        }
        self.ephemeral.refilter(&self.presence, now_ms);
        self.refresh();
    }

    pub fn apply_remote_previews(
        &mut self,
        previews: HashMap<ShapeId, EphemeralOverride>,
        now_ms: i64,
    ) {
        self.ephemeral.apply_remote(previews, &self.presence, now_ms);
        self.refresh();
    }

    pub fn apply_remote_cursors(&mut self, cursors: HashMap<ActorId, CursorPosition>, now_ms: i64) {
        self.cursors.apply_remote(cursors, now_ms);
    }

    /// A durable write finished. Success and failure are handled alike: the optimistic
    /// entry is dropped (if still current) and the store subscription provides truth.
    pub fn settle(&mut self, ticket: &WriteTicket) {
        self.optimistic.settle(ticket);
        if self.replay_tickets.remove(ticket) && self.replay_tickets.is_empty() {
            self.history.end_replay();
        }
        self.refresh();
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Session start: announce presence and start the sweep clock.
    pub fn mount(&mut self, now_ms: i64) -> Vec<Action> {
        self.last_sweep = Some(now_ms);
        vec![Action::SetPresence(self.presence.mount(now_ms))]
    }

    pub fn set_visible(&mut self, visible: bool, now_ms: i64) -> Vec<Action> {
        self.presence
            .set_visible(visible, now_ms)
            .map(Action::SetPresence)
            .into_iter()
            .collect()
    }

    /// Periodic work: release throttled broadcasts, expire remote previews, heartbeat,
    /// and the lock sweep.
    pub fn tick(&mut self, now_ms: i64) -> Vec<Action> {
        if self.ephemeral.refilter(&self.presence, now_ms) {
            self.refresh();
        }
        let mut actions: Vec<Action> = self
            .previews
            .poll(now_ms)
            .into_iter()
            .map(|(shape_id, preview)| Action::PublishPreview { shape_id, preview })
            .collect();
        if let Some(position) = self.cursor_gate.poll(now_ms) {
            actions.push(Action::PublishCursor(position));
        }
        if let Some(record) = self.presence.heartbeat_due(now_ms) {
            actions.push(Action::SetPresence(record));
        }
        if self.sweep_due(now_ms) {
            actions.extend(self.sweep_locks(now_ms));
        }
        actions
    }

    fn sweep_due(&mut self, now_ms: i64) -> bool {
        match self.last_sweep {
            None => {
                self.last_sweep = Some(now_ms);
                false
            }
            Some(last) => now_ms.saturating_sub(last) >= self.config.lock_sweep_interval_ms,
        }
    }

    /// Run the lock reclamation sweep now.
    pub fn sweep_locks(&mut self, now_ms: i64) -> Vec<Action> {
        self.last_sweep = Some(now_ms);
        let ctx = SweepContext {
            self_actor: &self.actor,
            presence: &self.presence,
            selection: &self.selection,
            grace_ms: self.config.lock_grace_ms,
            now_ms,
        };
        let released = lock::sweep(self.doc.iter(), &ctx, &mut self.recently_unlocked);
        released
            .into_iter()
            .map(|shape_id| {
                info!(shape_id = %shape_id, "releasing stale lock");
                Action::ReleaseStaleLock { shape_id }
            })
            .collect()
    }

    /// Session end: withdraw previews and cursor, release own locks, go offline.
    pub fn shutdown(&mut self, now_ms: i64) -> Vec<Action> {
        let mut actions = self.abandon_gesture();
        self.cursor_gate.cancel();
        actions.push(Action::ClearCursor);
        for shape_id in lock::held_by(&self.rendered, &self.actor) {
            let ticket = self.optimistic.patch(&shape_id, &ShapePatch::lock(None));
            actions.push(Action::UnlockShape { ticket });
        }
        actions.push(Action::SetPresence(self.presence.unmount(now_ms)));
        self.refresh();
        actions
    }

    // =========================================================================
    // SELECTION
    // =========================================================================

    /// Replace (or extend, with `add`) the selection. Unknown ids are ignored.
    pub fn select(&mut self, ids: Vec<ShapeId>, add: bool, now_ms: i64) -> Vec<Action> {
        let before = self.selection.ids().to_vec();
        let known: Vec<ShapeId> = ids.into_iter().filter(|id| self.shape(id).is_some()).collect();
        self.selection.select(known, add);

        let mut actions = self.release_deselected(&before);
        if self.config.lock_on_select {
            actions.extend(self.acquire_selected(now_ms));
        }
        self.refresh();
        actions
    }

    /// Remove `ids` from the selection, or clear it when `None`.
    pub fn deselect(&mut self, ids: Option<&[ShapeId]>) -> Vec<Action> {
        let before = self.selection.ids().to_vec();
        self.selection.deselect(ids);
        let actions = self.release_deselected(&before);
        self.refresh();
        actions
    }

    /// Select every shape whose bounds intersect the box spanned by `a` and `b`.
    pub fn select_box(&mut self, a: Point, b: Point, add: bool, now_ms: i64) -> Vec<Action> {
        let ids = hit::box_select(&self.rendered, &Bounds::from_corners(a, b));
        self.select(ids, add, now_ms)
    }

    pub fn select_all(&mut self, now_ms: i64) -> Vec<Action> {
        let ids = self.rendered.iter().map(|s| s.id.clone()).collect();
        self.select(ids, false, now_ms)
    }

    /// Click at `pt`: select the shape under it, or clear the selection on empty canvas.
    pub fn click(&mut self, pt: Point, add: bool, now_ms: i64) -> Vec<Action> {
        match self.hit_test(pt).map(|s| s.id.clone()) {
            Some(id) => self.select(vec![id], add, now_ms),
            None if !add => self.deselect(None),
            None => Vec::new(),
        }
    }

    fn release_deselected(&mut self, before: &[ShapeId]) -> Vec<Action> {
        if !self.config.lock_on_select {
            return Vec::new();
        }
        let mut actions = Vec::new();
        for id in before {
            if self.selection.contains(id) {
                continue;
            }
            let held = self
                .shape(id)
                .is_some_and(|s| s.locked_by.as_deref() == Some(self.actor.as_str()));
            if held {
                let ticket = self.optimistic.patch(id, &ShapePatch::lock(None));
                actions.push(Action::UnlockShape { ticket });
            }
        }
        actions
    }

    fn acquire_selected(&mut self, now_ms: i64) -> Vec<Action> {
        let mut actions = Vec::new();
        for id in self.selection.ids().to_vec() {
            let Some(shape) = self.shape(&id) else {
                continue;
            };
            if shape.locked_by.as_deref() == Some(self.actor.as_str()) {
                continue;
            }
            if lock::check_lock(shape, &self.actor, &self.presence, now_ms).is_err() {
                debug!(shape_id = %id, "selected shape is locked elsewhere");
                continue;
            }
            let ticket = self.optimistic.patch(&id, &ShapePatch::lock(Some(self.actor.clone())));
            actions.push(Action::LockShape { ticket });
        }
        actions
    }

    // =========================================================================
    // EDITS
    // =========================================================================

    fn rendered_shape(&self, id: &str) -> Result<&Shape, EditError> {
        self.shape(id).ok_or_else(|| EditError::NotFound { shape_id: id.to_owned() })
    }

    fn editable(&self, id: &str) -> Result<&Shape, EditError> {
        let shape = self.rendered_shape(id)?;
        if self.can_edit(shape) {
            return Ok(shape);
        }
        Err(LockError::AlreadyLocked {
            shape_id: shape.id.clone(),
            holder: shape.locked_by.clone().unwrap_or_default(),
        }
        .into())
    }

    /// Create a shape. Ownership fields and the z-index (in front of everything) are
    /// assigned here.
    pub fn request_create(&mut self, shape: Shape, now_ms: i64) -> Vec<Action> {
        let z_index = self.rendered.iter().map(|s| s.z_index).max().map_or(0, |z| z + 1);
        let shape = Shape {
            created_by: self.actor.clone(),
            locked_by: None,
            updated_at: now_ms,
            z_index,
            ..shape
        };
        self.history.take_snapshot(&self.rendered);
        let ticket = self.optimistic.create(shape.clone());
        self.refresh();
        vec![Action::CreateShape { ticket, shape }]
    }

    /// Move `id` to `(x, y)`, carrying the rest of the selection by the same delta.
    ///
    /// # Errors
    ///
    /// Fails when the shape is not rendered or the local actor may not edit it.
    pub fn request_move(
        &mut self,
        id: &str,
        x: f64,
        y: f64,
        phase: Phase,
        now_ms: i64,
    ) -> Result<Vec<Action>, EditError> {
        self.editable(id)?;
        let is_owner = self.is_owner();
        let patches = selection::group_drag(&self.rendered, &self.selection, id, x, y, |s| {
            lock::can_edit(s, &self.actor, is_owner)
        });
        Ok(self.apply_edit(patches, phase, now_ms))
    }

    /// Resize `id` to fit a `width` x `height` box.
    ///
    /// Circles take the larger side as their diameter; lines scale their points.
    ///
    /// # Errors
    ///
    /// Fails when the shape is not rendered or the local actor may not edit it.
    pub fn request_resize(
        &mut self,
        id: &str,
        width: f64,
        height: f64,
        phase: Phase,
        now_ms: i64,
    ) -> Result<Vec<Action>, EditError> {
        let patch = resize_patch(self.editable(id)?, width.max(0.0), height.max(0.0));
        Ok(self.apply_edit(vec![(id.to_owned(), patch)], phase, now_ms))
    }

    /// # Errors
    ///
    /// Fails when the shape is not rendered or the local actor may not edit it.
    pub fn request_rotate(
        &mut self,
        id: &str,
        degrees: f64,
        phase: Phase,
        now_ms: i64,
    ) -> Result<Vec<Action>, EditError> {
        self.editable(id)?;
        Ok(self.apply_edit(vec![(id.to_owned(), ShapePatch::rotation(degrees))], phase, now_ms))
    }

    /// Durable one-shot field update (text edits, styling). Lock fields are ignored.
    ///
    /// # Errors
    ///
    /// Fails when the shape is not rendered or the local actor may not edit it.
    pub fn request_update(
        &mut self,
        id: &str,
        patch: &ShapePatch,
        now_ms: i64,
    ) -> Result<Vec<Action>, EditError> {
        self.editable(id)?;
        let patch = patch.without_lock();
        if patch.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.apply_edit(vec![(id.to_owned(), patch)], Phase::Commit, now_ms))
    }

    /// # Errors
    ///
    /// Fails when the shape is not rendered or the local actor may not edit it.
    pub fn request_delete(&mut self, id: &str) -> Result<Vec<Action>, EditError> {
        self.editable(id)?;
        self.history.take_snapshot(&self.rendered);
        self.previews.cancel(&id.to_owned());
        let ticket = self.optimistic.delete(id);
        self.refresh();
        Ok(vec![Action::DeleteShape { ticket }])
    }

    /// Raise `id` above every other shape. No-op when it is already alone in front.
    ///
    /// # Errors
    ///
    /// Fails when the shape is not rendered or the local actor may not edit it.
    pub fn bring_to_front(&mut self, id: &str, now_ms: i64) -> Result<Vec<Action>, EditError> {
        let current = self.editable(id)?.z_index;
        let top = self.rendered.iter().filter(|s| s.id != id).map(|s| s.z_index).max();
        match top {
            Some(top) if top >= current => {
                let patch = ShapePatch { z_index: Some(top + 1), ..ShapePatch::default() };
                Ok(self.apply_edit(vec![(id.to_owned(), patch)], Phase::Commit, now_ms))
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Lower `id` below every other shape. No-op when it is already alone at the back.
    ///
    /// # Errors
    ///
    /// Fails when the shape is not rendered or the local actor may not edit it.
    pub fn send_to_back(&mut self, id: &str, now_ms: i64) -> Result<Vec<Action>, EditError> {
        let current = self.editable(id)?.z_index;
        let bottom = self.rendered.iter().filter(|s| s.id != id).map(|s| s.z_index).min();
        match bottom {
            Some(bottom) if bottom <= current => {
                let patch = ShapePatch { z_index: Some(bottom - 1), ..ShapePatch::default() };
                Ok(self.apply_edit(vec![(id.to_owned(), patch)], Phase::Commit, now_ms))
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Abort the current gesture: local previews are discarded and withdrawn.
    pub fn cancel_gesture(&mut self) -> Vec<Action> {
        let actions = self.abandon_gesture();
        self.refresh();
        actions
    }

    fn abandon_gesture(&mut self) -> Vec<Action> {
        let Some(touched) = self.gesture.take() else {
            return Vec::new();
        };
        touched
            .into_iter()
            .map(|shape_id| {
                self.previews.cancel(&shape_id);
                self.optimistic.discard(&shape_id);
                Action::ClearPreview { shape_id }
            })
            .collect()
    }

    /// Shapes touched so far by the running gesture. Starting a gesture records the
    /// undo point.
    fn take_gesture(&mut self) -> BTreeSet<ShapeId> {
        if let Some(touched) = self.gesture.take() {
            return touched;
        }
        self.history.take_snapshot(&self.rendered);
        BTreeSet::new()
    }

    fn apply_edit(
        &mut self,
        patches: Vec<(ShapeId, ShapePatch)>,
        phase: Phase,
        now_ms: i64,
    ) -> Vec<Action> {
        let mut actions = Vec::new();
        match phase {
            Phase::Preview => {
                let mut touched = self.take_gesture();
                for (shape_id, patch) in patches {
                    self.optimistic.hold(&shape_id, &patch);
                    let preview =
                        EphemeralOverride { actor_id: self.actor.clone(), patch, ts: now_ms };
                    self.previews.offer(shape_id.clone(), preview, now_ms);
                    touched.insert(shape_id);
                }
                self.gesture = Some(touched);
            }
            Phase::Commit => {
                let touched = self.take_gesture();
                for (shape_id, mut patch) in patches {
                    patch.updated_at = Some(now_ms);
                    let ticket = self.optimistic.patch(&shape_id, &patch);
                    actions.push(Action::UpdateShape { ticket, patch });
                }
                for shape_id in touched {
                    self.previews.cancel(&shape_id);
                    actions.push(Action::ClearPreview { shape_id });
                }
            }
        }
        self.refresh();
        actions
    }

    // =========================================================================
    // LOCKS
    // =========================================================================

    /// Take the lock on `id` for the local actor. Already holding it is a no-op.
    ///
    /// # Errors
    ///
    /// Fails when the shape is not rendered or another online actor holds the lock.
    pub fn lock(&mut self, id: &str, now_ms: i64) -> Result<Vec<Action>, EditError> {
        let shape = self.rendered_shape(id)?;
        if shape.locked_by.as_deref() == Some(self.actor.as_str()) {
            return Ok(Vec::new());
        }
        lock::check_lock(shape, &self.actor, &self.presence, now_ms)?;
        let ticket = self.optimistic.patch(id, &ShapePatch::lock(Some(self.actor.clone())));
        self.refresh();
        Ok(vec![Action::LockShape { ticket }])
    }

    /// Clear the lock on `id`, whoever holds it.
    ///
    /// # Errors
    ///
    /// Fails when the shape is not rendered.
    pub fn unlock(&mut self, id: &str) -> Result<Vec<Action>, EditError> {
        self.rendered_shape(id)?;
        let ticket = self.optimistic.patch(id, &ShapePatch::lock(None));
        self.refresh();
        Ok(vec![Action::UnlockShape { ticket }])
    }

    /// Owner takeover: reassign the lock on `id` to the local actor unconditionally.
    ///
    /// # Errors
    ///
    /// Fails when the shape is not rendered or the local actor does not own the canvas.
    pub fn override_lock(&mut self, id: &str) -> Result<Vec<Action>, EditError> {
        self.rendered_shape(id)?;
        lock::require_owner(self.is_owner(), "override a lock")?;
        let ticket = self.optimistic.patch(id, &ShapePatch::lock(Some(self.actor.clone())));
        self.refresh();
        Ok(vec![Action::OverrideLock { ticket }])
    }

    /// Remove `target` from the canvas: mark them offline and release their locks.
    ///
    /// # Errors
    ///
    /// Fails when the local actor does not own the canvas.
    pub fn kick(&mut self, target: &str, now_ms: i64) -> Result<Vec<Action>, EditError> {
        lock::require_owner(self.is_owner(), "remove a collaborator")?;
        let mut actions = vec![Action::SetPresence(self.presence.kicked_record(target, now_ms))];
        for shape_id in lock::held_by(&self.rendered, target) {
            self.recently_unlocked.insert(shape_id.clone(), now_ms);
            let ticket = self.optimistic.patch(&shape_id, &ShapePatch::lock(None));
            actions.push(Action::UnlockShape { ticket });
        }
        info!(target_actor = %target, released = actions.len() - 1, "collaborator removed");
        self.refresh();
        Ok(actions)
    }

    // =========================================================================
    // CURSOR
    // =========================================================================

    /// Local pointer moved. Broadcast happens from [`EngineCore::tick`].
    pub fn pointer_moved(&mut self, x: f64, y: f64, now_ms: i64) {
        self.cursor_gate.offer(CursorPosition { x, y, ts: now_ms }, now_ms);
    }

    /// Local pointer left the canvas.
    pub fn pointer_left(&mut self) -> Vec<Action> {
        self.cursor_gate.cancel();
        vec![Action::ClearCursor]
    }

    // =========================================================================
    // HISTORY
    // =========================================================================

    pub fn undo(&mut self, now_ms: i64) -> Vec<Action> {
        match self.history.undo(&self.rendered) {
            Some(target) => self.replay(&target, now_ms),
            None => Vec::new(),
        }
    }

    pub fn redo(&mut self, now_ms: i64) -> Vec<Action> {
        match self.history.redo(&self.rendered) {
            Some(target) => self.replay(&target, now_ms),
            None => Vec::new(),
        }
    }

    /// Turn a history snapshot into the writes that make the canvas match it.
    ///
    /// Shapes another actor currently holds are left alone. Lock state is never
    /// written. The replay guard drops once every write has settled.
    fn replay(&mut self, target: &Snapshot, now_ms: i64) -> Vec<Action> {
        let current = self.rendered.clone();
        let current_by_id: HashMap<&str, &Shape> =
            current.iter().map(|s| (s.id.as_str(), s)).collect();
        let target_ids: HashSet<&str> = target.iter().map(|s| s.id.as_str()).collect();
        let mut actions = Vec::new();

        for wanted in target {
            match current_by_id.get(wanted.id.as_str()) {
                None => {
                    let shape = Shape { updated_at: now_ms, ..wanted.clone() };
                    let ticket = self.optimistic.create(shape.clone());
                    self.replay_tickets.insert(ticket.clone());
                    actions.push(Action::CreateShape { ticket, shape });
                }
                Some(existing) => {
                    if !self.can_edit(existing) {
                        debug!(shape_id = %wanted.id, "replay skipped locked shape");
                        continue;
                    }
                    let mut patch = ShapePatch::diff(existing, wanted);
                    if patch.is_empty() {
                        continue;
                    }
                    patch.updated_at = Some(now_ms);
                    let ticket = self.optimistic.patch(&wanted.id, &patch);
                    self.replay_tickets.insert(ticket.clone());
                    actions.push(Action::UpdateShape { ticket, patch });
                }
            }
        }

        for existing in &current {
            if target_ids.contains(existing.id.as_str()) {
                continue;
            }
            if !self.can_edit(existing) {
                debug!(shape_id = %existing.id, "replay skipped locked shape");
                continue;
            }
            let ticket = self.optimistic.delete(&existing.id);
            self.replay_tickets.insert(ticket.clone());
            actions.push(Action::DeleteShape { ticket });
        }

        if self.replay_tickets.is_empty() {
            self.history.end_replay();
        }
        self.refresh();
        actions
    }

    // =========================================================================
    // RECONCILE
    // =========================================================================

    fn refresh(&mut self) {
        self.rendered = reconcile(self.doc.as_map(), self.ephemeral.as_map(), self.optimistic.as_map());
        let live: HashSet<&str> = self.rendered.iter().map(|s| s.id.as_str()).collect();
        let removed = self.selection.retain_existing(|id| live.contains(id));
        if !removed.is_empty() {
            debug!(count = removed.len(), "vanished shapes dropped from selection");
        }
    }
}

fn resize_patch(shape: &Shape, width: f64, height: f64) -> ShapePatch {
    match shape.kind {
        ShapeKind::Rectangle | ShapeKind::Text => {
            ShapePatch { width: Some(width), height: Some(height), ..ShapePatch::default() }
        }
        ShapeKind::Circle => ShapePatch { radius: Some(width.max(height) / 2.0), ..ShapePatch::default() },
        ShapeKind::Line => {
            let bounds = hit::shape_bounds(shape);
            let sx = if bounds.width() > 0.0 { width / bounds.width() } else { 1.0 };
            let sy = if bounds.height() > 0.0 { height / bounds.height() } else { 1.0 };
            let points = shape
                .points
                .as_deref()
                .unwrap_or(&[])
                .iter()
                .enumerate()
                .map(|(i, v)| if i % 2 == 0 { v * sx } else { v * sy })
                .collect();
            ShapePatch { points: Some(points), ..ShapePatch::default() }
        }
    }
}
