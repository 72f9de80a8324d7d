//! Canvas session: one actor on one canvas.
//!
//! ARCHITECTURE
//! ============
//! `Session` owns the [`EngineCore`] and the collaborator handles. It is the
//! only thing that mutates engine state:
//!
//! - Store and channel subscriptions never touch the engine. Their callbacks
//!   push an `Event` onto the session's unbounded queue, and the session
//!   applies events in arrival order (`pump`, `settle`, `run`).
//! - UI calls go straight into the engine, which updates the optimistic layer
//!   synchronously and returns `Action`s. Durable writes are spawned as tokio
//!   tasks; each reports back with a `Settled` event carrying its ticket.
//! - Broadcasts (previews, cursors, presence, stale-lock releases) are spawned
//!   the same way but only report completion. Their failures are logged.
//!
//! TRADE-OFFS
//! ==========
//! The queue is unbounded because adapter callbacks are synchronous and may
//! not block. Back-pressure comes from the engine's throttles, not the queue.
//!
//! A failed write is not compensated. The optimistic entry is dropped and the
//! store subscription re-asserts the durable value; the UI gets one notice.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use canvas::cursor::{CursorPosition, RemoteCursor};
use canvas::doc::{ActorId, CanvasMetadata, Shape, ShapeId, ShapePatch};
use canvas::engine::{Action, EditError, EngineCore, Phase};
use canvas::hit::Point;
use canvas::overlay::{EphemeralOverride, WriteTicket};
use canvas::presence::PresenceRecord;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::adapters::{Callback, DurableStore, EphemeralChannel, Subscription};
use crate::config::SessionConfig;
use crate::error::{ErrorCode, Notice, SessionError, StoreError};
use crate::services::cursor::CursorChannel;
use crate::services::ephemeral::PreviewChannel;
use crate::services::lock::{self, LockWrite};

// =============================================================================
// CLOCK
// =============================================================================

/// Wall-clock source in milliseconds since Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
            return 0;
        };
        i64::try_from(dur.as_millis()).unwrap_or(0)
    }
}

// =============================================================================
// EVENTS AND JOBS
// =============================================================================

enum Event {
    Shapes(Vec<Shape>),
    Metadata(CanvasMetadata),
    Presence(Vec<PresenceRecord>),
    Previews(HashMap<ShapeId, EphemeralOverride>),
    Cursors(HashMap<ActorId, CursorPosition>),
    Settled { ticket: WriteTicket, result: Result<(), StoreError> },
    Finished,
}

/// An engine action turned into work.
enum Job {
    Write(WriteTicket, BoxFuture<'static, Result<(), StoreError>>),
    Background(BoxFuture<'static, ()>),
}

fn forward<T: Send + 'static>(tx: &mpsc::UnboundedSender<Event>, wrap: fn(T) -> Event) -> Callback<T> {
    let tx = tx.clone();
    Box::new(move |value| {
        if tx.send(wrap(value)).is_err() {
            debug!("session closed; delivery dropped");
        }
    })
}

fn log_background<E: ErrorCode>(task: &'static str, result: Result<(), E>) {
    if let Err(e) = result {
        warn!(task, code = e.error_code(), error = %e, "background write failed");
    }
}

// =============================================================================
// SESSION
// =============================================================================

pub struct Session {
    core: EngineCore,
    config: SessionConfig,
    store: Arc<dyn DurableStore>,
    previews: PreviewChannel,
    cursors: CursorChannel,
    clock: Arc<dyn Clock>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    subscriptions: Vec<Subscription>,
    in_flight: usize,
    notices: Vec<Notice>,
}

impl Session {
    pub fn new(
        actor: impl Into<ActorId>,
        store: Arc<dyn DurableStore>,
        previews: Arc<dyn EphemeralChannel>,
        cursors: Arc<dyn EphemeralChannel>,
        config: SessionConfig,
    ) -> Self {
        let actor = actor.into();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            core: EngineCore::new(actor.clone(), config.engine.clone()),
            cursors: CursorChannel::new(cursors, actor),
            previews: PreviewChannel::new(previews),
            clock: Arc::new(SystemClock),
            store,
            config,
            events_tx,
            events_rx,
            subscriptions: Vec::new(),
            in_flight: 0,
            notices: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Subscribe to every collaborator and announce presence.
    pub async fn start(&mut self) {
        let tx = self.events_tx.clone();
        self.subscriptions.push(self.store.subscribe_shapes(forward(&tx, Event::Shapes)));
        self.subscriptions.push(self.store.subscribe_canvas_metadata(forward(&tx, Event::Metadata)));
        self.subscriptions.push(self.store.subscribe_presence(forward(&tx, Event::Presence)));
        self.subscriptions.push(self.previews.subscribe(forward(&tx, Event::Previews)));
        self.subscriptions.push(self.cursors.subscribe(forward(&tx, Event::Cursors)));

        if let Err(e) = self.cursors.register_disconnect().await {
            let err = SessionError::from(e);
            warn!(actor = %self.actor(), code = err.error_code(), error = %err, "cursor cleanup not registered");
        }

        let actions = self.core.mount(self.now());
        self.execute(actions);
        self.pump();
        info!(actor = %self.actor(), "session started");
    }

    /// Drive the session until `shutdown` resolves, then shut down.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.tick_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                maybe = self.events_rx.recv() => {
                    let Some(event) = maybe else { break };
                    self.handle(event);
                }
                _ = ticker.tick() => self.tick(),
            }
        }
        self.shutdown().await;
    }

    /// Periodic work: throttled broadcasts, heartbeat, lock sweep.
    pub fn tick(&mut self) {
        self.pump();
        let actions = self.core.tick(self.now());
        self.execute(actions);
    }

    /// Apply every queued event without waiting.
    pub fn pump(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle(event);
        }
    }

    /// Wait until every spawned task has reported back.
    pub async fn settle(&mut self) {
        self.pump();
        while self.in_flight > 0 {
            let Some(event) = self.events_rx.recv().await else {
                break;
            };
            self.handle(event);
        }
        self.pump();
    }

    /// Release own locks, withdraw cursor and previews, go offline, unsubscribe.
    ///
    /// Best effort: failures are logged and the session closes anyway.
    pub async fn shutdown(&mut self) {
        self.settle().await;
        let actions = self.core.shutdown(self.now());
        let jobs: Vec<Job> = actions.into_iter().map(|a| self.job(a)).collect();
        let outcomes = join_all(jobs.into_iter().map(|job| async move {
            match job {
                Job::Write(ticket, fut) => Some((ticket, fut.await)),
                Job::Background(fut) => {
                    fut.await;
                    None
                }
            }
        }))
        .await;
        for (ticket, result) in outcomes.into_iter().flatten() {
            if let Err(e) = result {
                warn!(shape_id = %ticket.shape_id, code = e.error_code(), error = %e, "release on shutdown failed");
            }
            self.core.settle(&ticket);
        }
        self.subscriptions.clear();
        self.pump();
        info!(actor = %self.actor(), "session closed");
    }

    pub fn set_visible(&mut self, visible: bool) {
        let actions = self.core.set_visible(visible, self.now());
        self.execute(actions);
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn actor(&self) -> &ActorId {
        self.core.actor()
    }

    #[must_use]
    pub fn engine(&self) -> &EngineCore {
        &self.core
    }

    /// The reconciled shape list in draw order.
    #[must_use]
    pub fn shapes(&self) -> &[Shape] {
        self.core.shapes()
    }

    #[must_use]
    pub fn shape(&self, id: &str) -> Option<&Shape> {
        self.core.shape(id)
    }

    #[must_use]
    pub fn selection(&self) -> &[ShapeId] {
        self.core.selection().ids()
    }

    #[must_use]
    pub fn can_edit(&self, id: &str) -> bool {
        self.core.shape(id).is_some_and(|s| self.core.can_edit(s))
    }

    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.core.is_owner()
    }

    /// Whether the owner removed this actor from the canvas.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.core.is_removed()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.core.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.core.can_redo()
    }

    #[must_use]
    pub fn cursors(&self) -> Vec<RemoteCursor> {
        self.core.cursors(self.now())
    }

    #[must_use]
    pub fn online_users(&self) -> Vec<PresenceRecord> {
        self.core.online_users(self.now())
    }

    /// Spawned tasks that have not reported back yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Drain pending user notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // =========================================================================
    // SELECTION
    // =========================================================================

    pub fn select(&mut self, ids: Vec<ShapeId>, add: bool) {
        let actions = self.core.select(ids, add, self.now());
        self.execute(actions);
    }

    pub fn deselect(&mut self, ids: Option<&[ShapeId]>) {
        let actions = self.core.deselect(ids);
        self.execute(actions);
    }

    pub fn select_box(&mut self, a: Point, b: Point, add: bool) {
        let actions = self.core.select_box(a, b, add, self.now());
        self.execute(actions);
    }

    pub fn select_all(&mut self) {
        let actions = self.core.select_all(self.now());
        self.execute(actions);
    }

    pub fn click(&mut self, pt: Point, add: bool) {
        let actions = self.core.click(pt, add, self.now());
        self.execute(actions);
    }

    // =========================================================================
    // EDITS
    // =========================================================================

    /// Create `shape`, assigning a fresh id when it has none. Returns the id.
    pub fn request_create(&mut self, mut shape: Shape) -> ShapeId {
        if shape.id.is_empty() {
            shape.id = Uuid::new_v4().to_string();
        }
        let id = shape.id.clone();
        let actions = self.core.request_create(shape, self.now());
        self.execute(actions);
        id
    }

    /// # Errors
    ///
    /// `NotFound` or `LockConflict`; a notice is queued as well.
    pub fn request_move(&mut self, id: &str, x: f64, y: f64, phase: Phase) -> Result<(), SessionError> {
        let result = self.core.request_move(id, x, y, phase, self.now());
        self.run_edit(result)
    }

    /// # Errors
    ///
    /// `NotFound` or `LockConflict`; a notice is queued as well.
    pub fn request_resize(&mut self, id: &str, width: f64, height: f64, phase: Phase) -> Result<(), SessionError> {
        let result = self.core.request_resize(id, width, height, phase, self.now());
        self.run_edit(result)
    }

    /// # Errors
    ///
    /// `NotFound` or `LockConflict`; a notice is queued as well.
    pub fn request_rotate(&mut self, id: &str, degrees: f64, phase: Phase) -> Result<(), SessionError> {
        let result = self.core.request_rotate(id, degrees, phase, self.now());
        self.run_edit(result)
    }

    /// # Errors
    ///
    /// `NotFound` or `LockConflict`; a notice is queued as well.
    pub fn request_update(&mut self, id: &str, patch: &ShapePatch) -> Result<(), SessionError> {
        let result = self.core.request_update(id, patch, self.now());
        self.run_edit(result)
    }

    /// # Errors
    ///
    /// `NotFound` or `LockConflict`; a notice is queued as well.
    pub fn request_delete(&mut self, id: &str) -> Result<(), SessionError> {
        let result = self.core.request_delete(id);
        self.run_edit(result)
    }

    /// # Errors
    ///
    /// `NotFound` or `LockConflict`; a notice is queued as well.
    pub fn bring_to_front(&mut self, id: &str) -> Result<(), SessionError> {
        let result = self.core.bring_to_front(id, self.now());
        self.run_edit(result)
    }

    /// # Errors
    ///
    /// `NotFound` or `LockConflict`; a notice is queued as well.
    pub fn send_to_back(&mut self, id: &str) -> Result<(), SessionError> {
        let result = self.core.send_to_back(id, self.now());
        self.run_edit(result)
    }

    /// Abort an in-progress gesture and withdraw its previews.
    pub fn cancel_gesture(&mut self) {
        let actions = self.core.cancel_gesture();
        self.execute(actions);
    }

    pub fn undo(&mut self) {
        let actions = self.core.undo(self.now());
        self.execute(actions);
    }

    pub fn redo(&mut self) {
        let actions = self.core.redo(self.now());
        self.execute(actions);
    }

    // =========================================================================
    // LOCKS
    // =========================================================================

    /// # Errors
    ///
    /// `LockConflict` when another online actor holds the shape.
    pub fn lock(&mut self, id: &str) -> Result<(), SessionError> {
        let result = self.core.lock(id, self.now());
        self.run_edit(result)
    }

    /// # Errors
    ///
    /// `NotFound` when the shape is not rendered.
    pub fn unlock(&mut self, id: &str) -> Result<(), SessionError> {
        let result = self.core.unlock(id);
        self.run_edit(result)
    }

    /// # Errors
    ///
    /// `PermissionDenied` for non-owners.
    pub fn override_lock(&mut self, id: &str) -> Result<(), SessionError> {
        let result = self.core.override_lock(id);
        self.run_edit(result)
    }

    /// Mark `target` offline and release every lock it holds. Owner only.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for non-owners.
    pub fn kick(&mut self, target: &str) -> Result<(), SessionError> {
        let result = self.core.kick(target, self.now());
        self.run_edit(result)
    }

    // =========================================================================
    // CURSOR
    // =========================================================================

    pub fn pointer_moved(&mut self, x: f64, y: f64) {
        self.core.pointer_moved(x, y, self.now());
    }

    pub fn pointer_left(&mut self) {
        let actions = self.core.pointer_left();
        self.execute(actions);
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn now(&self) -> i64 {
        self.clock.now_ms()
    }

    fn run_edit(&mut self, result: Result<Vec<Action>, EditError>) -> Result<(), SessionError> {
        match result {
            Ok(actions) => {
                self.execute(actions);
                Ok(())
            }
            Err(e) => {
                let err = SessionError::from(e);
                debug!(actor = %self.actor(), code = err.error_code(), error = %err, "request refused");
                self.push_notice(&err);
                Err(err)
            }
        }
    }

    /// Queue a notice unless one with the same code is already waiting.
    fn push_notice(&mut self, err: &SessionError) {
        let code = err.error_code();
        if self.notices.iter().any(|n| n.code == code) {
            return;
        }
        self.notices.push(Notice::from_error(err));
    }

    fn handle(&mut self, event: Event) {
        let now = self.now();
        match event {
            Event::Shapes(shapes) => self.core.apply_shapes(shapes),
            Event::Metadata(metadata) => self.core.apply_metadata(metadata),
            Event::Presence(records) => {
                let was_removed = self.core.is_removed();
                self.core.apply_presence(records, now);
                if !was_removed && self.core.is_removed() {
                    let err = SessionError::Removed;
                    warn!(actor = %self.actor(), code = err.error_code(), "{err}");
                    self.push_notice(&err);
                }
            }
            Event::Previews(previews) => self.core.apply_remote_previews(previews, now),
            Event::Cursors(cursors) => self.core.apply_remote_cursors(cursors, now),
            Event::Settled { ticket, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                if let Err(source) = result {
                    let err = SessionError::WriteFailed { shape_id: ticket.shape_id.clone(), source };
                    error!(shape_id = %ticket.shape_id, code = err.error_code(), error = %err, "durable write failed");
                    self.push_notice(&err);
                }
                self.core.settle(&ticket);
            }
            Event::Finished => self.in_flight = self.in_flight.saturating_sub(1),
        }
    }

    fn execute(&mut self, actions: Vec<Action>) {
        for action in actions {
            match self.job(action) {
                Job::Write(ticket, fut) => self.spawn_write(ticket, fut),
                Job::Background(fut) => self.spawn_background(fut),
            }
        }
    }

    fn spawn_write(&mut self, ticket: WriteTicket, fut: BoxFuture<'static, Result<(), StoreError>>) {
        self.in_flight += 1;
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = fut.await;
            if tx.send(Event::Settled { ticket, result }).is_err() {
                debug!("session closed before write settled");
            }
        });
    }

    fn spawn_background(&mut self, fut: BoxFuture<'static, ()>) {
        self.in_flight += 1;
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            fut.await;
            if tx.send(Event::Finished).is_err() {
                debug!("session closed before background task finished");
            }
        });
    }

    fn job(&self, action: Action) -> Job {
        let store = Arc::clone(&self.store);
        let actor = self.actor().clone();
        match action {
            Action::CreateShape { ticket, shape } => {
                Job::Write(ticket, async move { store.create_shape(shape, &actor).await }.boxed())
            }
            Action::UpdateShape { ticket, patch } => {
                let id = ticket.shape_id.clone();
                Job::Write(ticket, async move { store.update_shape(&id, patch).await }.boxed())
            }
            Action::DeleteShape { ticket } => {
                let id = ticket.shape_id.clone();
                Job::Write(ticket, async move { store.delete_shape(&id).await }.boxed())
            }
            Action::LockShape { ticket } => lock_job(store, ticket, LockWrite::Acquire, actor),
            Action::UnlockShape { ticket } => lock_job(store, ticket, LockWrite::Release, actor),
            Action::OverrideLock { ticket } => lock_job(store, ticket, LockWrite::Override, actor),
            Action::ReleaseStaleLock { shape_id } => {
                Job::Background(async move { lock::release_stale(store.as_ref(), &shape_id).await }.boxed())
            }
            // Queued here, in action order, so a clear never overtakes its publish.
            Action::PublishPreview { shape_id, preview } => {
                let write = self.previews.publish(&shape_id, &preview);
                Job::Background(
                    async move { log_background("preview", write.await.map_err(SessionError::from)) }.boxed(),
                )
            }
            Action::ClearPreview { shape_id } => {
                let write = self.previews.clear(&shape_id);
                Job::Background(
                    async move { log_background("preview", write.await.map_err(SessionError::from)) }.boxed(),
                )
            }
            Action::PublishCursor(position) => {
                let cursors = self.cursors.clone();
                Job::Background(
                    async move {
                        let result = cursors.publish(position).await;
                        log_background("cursor", result.map_err(SessionError::from));
                    }
                    .boxed(),
                )
            }
            Action::ClearCursor => {
                let cursors = self.cursors.clone();
                Job::Background(
                    async move {
                        let result = cursors.clear().await;
                        log_background("cursor", result.map_err(SessionError::from));
                    }
                    .boxed(),
                )
            }
            Action::SetPresence(record) => Job::Background(
                async move {
                    let user_id = record.user_id.clone();
                    log_background("presence", store.set_presence(&user_id, record).await);
                }
                .boxed(),
            ),
        }
    }
}

fn lock_job(store: Arc<dyn DurableStore>, ticket: WriteTicket, kind: LockWrite, actor: ActorId) -> Job {
    let id = ticket.shape_id.clone();
    Job::Write(ticket, async move { lock::write(store.as_ref(), kind, &id, &actor).await }.boxed())
}
