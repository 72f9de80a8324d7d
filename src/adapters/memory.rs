//! In-process adapters.
//!
//! DESIGN
//! ======
//! `MemoryStore` keeps one canvas in a `Mutex`, applies writes immediately and
//! notifies subscribers synchronously before the write future resolves, so an
//! acknowledgment never overtakes the state change it caused. Callbacks are
//! invoked after the lock is released.
//!
//! `MemoryChannel` is a hub shared by every client; each handle from
//! [`MemoryChannel::connect_client`] has its own connection state, so one
//! client can be disconnected while the others keep publishing.
//!
//! Both support failure injection for tests.

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use canvas::doc::{ActorId, CanvasMetadata, Shape, ShapeId, ShapePatch};
use canvas::presence::PresenceRecord;
use serde_json::Value;

use super::{Callback, DurableStore, EphemeralChannel, Subscription};
use crate::error::{ChannelError, StoreError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Listener<T> = Arc<dyn Fn(T) + Send + Sync>;

struct Subscribers<T> {
    next_id: u64,
    listeners: HashMap<u64, Listener<T>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self { next_id: 0, listeners: HashMap::new() }
    }
}

impl<T> Subscribers<T> {
    fn add(&mut self, callback: Callback<T>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.insert(id, Arc::from(callback));
        id
    }

    fn remove(&mut self, id: u64) {
        self.listeners.remove(&id);
    }

    fn snapshot(&self) -> Vec<Listener<T>> {
        self.listeners.values().cloned().collect()
    }
}

fn notify<T: Clone>(listeners: Vec<Listener<T>>, value: &T) {
    for listener in listeners {
        listener(value.clone());
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// One durable write as seen by [`MemoryStore`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Create(ShapeId),
    Update(ShapeId),
    Delete(ShapeId),
    Lock(ShapeId, ActorId),
    Unlock(ShapeId),
    Override(ShapeId, ActorId),
    SetPresence(ActorId),
}

#[derive(Default)]
struct StoreInner {
    shapes: BTreeMap<ShapeId, Shape>,
    metadata: Option<CanvasMetadata>,
    presence: BTreeMap<ActorId, PresenceRecord>,
    ops: Vec<StoreOp>,
    failure: Option<StoreError>,
    shape_subs: Subscribers<Vec<Shape>>,
    metadata_subs: Subscribers<CanvasMetadata>,
    presence_subs: Subscribers<Vec<PresenceRecord>>,
}

impl StoreInner {
    fn shape_list(&self) -> Vec<Shape> {
        self.shapes.values().cloned().collect()
    }

    fn roster(&self) -> Vec<PresenceRecord> {
        self.presence.values().cloned().collect()
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Shared in-memory canvas. Cloning yields another handle to the same canvas.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose canvas is owned by `owner_id`.
    #[must_use]
    pub fn with_owner(owner_id: impl Into<ActorId>, name: impl Into<String>) -> Self {
        let store = Self::new();
        lock(&store.inner).metadata = Some(CanvasMetadata { owner_id: owner_id.into(), name: name.into() });
        store
    }

    /// Insert shapes directly, bypassing the op log. Notifies subscribers.
    pub fn seed(&self, shapes: Vec<Shape>) {
        let (listeners, list) = {
            let mut inner = lock(&self.inner);
            for shape in shapes {
                inner.shapes.insert(shape.id.clone(), shape);
            }
            (inner.shape_subs.snapshot(), inner.shape_list())
        };
        notify(listeners, &list);
    }

    /// Insert a presence record directly, bypassing the op log.
    pub fn seed_presence(&self, record: PresenceRecord) {
        let (listeners, roster) = {
            let mut inner = lock(&self.inner);
            inner.presence.insert(record.user_id.clone(), record);
            (inner.presence_subs.snapshot(), inner.roster())
        };
        notify(listeners, &roster);
    }

    /// Make every subsequent write fail with `err` until cleared with `None`.
    pub fn fail_writes(&self, err: Option<StoreError>) {
        lock(&self.inner).failure = err;
    }

    #[must_use]
    pub fn shapes(&self) -> Vec<Shape> {
        lock(&self.inner).shape_list()
    }

    #[must_use]
    pub fn shape(&self, id: &str) -> Option<Shape> {
        lock(&self.inner).shapes.get(id).cloned()
    }

    #[must_use]
    pub fn presence_of(&self, actor_id: &str) -> Option<PresenceRecord> {
        lock(&self.inner).presence.get(actor_id).cloned()
    }

    /// Every accepted write so far.
    #[must_use]
    pub fn ops(&self) -> Vec<StoreOp> {
        lock(&self.inner).ops.clone()
    }

    /// Run `mutate` against one shape and notify shape subscribers.
    fn write_shape(
        &self,
        id: &str,
        op: StoreOp,
        missing_ok: bool,
        mutate: impl FnOnce(&mut Shape),
    ) -> Result<(), StoreError> {
        let (listeners, list) = {
            let mut inner = lock(&self.inner);
            inner.check_failure()?;
            match inner.shapes.get_mut(id) {
                Some(shape) => mutate(shape),
                None if missing_ok => {}
                None => return Err(StoreError::NotFound(id.to_owned())),
            }
            inner.ops.push(op);
            (inner.shape_subs.snapshot(), inner.shape_list())
        };
        notify(listeners, &list);
        Ok(())
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn create_shape(&self, mut shape: Shape, actor_id: &str) -> Result<(), StoreError> {
        let (listeners, list) = {
            let mut inner = lock(&self.inner);
            inner.check_failure()?;
            if inner.shapes.contains_key(&shape.id) {
                return Err(StoreError::Rejected(format!("shape {} already exists", shape.id)));
            }
            if shape.created_by.is_empty() {
                actor_id.clone_into(&mut shape.created_by);
            }
            inner.ops.push(StoreOp::Create(shape.id.clone()));
            inner.shapes.insert(shape.id.clone(), shape);
            (inner.shape_subs.snapshot(), inner.shape_list())
        };
        notify(listeners, &list);
        Ok(())
    }

    async fn update_shape(&self, id: &str, patch: ShapePatch) -> Result<(), StoreError> {
        self.write_shape(id, StoreOp::Update(id.to_owned()), false, |shape| shape.apply(&patch))
    }

    async fn delete_shape(&self, id: &str) -> Result<(), StoreError> {
        let (listeners, list) = {
            let mut inner = lock(&self.inner);
            inner.check_failure()?;
            inner.shapes.remove(id);
            inner.ops.push(StoreOp::Delete(id.to_owned()));
            (inner.shape_subs.snapshot(), inner.shape_list())
        };
        notify(listeners, &list);
        Ok(())
    }

    fn subscribe_shapes(&self, callback: Callback<Vec<Shape>>) -> Subscription {
        let (id, listener, initial) = {
            let mut inner = lock(&self.inner);
            let id = inner.shape_subs.add(callback);
            (id, inner.shape_subs.listeners.get(&id).cloned(), inner.shape_list())
        };
        if let Some(listener) = listener {
            listener(initial);
        }
        let weak: Weak<Mutex<StoreInner>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).shape_subs.remove(id);
            }
        })
    }

    async fn lock_shape(&self, id: &str, actor_id: &str) -> Result<(), StoreError> {
        let op = StoreOp::Lock(id.to_owned(), actor_id.to_owned());
        self.write_shape(id, op, false, |shape| shape.locked_by = Some(actor_id.to_owned()))
    }

    async fn unlock_shape(&self, id: &str) -> Result<(), StoreError> {
        self.write_shape(id, StoreOp::Unlock(id.to_owned()), true, |shape| shape.locked_by = None)
    }

    async fn override_lock(&self, id: &str, owner_id: &str) -> Result<(), StoreError> {
        let op = StoreOp::Override(id.to_owned(), owner_id.to_owned());
        self.write_shape(id, op, false, |shape| shape.locked_by = Some(owner_id.to_owned()))
    }

    fn subscribe_canvas_metadata(&self, callback: Callback<CanvasMetadata>) -> Subscription {
        let (id, listener, initial) = {
            let mut inner = lock(&self.inner);
            let id = inner.metadata_subs.add(callback);
            (id, inner.metadata_subs.listeners.get(&id).cloned(), inner.metadata.clone())
        };
        if let (Some(listener), Some(metadata)) = (listener, initial) {
            listener(metadata);
        }
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).metadata_subs.remove(id);
            }
        })
    }

    fn subscribe_presence(&self, callback: Callback<Vec<PresenceRecord>>) -> Subscription {
        let (id, listener, initial) = {
            let mut inner = lock(&self.inner);
            let id = inner.presence_subs.add(callback);
            (id, inner.presence_subs.listeners.get(&id).cloned(), inner.roster())
        };
        if let Some(listener) = listener {
            listener(initial);
        }
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).presence_subs.remove(id);
            }
        })
    }

    async fn set_presence(&self, actor_id: &str, record: PresenceRecord) -> Result<(), StoreError> {
        let (listeners, roster) = {
            let mut inner = lock(&self.inner);
            inner.check_failure()?;
            inner.presence.insert(actor_id.to_owned(), record);
            inner.ops.push(StoreOp::SetPresence(actor_id.to_owned()));
            (inner.presence_subs.snapshot(), inner.roster())
        };
        notify(listeners, &roster);
        Ok(())
    }
}

// =============================================================================
// MEMORY CHANNEL
// =============================================================================

#[derive(Default)]
struct Hub {
    entries: HashMap<String, Value>,
    subscribers: Subscribers<HashMap<String, Value>>,
}

#[derive(Default)]
struct Connection {
    disconnected: bool,
    on_disconnect: HashSet<String>,
}

/// One client's handle on a shared in-memory ephemeral hub.
#[derive(Clone, Default)]
pub struct MemoryChannel {
    hub: Arc<Mutex<Hub>>,
    conn: Arc<Mutex<Connection>>,
}

impl MemoryChannel {
    /// A fresh hub with one connected client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Another client on the same hub, with its own connection state.
    #[must_use]
    pub fn connect_client(&self) -> Self {
        Self { hub: Arc::clone(&self.hub), conn: Arc::new(Mutex::new(Connection::default())) }
    }

    /// Drop this client's connection. Keys registered with
    /// `remove_on_disconnect` are removed from the hub.
    pub fn disconnect(&self) {
        let keys: Vec<String> = {
            let mut conn = lock(&self.conn);
            conn.disconnected = true;
            conn.on_disconnect.drain().collect()
        };
        let (listeners, entries) = {
            let mut hub = lock(&self.hub);
            let mut changed = false;
            for key in &keys {
                changed |= hub.entries.remove(key).is_some();
            }
            if !changed {
                return;
            }
            (hub.subscribers.snapshot(), hub.entries.clone())
        };
        notify(listeners, &entries);
    }

    pub fn reconnect(&self) {
        lock(&self.conn).disconnected = false;
    }

    /// Current hub contents.
    #[must_use]
    pub fn entries(&self) -> HashMap<String, Value> {
        lock(&self.hub).entries.clone()
    }

    fn check_connected(&self) -> Result<(), ChannelError> {
        if lock(&self.conn).disconnected {
            return Err(ChannelError::Disconnected);
        }
        Ok(())
    }

    fn mutate(&self, apply: impl FnOnce(&mut HashMap<String, Value>)) {
        let (listeners, entries) = {
            let mut hub = lock(&self.hub);
            apply(&mut hub.entries);
            (hub.subscribers.snapshot(), hub.entries.clone())
        };
        notify(listeners, &entries);
    }
}

#[async_trait]
impl EphemeralChannel for MemoryChannel {
    async fn publish(&self, key: &str, value: Value) -> Result<(), ChannelError> {
        self.check_connected()?;
        self.mutate(|entries| {
            entries.insert(key.to_owned(), value);
        });
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), ChannelError> {
        self.check_connected()?;
        self.mutate(|entries| {
            entries.remove(key);
        });
        Ok(())
    }

    fn subscribe(&self, callback: Callback<HashMap<String, Value>>) -> Subscription {
        let (id, initial, listener) = {
            let mut hub = lock(&self.hub);
            let id = hub.subscribers.add(callback);
            (id, hub.entries.clone(), hub.subscribers.listeners.get(&id).cloned())
        };
        if let Some(listener) = listener {
            listener(initial);
        }
        let weak = Arc::downgrade(&self.hub);
        Subscription::new(move || {
            if let Some(hub) = weak.upgrade() {
                lock(&hub).subscribers.remove(id);
            }
        })
    }

    async fn remove_on_disconnect(&self, key: &str) -> Result<(), ChannelError> {
        self.check_connected()?;
        lock(&self.conn).on_disconnect.insert(key.to_owned());
        Ok(())
    }
}
