//! Seams to the outside world.
//!
//! SYSTEM CONTEXT
//! ==============
//! The session never talks to a database or a socket directly. It holds an
//! `Arc<dyn DurableStore>` for authoritative shapes, locks, presence and
//! canvas metadata, plus one `Arc<dyn EphemeralChannel>` each for previews and
//! cursors. `memory` provides in-process implementations of both, used by the
//! tests and the demo binary.

pub mod channel;
pub mod memory;
pub mod store;

pub use channel::EphemeralChannel;
pub use memory::{MemoryChannel, MemoryStore};
pub use store::DurableStore;

/// Subscriber callback. Invoked synchronously by the adapter; implementations
/// must only enqueue work.
pub type Callback<T> = Box<dyn Fn(T) + Send + Sync>;

/// Unsubscribes when dropped.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// A guard with nothing to undo.
    #[must_use]
    pub fn noop() -> Self {
        Self { cancel: None }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("active", &self.cancel.is_some()).finish()
    }
}
