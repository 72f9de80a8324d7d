//! Shape previews on the ephemeral channel.
//!
//! DESIGN
//! ======
//! One channel entry per shape, keyed by shape id, holding a JSON-encoded
//! [`EphemeralOverride`]. Entries live for one gesture: the publisher clears
//! them when the durable write goes out. Throttling happens upstream in the
//! engine; this layer encodes, decodes and orders.
//!
//! Writes for one key are chained: each publish or clear is queued at call
//! time and only reaches the transport after every earlier write for that key
//! has finished, however the returned futures are scheduled. The first publish
//! of a gesture also asks the transport to drop the key if this client
//! disconnects.

#[cfg(test)]
#[path = "ephemeral_test.rs"]
mod ephemeral_test;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use canvas::doc::ShapeId;
use canvas::overlay::EphemeralOverride;
use futures::FutureExt;
use futures::future::{self, BoxFuture, Shared};

use super::decode_entries;
use crate::adapters::{Callback, EphemeralChannel, Subscription};
use crate::error::ChannelError;

type Write = BoxFuture<'static, Result<(), ChannelError>>;

#[derive(Default)]
struct Writes {
    /// Last write queued per key.
    tails: HashMap<ShapeId, Shared<Write>>,
    /// Keys registered for removal on disconnect since their last clear.
    registered: HashSet<ShapeId>,
}

fn lock(writes: &Mutex<Writes>) -> MutexGuard<'_, Writes> {
    writes.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct PreviewChannel {
    channel: Arc<dyn EphemeralChannel>,
    writes: Arc<Mutex<Writes>>,
}

impl PreviewChannel {
    pub fn new(channel: Arc<dyn EphemeralChannel>) -> Self {
        Self { channel, writes: Arc::default() }
    }

    /// Queue a publish of `preview` under `shape_id`. The write is ordered when this
    /// is called, not when the future is polled.
    ///
    /// # Errors
    ///
    /// The future yields the channel's error, or `Encode` if the preview cannot be
    /// serialized.
    #[must_use]
    pub fn publish(&self, shape_id: &str, preview: &EphemeralOverride) -> Write {
        let value = match serde_json::to_value(preview) {
            Ok(value) => value,
            Err(e) => return future::ready(Err(ChannelError::Encode(e.to_string()))).boxed(),
        };
        let channel = Arc::clone(&self.channel);
        let state = Arc::clone(&self.writes);
        let key = shape_id.to_owned();

        let mut writes = lock(&self.writes);
        let register = writes.registered.insert(key.clone());
        let op = async move {
            if register {
                if let Err(e) = channel.remove_on_disconnect(&key).await {
                    lock(&state).registered.remove(&key);
                    return Err(e);
                }
            }
            channel.publish(&key, value).await
        }
        .boxed();
        chain(&mut writes, shape_id, op)
    }

    /// Queue removal of the entry under `shape_id`, after any pending publish.
    ///
    /// # Errors
    ///
    /// The future yields the channel's error.
    #[must_use]
    pub fn clear(&self, shape_id: &str) -> Write {
        let channel = Arc::clone(&self.channel);
        let key = shape_id.to_owned();

        let mut writes = lock(&self.writes);
        writes.registered.remove(shape_id);
        let op = async move { channel.clear(&key).await }.boxed();
        chain(&mut writes, shape_id, op)
    }

    /// Deliver the decoded preview map on every change.
    pub fn subscribe(&self, callback: Callback<HashMap<ShapeId, EphemeralOverride>>) -> Subscription {
        self.channel.subscribe(Box::new(move |raw| callback(decode_entries(raw, "preview"))))
    }
}

/// Run `op` after the last write queued for `key`, and make it the new tail.
fn chain(writes: &mut Writes, key: &str, op: Write) -> Write {
    writes.tails.retain(|_, pending| pending.peek().is_none());
    let previous = writes.tails.remove(key);
    let next = async move {
        if let Some(previous) = previous {
            // Its outcome belongs to whoever queued it.
            drop(previous.await);
        }
        op.await
    }
    .boxed()
    .shared();
    writes.tails.insert(key.to_owned(), next.clone());
    next.boxed()
}
