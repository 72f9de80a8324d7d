//! Cursor positions on the ephemeral channel.
//!
//! DESIGN
//! ======
//! Cursor positions are purely ephemeral: one entry per actor, keyed by actor
//! id, overwritten on every (throttled) move and removed when the pointer
//! leaves the canvas or the client disconnects. No persistence.

#[cfg(test)]
#[path = "cursor_test.rs"]
mod cursor_test;

use std::collections::HashMap;
use std::sync::Arc;

use canvas::cursor::CursorPosition;
use canvas::doc::ActorId;

use super::decode_entries;
use crate::adapters::{Callback, EphemeralChannel, Subscription};
use crate::error::ChannelError;

/// The local actor's handle on the shared cursor map.
#[derive(Clone)]
pub struct CursorChannel {
    channel: Arc<dyn EphemeralChannel>,
    actor: ActorId,
}

impl CursorChannel {
    pub fn new(channel: Arc<dyn EphemeralChannel>, actor: impl Into<ActorId>) -> Self {
        Self { channel, actor: actor.into() }
    }

    /// Have the transport drop our entry if this client goes away.
    ///
    /// # Errors
    ///
    /// Returns the channel's error.
    pub async fn register_disconnect(&self) -> Result<(), ChannelError> {
        self.channel.remove_on_disconnect(&self.actor).await
    }

    /// # Errors
    ///
    /// Returns the channel's error, or `Encode` if the position cannot be serialized.
    pub async fn publish(&self, position: CursorPosition) -> Result<(), ChannelError> {
        let value = serde_json::to_value(position).map_err(|e| ChannelError::Encode(e.to_string()))?;
        self.channel.publish(&self.actor, value).await
    }

    /// # Errors
    ///
    /// Returns the channel's error.
    pub async fn clear(&self) -> Result<(), ChannelError> {
        self.channel.clear(&self.actor).await
    }

    /// Deliver every actor's decoded cursor, self included, on every change.
    pub fn subscribe(&self, callback: Callback<HashMap<ActorId, CursorPosition>>) -> Subscription {
        self.channel.subscribe(Box::new(move |raw| callback(decode_entries(raw, "cursor"))))
    }
}
