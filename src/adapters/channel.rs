//! Ephemeral pub/sub channel contract.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use super::{Callback, Subscription};
use crate::error::ChannelError;

/// Low-latency keyed map shared by everyone on the canvas.
///
/// Values are opaque JSON; typing happens in `services::ephemeral` and
/// `services::cursor`. Subscribers receive the whole map on every change.
#[async_trait]
pub trait EphemeralChannel: Send + Sync {
    async fn publish(&self, key: &str, value: Value) -> Result<(), ChannelError>;

    async fn clear(&self, key: &str) -> Result<(), ChannelError>;

    fn subscribe(&self, callback: Callback<HashMap<String, Value>>) -> Subscription;

    /// Ask the transport to drop `key` when this client disconnects.
    async fn remove_on_disconnect(&self, _key: &str) -> Result<(), ChannelError> {
        Ok(())
    }
}
