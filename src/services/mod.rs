//! Typed wrappers over the raw adapters.
//!
//! Each service owns one concern: `ephemeral` turns shape previews into channel
//! entries, `cursor` does the same for pointer positions, and `lock` runs lock
//! writes against the durable store with the logging each path needs.

pub mod cursor;
pub mod ephemeral;
pub mod lock;

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// Decode every entry of a channel snapshot, dropping the ones that fail.
fn decode_entries<T: DeserializeOwned>(raw: HashMap<String, Value>, kind: &'static str) -> HashMap<String, T> {
    raw.into_iter()
        .filter_map(|(key, value)| match serde_json::from_value::<T>(value) {
            Ok(decoded) => Some((key, decoded)),
            Err(e) => {
                warn!(%key, kind, error = %e, "undecodable channel entry dropped");
                None
            }
        })
        .collect()
}
