//! Durable shape store contract.

use async_trait::async_trait;
use canvas::doc::{CanvasMetadata, Shape, ShapePatch};
use canvas::presence::PresenceRecord;

use super::{Callback, Subscription};
use crate::error::StoreError;

/// Authoritative storage for one canvas.
///
/// Subscriptions deliver the full current value immediately on subscribe and
/// again after every change. Writes resolve once the store has accepted them;
/// the resulting state change arrives through the subscription.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn create_shape(&self, shape: Shape, actor_id: &str) -> Result<(), StoreError>;

    /// Field-wise update. Absent fields are left untouched.
    async fn update_shape(&self, id: &str, patch: ShapePatch) -> Result<(), StoreError>;

    async fn delete_shape(&self, id: &str) -> Result<(), StoreError>;

    fn subscribe_shapes(&self, callback: Callback<Vec<Shape>>) -> Subscription;

    async fn lock_shape(&self, id: &str, actor_id: &str) -> Result<(), StoreError>;

    /// Clears `locked_by`. Idempotent.
    async fn unlock_shape(&self, id: &str) -> Result<(), StoreError>;

    async fn override_lock(&self, id: &str, owner_id: &str) -> Result<(), StoreError>;

    fn subscribe_canvas_metadata(&self, callback: Callback<CanvasMetadata>) -> Subscription;

    fn subscribe_presence(&self, callback: Callback<Vec<PresenceRecord>>) -> Subscription;

    async fn set_presence(&self, actor_id: &str, record: PresenceRecord) -> Result<(), StoreError>;
}
