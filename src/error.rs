//! Error types for the session host.
//!
//! DESIGN
//! ======
//! Each collaborator gets its own `thiserror` enum (`StoreError`,
//! `ChannelError`); `SessionError` is what the UI sees. Every error
//! implements [`ErrorCode`] so a [`Notice`] can carry a stable, grepable code
//! next to the human-readable message.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use canvas::doc::{ActorId, ShapeId};
use canvas::engine::EditError;
use canvas::lock::LockError;

/// Trait for typed errors that carry a stable code.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// COLLABORATOR ERRORS
// =============================================================================

/// Failure reported by a [`crate::adapters::DurableStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("shape {0} not found in store")]
    NotFound(ShapeId),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Unavailable(_) => "E_STORE_UNAVAILABLE",
            Self::Rejected(_) => "E_WRITE_REJECTED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Failure reported by a [`crate::adapters::EphemeralChannel`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("channel disconnected")]
    Disconnected,
    #[error("payload encoding failed: {0}")]
    Encode(String),
}

impl ErrorCode for ChannelError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Disconnected => "E_CHANNEL_DISCONNECTED",
            Self::Encode(_) => "E_CHANNEL_ENCODE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

// =============================================================================
// SESSION ERROR
// =============================================================================

/// Errors surfaced to the UI layer by [`crate::session::Session`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("shape {shape_id} is locked by {holder}")]
    LockConflict { shape_id: ShapeId, holder: ActorId },
    #[error("only the canvas owner may {action}")]
    PermissionDenied { action: &'static str },
    #[error("write to shape {shape_id} failed: {source}")]
    WriteFailed {
        shape_id: ShapeId,
        #[source]
        source: StoreError,
    },
    #[error("live channel unavailable: {0}")]
    ChannelUnavailable(#[from] ChannelError),
    #[error("stale lock on shape {shape_id} released")]
    StaleLock { shape_id: ShapeId },
    #[error("shape {shape_id} not found")]
    NotFound { shape_id: ShapeId },
    #[error("removed from the canvas by the owner")]
    Removed,
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::LockConflict { .. } => "E_LOCK_CONFLICT",
            Self::PermissionDenied { .. } => "E_PERMISSION_DENIED",
            Self::WriteFailed { .. } => "E_WRITE_FAILED",
            Self::ChannelUnavailable(_) => "E_CHANNEL_UNAVAILABLE",
            Self::StaleLock { .. } => "E_STALE_LOCK",
            Self::NotFound { .. } => "E_NOT_FOUND",
            Self::Removed => "E_REMOVED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(
            self,
            Self::LockConflict { .. } | Self::WriteFailed { .. } | Self::ChannelUnavailable(_)
        )
    }
}

impl From<EditError> for SessionError {
    fn from(err: EditError) -> Self {
        match err {
            EditError::NotFound { shape_id } => Self::NotFound { shape_id },
            EditError::Lock(LockError::AlreadyLocked { shape_id, holder }) => {
                Self::LockConflict { shape_id, holder }
            }
            EditError::Lock(LockError::PermissionDenied { action }) => {
                Self::PermissionDenied { action }
            }
        }
    }
}

// =============================================================================
// NOTICE
// =============================================================================

/// One user-visible notification, drained by the UI via `take_notices`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl Notice {
    #[must_use]
    pub fn from_error(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self { code: err.error_code(), message: err.to_string(), retryable: err.retryable() }
    }
}
