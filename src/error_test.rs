use super::*;

// =============================================================================
// ErrorCode
// =============================================================================

#[test]
fn session_error_codes() {
    let cases: Vec<(SessionError, &str, bool)> = vec![
        (
            SessionError::LockConflict { shape_id: "s".into(), holder: "bob".into() },
            "E_LOCK_CONFLICT",
            true,
        ),
        (SessionError::PermissionDenied { action: "kick" }, "E_PERMISSION_DENIED", false),
        (
            SessionError::WriteFailed {
                shape_id: "s".into(),
                source: StoreError::Unavailable("down".into()),
            },
            "E_WRITE_FAILED",
            true,
        ),
        (SessionError::ChannelUnavailable(ChannelError::Disconnected), "E_CHANNEL_UNAVAILABLE", true),
        (SessionError::StaleLock { shape_id: "s".into() }, "E_STALE_LOCK", false),
        (SessionError::NotFound { shape_id: "s".into() }, "E_NOT_FOUND", false),
        (SessionError::Removed, "E_REMOVED", false),
    ];
    for (err, code, retryable) in cases {
        assert_eq!(err.error_code(), code, "{err}");
        assert_eq!(err.retryable(), retryable, "{err}");
    }
}

#[test]
fn store_error_only_unavailable_retries() {
    assert!(StoreError::Unavailable("x".into()).retryable());
    assert!(!StoreError::Rejected("x".into()).retryable());
    assert_eq!(StoreError::NotFound("s".into()).error_code(), "E_NOT_FOUND");
}

// =============================================================================
// From<EditError>
// =============================================================================

#[test]
fn edit_lock_conflict_maps_to_lock_conflict() {
    let err: SessionError =
        EditError::Lock(LockError::AlreadyLocked { shape_id: "s1".into(), holder: "bob".into() }).into();
    assert_eq!(err, SessionError::LockConflict { shape_id: "s1".into(), holder: "bob".into() });
}

#[test]
fn edit_permission_maps_to_permission_denied() {
    let err: SessionError = EditError::Lock(LockError::PermissionDenied { action: "override locks" }).into();
    assert_eq!(err.to_string(), "only the canvas owner may override locks");
}

#[test]
fn edit_not_found_maps_to_not_found() {
    let err: SessionError = EditError::NotFound { shape_id: "gone".into() }.into();
    assert_eq!(err.error_code(), "E_NOT_FOUND");
}

// =============================================================================
// Notice
// =============================================================================

#[test]
fn notice_carries_code_message_and_retry_flag() {
    let err = SessionError::LockConflict { shape_id: "s1".into(), holder: "bob".into() };
    let notice = Notice::from_error(&err);
    assert_eq!(notice.code, "E_LOCK_CONFLICT");
    assert_eq!(notice.message, "shape s1 is locked by bob");
    assert!(notice.retryable);
}
