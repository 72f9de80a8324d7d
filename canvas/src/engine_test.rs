#![allow(clippy::float_cmp)]

use super::*;
use crate::consts::PREVIEW_STALE_MS;
use crate::presence::PresenceRecord;

// =============================================================
// Helpers
// =============================================================

fn rect(id: &str) -> Shape {
    Shape::rectangle(id, 0.0, 0.0, 100.0, 100.0)
}

fn rect_at(id: &str, x: f64, y: f64) -> Shape {
    Shape::rectangle(id, x, y, 10.0, 10.0)
}

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn core_with(actor: &str, shapes: Vec<Shape>) -> EngineCore {
    let mut core = EngineCore::new(actor, EngineConfig::default());
    core.apply_shapes(shapes);
    core
}

fn roster(core: &mut EngineCore, entries: &[(&str, bool, i64)], now_ms: i64) {
    let records = entries
        .iter()
        .map(|(user, online, last_seen)| PresenceRecord {
            user_id: (*user).to_string(),
            online: *online,
            last_seen: *last_seen,
            role: Role::Collaborator,
        })
        .collect();
    core.apply_presence(records, now_ms);
}

fn x_of(core: &EngineCore, id: &str) -> Option<f64> {
    core.shape(id).map(|s| s.x)
}

fn tickets(actions: &[Action]) -> Vec<WriteTicket> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::CreateShape { ticket, .. }
            | Action::UpdateShape { ticket, .. }
            | Action::DeleteShape { ticket }
            | Action::LockShape { ticket }
            | Action::UnlockShape { ticket }
            | Action::OverrideLock { ticket } => Some(ticket.clone()),
            _ => None,
        })
        .collect()
}

fn count(actions: &[Action], pred: impl Fn(&Action) -> bool) -> usize {
    actions.iter().filter(|a| pred(a)).count()
}

/// Stand-in for the durable store: applies write actions, echoes the full shape list
/// back into the engine, then settles every ticket.
struct Echo {
    shapes: Vec<Shape>,
}

impl Echo {
    fn new(shapes: Vec<Shape>) -> Self {
        Self { shapes }
    }

    fn find(&mut self, id: &str) -> Option<&mut Shape> {
        self.shapes.iter_mut().find(|s| s.id == id)
    }

    fn run(&mut self, core: &mut EngineCore, actions: &[Action]) {
        let actor = core.actor().clone();
        for action in actions {
            match action {
                Action::CreateShape { shape, .. } => {
                    self.shapes.retain(|s| s.id != shape.id);
                    self.shapes.push(shape.clone());
                }
                Action::UpdateShape { ticket, patch } => {
                    if let Some(s) = self.find(&ticket.shape_id) {
                        s.apply(patch);
                    }
                }
                Action::DeleteShape { ticket } => self.shapes.retain(|s| s.id != ticket.shape_id),
                Action::LockShape { ticket } | Action::OverrideLock { ticket } => {
                    if let Some(s) = self.find(&ticket.shape_id) {
                        s.locked_by = Some(actor.clone());
                    }
                }
                Action::UnlockShape { ticket } => {
                    if let Some(s) = self.find(&ticket.shape_id) {
                        s.locked_by = None;
                    }
                }
                Action::ReleaseStaleLock { shape_id } => {
                    if let Some(s) = self.find(shape_id) {
                        s.locked_by = None;
                    }
                }
                _ => {}
            }
        }
        core.apply_shapes(self.shapes.clone());
        for ticket in tickets(actions) {
            core.settle(&ticket);
        }
    }
}

// =============================================================
// Construction and loading
// =============================================================

#[test]
fn new_core_is_empty_and_unloaded() {
    let core = EngineCore::new("me", EngineConfig::default());
    assert!(core.shapes().is_empty());
    assert!(!core.is_loaded());
    assert!(!core.can_undo());
    assert!(!core.is_owner());
}

#[test]
fn apply_shapes_renders_in_draw_order() {
    let core = core_with("me", vec![rect("b").with_z(2), rect("a").with_z(1)]);
    let ids: Vec<&str> = core.shapes().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert!(core.is_loaded());
}

#[test]
fn metadata_decides_ownership() {
    let mut core = core_with("me", vec![]);
    core.apply_metadata(CanvasMetadata { owner_id: "me".into(), name: "board".into() });
    assert!(core.is_owner());
    assert_eq!(core.presence().role(), Role::Owner);
}

// =============================================================
// Create / delete
// =============================================================

#[test]
fn create_renders_before_ack_and_goes_in_front() {
    let mut core = core_with("me", vec![rect("a").with_z(4)]);
    let actions = core.request_create(rect_at("n", 5.0, 5.0).with_creator("someone"), 100);
    let created = core.shape("n").cloned();
    assert!(created.as_ref().is_some_and(|s| s.z_index == 5 && s.created_by == "me"));
    assert!(matches!(&actions[..], [Action::CreateShape { shape, .. }] if shape.id == "n"));
    assert_eq!(core.pending_writes(), 1);

    let mut echo = Echo::new(vec![rect("a").with_z(4)]);
    echo.run(&mut core, &actions);
    assert_eq!(core.pending_writes(), 0);
    assert!(core.shape("n").is_some());
}

#[test]
fn delete_hides_immediately_and_deselects() {
    let mut core = core_with("me", vec![rect("a"), rect_at("b", 200.0, 0.0)]);
    core.select(vec!["a".into()], false, 0);
    let actions = core.request_delete("a").unwrap();
    assert!(core.shape("a").is_none());
    assert!(!core.selection().contains("a"));
    assert_eq!(count(&actions, |a| matches!(a, Action::DeleteShape { .. })), 1);
}

#[test]
fn failed_create_disappears_on_settle() {
    let mut core = core_with("me", vec![]);
    let actions = core.request_create(rect("n"), 0);
    for ticket in tickets(&actions) {
        core.settle(&ticket);
    }
    assert!(core.shape("n").is_none());
}

#[test]
fn missing_shape_is_not_found() {
    let mut core = core_with("me", vec![]);
    assert_eq!(
        core.request_move("nope", 1.0, 1.0, Phase::Commit, 0),
        Err(EditError::NotFound { shape_id: "nope".into() })
    );
}

// =============================================================
// Gestures
// =============================================================

#[test]
fn preview_is_local_and_throttled() {
    let mut core = core_with("me", vec![rect("a")]);
    core.mount(0);
    let first = core.request_move("a", 5.0, 5.0, Phase::Preview, 10).unwrap();
    let second = core.request_move("a", 7.0, 7.0, Phase::Preview, 20).unwrap();
    assert!(first.is_empty() && second.is_empty());
    assert_eq!(x_of(&core, "a"), Some(7.0));

    assert!(core.tick(40).is_empty());
    let out = core.tick(60);
    let published: Vec<&EphemeralOverride> = out
        .iter()
        .filter_map(|a| match a {
            Action::PublishPreview { preview, .. } => Some(preview),
            _ => None,
        })
        .collect();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].patch.x, Some(7.0));
    assert_eq!(published[0].actor_id, "me");
}

#[test]
fn commit_writes_durably_and_clears_preview() {
    let mut core = core_with("me", vec![rect("a")]);
    core.request_move("a", 5.0, 5.0, Phase::Preview, 10).unwrap();
    let actions = core.request_move("a", 8.0, 8.0, Phase::Commit, 20).unwrap();
    assert!(matches!(
        &actions[0],
        Action::UpdateShape { patch, .. } if patch.x == Some(8.0) && patch.updated_at == Some(20)
    ));
    assert!(actions.contains(&Action::ClearPreview { shape_id: "a".into() }));
    // Nothing left to broadcast after commit.
    assert!(core.tick(1_000).iter().all(|a| !matches!(a, Action::PublishPreview { .. })));
}

#[test]
fn gesture_records_one_undo_point() {
    let mut core = core_with("me", vec![rect("a")]);
    for i in 1..=5_i32 {
        core.request_move("a", f64::from(i), 0.0, Phase::Preview, i64::from(i)).unwrap();
    }
    core.request_move("a", 9.0, 0.0, Phase::Commit, 10).unwrap();
    assert!(core.can_undo());
    let undo = core.undo(11);
    assert_eq!(x_of(&core, "a"), Some(0.0));
    assert_eq!(count(&undo, |a| matches!(a, Action::UpdateShape { .. })), 1);
}

#[test]
fn cancel_gesture_restores_base() {
    let mut core = core_with("me", vec![rect("a")]);
    core.request_move("a", 5.0, 5.0, Phase::Preview, 10).unwrap();
    let actions = core.cancel_gesture();
    assert_eq!(actions, vec![Action::ClearPreview { shape_id: "a".into() }]);
    assert_eq!(x_of(&core, "a"), Some(0.0));
}

#[test]
fn multi_drag_moves_selection_by_same_delta() {
    let mut core = core_with("me", vec![rect_at("A", 0.0, 0.0), rect_at("B", 50.0, 50.0)]);
    core.select(vec!["A".into(), "B".into()], false, 0);
    let actions = core.request_move("A", 10.0, 5.0, Phase::Commit, 1).unwrap();
    assert_eq!(count(&actions, |a| matches!(a, Action::UpdateShape { .. })), 2);
    let b = core.shape("B").map(|s| (s.x, s.y));
    assert_eq!(b, Some((60.0, 55.0)));
}

#[test]
fn multi_drag_skips_shapes_locked_by_others() {
    let mut core = core_with("me", vec![rect_at("A", 0.0, 0.0), rect_at("B", 50.0, 50.0).with_lock("bob")]);
    roster(&mut core, &[("bob", true, 0)], 0);
    core.select(vec!["A".into(), "B".into()], false, 0);
    core.request_move("A", 10.0, 5.0, Phase::Commit, 1).unwrap();
    assert_eq!(x_of(&core, "B"), Some(50.0));
}

#[test]
fn resize_maps_to_kind() {
    let mut core = core_with(
        "me",
        vec![
            Shape::circle("c", 0.0, 0.0, 10.0),
            Shape::line("l", 0.0, 0.0, vec![0.0, 0.0, 10.0, 20.0]),
        ],
    );
    core.request_resize("c", 30.0, 40.0, Phase::Commit, 0).unwrap();
    core.request_resize("l", 20.0, 10.0, Phase::Commit, 0).unwrap();
    assert_eq!(core.shape("c").and_then(|s| s.radius), Some(20.0));
    assert_eq!(core.shape("l").and_then(|s| s.points.clone()), Some(vec![0.0, 0.0, 20.0, 10.0]));
}

#[test]
fn rotate_and_update() {
    let mut core = core_with("me", vec![Shape::text("t", 0.0, 0.0, "hi", 16.0)]);
    core.request_rotate("t", 90.0, Phase::Commit, 0).unwrap();
    let patch = ShapePatch {
        text: Some("hello".into()),
        locked_by: Some(Some("me".into())),
        ..ShapePatch::default()
    };
    let actions = core.request_update("t", &patch, 1).unwrap();
    let t = core.shape("t").cloned();
    assert!(t.is_some_and(|t| t.rotation == 90.0 && t.text.as_deref() == Some("hello")));
    assert!(matches!(&actions[0], Action::UpdateShape { patch, .. } if patch.locked_by.is_none()));
}

#[test]
fn z_order_requests() {
    let mut core = core_with("me", vec![rect("a").with_z(0), rect("b").with_z(5)]);
    let front = core.bring_to_front("a", 0).unwrap();
    assert!(matches!(&front[0], Action::UpdateShape { patch, .. } if patch.z_index == Some(6)));
    assert!(core.bring_to_front("a", 1).unwrap().is_empty());
    let back = core.send_to_back("a", 2).unwrap();
    assert!(matches!(&back[0], Action::UpdateShape { patch, .. } if patch.z_index == Some(4)));
}

// =============================================================
// Optimistic acknowledgment
// =============================================================

#[test]
fn older_ack_does_not_strip_newer_edit() {
    let mut core = core_with("me", vec![rect("a")]);
    let first = core.request_move("a", 5.0, 0.0, Phase::Commit, 1).unwrap();
    let second = core.request_move("a", 9.0, 0.0, Phase::Commit, 2).unwrap();
    for ticket in tickets(&first) {
        core.settle(&ticket);
    }
    assert_eq!(x_of(&core, "a"), Some(9.0));
    for ticket in tickets(&second) {
        core.settle(&ticket);
    }
    // The store never took either write: base reasserts.
    assert_eq!(x_of(&core, "a"), Some(0.0));
}

#[test]
fn acked_edit_is_served_from_base() {
    let mut core = core_with("me", vec![rect("a")]);
    let mut echo = Echo::new(vec![rect("a")]);
    let actions = core.request_move("a", 5.0, 0.0, Phase::Commit, 1).unwrap();
    echo.run(&mut core, &actions);
    assert_eq!(core.pending_writes(), 0);
    assert_eq!(x_of(&core, "a"), Some(5.0));
}

// =============================================================
// Locks
// =============================================================

#[test]
fn shape_locked_by_online_peer_is_read_only() {
    let mut core = core_with("me", vec![rect("a").with_lock("bob")]);
    roster(&mut core, &[("bob", true, 0)], 0);
    assert!(!core.can_edit(&rect("a").with_lock("bob")));
    let err = core.request_move("a", 1.0, 1.0, Phase::Commit, 0);
    assert!(matches!(
        err,
        Err(EditError::Lock(LockError::AlreadyLocked { ref holder, .. })) if holder == "bob"
    ));
    assert!(core.lock("a", 0).is_err());
}

#[test]
fn owner_edits_through_locks() {
    let mut core = core_with("me", vec![rect("a").with_lock("bob")]);
    core.apply_metadata(CanvasMetadata { owner_id: "me".into(), name: String::new() });
    assert!(core.request_move("a", 1.0, 1.0, Phase::Commit, 0).is_ok());
}

#[test]
fn lock_and_unlock_are_optimistic() {
    let mut core = core_with("me", vec![rect("a")]);
    let actions = core.lock("a", 0).unwrap();
    assert!(matches!(&actions[..], [Action::LockShape { .. }]));
    assert_eq!(core.shape("a").and_then(|s| s.locked_by.clone()), Some("me".into()));
    assert!(core.lock("a", 0).unwrap().is_empty());
    core.unlock("a").unwrap();
    assert!(core.shape("a").is_some_and(|s| s.locked_by.is_none()));
}

#[test]
fn override_requires_owner() {
    let mut core = core_with("me", vec![rect("a").with_lock("bob")]);
    core.apply_metadata(CanvasMetadata { owner_id: "boss".into(), name: String::new() });
    assert!(matches!(
        core.override_lock("a"),
        Err(EditError::Lock(LockError::PermissionDenied { .. }))
    ));

    let mut owner = core_with("boss", vec![rect("a").with_lock("bob")]);
    owner.apply_metadata(CanvasMetadata { owner_id: "boss".into(), name: String::new() });
    let actions = owner.override_lock("a").unwrap();
    assert!(matches!(&actions[..], [Action::OverrideLock { .. }]));
    assert_eq!(owner.shape("a").and_then(|s| s.locked_by.clone()), Some("boss".into()));
}

#[test]
fn kick_marks_offline_and_releases_locks() {
    let mut core = core_with("boss", vec![rect("x").with_lock("bob"), rect("y").with_lock("carol")]);
    core.apply_metadata(CanvasMetadata { owner_id: "boss".into(), name: String::new() });
    let actions = core.kick("bob", 500).unwrap();
    assert!(matches!(
        &actions[0],
        Action::SetPresence(r) if r.user_id == "bob" && !r.online && r.last_seen == 500
    ));
    assert_eq!(count(&actions, |a| matches!(a, Action::UnlockShape { .. })), 1);
    assert!(core.shape("x").is_some_and(|s| s.locked_by.is_none()));
    assert!(core.shape("y").is_some_and(|s| s.locked_by.is_some()));
}

#[test]
fn kick_requires_owner() {
    let mut core = core_with("me", vec![]);
    assert!(core.kick("bob", 0).is_err());
}

#[test]
fn select_locks_and_deselect_releases() {
    let mut core = core_with("me", vec![rect("a")]);
    let mut echo = Echo::new(vec![rect("a")]);
    let actions = core.select(vec!["a".into()], false, 0);
    assert!(matches!(&actions[..], [Action::LockShape { .. }]));
    echo.run(&mut core, &actions);

    let actions = core.deselect(None);
    assert!(matches!(&actions[..], [Action::UnlockShape { .. }]));
    echo.run(&mut core, &actions);
    assert!(core.shape("a").is_some_and(|s| s.locked_by.is_none()));
}

#[test]
fn select_skips_shapes_held_by_online_peer() {
    let mut core = core_with("me", vec![rect("a").with_lock("bob")]);
    roster(&mut core, &[("bob", true, 0)], 0);
    assert!(core.select(vec!["a".into()], false, 0).is_empty());
    assert!(core.selection().contains("a"));
}

#[test]
fn lock_on_select_can_be_disabled() {
    let config = EngineConfig { lock_on_select: false, ..EngineConfig::default() };
    let mut core = EngineCore::new("me", config);
    core.apply_shapes(vec![rect("a")]);
    assert!(core.select(vec!["a".into()], false, 0).is_empty());
}

// =============================================================
// Reclamation sweep
// =============================================================

#[test]
fn offline_holder_loses_lock_on_next_sweep_tick() {
    let mut core = core_with("me", vec![rect("x").with_lock("bob")]);
    core.mount(0);
    roster(&mut core, &[("bob", false, 0)], 0);
    let before = core.tick(29_999);
    assert_eq!(count(&before, |a| matches!(a, Action::ReleaseStaleLock { .. })), 0);

    let actions = core.tick(30_000);
    assert!(actions.contains(&Action::ReleaseStaleLock { shape_id: "x".into() }));

    // Store has not echoed yet; the cooldown keeps the next tick quiet.
    let again = core.tick(60_000);
    assert_eq!(count(&again, |a| matches!(a, Action::ReleaseStaleLock { .. })), 0);
}

#[test]
fn sweep_leaves_selected_shapes_alone() {
    let config = EngineConfig { lock_on_select: false, ..EngineConfig::default() };
    let mut core = EngineCore::new("me", config);
    core.apply_shapes(vec![rect("x").with_lock("bob")]);
    roster(&mut core, &[("bob", false, 0)], 0);
    core.select(vec!["x".into()], false, 0);
    assert!(core.sweep_locks(100_000).is_empty());
}

// =============================================================
// Selection and hit-testing
// =============================================================

#[test]
fn box_selection_through_engine() {
    let config = EngineConfig { lock_on_select: false, ..EngineConfig::default() };
    let mut core = EngineCore::new("me", config);
    core.apply_shapes(vec![rect("rect"), Shape::circle("circle", 500.0, 500.0, 50.0)]);
    core.select_box(pt(0.0, 0.0), pt(120.0, 120.0), false, 0);
    assert_eq!(core.selection().ids().to_vec(), vec!["rect".to_string()]);
    core.select_box(pt(450.0, 450.0), pt(560.0, 560.0), false, 0);
    assert_eq!(core.selection().ids().to_vec(), vec!["circle".to_string()]);
    core.select_all(0);
    assert_eq!(core.selection().len(), 2);
}

#[test]
fn click_selects_topmost_or_clears() {
    let mut core = core_with("me", vec![rect("low").with_z(0), rect("high").with_z(1)]);
    core.click(pt(10.0, 10.0), false, 0);
    assert_eq!(core.selection().ids().to_vec(), vec!["high".to_string()]);
    core.click(pt(900.0, 900.0), false, 0);
    assert!(core.selection().is_empty());
}

#[test]
fn vanished_shape_leaves_selection() {
    let mut core = core_with("me", vec![rect("a"), rect("b")]);
    core.select(vec!["a".into(), "b".into()], false, 0);
    core.apply_shapes(vec![rect("b")]);
    assert_eq!(core.selection().ids().to_vec(), vec!["b".to_string()]);
}

#[test]
fn unknown_ids_are_not_selected() {
    let mut core = core_with("me", vec![rect("a")]);
    core.select(vec!["ghost".into()], false, 0);
    assert!(core.selection().is_empty());
}

// =============================================================
// History
// =============================================================

#[test]
fn undo_redo_move() {
    let mut core = core_with("me", vec![rect("a")]);
    let mut echo = Echo::new(vec![rect("a")]);
    let actions = core.request_move("a", 10.0, 0.0, Phase::Commit, 1).unwrap();
    echo.run(&mut core, &actions);

    let undo = core.undo(2);
    assert!(core.is_replaying());
    assert_eq!(x_of(&core, "a"), Some(0.0));
    echo.run(&mut core, &undo);
    assert!(!core.is_replaying());
    assert!(core.can_redo());

    let redo = core.redo(3);
    echo.run(&mut core, &redo);
    assert_eq!(x_of(&core, "a"), Some(10.0));
    assert_eq!(core.pending_writes(), 0);
}

#[test]
fn undo_create_deletes_and_redo_recreates() {
    let mut core = core_with("me", vec![]);
    let mut echo = Echo::new(vec![]);
    let actions = core.request_create(rect("n"), 1);
    echo.run(&mut core, &actions);

    let undo = core.undo(2);
    assert!(matches!(&undo[..], [Action::DeleteShape { ticket }] if ticket.shape_id == "n"));
    echo.run(&mut core, &undo);
    assert!(core.shape("n").is_none());

    let redo = core.redo(3);
    assert!(matches!(&redo[..], [Action::CreateShape { shape, .. }] if shape.id == "n"));
    echo.run(&mut core, &redo);
    assert!(core.shape("n").is_some());
}

#[test]
fn undo_never_touches_locks() {
    let mut core = core_with("me", vec![rect("a")]);
    let mut echo = Echo::new(vec![rect("a")]);
    let actions = core.request_move("a", 10.0, 0.0, Phase::Commit, 1).unwrap();
    echo.run(&mut core, &actions);
    let actions = core.lock("a", 2).unwrap();
    echo.run(&mut core, &actions);

    let undo = core.undo(3);
    assert!(undo.iter().all(|a| matches!(a, Action::UpdateShape { patch, .. } if patch.locked_by.is_none())));
    echo.run(&mut core, &undo);
    assert_eq!(core.shape("a").and_then(|s| s.locked_by.clone()), Some("me".into()));
}

#[test]
fn undo_skips_shapes_now_held_by_peer() {
    let mut core = core_with("me", vec![rect("a")]);
    let mut echo = Echo::new(vec![rect("a")]);
    roster(&mut core, &[("bob", true, 0)], 0);
    let actions = core.request_move("a", 10.0, 0.0, Phase::Commit, 1).unwrap();
    echo.run(&mut core, &actions);

    echo.shapes[0].locked_by = Some("bob".into());
    core.apply_shapes(echo.shapes.clone());
    assert!(core.undo(2).is_empty());
    assert!(!core.is_replaying());
    assert_eq!(x_of(&core, "a"), Some(10.0));
}

// =============================================================
// Remote previews, cursors, presence
// =============================================================

#[test]
fn remote_previews_filtered_by_presence_and_self() {
    let mut core = core_with("me", vec![rect("a"), rect("b"), rect("c")]);
    roster(&mut core, &[("bob", true, 0), ("carol", false, 0)], 0);
    let preview = |actor: &str, x: f64| EphemeralOverride {
        actor_id: actor.into(),
        patch: ShapePatch::position(x, 0.0),
        ts: 1,
    };
    core.apply_remote_previews(
        HashMap::from([
            ("a".to_string(), preview("bob", 5.0)),
            ("b".to_string(), preview("carol", 7.0)),
            ("c".to_string(), preview("me", 9.0)),
        ]),
        10,
    );
    assert_eq!(x_of(&core, "a"), Some(5.0));
    assert_eq!(x_of(&core, "b"), Some(0.0));
    assert_eq!(x_of(&core, "c"), Some(0.0));
}

#[test]
fn local_edit_beats_remote_preview() {
    let mut core = core_with("me", vec![rect("a")]);
    core.apply_remote_previews(
        HashMap::from([(
            "a".to_string(),
            EphemeralOverride { actor_id: "bob".into(), patch: ShapePatch::position(5.0, 5.0), ts: 1 },
        )]),
        0,
    );
    core.request_move("a", 1.0, 1.0, Phase::Preview, 0).unwrap();
    assert_eq!(x_of(&core, "a"), Some(1.0));
}

#[test]
fn peer_going_offline_drops_its_preview() {
    let mut core = core_with("me", vec![rect("a")]);
    roster(&mut core, &[("bob", true, 0)], 0);
    core.apply_remote_previews(
        HashMap::from([(
            "a".to_string(),
            EphemeralOverride { actor_id: "bob".into(), patch: ShapePatch::position(5.0, 5.0), ts: 1 },
        )]),
        0,
    );
    assert_eq!(x_of(&core, "a"), Some(5.0));
    roster(&mut core, &[("bob", false, 10)], 10);
    assert_eq!(x_of(&core, "a"), Some(0.0));
}

#[test]
fn newer_durable_write_beats_lingering_peer_preview() {
    let mut core = core_with("me", vec![rect("a")]);
    roster(&mut core, &[("bob", true, 0)], 0);
    core.apply_remote_previews(
        HashMap::from([(
            "a".to_string(),
            EphemeralOverride { actor_id: "bob".into(), patch: ShapePatch::position(5.0, 5.0), ts: 1_000 },
        )]),
        1_000,
    );
    assert_eq!(x_of(&core, "a"), Some(5.0));

    let mut committed = rect("a");
    committed.x = 100.0;
    committed.updated_at = 2_000;
    core.apply_shapes(vec![committed]);
    assert_eq!(x_of(&core, "a"), Some(100.0));
}

#[test]
fn unrefreshed_peer_preview_expires_on_tick() {
    let mut core = core_with("me", vec![rect("a")]);
    core.mount(0);
    roster(&mut core, &[("bob", true, 0)], 0);
    core.apply_remote_previews(
        HashMap::from([(
            "a".to_string(),
            EphemeralOverride { actor_id: "bob".into(), patch: ShapePatch::position(5.0, 5.0), ts: 1 },
        )]),
        0,
    );
    core.tick(PREVIEW_STALE_MS);
    assert_eq!(x_of(&core, "a"), Some(5.0));
    core.tick(PREVIEW_STALE_MS + 1);
    assert_eq!(x_of(&core, "a"), Some(0.0));
}

#[test]
fn cursor_burst_sends_once() {
    let mut core = core_with("me", vec![]);
    core.pointer_moved(1.0, 1.0, 0);
    core.pointer_moved(2.0, 2.0, 10);
    core.pointer_moved(3.0, 3.0, 20);
    assert!(core.tick(49).is_empty());
    let out = core.tick(50);
    let sent: Vec<&CursorPosition> = out
        .iter()
        .filter_map(|a| match a {
            Action::PublishCursor(p) => Some(p),
            _ => None,
        })
        .collect();
    assert_eq!(sent.len(), 1);
    assert_eq!((sent[0].x, sent[0].y), (3.0, 3.0));
}

#[test]
fn pointer_left_clears_cursor() {
    let mut core = core_with("me", vec![]);
    core.pointer_moved(1.0, 1.0, 0);
    assert_eq!(core.pointer_left(), vec![Action::ClearCursor]);
    assert!(core.tick(100).is_empty());
}

#[test]
fn remote_cursors_exclude_self() {
    let mut core = core_with("me", vec![]);
    core.apply_remote_cursors(
        HashMap::from([
            ("me".to_string(), CursorPosition { x: 1.0, y: 1.0, ts: 0 }),
            ("bob".to_string(), CursorPosition { x: 2.0, y: 2.0, ts: 0 }),
        ]),
        0,
    );
    let cursors = core.cursors(0);
    assert_eq!(cursors.len(), 1);
    assert_eq!(cursors[0].actor_id, "bob");
}

#[test]
fn heartbeat_and_visibility() {
    let mut core = core_with("me", vec![]);
    let mount = core.mount(0);
    assert!(matches!(&mount[..], [Action::SetPresence(r)] if r.online));
    let beat = core.tick(15_000);
    assert_eq!(count(&beat, |a| matches!(a, Action::SetPresence(_))), 1);
    let hidden = core.set_visible(false, 16_000);
    assert!(matches!(&hidden[..], [Action::SetPresence(r)] if !r.online));
}

#[test]
fn removed_actor_stops_heartbeating() {
    let mut core = core_with("bob", vec![]);
    core.mount(0);
    roster(&mut core, &[("bob", true, 0)], 0);
    assert!(!core.is_removed());
    roster(&mut core, &[("bob", false, 5_000)], 5_000);
    assert!(core.is_removed());
    let later = core.tick(30_000);
    assert_eq!(count(&later, |a| matches!(a, Action::SetPresence(_))), 0);
}

#[test]
fn shutdown_releases_everything() {
    let mut core = core_with("me", vec![rect("a")]);
    let mut echo = Echo::new(vec![rect("a")]);
    core.mount(0);
    let actions = core.select(vec!["a".into()], false, 0);
    echo.run(&mut core, &actions);
    core.request_move("a", 3.0, 3.0, Phase::Preview, 1).unwrap();

    let out = core.shutdown(100);
    assert!(out.contains(&Action::ClearPreview { shape_id: "a".into() }));
    assert!(out.contains(&Action::ClearCursor));
    assert_eq!(count(&out, |a| matches!(a, Action::UnlockShape { .. })), 1);
    assert!(matches!(out.last(), Some(Action::SetPresence(r)) if !r.online));
}
