use super::*;

// =============================================================
// Throttle
// =============================================================

#[test]
fn idle_gate_releases_nothing() {
    let mut gate: Throttle<u32> = Throttle::new(50);
    assert!(gate.poll(1_000).is_none());
    assert!(!gate.has_pending());
}

#[test]
fn burst_in_one_interval_sends_once_with_last_value() {
    let mut gate = Throttle::new(50);
    let mut sent = Vec::new();
    for (i, t) in (0..10).zip((0..).step_by(4)) {
        gate.offer(i, t);
        if let Some(v) = gate.poll(t) {
            sent.push(v);
        }
    }
    // Ten offers at t = 0..36 all land in the first window.
    if let Some(v) = gate.poll(50) {
        sent.push(v);
    }
    assert_eq!(sent, vec![9]);
}

#[test]
fn window_holds_until_interval() {
    let mut gate = Throttle::new(50);
    gate.offer("a", 100);
    assert!(gate.poll(149).is_none());
    assert_eq!(gate.poll(150), Some("a"));
    assert!(gate.poll(200).is_none());
}

#[test]
fn new_window_opens_after_release() {
    let mut gate = Throttle::new(50);
    gate.offer(1, 0);
    assert_eq!(gate.poll(50), Some(1));
    gate.offer(2, 60);
    assert!(gate.poll(100).is_none());
    assert_eq!(gate.poll(110), Some(2));
}

#[test]
fn flush_releases_immediately() {
    let mut gate = Throttle::new(50);
    gate.offer(7, 0);
    assert_eq!(gate.flush(), Some(7));
    assert!(gate.poll(1_000).is_none());
}

#[test]
fn cancel_drops_pending() {
    let mut gate = Throttle::new(50);
    gate.offer(7, 0);
    gate.cancel();
    assert!(!gate.has_pending());
    assert!(gate.poll(100).is_none());
}

// =============================================================
// KeyedThrottle
// =============================================================

#[test]
fn keys_do_not_overwrite_each_other() {
    let mut gates = KeyedThrottle::new(50);
    gates.offer("a", 1, 0);
    gates.offer("b", 2, 0);
    gates.offer("a", 3, 10);
    let mut ready = gates.poll(50);
    ready.sort_unstable();
    assert_eq!(ready, vec![("a", 3), ("b", 2)]);
}

#[test]
fn keyed_windows_are_independent() {
    let mut gates = KeyedThrottle::new(50);
    gates.offer("a", 1, 0);
    gates.offer("b", 2, 30);
    assert_eq!(gates.poll(50), vec![("a", 1)]);
    assert!(gates.has_pending(&"b"));
    assert_eq!(gates.poll(80), vec![("b", 2)]);
    assert!(!gates.has_pending(&"b"));
}

#[test]
fn keyed_cancel_and_flush() {
    let mut gates = KeyedThrottle::new(50);
    gates.offer("a", 1, 0);
    gates.offer("b", 2, 0);
    gates.cancel(&"a");
    assert_eq!(gates.flush(&"b"), Some(2));
    assert!(gates.poll(100).is_empty());
}
