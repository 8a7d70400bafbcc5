//! Tests for audit sink

use std::sync::Arc;

use effect_engine::core::{build_audit_event, AuditSink, InMemoryAuditSink};
use parking_lot::Mutex;

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);

    let event = build_audit_event(7, "rainbow", 50, "JSON API", "start", Some("detail".to_string()));
    sink.record(event.clone());

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0], event);
    assert_eq!(events[0].effect_id, 7);
    assert_eq!(events[0].effect, "rainbow");
    assert_eq!(events[0].priority, 50);
    assert_eq!(events[0].origin, "JSON API");
    assert_eq!(events[0].action, "start");
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);

    for id in 1..=3 {
        sink.record(build_audit_event(id, "rainbow", 1, "System", "start", None));
    }

    let ids: Vec<u64> = sink.events().iter().map(|e| e.effect_id).collect();
    assert_eq!(ids, vec![2, 3]);
}

#[test]
fn test_zero_capacity_sink_drops_everything() {
    let mut sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event(1, "rainbow", 1, "System", "start", None));
    assert!(sink.events().is_empty());
}

#[test]
fn test_event_ids_are_unique() {
    let a = build_audit_event(1, "rainbow", 1, "System", "start", None);
    let b = build_audit_event(1, "rainbow", 1, "System", "start", None);
    assert_ne!(a.event_id, b.event_id);
    assert!(a.created_at_ms > 0);
}

#[test]
fn test_shared_sink_records_through_arc() {
    let shared = Arc::new(Mutex::new(InMemoryAuditSink::new(4)));
    let mut handle = Arc::clone(&shared);
    handle.record(build_audit_event(3, "police", 10, "System", "evict", None));
    assert_eq!(shared.lock().events()[0].action, "evict");
}
