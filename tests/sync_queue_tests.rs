use calsync::{Event, EventData, SyncOperation, SyncQueue, SyncStatus};
use chrono::{Duration, TimeZone, Utc};
use std::fs;
use tempfile::TempDir;

fn event(uid: &str, title: &str) -> Event {
    let start = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
    Event::new(uid, "work", EventData::timed(title, start, start + Duration::hours(1)))
}

#[test]
fn test_repeated_updates_fold_into_one_entry() {
    let dir = TempDir::new().unwrap();
    let mut queue = SyncQueue::open(dir.path().join("queue.json")).unwrap();

    let id = queue.add_update(&event("a", "First")).unwrap();
    queue.mark_syncing(&id).unwrap();
    queue.mark_failed(&id, "timeout").unwrap();
    let folded = queue.add_update(&event("a", "Second")).unwrap();

    assert_eq!(folded, id);
    assert_eq!(queue.len(), 1);
    let entry = queue.get(&id).unwrap();
    assert_eq!(entry.retry_count, 0);
    assert_eq!(entry.status, SyncStatus::Pending);
    assert!(entry.last_error.is_none());
    assert_eq!(entry.payload.as_ref().unwrap().data.title, "Second");
}

#[test]
fn test_create_then_delete_cancels_out() {
    let dir = TempDir::new().unwrap();
    let mut queue = SyncQueue::open(dir.path().join("queue.json")).unwrap();

    queue.add_create(&event("a", "Draft")).unwrap();
    queue.add_update(&event("a", "Draft 2")).unwrap();
    assert_eq!(queue.add_delete(&event("a", "Draft 2")).unwrap(), None);
    assert!(queue.is_empty());
}

#[test]
fn test_update_then_delete_becomes_delete() {
    let dir = TempDir::new().unwrap();
    let mut queue = SyncQueue::open(dir.path().join("queue.json")).unwrap();

    let id = queue.add_update(&event("a", "Edited")).unwrap();
    assert_eq!(queue.add_delete(&event("a", "Edited")).unwrap(), Some(id.clone()));
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.get(&id).unwrap().operation, SyncOperation::Delete);
}

#[test]
fn test_edit_during_delivery_queues_a_fresh_entry() {
    let dir = TempDir::new().unwrap();
    let mut queue = SyncQueue::open(dir.path().join("queue.json")).unwrap();

    let in_flight = queue.add_update(&event("a", "Sent")).unwrap();
    queue.mark_syncing(&in_flight).unwrap();

    let fresh = queue.add_update(&event("a", "Newer")).unwrap();
    assert_ne!(fresh, in_flight);
    assert_eq!(queue.get(&in_flight).unwrap().payload.as_ref().unwrap().data.title, "Sent");

    queue.mark_synced(&in_flight).unwrap();
    let eligible = queue.eligible();
    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].payload.as_ref().unwrap().data.title, "Newer");
    assert!(queue.has_pending_for("a"));
}

#[test]
fn test_repeated_delete_keeps_one_entry() {
    let dir = TempDir::new().unwrap();
    let mut queue = SyncQueue::open(dir.path().join("queue.json")).unwrap();

    let first = queue.add_delete(&event("a", "Gone")).unwrap();
    let second = queue.add_delete(&event("a", "Gone")).unwrap();

    assert!(first.is_some());
    assert_eq!(second, first);
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.entries()[0].operation, SyncOperation::Delete);
}

#[test]
fn test_delete_drops_queued_exclusions() {
    let dir = TempDir::new().unwrap();
    let mut queue = SyncQueue::open(dir.path().join("queue.json")).unwrap();
    let start = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();

    let update = queue.add_update(&event("a", "Weekly renamed")).unwrap();
    queue.add_delete_occurrence(&event("a", "Weekly"), start).unwrap();
    queue.add_delete_occurrence(&event("b", "Other"), start).unwrap();
    let delete = queue.add_delete(&event("a", "Weekly renamed")).unwrap();

    assert_eq!(delete, Some(update.clone()));
    let ops: Vec<(&str, SyncOperation)> = queue
        .entries()
        .iter()
        .map(|e| (e.event_uid.as_str(), e.operation))
        .collect();
    assert_eq!(ops, vec![("a", SyncOperation::Delete), ("b", SyncOperation::DeleteOccurrence)]);

    // The pruned queue is what a restart sees.
    let reopened = SyncQueue::open(dir.path().join("queue.json")).unwrap();
    assert_eq!(reopened.len(), 2);
}

#[test]
fn test_delete_after_exclusion_alone_is_appended() {
    let dir = TempDir::new().unwrap();
    let mut queue = SyncQueue::open(dir.path().join("queue.json")).unwrap();
    let start = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();

    let exclusion = queue.add_delete_occurrence(&event("a", "Weekly"), start).unwrap();
    let delete = queue.add_delete(&event("a", "Weekly")).unwrap().unwrap();

    assert_ne!(delete, exclusion);
    assert!(queue.get(&exclusion).is_none());
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.entries()[0].operation, SyncOperation::Delete);
}

#[test]
fn test_occurrence_exclusions_are_never_folded() {
    let dir = TempDir::new().unwrap();
    let mut queue = SyncQueue::open(dir.path().join("queue.json")).unwrap();
    let start = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();

    queue.add_delete_occurrence(&event("a", "Weekly"), start).unwrap();
    queue.add_delete_occurrence(&event("a", "Weekly"), start + Duration::weeks(1)).unwrap();
    queue.add_update(&event("a", "Weekly renamed")).unwrap();

    let ops: Vec<SyncOperation> = queue.entries().iter().map(|e| e.operation).collect();
    assert_eq!(
        ops,
        vec![SyncOperation::DeleteOccurrence, SyncOperation::DeleteOccurrence, SyncOperation::Update]
    );
}

#[test]
fn test_restart_recovers_interrupted_entries() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.json");

    let (syncing, waiting) = {
        let mut queue = SyncQueue::open(&path).unwrap();
        let syncing = queue.add_create(&event("a", "A")).unwrap();
        let waiting = queue.add_update(&event("b", "B")).unwrap();
        queue.mark_syncing(&syncing).unwrap();
        (syncing, waiting)
    };

    let queue = SyncQueue::open(&path).unwrap();
    let ids: Vec<&str> = queue.entries().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec![syncing.as_str(), waiting.as_str()]);
    assert!(queue.entries().iter().all(|e| e.status == SyncStatus::Pending));
    assert_eq!(queue.get(&syncing).unwrap().retry_count, 0);
}

#[test]
fn test_corrupt_queue_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.json");
    fs::write(&path, "{\"pending\": [").unwrap();

    assert!(SyncQueue::open(&path).is_err());
    // Left in place for inspection.
    assert!(path.exists());
}

#[test]
fn test_queue_file_is_plain_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.json");
    let mut queue = SyncQueue::open(&path).unwrap();
    queue.add_create(&event("a", "A")).unwrap();

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let pending = value["pending"].as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["operation"], "create");
    assert_eq!(pending[0]["event_uid"], "a");
}
