use calsync::{
    CalendarSource, Database, Event, EventData, PendingOperation, RemoteCalendar, RemoteError, SourceMetadata,
    StoreConfig, StoreCoordinator, TimeRange,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Test//EN\r\n\
BEGIN:VEVENT\r\n\
UID:review@example.com\r\n\
DTSTART:20240605T140000Z\r\n\
DTEND:20240605T150000Z\r\n\
SUMMARY:Design review\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:sync@example.com\r\n\
DTSTART:20240603T080000Z\r\n\
DTEND:20240603T081500Z\r\n\
RRULE:FREQ=WEEKLY;COUNT=3\r\n\
SUMMARY:Weekly sync\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

/// Serves a fixed feed, or fails every call when `online` is false.
struct FixedRemote {
    online: bool,
    token: Option<&'static str>,
    fetches: AtomicUsize,
}

impl FixedRemote {
    fn online(token: Option<&'static str>) -> Self {
        Self { online: true, token, fetches: AtomicUsize::new(0) }
    }

    fn offline() -> Self {
        Self { online: false, token: None, fetches: AtomicUsize::new(0) }
    }

    fn check(&self) -> Result<(), RemoteError> {
        if self.online {
            Ok(())
        } else {
            Err(RemoteError::Network("network unreachable".to_string()))
        }
    }
}

impl RemoteCalendar for FixedRemote {
    fn fetch_raw(&self, _range: TimeRange) -> Result<String, RemoteError> {
        self.check()?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(FEED.to_string())
    }

    fn push_create(&self, _payload: &str) -> Result<(), RemoteError> {
        self.check()
    }

    fn push_update(&self, _uid: &str, _payload: &str) -> Result<(), RemoteError> {
        self.check()
    }

    fn push_delete(&self, _uid: &str) -> Result<(), RemoteError> {
        self.check()
    }

    fn push_exclude_occurrence(&self, _uid: &str, _start: DateTime<Utc>) -> Result<(), RemoteError> {
        self.check()
    }

    fn change_token(&self) -> Result<Option<String>, RemoteError> {
        self.check()?;
        Ok(self.token.map(str::to_string))
    }
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
}

#[tokio::test]
async fn test_database_round_trip() {
    let dir = TempDir::new().unwrap();
    let db = Database::open(&dir.path().join("events.db")).await.unwrap();

    let first = Event::new("a", "work", EventData::timed("A", at(3, 9), at(3, 10)));
    let second = Event::new("b", "work", EventData::timed("B", at(4, 9), at(4, 10)))
        .with_pending(PendingOperation::Update);
    db.save_events("work", &[first.clone(), second.clone()]).await.unwrap();

    let loaded = db.load_events("work").await.unwrap();
    assert_eq!(loaded, vec![first, second]);
    assert!(db.delete_event("work", "a").await.unwrap());
    assert_eq!(db.load_events("work").await.unwrap().len(), 1);
    assert!(db.load_events("home").await.unwrap().is_empty());

    let mut metadata = SourceMetadata::new("work");
    metadata.record_success(Utc::now(), Some("ctag-7".to_string()));
    db.save_source_metadata(&metadata).await.unwrap();
    assert_eq!(db.load_source_metadata("work").await.unwrap(), Some(metadata));
}

#[tokio::test]
async fn test_cold_start_without_network_serves_last_known_state() {
    let dir = TempDir::new().unwrap();
    let source = CalendarSource::new_caldav("work", "Work", "me@example.com");

    let local_uid = {
        let mut store = StoreCoordinator::open(StoreConfig::in_dir(dir.path())).await.unwrap();
        store
            .register_source(source.clone(), Arc::new(FixedRemote::online(None)))
            .await
            .unwrap();
        assert_eq!(store.get_occurrences(at(3, 0), at(8, 0)).await.unwrap().len(), 2);
        let created = store
            .create_event("work", EventData::timed("Lunch", at(5, 12), at(5, 13)))
            .await
            .unwrap();
        store.shutdown().await;
        created.uid.clone()
    };

    let mut store = StoreCoordinator::open(StoreConfig::in_dir(dir.path())).await.unwrap();
    store
        .register_source(source, Arc::new(FixedRemote::offline()))
        .await
        .unwrap();

    let occurrences = store.get_occurrences(at(3, 0), at(8, 0)).await.unwrap();
    let titles: Vec<&str> = occurrences.iter().map(|o| o.title()).collect();
    assert_eq!(titles, vec!["Weekly sync", "Lunch", "Design review"]);

    let local = store.get_event("work", &local_uid).unwrap();
    assert_eq!(local.pending_operation, PendingOperation::Create);
    assert_eq!(store.pending_changes().len(), 1);
    assert!(store.source_metadata("work").unwrap().last_success.is_some());

    let report = store.sync().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(store.pending_changes()[0].retry_count, 1);
}

#[tokio::test]
async fn test_unchanged_feed_is_not_downloaded_again() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(FixedRemote::online(Some("\"etag-1\"")));
    let mut store = StoreCoordinator::open(StoreConfig::in_dir(dir.path())).await.unwrap();
    store
        .register_source(CalendarSource::new_ics("team", "Team"), remote.clone())
        .await
        .unwrap();

    assert_eq!(store.get_occurrences(at(3, 0), at(8, 0)).await.unwrap().len(), 2);
    // Far outside the prefetched window, so the source is asked again.
    let later = at(3, 0) + Duration::days(365);
    assert!(store.get_occurrences(later, later + Duration::days(7)).await.unwrap().is_empty());
    assert_eq!(store.get_occurrences(at(3, 0), at(8, 0)).await.unwrap().len(), 2);

    assert_eq!(remote.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(
        store.source_metadata("team").unwrap().change_token.as_deref(),
        Some("\"etag-1\"")
    );
}
