//! Per-source event cache.
//!
//! Holds the last raw payload fetched for one source, the master events
//! parsed from it plus any local edits, and an interval index over each
//! event's bounding span. The index is derived state: any change to the
//! event set drops it, and the next query builds a fresh one and swaps it
//! in whole.

use crate::calendar::recurrence::{expand, span};
use crate::calendar::{parse_calendar, TimeRange};
use crate::error::AppResult;
use crate::interval_tree::IntervalTree;
use crate::models::{Event, Occurrence};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;

pub struct SourceCache {
    source_id: String,
    raw_payload: Option<String>,
    events: HashMap<String, Arc<Event>>,
    window: Option<TimeRange>,
    index: Option<IntervalTree<DateTime<Utc>, String>>,
}

impl SourceCache {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            raw_payload: None,
            events: HashMap::new(),
            window: None,
            index: None,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn raw_payload(&self) -> Option<&str> {
        self.raw_payload.as_deref()
    }

    pub fn window(&self) -> Option<TimeRange> {
        self.window
    }

    pub fn set_window(&mut self, window: TimeRange) {
        self.window = Some(window);
    }

    /// Whether `[start, end)` lies inside the last fetched window.
    pub fn covers(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.window.map(|w| w.covers(start, end)).unwrap_or(false)
    }

    /// Forget the fetched window so the next query re-fetches. Cached events
    /// stay available for offline reads.
    pub fn invalidate(&mut self) {
        debug!("Invalidating cache for source '{}'", self.source_id);
        self.window = None;
    }

    /// Replace the cached payload. Nothing changes if the payload does not
    /// parse. Events with unsynced local changes win over the server copy.
    pub fn update(&mut self, raw_payload: String) -> AppResult<usize> {
        let parsed = parse_calendar(&raw_payload, &self.source_id)?;

        let mut events: HashMap<String, Arc<Event>> = parsed
            .into_iter()
            .map(|event| (event.uid.clone(), Arc::new(event)))
            .collect();
        let server_count = events.len();

        for (uid, local) in self.events.iter().filter(|(_, e)| e.is_pending()) {
            events.insert(uid.clone(), Arc::clone(local));
        }

        self.events = events;
        self.raw_payload = Some(raw_payload);
        self.index = None;
        Ok(server_count)
    }

    /// Seed from persisted events, e.g. on a cold start without network.
    pub fn load(&mut self, events: Vec<Event>) {
        self.events = events
            .into_iter()
            .map(|event| (event.uid.clone(), Arc::new(event)))
            .collect();
        self.index = None;
    }

    /// Insert or replace by uid.
    pub fn add(&mut self, event: Event) -> Arc<Event> {
        let event = Arc::new(event);
        self.events.insert(event.uid.clone(), Arc::clone(&event));
        self.index = None;
        event
    }

    pub fn remove(&mut self, uid: &str) -> Option<Arc<Event>> {
        let removed = self.events.remove(uid);
        if removed.is_some() {
            self.index = None;
        }
        removed
    }

    pub fn get(&self, uid: &str) -> Option<Arc<Event>> {
        self.events.get(uid).cloned()
    }

    /// All master events ordered by start.
    pub fn list(&self) -> Vec<Arc<Event>> {
        let mut events: Vec<Arc<Event>> = self.events.values().cloned().collect();
        events.sort_by(|a, b| a.data.start.cmp(&b.data.start).then_with(|| a.uid.cmp(&b.uid)));
        events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn build_index(&self) -> IntervalTree<DateTime<Utc>, String> {
        let mut tree = IntervalTree::new();
        for event in self.events.values() {
            let (start, end) = span(event).unwrap_or_else(|e| {
                warn!("Indexing '{}' without a bounded span: {}", event.uid, e);
                (event.data.start, DateTime::<Utc>::MAX_UTC)
            });
            tree.insert(start, end, event.uid.clone());
        }
        tree
    }

    /// Occurrences intersecting `[start, end)`, ordered by start.
    pub fn query(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Occurrence> {
        if self.index.is_none() {
            let rebuilt = self.build_index();
            self.index = Some(rebuilt);
        }
        let Some(index) = &self.index else {
            return Vec::new();
        };

        let mut occurrences = Vec::new();
        for entry in index.find_intersecting(start, end) {
            let Some(event) = self.events.get(entry.payload) else {
                continue;
            };
            match expand(event, start, end) {
                Ok(found) => occurrences.extend(found),
                Err(e) => warn!("Skipping event '{}' in '{}': {}", event.uid, self.source_id, e),
            }
        }

        occurrences.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| a.end.cmp(&b.end))
                .then_with(|| a.event.uid.cmp(&b.event.uid))
        });
        occurrences
    }

    #[cfg(test)]
    fn index_size(&self) -> Option<usize> {
        self.index.as_ref().map(|i| i.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventChanges, EventData, PendingOperation, RecurrenceRule};
    use chrono::{Duration, TimeZone};

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap()
    }

    fn feed(title: &str) -> String {
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\n\
BEGIN:VEVENT\r\nUID:a\r\nDTSTART:20240304T100000Z\r\nDTEND:20240304T110000Z\r\nSUMMARY:{}\r\nEND:VEVENT\r\n\
BEGIN:VEVENT\r\nUID:b\r\nDTSTART:20240320T100000Z\r\nDTEND:20240320T110000Z\r\nSUMMARY:Later\r\nEND:VEVENT\r\n\
END:VCALENDAR\r\n",
            title
        )
    }

    #[test]
    fn test_update_then_query() {
        let mut cache = SourceCache::new("work");
        assert_eq!(cache.update(feed("First")).unwrap(), 2);

        let occs = cache.query(at(1, 0), at(10, 0));
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].title(), "First");
        assert_eq!(cache.index_size(), Some(2));
    }

    #[test]
    fn test_bad_payload_leaves_cache_untouched() {
        let mut cache = SourceCache::new("work");
        cache.update(feed("First")).unwrap();
        assert!(cache.update("not a calendar".to_string()).is_err());
        assert_eq!(cache.len(), 2);
        assert!(cache.raw_payload().unwrap().contains("First"));
    }

    #[test]
    fn test_update_keeps_pending_local_edits() {
        let mut cache = SourceCache::new("work");
        cache.update(feed("Server")).unwrap();

        let local = cache
            .get("a")
            .unwrap()
            .apply_changes(&EventChanges::retitle("Local"))
            .unwrap()
            .with_pending(PendingOperation::Update);
        cache.add(local);
        cache.add(Event::new_local("work", EventData::timed("New", at(5, 9), at(5, 10))));

        cache.update(feed("Server again")).unwrap();
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("a").unwrap().data.title, "Local");
    }

    #[test]
    fn test_mutations_drop_the_index() {
        let mut cache = SourceCache::new("work");
        cache.update(feed("First")).unwrap();
        cache.query(at(1, 0), at(31, 0));
        assert!(cache.index_size().is_some());

        cache.add(Event::new("c", "work", EventData::timed("C", at(6, 9), at(6, 10))));
        assert!(cache.index_size().is_none());
        assert_eq!(cache.query(at(1, 0), at(31, 0)).len(), 3);

        cache.remove("c");
        assert_eq!(cache.query(at(1, 0), at(31, 0)).len(), 2);
    }

    #[test]
    fn test_recurring_event_found_through_span() {
        let mut cache = SourceCache::new("work");
        let start = at(1, 9);
        cache.add(Event::new(
            "weekly",
            "work",
            EventData::timed("Weekly", start, start + Duration::hours(1))
                .with_recurrence(RecurrenceRule::weekly()),
        ));
        let occs = cache.query(
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap(),
        );
        assert_eq!(occs.len(), 4);
    }

    #[test]
    fn test_window_coverage_and_invalidate() {
        let mut cache = SourceCache::new("work");
        assert!(!cache.covers(at(1, 0), at(2, 0)));
        cache.set_window(TimeRange::new(at(1, 0), at(20, 0)));
        assert!(cache.covers(at(2, 0), at(3, 0)));
        assert!(!cache.covers(at(2, 0), at(21, 0)));
        cache.invalidate();
        assert!(!cache.covers(at(2, 0), at(3, 0)));
    }
}
