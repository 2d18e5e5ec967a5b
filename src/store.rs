//! Store coordinator.
//!
//! Owns one [`SourceCache`] per registered calendar, the single
//! [`SyncQueue`], the worker pool that runs every blocking remote call, and
//! the optional offline database. All of its state is mutated from the task
//! that holds it; remote calls only ever happen on pool threads and report
//! back through pool completions.

use crate::cache::SourceCache;
use crate::calendar::ics::all_day_anchor;
use crate::calendar::recurrence::{expand, validate_event};
use crate::calendar::{generate_event, RemoteCalendar, TimeRange};
use crate::config::StoreConfig;
use crate::database::Database;
use crate::error::{AppError, AppResult, RemoteError};
use crate::models::{
    CalendarSource, Event, EventChanges, EventData, Occurrence, PendingChange, PendingOperation,
    SourceKind, SourceMetadata, SyncOperation, SyncReport, SyncStatus,
};
use crate::sync_queue::SyncQueue;
use crate::utils::logging::{log_error_with_context, log_source_fetch, log_sync_pass};
use crate::utils::{normalize_title, prefetch_window};
use crate::utils::retry::Backoff;
use crate::worker::{Completion, TaskOutcome, Ticket, WorkerPool};
use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// What a fetch job brings back. `raw` is `None` when the remote's change
/// token matched the one on record and the cached payload is still current.
#[derive(Debug)]
pub struct FetchedPayload {
    pub raw: Option<String>,
    pub change_token: Option<String>,
}

#[derive(Debug)]
pub enum JobResult {
    Fetch(Result<FetchedPayload, RemoteError>),
    Push(Result<(), RemoteError>),
}

enum PushRequest {
    Create(String),
    Update { uid: String, payload: String },
    Delete { uid: String },
    ExcludeOccurrence { uid: String, start: DateTime<Utc> },
}

impl PushRequest {
    fn from_change(change: &PendingChange) -> AppResult<Self> {
        let payload = || {
            change
                .payload
                .as_ref()
                .map(generate_event)
                .ok_or_else(|| AppError::invalid_input(format!("change {} has no payload", change.id)))
        };
        let uid = change.event_uid.clone();
        Ok(match change.operation {
            SyncOperation::Create => PushRequest::Create(payload()?),
            SyncOperation::Update => PushRequest::Update { uid, payload: payload()? },
            SyncOperation::Delete => PushRequest::Delete { uid },
            SyncOperation::DeleteOccurrence => {
                let start = change.occurrence_start.ok_or_else(|| {
                    AppError::invalid_input(format!("change {} has no occurrence start", change.id))
                })?;
                PushRequest::ExcludeOccurrence { uid, start }
            }
        })
    }

    fn send(self, remote: &dyn RemoteCalendar) -> Result<(), RemoteError> {
        match self {
            PushRequest::Create(payload) => remote.push_create(&payload),
            PushRequest::Update { uid, payload } => remote.push_update(&uid, &payload),
            PushRequest::Delete { uid } => remote.push_delete(&uid),
            PushRequest::ExcludeOccurrence { uid, start } => remote.push_exclude_occurrence(&uid, start),
        }
    }
}

fn fetch(remote: &dyn RemoteCalendar, range: TimeRange, known_token: Option<String>) -> JobResult {
    let change_token = match remote.change_token() {
        Ok(token) => token,
        Err(e) => {
            debug!("Change token unavailable: {}", e);
            None
        }
    };
    if let (Some(known), Some(current)) = (&known_token, &change_token) {
        if known == current {
            return JobResult::Fetch(Ok(FetchedPayload { raw: None, change_token }));
        }
    }
    JobResult::Fetch(remote.fetch_raw(range).map(|raw| FetchedPayload {
        raw: Some(raw),
        change_token,
    }))
}

struct SourceEntry {
    source: CalendarSource,
    remote: Arc<dyn RemoteCalendar>,
    cache: SourceCache,
    metadata: SourceMetadata,
}

struct FetchRequest {
    source_id: String,
    window: TimeRange,
    started: Instant,
}

pub struct StoreCoordinator {
    config: StoreConfig,
    order: Vec<String>,
    sources: HashMap<String, SourceEntry>,
    queue: SyncQueue,
    pool: WorkerPool<JobResult>,
    db: Option<Database>,
    backoff: Backoff,
}

impl StoreCoordinator {
    pub async fn open(config: StoreConfig) -> AppResult<Self> {
        config.validate()?;
        let queue = SyncQueue::open(&config.queue_path)?.with_max_retries(config.max_retries());
        let db = match &config.database_path {
            Some(path) => Some(Database::open(path).await?),
            None => None,
        };
        info!(
            "Store opened with {} queued changes, offline cache {}",
            queue.len(),
            if db.is_some() { "enabled" } else { "disabled" }
        );

        Ok(Self {
            pool: WorkerPool::new(config.worker_count, config.request_timeout),
            backoff: Backoff::new(config.retry.clone()),
            order: Vec::new(),
            sources: HashMap::new(),
            queue,
            db,
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // --- Sources ---

    /// Register a calendar and the remote that backs it. Events cached by a
    /// previous run are available immediately, before any fetch.
    pub async fn register_source(
        &mut self,
        source: CalendarSource,
        remote: Arc<dyn RemoteCalendar>,
    ) -> AppResult<()> {
        if self.sources.contains_key(&source.id) {
            return Err(AppError::invalid_input(format!("source '{}' is already registered", source.id)));
        }

        let mut cache = SourceCache::new(source.id.clone());
        let mut metadata = SourceMetadata::new(source.id.clone());
        if let Some(db) = &self.db {
            let events = db.load_events(&source.id).await?;
            if !events.is_empty() {
                info!("Loaded {} cached events for '{}'", events.len(), source.id);
            }
            cache.load(events);
            if let Some(stored) = db.load_source_metadata(&source.id).await? {
                metadata = stored;
            }
        }

        info!("Registered {} source '{}'", source.kind.as_str(), source.id);
        self.order.push(source.id.clone());
        self.sources.insert(
            source.id.clone(),
            SourceEntry {
                source,
                remote,
                cache,
                metadata,
            },
        );
        Ok(())
    }

    /// Registered sources in registration order.
    pub fn sources(&self) -> Vec<&CalendarSource> {
        self.order
            .iter()
            .filter_map(|id| self.sources.get(id).map(|entry| &entry.source))
            .collect()
    }

    pub fn source_metadata(&self, source_id: &str) -> Option<&SourceMetadata> {
        self.sources.get(source_id).map(|entry| &entry.metadata)
    }

    fn entry_mut(&mut self, source_id: &str) -> AppResult<&mut SourceEntry> {
        self.sources
            .get_mut(source_id)
            .ok_or_else(|| AppError::not_found(format!("source '{}'", source_id)))
    }

    pub fn set_visibility(&mut self, source_id: &str, visible: bool) -> AppResult<()> {
        self.entry_mut(source_id)?.source.visible = visible;
        Ok(())
    }

    pub fn set_color(&mut self, source_id: &str, color: impl Into<String>) -> AppResult<()> {
        self.entry_mut(source_id)?.source.color = color.into();
        Ok(())
    }

    pub fn rename_source(&mut self, source_id: &str, name: impl Into<String>) -> AppResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AppError::invalid_input("source name cannot be empty"));
        }
        self.entry_mut(source_id)?.source.name = name;
        Ok(())
    }

    /// Look up a source that accepts local edits.
    fn writable_mut(&mut self, source_id: &str) -> AppResult<&mut SourceEntry> {
        let entry = self.entry_mut(source_id)?;
        if entry.source.read_only {
            return Err(AppError::permission_denied(format!("source '{}' is read-only", source_id)));
        }
        Ok(entry)
    }

    // --- Reads ---

    pub fn get_event(&self, source_id: &str, uid: &str) -> Option<Arc<Event>> {
        self.sources.get(source_id).and_then(|entry| entry.cache.get(uid))
    }

    pub fn list_events(&self, source_id: &str) -> AppResult<Vec<Arc<Event>>> {
        self.sources
            .get(source_id)
            .map(|entry| entry.cache.list())
            .ok_or_else(|| AppError::not_found(format!("source '{}'", source_id)))
    }

    /// Occurrences of every visible source intersecting `[start, end)`,
    /// ordered by start. Sources whose fetched window does not cover the
    /// request are refreshed first over a wider prefetch window; a source
    /// that cannot be reached is served from what it has cached.
    pub async fn get_occurrences(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Occurrence>> {
        if end < start {
            return Err(AppError::invalid_input("query window ends before it starts"));
        }

        let (from, to) = prefetch_window(start, end, self.config.prefetch_margin());
        let window = TimeRange::new(from, to);

        let mut requests: HashMap<Ticket, FetchRequest> = HashMap::new();
        for id in &self.order {
            let Some(entry) = self.sources.get(id) else {
                continue;
            };
            if !entry.source.visible || entry.cache.covers(start, end) {
                continue;
            }

            // Feeds return the whole calendar, so an unchanged token means the
            // cached payload is still the full truth.
            let known_token = match entry.source.kind {
                SourceKind::Ics if entry.cache.raw_payload().is_some() => entry.metadata.change_token.clone(),
                _ => None,
            };
            let remote = Arc::clone(&entry.remote);
            debug!("Prefetching '{}' over {} .. {}", id, window.start, window.end);
            let ticket = self.pool.submit(move || fetch(remote.as_ref(), window, known_token));
            requests.insert(
                ticket,
                FetchRequest {
                    source_id: id.clone(),
                    window,
                    started: Instant::now(),
                },
            );
        }

        let mut crashed = None;
        while !requests.is_empty() {
            let Some(Completion { ticket, outcome }) = self.pool.next_completion().await else {
                break;
            };
            let Some(request) = requests.remove(&ticket) else {
                warn!("Ignoring completion for unknown ticket {:?}", ticket);
                continue;
            };
            match outcome {
                TaskOutcome::Finished(JobResult::Fetch(result)) => self.apply_fetch(request, result).await,
                TaskOutcome::Finished(JobResult::Push(_)) => {
                    warn!("Fetch for '{}' returned a push result", request.source_id);
                }
                TaskOutcome::TimedOut => self.apply_fetch(request, Err(RemoteError::Timeout)).await,
                TaskOutcome::Crashed(message) => {
                    self.record_attempt(&request.source_id).await;
                    crashed = Some(message);
                }
            }
        }
        if let Some(message) = crashed {
            return Err(AppError::TaskCrashed(message));
        }

        let mut occurrences = Vec::new();
        for id in &self.order {
            if let Some(entry) = self.sources.get_mut(id) {
                if entry.source.visible {
                    occurrences.extend(entry.cache.query(start, end));
                }
            }
        }
        occurrences.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| a.end.cmp(&b.end))
                .then_with(|| a.uid().cmp(b.uid()))
        });
        Ok(occurrences)
    }

    async fn apply_fetch(&mut self, request: FetchRequest, result: Result<FetchedPayload, RemoteError>) {
        let now = Utc::now();
        let Some(entry) = self.sources.get_mut(&request.source_id) else {
            return;
        };

        match result {
            Ok(FetchedPayload { raw: None, change_token }) => {
                debug!("'{}' unchanged since last fetch, reusing payload", request.source_id);
                entry.cache.set_window(request.window);
                entry.metadata.record_success(now, change_token);
            }
            Ok(FetchedPayload { raw: Some(raw), change_token }) => match entry.cache.update(raw) {
                Ok(count) => {
                    entry.cache.set_window(request.window);
                    entry.metadata.record_success(now, change_token);
                    log_source_fetch(&request.source_id, count, request.started.elapsed());

                    let events: Vec<Event> = entry.cache.list().iter().map(|e| (**e).clone()).collect();
                    if let Some(db) = &self.db {
                        if let Err(e) = db.save_events(&request.source_id, &events).await {
                            log_error_with_context(&e, "Persist cached events");
                        }
                    }
                }
                Err(e) => {
                    warn!("Keeping stale data for '{}': {}", request.source_id, e);
                    entry.metadata.record_attempt(now);
                }
            },
            Err(e) => {
                log_error_with_context(&e, &format!("Fetch '{}'", request.source_id));
                entry.metadata.record_attempt(now);
            }
        }

        let metadata = entry.metadata.clone();
        self.save_metadata(&metadata).await;
    }

    async fn record_attempt(&mut self, source_id: &str) {
        let Some(entry) = self.sources.get_mut(source_id) else {
            return;
        };
        entry.metadata.record_attempt(Utc::now());
        let metadata = entry.metadata.clone();
        self.save_metadata(&metadata).await;
    }

    async fn save_metadata(&self, metadata: &SourceMetadata) {
        if let Some(db) = &self.db {
            if let Err(e) = db.save_source_metadata(metadata).await {
                log_error_with_context(&e, "Persist source metadata");
            }
        }
    }

    async fn persist_event(&self, source_id: &str, event: &Event) {
        if let Some(db) = &self.db {
            if let Err(e) = db.save_event(source_id, event).await {
                log_error_with_context(&e, "Persist event");
            }
        }
    }

    async fn forget_event(&self, source_id: &str, uid: &str) {
        if let Some(db) = &self.db {
            if let Err(e) = db.delete_event(source_id, uid).await {
                log_error_with_context(&e, "Remove cached event");
            }
        }
    }

    // --- Local mutations ---
    //
    // Each mutation is validated before anything is written, queued before
    // the cache changes, and marked pending so readers see it immediately.

    pub async fn create_event(&mut self, source_id: &str, data: EventData) -> AppResult<Arc<Event>> {
        self.writable_mut(source_id)?;
        let event = Event::new_local(source_id, normalize(data));
        validate_event(&event)?;

        self.queue.add_create(&event)?;
        let stored = entry_cache_add(&mut self.sources, source_id, event);
        info!("Created event '{}' in '{}'", stored.uid, source_id);
        self.persist_event(source_id, &stored).await;
        Ok(stored)
    }

    pub async fn update_event(
        &mut self,
        source_id: &str,
        uid: &str,
        changes: &EventChanges,
    ) -> AppResult<Arc<Event>> {
        let entry = self.writable_mut(source_id)?;
        let current = entry
            .cache
            .get(uid)
            .ok_or_else(|| AppError::not_found(format!("event '{}' in '{}'", uid, source_id)))?;
        if current.pending_operation == PendingOperation::Delete {
            return Err(AppError::invalid_input(format!("event '{}' is being deleted", uid)));
        }
        if changes.is_empty() {
            return Ok(current);
        }

        let mut updated = current.apply_changes(changes)?;
        updated.data = normalize(updated.data);
        validate_event(&updated)?;
        let updated = updated.with_pending(PendingOperation::Update);

        self.queue.add_update(&updated)?;
        let stored = entry_cache_add(&mut self.sources, source_id, updated);
        debug!("Updated event '{}' ({:?})", uid, stored.pending_operation);
        self.persist_event(source_id, &stored).await;
        Ok(stored)
    }

    pub async fn delete_event(&mut self, source_id: &str, uid: &str) -> AppResult<()> {
        let entry = self.writable_mut(source_id)?;
        let current = entry
            .cache
            .get(uid)
            .ok_or_else(|| AppError::not_found(format!("event '{}' in '{}'", uid, source_id)))?;
        if current.pending_operation == PendingOperation::Delete {
            debug!("Event '{}' is already queued for deletion", uid);
            return Ok(());
        }

        match self.queue.add_delete(&current)? {
            None => {
                if let Some(entry) = self.sources.get_mut(source_id) {
                    entry.cache.remove(uid);
                }
                debug!("Event '{}' never reached the server, dropped locally", uid);
                self.forget_event(source_id, uid).await;
            }
            Some(_) => {
                let marked = (*current).clone().with_pending(PendingOperation::Delete);
                let stored = entry_cache_add(&mut self.sources, source_id, marked);
                self.persist_event(source_id, &stored).await;
            }
        }
        Ok(())
    }

    /// Exclude the occurrence of a recurring event that starts at
    /// `occurrence_start`.
    pub async fn delete_occurrence(
        &mut self,
        source_id: &str,
        uid: &str,
        occurrence_start: DateTime<Utc>,
    ) -> AppResult<Arc<Event>> {
        let entry = self.writable_mut(source_id)?;
        let current = entry
            .cache
            .get(uid)
            .ok_or_else(|| AppError::not_found(format!("event '{}' in '{}'", uid, source_id)))?;
        if current.pending_operation == PendingOperation::Delete {
            return Err(AppError::invalid_input(format!("event '{}' is being deleted", uid)));
        }
        if !current.is_recurring() {
            return Err(AppError::invalid_input(format!("event '{}' does not recur", uid)));
        }

        let nearby = expand(
            &current,
            occurrence_start - Duration::seconds(1),
            occurrence_start + Duration::seconds(1),
        )?;
        if !nearby.iter().any(|occ| occ.start == occurrence_start) {
            return Err(AppError::not_found(format!(
                "occurrence of '{}' at {}",
                uid, occurrence_start
            )));
        }

        let excluded = current.with_exdate(occurrence_start);
        let excluded = if current.pending_operation == PendingOperation::Create {
            // Still unsent: the exclusion rides along with the create.
            self.queue.add_update(&excluded)?;
            excluded
        } else {
            let marked = excluded.with_pending(PendingOperation::Update);
            self.queue.add_delete_occurrence(&marked, occurrence_start)?;
            marked
        };

        let stored = entry_cache_add(&mut self.sources, source_id, excluded);
        self.persist_event(source_id, &stored).await;
        Ok(stored)
    }

    // --- Sync ---

    pub fn pending_changes(&self) -> &[PendingChange] {
        self.queue.entries()
    }

    /// Changes that reached the retry ceiling and need user attention.
    pub fn failed_changes(&self) -> Vec<&PendingChange> {
        self.queue.permanently_failed()
    }

    /// Delay before the next automatic sync pass.
    pub fn retry_delay(&self) -> std::time::Duration {
        self.backoff.current()
    }

    /// Deliver eligible queued changes in insertion order, one at a time.
    pub async fn sync(&mut self) -> AppResult<SyncReport> {
        let mut report = SyncReport::empty();

        // Nothing can be in flight between passes, so anything still marked
        // syncing was interrupted.
        let interrupted: Vec<String> = self
            .queue
            .entries()
            .iter()
            .filter(|c| c.status == SyncStatus::Syncing)
            .map(|c| c.id.clone())
            .collect();
        for id in interrupted {
            self.queue.reset_to_pending(&id)?;
        }

        let ids: Vec<String> = self.queue.eligible().iter().map(|c| c.id.clone()).collect();
        let mut crashed = None;

        for id in ids {
            let Some(change) = self.queue.get(&id).cloned() else {
                continue;
            };
            let Some(remote) = self.sources.get(&change.calendar_id).map(|e| Arc::clone(&e.remote)) else {
                debug!("Skipping change {} for unregistered source '{}'", id, change.calendar_id);
                continue;
            };
            let request = match PushRequest::from_change(&change) {
                Ok(request) => request,
                Err(e) => {
                    self.queue.mark_failed(&id, &e.to_string())?;
                    report.record_failure(e.to_safe_string());
                    continue;
                }
            };

            self.queue.mark_syncing(&id)?;
            let ticket = self.pool.submit(move || JobResult::Push(request.send(remote.as_ref())));

            match self.wait_for(ticket).await {
                Some(TaskOutcome::Finished(JobResult::Push(Ok(())))) => {
                    self.complete_change(&id).await?;
                    report.record_success();
                }
                Some(TaskOutcome::Finished(JobResult::Push(Err(e)))) => {
                    if !e.is_transient() {
                        warn!("Change {} rejected: {}", id, e);
                    }
                    self.queue.mark_failed(&id, &e.to_string())?;
                    report.record_failure(e.to_string());
                }
                Some(TaskOutcome::Finished(JobResult::Fetch(_))) | None => {
                    self.queue.mark_failed(&id, "push produced no result")?;
                    report.record_failure("push produced no result".to_string());
                }
                Some(TaskOutcome::TimedOut) => {
                    let e = RemoteError::Timeout;
                    self.queue.mark_failed(&id, &e.to_string())?;
                    report.record_failure(e.to_string());
                }
                Some(TaskOutcome::Crashed(message)) => {
                    self.queue.mark_failed(&id, &message)?;
                    report.record_failure(message.clone());
                    crashed = Some(message);
                    break;
                }
            }
        }

        let next_delay = if report.is_clean() {
            self.backoff.on_success()
        } else {
            self.backoff.on_failure()
        };
        if report.attempted > 0 {
            log_sync_pass(report.attempted, report.synced, report.failed, next_delay);
        }

        match crashed {
            Some(message) => Err(AppError::TaskCrashed(message)),
            None => Ok(report),
        }
    }

    async fn wait_for(&mut self, ticket: Ticket) -> Option<TaskOutcome<JobResult>> {
        while let Some(completion) = self.pool.next_completion().await {
            if completion.ticket == ticket {
                return Some(completion.outcome);
            }
            warn!("Ignoring completion for unexpected ticket {:?}", completion.ticket);
        }
        None
    }

    /// Server confirmed `id`. The event keeps its pending marker while other
    /// changes for it are still queued.
    async fn complete_change(&mut self, id: &str) -> AppResult<()> {
        let change = self.queue.mark_synced(id)?;
        let uid = change.event_uid.as_str();
        let still_pending = self.queue.has_pending_for(uid);
        let Some(entry) = self.sources.get_mut(&change.calendar_id) else {
            return Ok(());
        };

        entry.cache.invalidate();
        if still_pending {
            return Ok(());
        }

        if change.operation == SyncOperation::Delete {
            entry.cache.remove(uid);
            self.forget_event(&change.calendar_id, uid).await;
        } else if let Some(current) = entry.cache.get(uid) {
            let settled = entry.cache.add((*current).clone().clear_pending());
            self.persist_event(&change.calendar_id, &settled).await;
        }
        Ok(())
    }

    /// Cancel outstanding pool work and close the offline database.
    pub async fn shutdown(&mut self) {
        self.pool.cancel_all();
        if let Some(db) = &self.db {
            db.pool.close().await;
        }
        info!("Store shut down with {} changes still queued", self.queue.len());
    }
}

fn entry_cache_add(sources: &mut HashMap<String, SourceEntry>, source_id: &str, event: Event) -> Arc<Event> {
    match sources.get_mut(source_id) {
        Some(entry) => entry.cache.add(event),
        None => Arc::new(event),
    }
}

/// Trim the title and snap all-day events to whole UTC days, end exclusive.
fn normalize(mut data: EventData) -> EventData {
    data.title = normalize_title(&data.title);
    if data.all_day {
        data.start = all_day_anchor(data.start);
        let end = all_day_anchor(data.end);
        data.end = if end <= data.start { data.start + Duration::days(1) } else { end };
    }
    data
}

/// Drive sync passes until `shutdown` fires, sleeping for the coordinator's
/// backoff delay between passes. A crashed pool task ends the loop with an
/// error.
pub async fn run_sync_loop(
    store: Arc<Mutex<StoreCoordinator>>,
    shutdown: CancellationToken,
    reports: Option<mpsc::Sender<SyncReport>>,
) -> AppResult<()> {
    info!("Starting sync loop");

    loop {
        if shutdown.is_cancelled() {
            info!("Shutdown signal received, stopping sync loop");
            break;
        }

        let delay = {
            let mut store = store.lock().await;
            match store.sync().await {
                Ok(report) => {
                    debug!("Sync pass finished: {} synced, {} failed", report.synced, report.failed);
                    if let Some(tx) = &reports {
                        let _ = tx.send(report).await;
                    }
                }
                Err(AppError::TaskCrashed(message)) => {
                    error!("Sync loop stopping after a crashed task: {}", message);
                    return Err(AppError::TaskCrashed(message));
                }
                Err(e) => log_error_with_context(&e, "Sync pass"),
            }
            store.retry_delay()
        };

        tokio::select! {
            _ = sleep(delay) => {}
            _ = shutdown.cancelled() => {
                info!("Shutdown signal received during sleep, stopping sync loop");
                break;
            }
        }
    }

    info!("Sync loop stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_normalization() {
        let start = Utc.with_ymd_and_hms(2024, 6, 3, 15, 30, 0).unwrap();
        let data = normalize(EventData {
            all_day: true,
            ..EventData::timed("Trip", start, start + Duration::hours(2))
        });
        assert_eq!(data.start, Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap());
        assert_eq!(data.end, Utc.with_ymd_and_hms(2024, 6, 4, 0, 0, 0).unwrap());

        let timed = normalize(EventData::timed(" Call ", start, start + Duration::hours(2)));
        assert_eq!(timed.start, start);
        assert_eq!(timed.title, "Call");
    }

    #[test]
    fn test_push_request_needs_payload() {
        let change = PendingChange::new(SyncOperation::Update, "work", "a", None);
        assert!(PushRequest::from_change(&change).is_err());

        let delete = PendingChange::new(SyncOperation::Delete, "work", "a", None);
        assert!(matches!(PushRequest::from_change(&delete), Ok(PushRequest::Delete { .. })));
    }
}
