//! Durable queue of local mutations awaiting delivery.
//!
//! The whole queue is rewritten on every mutation: serialized to a temp file
//! in the target directory and renamed over the old file, so a crash mid-write
//! leaves the previous committed state intact.
//!
//! Per entry: `pending -> syncing -> (removed | failed)`. Entries found
//! `syncing` at load time are put back to `pending`.

use crate::error::{AppError, AppResult};
use crate::models::{Event, PendingChange, SyncOperation, SyncStatus};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Deserialize)]
struct QueueFile {
    #[serde(default)]
    pending: Vec<PendingChange>,
}

#[derive(Serialize)]
struct QueueFileRef<'a> {
    pending: &'a [PendingChange],
}

pub struct SyncQueue {
    path: PathBuf,
    entries: Vec<PendingChange>,
    max_retries: u32,
}

impl SyncQueue {
    /// Load the queue at `path`, or start empty if the file does not exist.
    /// A file that exists but cannot be read is an error rather than an
    /// empty queue, so undelivered changes are never dropped silently.
    pub fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let mut entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Vec::new(),
            Ok(text) => serde_json::from_str::<QueueFile>(&text)?.pending,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut recovered = 0;
        for entry in entries.iter_mut().filter(|e| e.status == SyncStatus::Syncing) {
            entry.status = SyncStatus::Pending;
            recovered += 1;
        }
        entries.retain(|e| e.status != SyncStatus::Synced);

        let queue = Self {
            path,
            entries,
            max_retries: DEFAULT_MAX_RETRIES,
        };
        if recovered > 0 {
            warn!("Recovered {} interrupted sync entries", recovered);
            queue.save()?;
        }
        info!("Sync queue loaded with {} entries", queue.entries.len());
        Ok(queue)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn save(&self) -> AppResult<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &QueueFileRef { pending: &self.entries })?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| {
            AppError::storage(format!("could not replace {}: {}", self.path.display(), e.error))
        })?;
        Ok(())
    }

    /// Latest entry for `uid` that a new mutation may fold into. In-flight
    /// entries are never folded into; neither are occurrence exclusions.
    fn fold_target(&self, uid: &str) -> Option<usize> {
        self.entries.iter().rposition(|e| {
            e.event_uid == uid
                && e.status != SyncStatus::Syncing
                && e.operation != SyncOperation::DeleteOccurrence
        })
    }

    fn append(&mut self, change: PendingChange) -> AppResult<String> {
        let id = change.id.clone();
        debug!("Queued {:?} for '{}' as {}", change.operation, change.event_uid, id);
        self.entries.push(change);
        self.save()?;
        Ok(id)
    }

    pub fn add_create(&mut self, event: &Event) -> AppResult<String> {
        self.append(PendingChange::new(
            SyncOperation::Create,
            &event.calendar_id,
            &event.uid,
            Some(event.clone()),
        ))
    }

    pub fn add_update(&mut self, event: &Event) -> AppResult<String> {
        if let Some(i) = self.fold_target(&event.uid) {
            let entry = &mut self.entries[i];
            if matches!(entry.operation, SyncOperation::Create | SyncOperation::Update) {
                entry.payload = Some(event.clone());
                entry.reset();
                let id = entry.id.clone();
                debug!("Folded update for '{}' into {:?} {}", event.uid, entry.operation, id);
                self.save()?;
                return Ok(id);
            }
        }
        self.append(PendingChange::new(
            SyncOperation::Update,
            &event.calendar_id,
            &event.uid,
            Some(event.clone()),
        ))
    }

    /// Returns the id of the entry that will carry the delete, or `None`
    /// when the event never reached the server and nothing needs sending.
    pub fn add_delete(&mut self, event: &Event) -> AppResult<Option<String>> {
        // Exclusions are moot once the whole event goes.
        let before = self.entries.len();
        self.entries.retain(|e| {
            !(e.event_uid == event.uid
                && e.operation == SyncOperation::DeleteOccurrence
                && e.status != SyncStatus::Syncing)
        });
        if self.entries.len() != before {
            debug!("Dropped {} queued exclusions for '{}'", before - self.entries.len(), event.uid);
        }

        if let Some(i) = self.fold_target(&event.uid) {
            match self.entries[i].operation {
                SyncOperation::Create => {
                    let dropped = self.entries.remove(i);
                    debug!("Dropped unsent create {} for '{}'", dropped.id, event.uid);
                    self.save()?;
                    return Ok(None);
                }
                SyncOperation::Update => {
                    let entry = &mut self.entries[i];
                    entry.operation = SyncOperation::Delete;
                    entry.payload = Some(event.clone());
                    entry.reset();
                    let id = entry.id.clone();
                    self.save()?;
                    return Ok(Some(id));
                }
                SyncOperation::Delete => {
                    let entry = &mut self.entries[i];
                    entry.payload = Some(event.clone());
                    let id = entry.id.clone();
                    self.save()?;
                    return Ok(Some(id));
                }
                SyncOperation::DeleteOccurrence => {}
            }
        }
        self.append(PendingChange::new(
            SyncOperation::Delete,
            &event.calendar_id,
            &event.uid,
            Some(event.clone()),
        ))
        .map(Some)
    }

    /// Occurrence exclusions always get their own entry.
    pub fn add_delete_occurrence(&mut self, event: &Event, occurrence_start: DateTime<Utc>) -> AppResult<String> {
        let mut change = PendingChange::delete_occurrence(&event.calendar_id, &event.uid, occurrence_start);
        change.payload = Some(event.clone());
        self.append(change)
    }

    fn position(&self, id: &str) -> AppResult<usize> {
        self.entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| AppError::not_found(format!("pending change {}", id)))
    }

    pub fn mark_syncing(&mut self, id: &str) -> AppResult<()> {
        let i = self.position(id)?;
        self.entries[i].status = SyncStatus::Syncing;
        self.save()
    }

    /// Confirmed by the server: the entry leaves the queue.
    pub fn mark_synced(&mut self, id: &str) -> AppResult<PendingChange> {
        let i = self.position(id)?;
        let mut change = self.entries.remove(i);
        change.status = SyncStatus::Synced;
        self.save()?;
        Ok(change)
    }

    pub fn mark_failed(&mut self, id: &str, error: &str) -> AppResult<()> {
        let i = self.position(id)?;
        let entry = &mut self.entries[i];
        entry.status = SyncStatus::Failed;
        entry.retry_count += 1;
        entry.last_error = Some(error.to_string());
        if entry.retry_count >= self.max_retries {
            warn!(
                "Change {} for '{}' gave up after {} attempts: {}",
                entry.id, entry.event_uid, entry.retry_count, error
            );
        }
        self.save()
    }

    /// Undo `mark_syncing` without counting an attempt.
    pub fn reset_to_pending(&mut self, id: &str) -> AppResult<()> {
        let i = self.position(id)?;
        self.entries[i].status = SyncStatus::Pending;
        self.save()
    }

    pub fn get(&self, id: &str) -> Option<&PendingChange> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[PendingChange] {
        &self.entries
    }

    /// Entries due for another attempt, in insertion order.
    pub fn eligible(&self) -> Vec<&PendingChange> {
        self.entries
            .iter()
            .filter(|e| e.is_eligible(self.max_retries))
            .collect()
    }

    pub fn permanently_failed(&self) -> Vec<&PendingChange> {
        self.entries
            .iter()
            .filter(|e| e.is_permanently_failed(self.max_retries))
            .collect()
    }

    pub fn has_pending_for(&self, uid: &str) -> bool {
        self.entries.iter().any(|e| e.event_uid == uid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) -> AppResult<()> {
        self.entries.clear();
        self.save()
    }
}
