// file: src/models/sync.rs
use crate::models::event::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Create,
    Update,
    Delete,
    DeleteOccurrence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Failed,
    Synced,
}

/// A queued local mutation waiting to reach its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    pub id: String,
    pub operation: SyncOperation,
    pub calendar_id: String,
    pub event_uid: String,
    /// Snapshot needed to replay the operation against the server.
    pub payload: Option<Event>,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub status: SyncStatus,
    /// Only set for `delete_occurrence`.
    #[serde(default)]
    pub occurrence_start: Option<DateTime<Utc>>,
}

impl PendingChange {
    pub fn new(
        operation: SyncOperation,
        calendar_id: impl Into<String>,
        event_uid: impl Into<String>,
        payload: Option<Event>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation,
            calendar_id: calendar_id.into(),
            event_uid: event_uid.into(),
            payload,
            created_at: Utc::now(),
            retry_count: 0,
            last_error: None,
            status: SyncStatus::Pending,
            occurrence_start: None,
        }
    }

    pub fn delete_occurrence(
        calendar_id: impl Into<String>,
        event_uid: impl Into<String>,
        occurrence_start: DateTime<Utc>,
    ) -> Self {
        Self {
            occurrence_start: Some(occurrence_start),
            ..Self::new(SyncOperation::DeleteOccurrence, calendar_id, event_uid, None)
        }
    }

    pub fn is_eligible(&self, max_retries: u32) -> bool {
        matches!(self.status, SyncStatus::Pending | SyncStatus::Failed) && self.retry_count < max_retries
    }

    pub fn is_permanently_failed(&self, max_retries: u32) -> bool {
        self.status == SyncStatus::Failed && self.retry_count >= max_retries
    }

    /// Back to a fresh pending state, as after a superseding fold.
    pub(crate) fn reset(&mut self) {
        self.retry_count = 0;
        self.last_error = None;
        self.status = SyncStatus::Pending;
    }
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub sync_time: DateTime<Utc>,
}

impl SyncReport {
    pub fn empty() -> Self {
        Self {
            attempted: 0,
            synced: 0,
            failed: 0,
            errors: Vec::new(),
            sync_time: Utc::now(),
        }
    }

    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.synced += 1;
    }

    pub fn record_failure(&mut self, error: String) {
        self.attempted += 1;
        self.failed += 1;
        self.errors.push(error);
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}
