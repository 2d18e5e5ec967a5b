use crate::error::RemoteError;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn covers(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start <= start && end <= self.end
    }
}

/// A remote calendar the store reads from and pushes changes to.
///
/// Calls block and are only ever made from worker-pool threads.
pub trait RemoteCalendar: Send + Sync {
    fn fetch_raw(&self, range: TimeRange) -> Result<String, RemoteError>;

    fn push_create(&self, payload: &str) -> Result<(), RemoteError>;

    fn push_update(&self, uid: &str, payload: &str) -> Result<(), RemoteError>;

    fn push_delete(&self, uid: &str) -> Result<(), RemoteError>;

    fn push_exclude_occurrence(&self, uid: &str, occurrence_start: DateTime<Utc>) -> Result<(), RemoteError>;

    /// Collection-level version tag. `None` means the remote has none and
    /// every fetch transfers the full payload.
    fn change_token(&self) -> Result<Option<String>, RemoteError> {
        Ok(None)
    }
}
