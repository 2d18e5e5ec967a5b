// file: src/models/event.rs
use crate::error::{AppError, AppResult};
use crate::models::recurrence::RecurrenceRule;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingOperation {
    #[default]
    None,
    Create,
    Update,
    Delete,
}

impl PendingOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingOperation::None => "none",
            PendingOperation::Create => "create",
            PendingOperation::Update => "update",
            PendingOperation::Delete => "delete",
        }
    }

    pub fn is_pending(&self) -> bool {
        *self != PendingOperation::None
    }

    /// Combine an existing marker with a new local mutation. A never-synced
    /// create stays a create however often it is edited.
    pub fn merge(self, next: PendingOperation) -> PendingOperation {
        match (self, next) {
            (PendingOperation::Create, PendingOperation::Update) => PendingOperation::Create,
            (_, next) => next,
        }
    }
}

impl std::str::FromStr for PendingOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(PendingOperation::None),
            "create" => Ok(PendingOperation::Create),
            "update" => Ok(PendingOperation::Update),
            "delete" => Ok(PendingOperation::Delete),
            other => Err(format!("Invalid pending operation: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    /// Exclusive. All-day events are stored as midnight UTC boundaries.
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub recurrence: Option<RecurrenceRule>,
    #[serde(default)]
    pub exdates: Vec<DateTime<Utc>>,
    /// IANA zone the recurrence is anchored in, if any.
    #[serde(default)]
    pub timezone: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl EventData {
    pub fn timed(title: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            description: None,
            location: None,
            start,
            end,
            all_day: false,
            recurrence: None,
            exdates: Vec::new(),
            timezone: None,
            last_modified: None,
        }
    }

    pub fn all_day(title: impl Into<String>, start: DateTime<Utc>, days: i64) -> Self {
        Self {
            all_day: true,
            ..Self::timed(title, start, start + Duration::days(days))
        }
    }

    pub fn with_recurrence(mut self, rule: RecurrenceRule) -> Self {
        self.recurrence = Some(rule);
        self
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.end < self.start {
            return Err(AppError::invalid_input(format!(
                "event ends ({}) before it starts ({})",
                self.end, self.start
            )));
        }
        if let Some(rule) = &self.recurrence {
            rule.validate()?;
        }
        if let Some(tz) = &self.timezone {
            tz.parse::<chrono_tz::Tz>()
                .map_err(|_| AppError::invalid_input(format!("unknown timezone '{}'", tz)))?;
        }
        Ok(())
    }
}

/// A field-level diff applied through [`Event::apply_changes`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: Option<bool>,
    pub recurrence: Option<Option<RecurrenceRule>>,
    pub timezone: Option<Option<String>>,
}

impl EventChanges {
    pub fn reschedule(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Self::default()
        }
    }

    pub fn retitle(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Master record for one calendar entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub uid: String,
    pub calendar_id: String,
    pub data: EventData,
    #[serde(default)]
    pub pending_operation: PendingOperation,
    /// Server version token, when the remote provides one.
    #[serde(default)]
    pub etag: Option<String>,
}

impl Event {
    pub fn new(uid: impl Into<String>, calendar_id: impl Into<String>, data: EventData) -> Self {
        Self {
            uid: uid.into(),
            calendar_id: calendar_id.into(),
            data,
            pending_operation: PendingOperation::None,
            etag: None,
        }
    }

    /// A locally authored event with a fresh uid, marked for creation.
    pub fn new_local(calendar_id: impl Into<String>, data: EventData) -> Self {
        let uid = format!("{}@calsync", uuid::Uuid::new_v4());
        Self::new(uid, calendar_id, data).with_pending(PendingOperation::Create)
    }

    pub fn is_recurring(&self) -> bool {
        self.data.recurrence.is_some()
    }

    pub fn duration(&self) -> Duration {
        self.data.duration()
    }

    pub fn is_pending(&self) -> bool {
        self.pending_operation.is_pending()
    }

    /// Return a new snapshot with `changes` applied. The pending marker is
    /// left alone; callers mark the snapshot dirty with [`Event::with_pending`].
    pub fn apply_changes(&self, changes: &EventChanges) -> AppResult<Event> {
        let mut data = self.data.clone();
        if let Some(title) = &changes.title {
            data.title = title.clone();
        }
        if let Some(description) = &changes.description {
            data.description = description.clone();
        }
        if let Some(location) = &changes.location {
            data.location = location.clone();
        }
        if let Some(start) = changes.start {
            data.start = start;
        }
        if let Some(end) = changes.end {
            data.end = end;
        }
        if let Some(all_day) = changes.all_day {
            data.all_day = all_day;
        }
        if let Some(recurrence) = &changes.recurrence {
            data.recurrence = recurrence.clone();
            if data.recurrence.is_none() {
                data.exdates.clear();
            }
        }
        if let Some(timezone) = &changes.timezone {
            data.timezone = timezone.clone();
        }
        data.validate()?;
        data.last_modified = Some(Utc::now());

        Ok(Event {
            data,
            ..self.clone()
        })
    }

    pub fn with_pending(mut self, operation: PendingOperation) -> Event {
        self.pending_operation = self.pending_operation.merge(operation);
        self
    }

    pub fn clear_pending(mut self) -> Event {
        self.pending_operation = PendingOperation::None;
        self
    }

    /// Snapshot with one more excluded occurrence start.
    pub fn with_exdate(&self, occurrence_start: DateTime<Utc>) -> Event {
        let mut event = self.clone();
        if !event.data.exdates.contains(&occurrence_start) {
            event.data.exdates.push(occurrence_start);
            event.data.exdates.sort();
        }
        event.data.last_modified = Some(Utc::now());
        event
    }
}
