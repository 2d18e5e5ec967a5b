// file: src/models/source.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Caldav,
    Ics,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Caldav => "caldav",
            SourceKind::Ics => "ics",
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "caldav" => Ok(SourceKind::Caldav),
            "ics" => Ok(SourceKind::Ics),
            other => Err(format!("Invalid source kind: {}", other)),
        }
    }
}

/// A calendar the store knows about. Two sources are the same source when
/// their ids match, whatever their display attributes say.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSource {
    pub id: String,
    pub name: String,
    pub color: String,
    pub account: String,
    pub read_only: bool,
    pub kind: SourceKind,
    pub visible: bool,
}

impl CalendarSource {
    pub fn new_caldav(id: impl Into<String>, name: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: "#4a90d9".to_string(),
            account: account.into(),
            read_only: false,
            kind: SourceKind::Caldav,
            visible: true,
        }
    }

    /// ICS subscriptions cannot be written back to.
    pub fn new_ics(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: "#7fb77e".to_string(),
            account: "subscriptions".to_string(),
            read_only: true,
            kind: SourceKind::Ics,
            visible: true,
        }
    }
}

impl PartialEq for CalendarSource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CalendarSource {}

impl Hash for CalendarSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Per-source sync bookkeeping kept alongside the cached events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SourceMetadata {
    pub source_id: String,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    /// Opaque collection-level change tag from the server.
    pub change_token: Option<String>,
}

impl SourceMetadata {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            ..Self::default()
        }
    }

    pub fn record_attempt(&mut self, at: DateTime<Utc>) {
        self.last_attempt = Some(at);
    }

    pub fn record_success(&mut self, at: DateTime<Utc>, change_token: Option<String>) {
        self.last_attempt = Some(at);
        self.last_success = Some(at);
        self.change_token = change_token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_by_id() {
        let a = CalendarSource::new_caldav("work", "Work", "me@example.com");
        let mut b = a.clone();
        b.name = "Renamed".to_string();
        b.color = "#000000".to_string();
        b.visible = false;
        assert_eq!(a, b);

        let c = CalendarSource::new_caldav("home", "Work", "me@example.com");
        assert_ne!(a, c);
    }

    #[test]
    fn test_ics_sources_are_read_only() {
        let feed = CalendarSource::new_ics("holidays", "Holidays");
        assert!(feed.read_only);
        assert_eq!(feed.kind, SourceKind::Ics);
        assert_eq!("ics".parse::<SourceKind>().unwrap(), SourceKind::Ics);
        assert!("webcal".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_metadata_success_updates_token() {
        let now = Utc::now();
        let mut meta = SourceMetadata::new("work");
        meta.record_attempt(now);
        assert_eq!(meta.last_success, None);

        meta.record_success(now, Some("ctag-2".to_string()));
        assert_eq!(meta.last_success, Some(now));
        assert_eq!(meta.change_token.as_deref(), Some("ctag-2"));
    }
}
