use thiserror::Error;

/// Failure reported by a remote calendar collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {0}")]
    Server(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rejected by server: {0}")]
    Rejected(String),

    #[error("Source is read-only: {0}")]
    ReadOnly(String),
}

impl RemoteError {
    /// Transient failures are retried silently; everything else is recorded
    /// against the pending change for the user to see.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout | Self::Server(_))
    }

    /// Classify a free-text failure from an HTTP client.
    pub fn classify<S: Into<String>>(msg: S) -> Self {
        let msg = msg.into();
        let lower = msg.to_lowercase();
        if lower.contains("401") || lower.contains("403") || lower.contains("unauthorized") {
            Self::Auth(msg)
        } else if crate::utils::retry::is_transient_error(&msg) {
            if lower.contains("timeout") || lower.contains("timed out") {
                Self::Timeout
            } else if lower.contains("50") {
                Self::Server(msg)
            } else {
                Self::Network(msg)
            }
        } else {
            Self::Rejected(msg)
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRecurrence(String),

    #[error("Calendar parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Background task crashed: {0}")]
    TaskCrashed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_recurrence<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRecurrence(msg.into())
    }

    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn permission_denied<S: Into<String>>(msg: S) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Local data errors are rejected at the mutation boundary and never
    /// reach the sync queue.
    pub fn is_local_data_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::InvalidRecurrence(_) | Self::Parse(_)
        )
    }

    pub fn is_pii_safe(&self) -> bool {
        match self {
            Self::Database(_) | Self::Io(_) | Self::Serialization(_) | Self::Remote(_) => false,
            Self::InvalidInput(_)
            | Self::InvalidRecurrence(_)
            | Self::Parse(_)
            | Self::NotFound(_)
            | Self::PermissionDenied(_)
            | Self::TaskCrashed(_)
            | Self::Config(_)
            | Self::Storage(_) => true,
        }
    }

    pub fn to_safe_string(&self) -> String {
        if self.is_pii_safe() {
            self.to_string()
        } else {
            match self {
                Self::Database(_) => "Database operation failed".to_string(),
                Self::Io(_) => "File operation failed".to_string(),
                Self::Serialization(_) => "Data could not be encoded".to_string(),
                Self::Remote(e) if e.is_transient() => "Network request failed".to_string(),
                Self::Remote(_) => "The calendar server rejected the request".to_string(),
                _ => self.to_string(),
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
