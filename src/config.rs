//! Store configuration
//!
//! Everything the coordinator needs to know that is not calendar data:
//! prefetch margin, retry policy, worker bounds and on-disk locations.
//! Parsing of user-facing config files stays with the caller; this type
//! only deserializes from JSON.

use crate::error::{AppError, AppResult};
use crate::utils::retry::{duration_secs, RetryConfig};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const APP_DIR: &str = "calsync";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Half-width of the prefetch window around a requested range, in days.
    pub prefetch_margin_days: i64,
    pub retry: RetryConfig,
    /// Bound on any single collaborator call, independent of retry backoff.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    pub worker_count: usize,
    pub queue_path: PathBuf,
    /// `None` disables the offline event cache.
    pub database_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let base = default_data_dir();
        Self {
            prefetch_margin_days: 60,
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(30),
            worker_count: 3,
            queue_path: base.join("sync_queue.json"),
            database_path: Some(base.join("events.db")),
        }
    }
}

impl StoreConfig {
    /// Configuration rooted in a single directory, handy for tests and
    /// embedders that manage their own storage.
    pub fn in_dir<P: Into<PathBuf>>(dir: P) -> Self {
        let dir = dir.into();
        Self {
            queue_path: dir.join("sync_queue.json"),
            database_path: Some(dir.join("events.db")),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> AppResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn prefetch_margin(&self) -> chrono::Duration {
        chrono::Duration::days(self.prefetch_margin_days)
    }

    pub fn max_retries(&self) -> u32 {
        self.retry.max_attempts
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.prefetch_margin_days < 0 {
            return Err(AppError::config("prefetch margin cannot be negative"));
        }
        if self.worker_count == 0 {
            return Err(AppError::config("worker pool needs at least one worker"));
        }
        if self.request_timeout.is_zero() {
            return Err(AppError::config("request timeout must be positive"));
        }
        if self.retry.base_delay.is_zero() {
            return Err(AppError::config("initial retry interval must be positive"));
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(AppError::config("retry ceiling is below the initial interval"));
        }
        if !(self.retry.backoff_multiplier >= 1.0) {
            return Err(AppError::config("backoff multiplier must be at least 1.0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::config("max retries must be at least 1"));
        }
        info!(
            "Store configuration: margin={}d workers={} timeout={:?}",
            self.prefetch_margin_days, self.worker_count, self.request_timeout
        );
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
