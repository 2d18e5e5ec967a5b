// file: src/database/mod.rs

use crate::error::AppResult;
use crate::models::{Event, SourceMetadata};
use log::info;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePool, Sqlite};
use std::path::Path;

// Declare submodules
pub mod events;
pub mod sources;

/// Offline store for cached events and per-source sync metadata.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db_url = format!("sqlite:{}?mode=rwc", path.display());

        // Create database if it doesn't exist
        if !Sqlite::database_exists(&db_url).await? {
            info!("Creating database at {}", path.display());
            Sqlite::create_database(&db_url).await?;
        }

        let pool = SqlitePool::connect(&db_url).await?;
        run_schema(&pool).await?;

        info!("Database initialized successfully");
        Ok(Database { pool })
    }

    // --- Event Delegates ---

    pub async fn save_events(&self, source_id: &str, events: &[Event]) -> AppResult<()> {
        events::replace_all(&self.pool, source_id, events).await
    }

    pub async fn save_event(&self, source_id: &str, event: &Event) -> AppResult<()> {
        events::upsert(&self.pool, source_id, event).await
    }

    pub async fn load_events(&self, source_id: &str) -> AppResult<Vec<Event>> {
        events::get_for_source(&self.pool, source_id).await
    }

    pub async fn delete_event(&self, source_id: &str, uid: &str) -> AppResult<bool> {
        events::delete(&self.pool, source_id, uid).await
    }

    // --- Source Metadata Delegates ---

    pub async fn load_source_metadata(&self, source_id: &str) -> AppResult<Option<SourceMetadata>> {
        sources::get(&self.pool, source_id).await
    }

    pub async fn save_source_metadata(&self, metadata: &SourceMetadata) -> AppResult<()> {
        sources::save(&self.pool, metadata).await
    }
}

pub(crate) async fn run_schema(pool: &SqlitePool) -> AppResult<()> {
    let schema = include_str!("schema.sql");

    let mut current_statement = String::new();
    for line in schema.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }

        current_statement.push_str(line);
        current_statement.push('\n');

        if trimmed.ends_with(';') {
            sqlx::query(&current_statement).execute(pool).await?;
            current_statement.clear();
        }
    }
    Ok(())
}

/// Single-connection in-memory pool; every connection to `:memory:` would
/// otherwise see its own empty database.
#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}
