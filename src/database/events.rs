// file: src/database/events.rs
use crate::error::AppResult;
use crate::models::Event;
use chrono::{DateTime, Utc};
use log::warn;
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;

#[derive(Debug, FromRow)]
struct CachedEventRow {
    uid: String,
    data: String,
}

/// Replace everything cached for `source_id` with `events`. A row's
/// `local_modified` stamp survives the rewrite; rows that first appear
/// with a pending operation are stamped now.
pub async fn replace_all(pool: &SqlitePool, source_id: &str, events: &[Event]) -> AppResult<()> {
    let mut tx = pool.begin().await?;

    let stamps: HashMap<String, Option<DateTime<Utc>>> = sqlx::query_as::<_, (String, Option<DateTime<Utc>>)>(
        "SELECT uid, local_modified FROM cached_events WHERE source_id = ?",
    )
    .bind(source_id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .collect();

    sqlx::query("DELETE FROM cached_events WHERE source_id = ?")
        .bind(source_id)
        .execute(&mut *tx)
        .await?;

    let now = Utc::now();
    for event in events {
        let stamp = match stamps.get(&event.uid).copied().flatten() {
            Some(prior) => Some(prior),
            None if event.is_pending() => Some(now),
            None => None,
        };
        sqlx::query(
            r#"
            INSERT INTO cached_events
                (source_id, uid, data, etag, last_modified, local_modified, pending_operation)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(source_id)
        .bind(&event.uid)
        .bind(serde_json::to_string(event)?)
        .bind(&event.etag)
        .bind(event.data.last_modified)
        .bind(stamp)
        .bind(event.pending_operation.as_str())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Write one event. Pending events are stamped as locally modified now;
/// settled ones keep whatever stamp the row had.
pub async fn upsert(pool: &SqlitePool, source_id: &str, event: &Event) -> AppResult<()> {
    let stamp = event.is_pending().then(Utc::now);
    sqlx::query(
        r#"
        INSERT INTO cached_events
            (source_id, uid, data, etag, last_modified, local_modified, pending_operation)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source_id, uid) DO UPDATE SET
            data = excluded.data,
            etag = excluded.etag,
            last_modified = excluded.last_modified,
            local_modified = COALESCE(excluded.local_modified, cached_events.local_modified),
            pending_operation = excluded.pending_operation
        "#,
    )
    .bind(source_id)
    .bind(&event.uid)
    .bind(serde_json::to_string(event)?)
    .bind(&event.etag)
    .bind(event.data.last_modified)
    .bind(stamp)
    .bind(event.pending_operation.as_str())
    .execute(pool)
    .await?;

    Ok(())
}

/// Rows that no longer decode are skipped rather than failing the load.
pub async fn get_for_source(pool: &SqlitePool, source_id: &str) -> AppResult<Vec<Event>> {
    let rows = sqlx::query_as::<_, CachedEventRow>(
        "SELECT uid, data FROM cached_events WHERE source_id = ? ORDER BY uid ASC",
    )
    .bind(source_id)
    .fetch_all(pool)
    .await?;

    let events = rows
        .into_iter()
        .filter_map(|row| match serde_json::from_str::<Event>(&row.data) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Dropping unreadable cached event '{}': {}", row.uid, e);
                None
            }
        })
        .collect();

    Ok(events)
}

pub async fn delete(pool: &SqlitePool, source_id: &str, uid: &str) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM cached_events WHERE source_id = ? AND uid = ?")
        .bind(source_id)
        .bind(uid)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
