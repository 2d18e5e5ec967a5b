// file: src/database/sources.rs
use crate::error::AppResult;
use crate::models::SourceMetadata;
use sqlx::SqlitePool;

pub async fn get(pool: &SqlitePool, source_id: &str) -> AppResult<Option<SourceMetadata>> {
    let metadata = sqlx::query_as::<_, SourceMetadata>(
        "SELECT source_id, last_attempt, last_success, change_token FROM source_metadata WHERE source_id = ?",
    )
    .bind(source_id)
    .fetch_optional(pool)
    .await?;

    Ok(metadata)
}

pub async fn save(pool: &SqlitePool, metadata: &SourceMetadata) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO source_metadata (source_id, last_attempt, last_success, change_token)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(source_id) DO UPDATE SET
            last_attempt = excluded.last_attempt,
            last_success = excluded.last_success,
            change_token = excluded.change_token
        "#,
    )
    .bind(&metadata.source_id)
    .bind(metadata.last_attempt)
    .bind(metadata.last_success)
    .bind(&metadata.change_token)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn setup_test_db() -> SqlitePool {
        let pool = crate::database::memory_pool().await;
        crate::database::run_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_missing_metadata_is_none() {
        let pool = setup_test_db().await;
        assert!(get(&pool, "work").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let pool = setup_test_db().await;
        let mut metadata = SourceMetadata::new("work");
        metadata.record_attempt(Utc::now());
        save(&pool, &metadata).await.unwrap();

        metadata.record_success(Utc::now(), Some("etag-1".to_string()));
        save(&pool, &metadata).await.unwrap();

        let stored = get(&pool, "work").await.unwrap().unwrap();
        assert_eq!(stored.change_token.as_deref(), Some("etag-1"));
        assert!(stored.last_success.is_some());
    }
}
