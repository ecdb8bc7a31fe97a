use crate::db::{models::*, DbPool};
use crate::error::{Error, Result};
use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

/// Create a new import batch in `pending` state
pub async fn create_batch(pool: &DbPool, new_batch: &NewImportBatch) -> Result<ImportBatch> {
    let batch = sqlx::query_as::<_, ImportBatch>(
        r#"
        INSERT INTO import_batches (
            id, repository_url, status, total_recipes, successful_imports,
            failed_imports, error_log, created_by, started_at
        )
        VALUES (?, ?, ?, NULL, 0, 0, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&new_batch.repository_url)
    .bind(BatchStatus::Pending)
    .bind(Json(Vec::<String>::new()))
    .bind(&new_batch.created_by)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(batch)
}

/// Get batch by ID
pub async fn get_batch(pool: &DbPool, batch_id: Uuid) -> Result<ImportBatch> {
    find_batch(pool, batch_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Import batch {batch_id} not found")))
}

/// Get batch by ID, `None` when unknown
pub async fn find_batch(pool: &DbPool, batch_id: Uuid) -> Result<Option<ImportBatch>> {
    let batch = sqlx::query_as::<_, ImportBatch>("SELECT * FROM import_batches WHERE id = ?")
        .bind(batch_id)
        .fetch_optional(pool)
        .await?;

    Ok(batch)
}

/// List batches, most recently started first
pub async fn list_batches(pool: &DbPool, limit: i64, offset: i64) -> Result<Vec<ImportBatch>> {
    let batches = sqlx::query_as::<_, ImportBatch>(
        "SELECT * FROM import_batches ORDER BY started_at DESC, id LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(batches)
}

/// Count all batches
pub async fn count_batches(pool: &DbPool) -> Result<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM import_batches")
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

/// Count batches in a given status
pub async fn count_batches_by_status(pool: &DbPool, status: BatchStatus) -> Result<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM import_batches WHERE status = ?")
        .bind(status)
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

/// Persist the tracker's view of a batch.
///
/// The row is only written while it is still non-terminal and when neither
/// counter would decrease. Returns `false` when the guard rejected the write.
pub async fn save_batch_progress(pool: &DbPool, batch: &ImportBatch) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE import_batches
        SET status = ?, total_recipes = ?, successful_imports = ?,
            failed_imports = ?, error_log = ?, completed_at = ?
        WHERE id = ?
          AND status NOT IN ('completed', 'failed')
          AND successful_imports <= ?
          AND failed_imports <= ?
        "#,
    )
    .bind(batch.status)
    .bind(batch.total_recipes)
    .bind(batch.successful_imports)
    .bind(batch.failed_imports)
    .bind(&batch.error_log)
    .bind(batch.completed_at)
    .bind(batch.id)
    .bind(batch.successful_imports)
    .bind(batch.failed_imports)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Delete a batch record. Recipes created by the batch are kept.
pub async fn delete_batch(pool: &DbPool, batch_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM import_batches WHERE id = ?")
        .bind(batch_id)
        .execute(pool)
        .await?;

    Ok(())
}
