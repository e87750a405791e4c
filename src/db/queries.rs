use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::task::{TaskStatus, TaskUpdate, ValidationResultItem, ValidationTask};

fn task_from_row(row: &PgRow) -> Result<ValidationTask, sqlx::Error> {
    let status_str: String = row.try_get("status")?;
    let status = TaskStatus::from_str(&status_str).map_err(|e| sqlx::Error::ColumnDecode {
        index: "status".to_string(),
        source: Box::new(e),
    })?;
    let Json(results): Json<Vec<ValidationResultItem>> = row.try_get("results")?;

    Ok(ValidationTask {
        id: row.try_get("id")?,
        status,
        completed_batches: row.try_get("completed_batches")?,
        total_batches: row.try_get("total_batches")?,
        results,
        warning: row.try_get("warning")?,
        cache_key: row.try_get("cache_key")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Insert a new pending validation task
pub async fn create_task(
    pool: &PgPool,
    task_id: Uuid,
    total_batches: i32,
    cache_key: &str,
) -> Result<ValidationTask, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO validation_tasks (id, status, total_batches, cache_key)
        VALUES ($1, 'pending', $2, $3)
        RETURNING id, status, completed_batches, total_batches, results, warning,
                  cache_key, created_at, updated_at
        "#,
    )
    .bind(task_id)
    .bind(total_batches)
    .bind(cache_key)
    .fetch_one(pool)
    .await?;

    task_from_row(&row)
}

/// Get a task by ID
pub async fn get_task(pool: &PgPool, task_id: Uuid) -> Result<Option<ValidationTask>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, status, completed_batches, total_batches, results, warning,
               cache_key, created_at, updated_at
        FROM validation_tasks
        WHERE id = $1
        "#,
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(task_from_row).transpose()
}

/// Apply a partial update. Returns false when the task no longer exists.
pub async fn update_task(
    pool: &PgPool,
    task_id: Uuid,
    update: &TaskUpdate,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE validation_tasks
        SET status = COALESCE($2, status),
            completed_batches = COALESCE($3, completed_batches),
            results = COALESCE($4, results),
            warning = COALESCE($5, warning),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(task_id)
    .bind(update.status.map(|s| s.to_string()))
    .bind(update.completed_batches)
    .bind(update.results.as_ref().map(Json))
    .bind(update.warning.as_deref())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete tasks created before `cutoff`. Returns the number removed.
pub async fn delete_expired_tasks(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM validation_tasks
        WHERE created_at < $1
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
