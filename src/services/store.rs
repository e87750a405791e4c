use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;
use crate::models::task::{TaskUpdate, ValidationTask};

/// Persistent, pollable task records.
///
/// `update` on a task that no longer exists is a no-op returning `false`;
/// records can be removed at any time by the expiry cleanup.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new `pending` task.
    async fn create(
        &self,
        task_id: Uuid,
        total_batches: i32,
        cache_key: &str,
    ) -> Result<ValidationTask, StoreError>;

    async fn find(&self, task_id: Uuid) -> Result<Option<ValidationTask>, StoreError>;

    async fn update(&self, task_id: Uuid, update: TaskUpdate) -> Result<bool, StoreError>;
}

/// PostgreSQL-backed task store.
#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn create(
        &self,
        task_id: Uuid,
        total_batches: i32,
        cache_key: &str,
    ) -> Result<ValidationTask, StoreError> {
        Ok(queries::create_task(&self.pool, task_id, total_batches, cache_key).await?)
    }

    async fn find(&self, task_id: Uuid) -> Result<Option<ValidationTask>, StoreError> {
        Ok(queries::get_task(&self.pool, task_id).await?)
    }

    async fn update(&self, task_id: Uuid, update: TaskUpdate) -> Result<bool, StoreError> {
        Ok(queries::update_task(&self.pool, task_id, &update).await?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
