use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::record::RecordBatch;

const QUEUE_KEY: &str = "qc_tool:validation_jobs";
const PROCESSING_KEY: &str = "qc_tool:validation_processing";

/// Job payload serialized into Redis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedJob {
    pub task_id: Uuid,
    pub cache_key: String,
    pub records: RecordBatch,
}

/// Accepts jobs for the worker.
#[async_trait]
pub trait JobEnqueuer: Send + Sync {
    async fn enqueue(&self, job: &QueuedJob) -> Result<(), QueueError>;
}

/// Redis-backed async job queue.
///
/// Payloads move to a processing list on dequeue and are removed once the
/// worker is done with them. Jobs are never re-enqueued after a run.
pub struct JobQueue {
    client: redis::Client,
}

impl JobQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Enqueue a validation job.
    pub async fn enqueue(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(job)?;
        conn.lpush::<_, _, ()>(QUEUE_KEY, &payload).await?;
        Ok(())
    }

    /// Dequeue a job for processing (pop with move to the processing list).
    ///
    /// The raw payload is returned alongside the job so `complete` removes
    /// exactly the entry that was moved.
    pub async fn dequeue(&self) -> Result<Option<(QueuedJob, String)>, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let result: Option<String> = conn.rpoplpush(QUEUE_KEY, PROCESSING_KEY).await?;

        match result {
            Some(payload) => match serde_json::from_str(&payload) {
                Ok(job) => Ok(Some((job, payload))),
                Err(e) => {
                    // Poison payloads would otherwise sit in the processing list forever
                    conn.lrem::<_, _, ()>(PROCESSING_KEY, 1, &payload).await?;
                    Err(QueueError::Serialize(e))
                }
            },
            None => Ok(None),
        }
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// Get the current queue depth (pending jobs).
    pub async fn queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let depth: u64 = conn.llen(QUEUE_KEY).await?;
        Ok(depth)
    }

    /// Mark a job as done (remove from the processing list).
    pub async fn complete(&self, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.lrem::<_, _, ()>(PROCESSING_KEY, 1, payload).await?;
        Ok(())
    }
}

#[async_trait]
impl JobEnqueuer for JobQueue {
    async fn enqueue(&self, job: &QueuedJob) -> Result<(), QueueError> {
        JobQueue::enqueue(self, job).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
