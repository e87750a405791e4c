//! In-memory collaborators for exercising submissions and validation jobs
//! without Postgres, Redis or the validation service.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use qc_tool::config::JobSettings;
use qc_tool::models::record::RecordBatch;
use qc_tool::models::task::{
    CachedFullResult, TaskStatus, TaskUpdate, ValidationResultItem, ValidationTask,
};
use qc_tool::models::validation::ChunkResponse;
use qc_tool::services::cache::{CacheError, ResultCache};
use qc_tool::services::job::JobContext;
use qc_tool::services::queue::{JobEnqueuer, QueueError, QueuedJob};
use qc_tool::services::store::{StoreError, TaskStore};
use qc_tool::services::validator::{TextValidator, ValidatorError};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::fixtures::items_for;

/// Task store backed by a map, recording every applied update.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<HashMap<Uuid, ValidationTask>>,
    applied: Mutex<Vec<TaskUpdate>>,
    /// Fail the progress update for this batch number.
    fail_progress_at: Mutex<Option<i32>>,
    /// Delete the task right after the progress update for this batch number.
    delete_after_batch: Mutex<Option<i32>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_pending(&self, task_id: Uuid, total_batches: i32) {
        self.insert(pending_task(
            task_id,
            total_batches,
            &format!("qc_validation:{task_id}"),
        ));
    }

    fn insert(&self, task: ValidationTask) {
        self.tasks.lock().unwrap().insert(task.id, task);
    }

    pub fn tasks(&self) -> Vec<ValidationTask> {
        self.tasks.lock().unwrap().values().cloned().collect()
    }

    pub fn get(&self, task_id: Uuid) -> Option<ValidationTask> {
        self.tasks.lock().unwrap().get(&task_id).cloned()
    }

    pub fn fail_progress_at(&self, batch_number: i32) {
        *self.fail_progress_at.lock().unwrap() = Some(batch_number);
    }

    pub fn delete_after_batch(&self, batch_number: i32) {
        *self.delete_after_batch.lock().unwrap() = Some(batch_number);
    }

    /// Every update that landed on an existing record, in order.
    pub fn applied_updates(&self) -> Vec<TaskUpdate> {
        self.applied.lock().unwrap().clone()
    }

    /// `completed_batches` values as a poller would have observed them.
    pub fn progress_history(&self) -> Vec<i32> {
        self.applied_updates()
            .iter()
            .filter_map(|u| u.completed_batches)
            .collect()
    }

    /// Status transitions written, in order.
    pub fn status_history(&self) -> Vec<TaskStatus> {
        self.applied_updates().iter().filter_map(|u| u.status).collect()
    }
}

fn pending_task(task_id: Uuid, total_batches: i32, cache_key: &str) -> ValidationTask {
    let now = Utc::now();
    ValidationTask {
        id: task_id,
        status: TaskStatus::Pending,
        completed_batches: 0,
        total_batches,
        results: Vec::new(),
        warning: None,
        cache_key: cache_key.to_string(),
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(
        &self,
        task_id: Uuid,
        total_batches: i32,
        cache_key: &str,
    ) -> Result<ValidationTask, StoreError> {
        let task = pending_task(task_id, total_batches, cache_key);
        self.insert(task.clone());
        Ok(task)
    }

    async fn find(&self, task_id: Uuid) -> Result<Option<ValidationTask>, StoreError> {
        Ok(self.get(task_id))
    }

    async fn update(&self, task_id: Uuid, update: TaskUpdate) -> Result<bool, StoreError> {
        if update.completed_batches.is_some()
            && update.completed_batches == *self.fail_progress_at.lock().unwrap()
        {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }

        let mut tasks = self.tasks.lock().unwrap();
        let Some(task) = tasks.get_mut(&task_id) else {
            return Ok(false);
        };
        update.apply_to(task);
        self.applied.lock().unwrap().push(update.clone());

        if update.completed_batches.is_some()
            && update.completed_batches == *self.delete_after_batch.lock().unwrap()
        {
            tasks.remove(&task_id);
        }

        Ok(true)
    }
}

/// Result cache that remembers every write with its TTL.
#[derive(Default)]
pub struct RecordingCache {
    writes: Mutex<Vec<(String, CachedFullResult, Duration)>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(String, CachedFullResult, Duration)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultCache for RecordingCache {
    async fn put(
        &self,
        key: &str,
        value: &CachedFullResult,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.writes
            .lock()
            .unwrap()
            .push((key.to_string(), value.clone(), ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CachedFullResult>, CacheError> {
        Ok(self
            .writes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _, _)| k == key)
            .map(|(_, v, _)| v.clone()))
    }
}

/// Job queue that records enqueued jobs, or refuses them all when down.
#[derive(Default)]
pub struct RecordingQueue {
    jobs: Mutex<Vec<QueuedJob>>,
    down: bool,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn down() -> Self {
        Self {
            down: true,
            ..Self::default()
        }
    }

    pub fn jobs(&self) -> Vec<QueuedJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobEnqueuer for RecordingQueue {
    async fn enqueue(&self, job: &QueuedJob) -> Result<(), QueueError> {
        if self.down {
            return Err(QueueError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            ))));
        }
        self.jobs.lock().unwrap().push(job.clone());
        Ok(())
    }
}

/// What the fake validation service does for one chunk.
#[derive(Debug, Clone)]
pub enum Script {
    /// One item per record in the chunk.
    Echo,
    Items(Vec<ValidationResultItem>),
    Warn(&'static str, Vec<ValidationResultItem>),
    Fail,
    Sleep(Duration),
    Panic,
}

/// Validation service fake that plays scripted responses per call, falling
/// back to `Script::Echo` once the script runs out.
pub struct ScriptedValidator {
    script: Vec<Script>,
    calls: AtomicUsize,
    chunk_sizes: Mutex<Vec<usize>>,
}

impl ScriptedValidator {
    pub fn new(script: Vec<Script>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            chunk_sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn echo() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.chunk_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextValidator for ScriptedValidator {
    async fn process_chunk(&self, chunk: &RecordBatch) -> Result<ChunkResponse, ValidatorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.chunk_sizes.lock().unwrap().push(chunk.len());

        match self.script.get(call).cloned().unwrap_or(Script::Echo) {
            Script::Echo => Ok(ChunkResponse {
                results: items_for(chunk),
                warning: None,
            }),
            Script::Items(results) => Ok(ChunkResponse {
                results,
                warning: None,
            }),
            Script::Warn(warning, results) => Ok(ChunkResponse {
                results,
                warning: Some(warning.to_string()),
            }),
            Script::Fail => Err(ValidatorError::Status {
                status: StatusCode::BAD_GATEWAY,
                body: "upstream unavailable".to_string(),
            }),
            Script::Sleep(duration) => {
                tokio::time::sleep(duration).await;
                Ok(ChunkResponse {
                    results: items_for(chunk),
                    warning: None,
                })
            }
            Script::Panic => panic!("validator blew up on call {call}"),
        }
    }
}

pub struct Harness {
    pub store: Arc<InMemoryTaskStore>,
    pub cache: Arc<RecordingCache>,
    pub validator: Arc<ScriptedValidator>,
    pub ctx: JobContext,
}

/// Wire fakes into a job context with the given settings.
pub fn harness(validator: ScriptedValidator, settings: JobSettings) -> Harness {
    let store = Arc::new(InMemoryTaskStore::new());
    let cache = Arc::new(RecordingCache::new());
    let validator = Arc::new(validator);

    let ctx = JobContext {
        store: store.clone(),
        cache: cache.clone(),
        validator: validator.clone(),
        settings,
    };

    Harness {
        store,
        cache,
        validator,
        ctx,
    }
}
