//! Chunked AI validation job.
//!
//! Splits a batch of records into fixed-size chunks, sends each chunk to the
//! validation service in order, and writes progress to the task record after
//! every chunk so clients can poll partial results. The combined result is
//! cached under the caller's key once all chunks have been handled.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::JobSettings;
use crate::models::record::RecordBatch;
use crate::models::task::{CachedFullResult, TaskStatus, TaskUpdate};
use crate::models::validation::ChunkResponse;
use crate::services::cache::{CacheError, ResultCache};
use crate::services::queue::QueuedJob;
use crate::services::store::{StoreError, TaskStore};
use crate::services::validator::TextValidator;

/// User-facing message recorded on a task whose run was aborted.
pub const FAILURE_WARNING: &str = "AI validation failed. Please try again.";

/// Collaborators a job run needs.
#[derive(Clone)]
pub struct JobContext {
    pub store: Arc<dyn TaskStore>,
    pub cache: Arc<dyn ResultCache>,
    pub validator: Arc<dyn TextValidator>,
    pub settings: JobSettings,
}

/// A single validation run over a batch of records.
#[derive(Debug, Clone)]
pub struct ChunkedValidationJob {
    pub task_id: Uuid,
    pub records: RecordBatch,
    pub cache_key: String,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The task record was gone before the run started.
    Skipped,
    Completed { batches: usize, results: usize },
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Task store error: {0}")]
    Store(#[from] StoreError),

    #[error("Result cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Job exceeded its run time of {0:?}")]
    TimedOut(Duration),

    #[error("Job panicked: {0}")]
    Panicked(String),
}

impl From<QueuedJob> for ChunkedValidationJob {
    fn from(job: QueuedJob) -> Self {
        Self::new(job.task_id, job.records, job.cache_key)
    }
}

impl ChunkedValidationJob {
    pub fn new(task_id: Uuid, records: RecordBatch, cache_key: impl Into<String>) -> Self {
        Self {
            task_id,
            records,
            cache_key: cache_key.into(),
        }
    }

    /// Run the job under its time cap, catching panics.
    ///
    /// Anything that escapes `run` ends in the failure handler. There is no
    /// retry at this level.
    pub async fn execute(&self, ctx: &JobContext) -> JobOutcome {
        let guarded = AssertUnwindSafe(tokio::time::timeout(ctx.settings.timeout, self.run(ctx)))
            .catch_unwind()
            .await;

        let error = match guarded {
            Ok(Ok(Ok(outcome))) => return outcome,
            Ok(Ok(Err(e))) => e,
            Ok(Err(_elapsed)) => JobError::TimedOut(ctx.settings.timeout),
            Err(panic) => JobError::Panicked(panic_message(panic.as_ref())),
        };

        self.failed(ctx, &error).await;
        JobOutcome::Failed
    }

    /// The run itself. Per-chunk failures are absorbed here; any `Err` returned
    /// is fatal to the run.
    pub async fn run(&self, ctx: &JobContext) -> Result<JobOutcome, JobError> {
        if ctx.store.find(self.task_id).await?.is_none() {
            tracing::info!(task_id = %self.task_id, "Validation task no longer exists, skipping");
            metrics::counter!("qc_validation_jobs_skipped").increment(1);
            return Ok(JobOutcome::Skipped);
        }

        ctx.store
            .update(self.task_id, TaskUpdate::status(TaskStatus::Processing))
            .await?;

        let chunks = self.records.chunks(ctx.settings.chunk_size);
        tracing::info!(
            task_id = %self.task_id,
            records = self.records.len(),
            batches = chunks.len(),
            "Starting chunked validation"
        );

        let mut results = Vec::new();

        for (index, chunk) in chunks.iter().enumerate() {
            let batch_number = index + 1;
            let start = Instant::now();

            match ctx.validator.process_chunk(chunk).await {
                Err(e) => {
                    tracing::warn!(
                        task_id = %self.task_id,
                        batch_number,
                        error = %e,
                        "Validation batch failed"
                    );
                    metrics::counter!("qc_validation_chunks_total", "outcome" => "error").increment(1);
                }
                Ok(ChunkResponse {
                    warning: Some(warning),
                    ..
                }) => {
                    tracing::warn!(
                        task_id = %self.task_id,
                        batch_number,
                        warning = %warning,
                        "Validation batch returned a warning, discarding its results"
                    );
                    metrics::counter!("qc_validation_chunks_total", "outcome" => "warning")
                        .increment(1);
                }
                Ok(response) => {
                    tracing::debug!(
                        task_id = %self.task_id,
                        batch_number,
                        items = response.results.len(),
                        "Validation batch complete"
                    );
                    results.extend(response.results);
                    metrics::counter!("qc_validation_chunks_total", "outcome" => "ok").increment(1);
                }
            }

            metrics::histogram!("qc_validation_chunk_seconds").record(start.elapsed().as_secs_f64());

            let completed = i32::try_from(batch_number).unwrap_or(i32::MAX);
            let recorded = ctx
                .store
                .update(self.task_id, TaskUpdate::progress(completed, &results))
                .await?;
            if !recorded {
                tracing::debug!(
                    task_id = %self.task_id,
                    batch_number,
                    "Task removed mid-run, progress not recorded"
                );
            }
        }

        let result_count = results.len();
        ctx.cache
            .put(
                &self.cache_key,
                &CachedFullResult::new(results),
                ctx.settings.cache_ttl,
            )
            .await?;

        ctx.store
            .update(self.task_id, TaskUpdate::status(TaskStatus::Complete))
            .await?;

        metrics::counter!("qc_validation_jobs_completed").increment(1);
        tracing::info!(
            task_id = %self.task_id,
            batches = chunks.len(),
            results = result_count,
            "Chunked validation complete"
        );

        Ok(JobOutcome::Completed {
            batches: chunks.len(),
            results: result_count,
        })
    }

    /// Failure handler for an aborted run. Never propagates errors of its own.
    pub async fn failed(&self, ctx: &JobContext, error: &JobError) {
        tracing::error!(task_id = %self.task_id, error = %error, "Validation job failed");
        metrics::counter!("qc_validation_jobs_failed").increment(1);

        match ctx
            .store
            .update(self.task_id, TaskUpdate::failed(FAILURE_WARNING))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(task_id = %self.task_id, "Failed task no longer exists");
            }
            Err(e) => {
                tracing::error!(
                    task_id = %self.task_id,
                    error = %e,
                    "Could not mark validation task as failed"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
