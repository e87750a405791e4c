use garde::Validate;
use uuid::Uuid;

use crate::config::JobSettings;
use crate::models::record::chunk_count;
use crate::models::task::{TaskStatus, TaskUpdate};
use crate::models::validation::{SubmitValidationRequest, SubmitValidationResponse};
use crate::services::job::FAILURE_WARNING;
use crate::services::queue::{JobEnqueuer, QueueError, QueuedJob};
use crate::services::store::{StoreError, TaskStore};

/// Cache key used when the caller does not supply one.
pub fn default_cache_key(task_id: Uuid) -> String {
    format!("qc_validation:{task_id}")
}

/// Validate a request, create its pending task and enqueue the job.
///
/// If the job cannot be enqueued the new task is marked failed, since no
/// worker will ever pick it up.
pub async fn submit(
    store: &dyn TaskStore,
    queue: &dyn JobEnqueuer,
    settings: &JobSettings,
    request: SubmitValidationRequest,
) -> Result<SubmitValidationResponse, SubmitError> {
    if let Err(report) = request.validate() {
        tracing::warn!(errors = %report, "Rejected validation request");
        return Err(SubmitError::Invalid(report));
    }

    let task_id = Uuid::new_v4();
    let cache_key = request
        .cache_key
        .unwrap_or_else(|| default_cache_key(task_id));
    let total_batches = i32::try_from(chunk_count(request.records.len(), settings.chunk_size))
        .map_err(|_| SubmitError::TooLarge)?;

    store
        .create(task_id, total_batches, &cache_key)
        .await
        .inspect_err(|e| {
            tracing::error!(task_id = %task_id, error = %e, "Failed to create validation task");
        })?;

    let job = QueuedJob {
        task_id,
        cache_key: cache_key.clone(),
        records: request.records,
    };

    if let Err(e) = queue.enqueue(&job).await {
        tracing::error!(task_id = %task_id, error = %e, "Failed to enqueue validation job");
        if let Err(e) = store
            .update(task_id, TaskUpdate::failed(FAILURE_WARNING))
            .await
        {
            tracing::error!(task_id = %task_id, error = %e, "Failed to mark orphaned task as failed");
        }
        return Err(SubmitError::Queue(e));
    }

    metrics::counter!("qc_validation_jobs_total").increment(1);
    tracing::info!(
        task_id = %task_id,
        records = job.records.len(),
        total_batches,
        "Validation task submitted"
    );

    Ok(SubmitValidationResponse {
        task_id,
        status: TaskStatus::Pending,
        cache_key,
        total_batches,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Invalid validation request: {0}")]
    Invalid(garde::Report),

    #[error("Too many batches for a single task")]
    TooLarge,

    #[error("Task store error: {0}")]
    Store(#[from] StoreError),

    #[error("Job queue error: {0}")]
    Queue(#[from] QueueError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_key() {
        let id = Uuid::nil();
        assert_eq!(
            default_cache_key(id),
            "qc_validation:00000000-0000-0000-0000-000000000000"
        );
    }
}
