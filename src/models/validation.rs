use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::record::RecordBatch;
use crate::models::task::{TaskStatus, ValidationResultItem};

/// Upper bound on records accepted in one submission.
pub const MAX_RECORDS: usize = 5000;

/// Request to validate a batch of free-text records.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitValidationRequest {
    #[garde(custom(validate_records))]
    pub records: RecordBatch,

    /// Where the combined result is cached. Defaults to one derived from the task id.
    #[garde(length(min = 1, max = 200), custom(validate_cache_key))]
    pub cache_key: Option<String>,
}

/// Namespace of the service's own Redis keys (queue lists, cached results).
pub const RESERVED_KEY_PREFIX: &str = "qc_tool:";

fn validate_records(records: &RecordBatch, _ctx: &()) -> garde::Result {
    if records.is_empty() {
        return Err(garde::Error::new("at least one record is required"));
    }
    if records.len() > MAX_RECORDS {
        return Err(garde::Error::new(format!(
            "at most {MAX_RECORDS} records may be submitted at once"
        )));
    }
    if records.ids().any(|id| id.trim().is_empty()) {
        return Err(garde::Error::new("record ids must not be blank"));
    }
    Ok(())
}

fn validate_cache_key(cache_key: &Option<String>, _ctx: &()) -> garde::Result {
    match cache_key {
        Some(key) if key.starts_with(RESERVED_KEY_PREFIX) => Err(garde::Error::new(format!(
            "cache keys must not start with {RESERVED_KEY_PREFIX}"
        ))),
        _ => Ok(()),
    }
}

/// Response after submitting a batch for validation.
#[derive(Debug, Serialize)]
pub struct SubmitValidationResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub cache_key: String,
    pub total_batches: i32,
}

/// Response for polling a validation task.
#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub completed_batches: i32,
    pub total_batches: i32,
    pub results: Vec<ValidationResultItem>,
    pub warning: Option<String>,
}

/// What the validation service returns for one chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkResponse {
    #[serde(default)]
    pub results: Vec<ValidationResultItem>,
    #[serde(default)]
    pub warning: Option<String>,
}
