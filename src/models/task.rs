use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// One per-record outcome returned by the validation service. The job passes
/// these through untouched.
pub type ValidationResultItem = serde_json::Value;

/// Status of a validation task as seen by polling clients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

/// Durable, pollable record of one validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationTask {
    pub id: Uuid,
    pub status: TaskStatus,
    pub completed_batches: i32,
    pub total_batches: i32,
    pub results: Vec<ValidationResultItem>,
    pub warning: Option<String>,
    pub cache_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update of a task record. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub completed_batches: Option<i32>,
    pub results: Option<Vec<ValidationResultItem>>,
    pub warning: Option<String>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn progress(completed_batches: i32, results: &[ValidationResultItem]) -> Self {
        Self {
            completed_batches: Some(completed_batches),
            results: Some(results.to_vec()),
            ..Self::default()
        }
    }

    pub fn failed(warning: &str) -> Self {
        Self {
            status: Some(TaskStatus::Failed),
            warning: Some(warning.to_string()),
            ..Self::default()
        }
    }

    /// Apply this update to an in-memory task.
    pub fn apply_to(&self, task: &mut ValidationTask) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(completed) = self.completed_batches {
            task.completed_batches = completed;
        }
        if let Some(results) = &self.results {
            task.results = results.clone();
        }
        if let Some(warning) = &self.warning {
            task.warning = Some(warning.clone());
        }
        task.updated_at = Utc::now();
    }
}

/// Final combined output of a run, cached for clients that poll the cache
/// instead of the task record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedFullResult {
    pub results: Vec<ValidationResultItem>,
    pub warning: Option<String>,
    pub enabled: bool,
}

impl CachedFullResult {
    pub fn new(results: Vec<ValidationResultItem>) -> Self {
        Self {
            results,
            warning: None,
            enabled: true,
        }
    }
}
