use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::task::CachedFullResult;
use crate::models::validation::{
    SubmitValidationRequest, SubmitValidationResponse, TaskStatusResponse,
};
use crate::services::submission::{self, SubmitError};

/// HTTP status reported for a rejected submission.
pub fn submit_error_status(error: &SubmitError) -> StatusCode {
    match error {
        SubmitError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SubmitError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        SubmitError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        SubmitError::Queue(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// POST /api/v1/validations: Create a validation task and enqueue its job.
pub async fn submit_validation(
    State(state): State<AppState>,
    Json(request): Json<SubmitValidationRequest>,
) -> Result<(StatusCode, Json<SubmitValidationResponse>), StatusCode> {
    let response = submission::submit(
        state.store.as_ref(),
        state.queue.as_ref(),
        &state.settings,
        request,
    )
    .await
    .map_err(|e| submit_error_status(&e))?;

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /api/v1/validations/{task_id}: Poll a validation task.
pub async fn get_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskStatusResponse>, StatusCode> {
    let task = state
        .store
        .find(task_id)
        .await
        .map_err(|e| {
            tracing::error!(task_id = %task_id, error = %e, "Failed to load validation task");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(TaskStatusResponse {
        task_id: task.id,
        status: task.status,
        completed_batches: task.completed_batches,
        total_batches: task.total_batches,
        results: task.results,
        warning: task.warning,
    }))
}

/// GET /api/v1/validation-results/{cache_key}: Fetch a cached combined result.
pub async fn get_cached_result(
    State(state): State<AppState>,
    Path(cache_key): Path<String>,
) -> Result<Json<CachedFullResult>, StatusCode> {
    state
        .cache
        .get(&cache_key)
        .await
        .map_err(|e| {
            tracing::error!(cache_key = %cache_key, error = %e, "Failed to read cached result");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
