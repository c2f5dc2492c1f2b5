use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::state::AppState;
use crate::tailoring::answers::AnswerField;
use crate::tailoring::workflow::WorkflowSnapshot;

#[derive(Deserialize)]
pub struct JobPostRequest {
    pub text: String,
}

#[derive(Deserialize)]
pub struct EditTextRequest {
    pub text: String,
}

/// GET /api/v1/tailor
pub async fn handle_get_session(State(state): State<AppState>) -> Json<WorkflowSnapshot> {
    Json(state.session.snapshot().await)
}

/// PUT /api/v1/tailor/job-post
pub async fn handle_set_job_post(
    State(state): State<AppState>,
    Json(req): Json<JobPostRequest>,
) -> Json<WorkflowSnapshot> {
    Json(state.session.set_job_post(req.text).await)
}

/// POST /api/v1/tailor/analyze
/// Responds once the backend has answered. A failed call is reported through
/// the returned stage, not as an HTTP error.
pub async fn handle_analyze(
    State(state): State<AppState>,
) -> Result<Json<WorkflowSnapshot>, AppError> {
    Ok(Json(state.session.analyze().await?))
}

/// POST /api/v1/tailor/answers/:q/rows
pub async fn handle_add_answer_row(
    State(state): State<AppState>,
    Path(question): Path<usize>,
) -> Result<Json<WorkflowSnapshot>, AppError> {
    Ok(Json(state.session.add_answer_row(question).await?))
}

/// DELETE /api/v1/tailor/answers/:q/rows
pub async fn handle_remove_answer_row(
    State(state): State<AppState>,
    Path(question): Path<usize>,
) -> Result<Json<WorkflowSnapshot>, AppError> {
    Ok(Json(state.session.remove_answer_row(question).await?))
}

/// PATCH /api/v1/tailor/answers/:q/rows/:r
/// Body: `{"field": "text" | "linked_experience" | "enhance", "value": ...}`
pub async fn handle_set_answer_field(
    State(state): State<AppState>,
    Path((question, row)): Path<(usize, usize)>,
    Json(field): Json<AnswerField>,
) -> Result<Json<WorkflowSnapshot>, AppError> {
    Ok(Json(
        state.session.set_answer_field(question, row, field).await?,
    ))
}

/// POST /api/v1/tailor/generate
pub async fn handle_generate(
    State(state): State<AppState>,
) -> Result<Json<WorkflowSnapshot>, AppError> {
    Ok(Json(state.session.generate().await?))
}

/// POST /api/v1/tailor/preview/edit
/// Enters or leaves edit mode. Leaving discards the buffer.
pub async fn handle_toggle_preview_edit(
    State(state): State<AppState>,
) -> Result<Json<WorkflowSnapshot>, AppError> {
    Ok(Json(state.session.toggle_preview_edit().await?))
}

/// PUT /api/v1/tailor/preview/edit
pub async fn handle_update_preview_edit(
    State(state): State<AppState>,
    Json(req): Json<EditTextRequest>,
) -> Result<Json<WorkflowSnapshot>, AppError> {
    Ok(Json(state.session.update_preview_edit(req.text).await?))
}

/// POST /api/v1/tailor/preview/save
pub async fn handle_save_preview_edit(
    State(state): State<AppState>,
) -> Result<Json<WorkflowSnapshot>, AppError> {
    Ok(Json(state.session.save_preview_edit().await?))
}

/// POST /api/v1/tailor/reset
pub async fn handle_reset(
    State(state): State<AppState>,
) -> Result<Json<WorkflowSnapshot>, AppError> {
    Ok(Json(state.session.reset().await?))
}
