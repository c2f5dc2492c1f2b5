use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::errors::AppError;
use crate::models::resume::ResumeDraft;
use crate::normalize::normalize;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SaveResumeResponse {
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub resume: ResumeDraft,
}

/// POST /api/v1/resume/normalize
/// Accepts raw editor sections in any historical shape.
pub async fn handle_normalize(Json(raw): Json<Value>) -> Json<ResumeDraft> {
    Json(normalize(&raw))
}

/// POST /api/v1/resume/save
/// Normalizes first so the backend only ever sees the canonical document.
pub async fn handle_save(
    State(state): State<AppState>,
    Json(raw): Json<Value>,
) -> Result<Json<SaveResumeResponse>, AppError> {
    let resume = normalize(&raw);
    let receipt = state
        .api
        .save_resume(&state.config.user_id, &resume)
        .await?;
    info!(
        "Saved resume for '{}' as version {}",
        state.config.user_id, receipt.version
    );
    // A saved résumé may rename the experiences answers link to.
    state.session.refresh_options().await;

    Ok(Json(SaveResumeResponse {
        version: receipt.version,
        created_at: receipt.created_at,
        resume,
    }))
}
