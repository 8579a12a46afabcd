//! Axum route handlers for standards administration.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::{require_text, AppError};
use crate::standards::catalog::{StandardRecord, StandardsCatalog};
use crate::standards::matcher::MatchOutcome;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StandardsListResponse {
    pub count: usize,
    pub standards: Vec<StandardRecord>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub essay: String,
}

/// GET /api/standards
pub async fn handle_list_standards(State(state): State<AppState>) -> Json<StandardsListResponse> {
    let standards = state.catalog.snapshot().as_ref().clone();
    Json(StandardsListResponse {
        count: standards.len(),
        standards,
    })
}

/// POST /api/standards/refresh
///
/// Re-reads the standards file. On failure the previous list stays active.
pub async fn handle_refresh_standards(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, AppError> {
    let count = refresh_catalog(state.catalog.clone()).await?;
    Ok(Json(RefreshResponse { count }))
}

/// Runs the file read on the blocking pool.
async fn refresh_catalog(catalog: Arc<StandardsCatalog>) -> Result<usize, AppError> {
    let count = tokio::task::spawn_blocking(move || catalog.refresh())
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Standards refresh task failed: {e}")))??;
    Ok(count)
}

/// POST /api/standards/match
///
/// Runs the matcher only; nothing is persisted.
pub async fn handle_match_standard(
    State(state): State<AppState>,
    Json(request): Json<MatchRequest>,
) -> Result<Json<MatchOutcome>, AppError> {
    require_text("essay", &request.essay)?;
    let outcome = state
        .matcher
        .match_standard(&request.question, &request.essay)
        .await;
    Ok(Json(outcome))
}
