use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::analysis::history::{
    load_history, report_summary, HistoryItem, ReportSummary, DEFAULT_HISTORY_LIMIT,
};
use crate::analysis::service::{analyze_submission, AnalysisResponse, AnalyzeRequest};
use crate::errors::{require_text, AppError};
use crate::state::AppState;

/// POST /api/student/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let response = analyze_submission(&state.matcher, state.recorder.as_ref(), request).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct HistoryRequest {
    #[serde(default)]
    pub username: String,
    pub subject: Option<String>,
    pub limit: Option<i64>,
}

/// POST /api/grading/history
pub async fn handle_history(
    State(state): State<AppState>,
    Json(request): Json<HistoryRequest>,
) -> Result<Json<Vec<HistoryItem>>, AppError> {
    require_text("username", &request.username)?;
    let items = load_history(
        &state.db,
        &request.username,
        request.subject.as_deref(),
        request.limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
    )
    .await?;
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub username: String,
}

/// GET /report/summary?username=
pub async fn handle_report_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<ReportSummary>, AppError> {
    require_text("username", &query.username)?;
    Ok(Json(report_summary(&state.db, &query.username).await?))
}
