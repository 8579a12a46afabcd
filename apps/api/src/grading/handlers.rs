//! Axum route handlers for essay grading.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::analysis::history::DEFAULT_HISTORY_LIMIT;
use crate::errors::{require_text, AppError};
use crate::grading::grader::{
    grade_essay, grading_detail, grading_history, GradeRequest, GradeResponse,
    GradingHistoryItem,
};
use crate::models::grading::EssayGradingRow;
use crate::state::AppState;

/// POST /api/grading/essay
///
/// Also mounted as POST /api/teacher/auto-grade.
pub async fn handle_grade_essay(
    State(state): State<AppState>,
    Json(request): Json<GradeRequest>,
) -> Result<Json<GradeResponse>, AppError> {
    let response = grade_essay(&state.db, state.llm.as_ref(), request).await?;
    Ok(Json(response))
}

/// GET /api/grading/detail/:id
pub async fn handle_grading_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EssayGradingRow>, AppError> {
    Ok(Json(grading_detail(&state.db, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct GradingListQuery {
    pub username: String,
    pub subject: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/grading/list?username=&subject=&limit=
///
/// Gradings only; the merged timeline is served by /api/grading/history.
pub async fn handle_grading_list(
    State(state): State<AppState>,
    Query(query): Query<GradingListQuery>,
) -> Result<Json<Vec<GradingHistoryItem>>, AppError> {
    require_text("username", &query.username)?;
    let items = grading_history(
        &state.db,
        &query.username,
        query.subject.as_deref(),
        query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
    )
    .await?;
    Ok(Json(items))
}
