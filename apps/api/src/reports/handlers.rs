//! Axum route handlers for class reports.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::{require_text, AppError};
use crate::reports::class_report::{
    download_class_report, generate_class_report, get_class_report, list_class_reports,
    ClassReport, ClassReportListItem, ClassReportRequest,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub teacher_username: String,
}

/// POST /api/teacher/class-report/generate
pub async fn handle_generate_report(
    State(state): State<AppState>,
    Json(request): Json<ClassReportRequest>,
) -> Result<Json<ClassReport>, AppError> {
    let codes = state.catalog.codes();
    let report = generate_class_report(
        &state.db,
        &state.s3,
        &state.config.s3_bucket,
        state.llm.as_ref(),
        &codes,
        request,
    )
    .await?;
    Ok(Json(report))
}

/// GET /api/teacher/class-report/:id
pub async fn handle_get_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ClassReport>, AppError> {
    Ok(Json(get_class_report(&state.db, id).await?))
}

/// GET /api/teacher/class-report/list?teacher_username=
pub async fn handle_list_reports(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ClassReportListItem>>, AppError> {
    require_text("teacher_username", &query.teacher_username)?;
    Ok(Json(
        list_class_reports(&state.db, &query.teacher_username).await?,
    ))
}

/// GET /api/teacher/class-report/download/:id
///
/// Returns the Markdown artifact as an attachment.
pub async fn handle_download_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let markdown =
        download_class_report(&state.db, &state.s3, &state.config.s3_bucket, id).await?;
    let disposition = format!("attachment; filename=\"class-report-{id}.md\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        markdown,
    ))
}
