//! Axum route handlers for the teacher assistant.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::assistant::service::{
    analyze_wrong_answers, class_average, recent_questions, summarize_questions, teaching_advice,
    wrong_answers, QuestionSummary, TeachingAdvice, WrongAnswerAnalysis, DEFAULT_SUMMARY_DAYS,
};
use crate::errors::{require_text, AppError};
use crate::state::AppState;

fn default_subject() -> String {
    "국어".to_string()
}

fn default_days() -> i64 {
    DEFAULT_SUMMARY_DAYS
}

#[derive(Debug, Deserialize)]
pub struct QuestionSummaryRequest {
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_days")]
    pub days: i64,
}

#[derive(Debug, Deserialize)]
pub struct WrongAnswerRequest {
    #[serde(default = "default_subject")]
    pub subject: String,
}

#[derive(Debug, Deserialize)]
pub struct TeachingAdviceRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default = "default_subject")]
    pub subject: String,
}

/// POST /api/teacher/assistant/summarize-questions
pub async fn handle_summarize_questions(
    State(state): State<AppState>,
    Json(request): Json<QuestionSummaryRequest>,
) -> Result<Json<QuestionSummary>, AppError> {
    let questions = recent_questions(&state.db, request.days).await?;
    let summary =
        summarize_questions(state.llm.as_ref(), &request.subject, request.days, &questions).await;
    Ok(Json(summary))
}

/// POST /api/teacher/assistant/analyze-wrong-answers
pub async fn handle_analyze_wrong_answers(
    State(state): State<AppState>,
    Json(request): Json<WrongAnswerRequest>,
) -> Result<Json<WrongAnswerAnalysis>, AppError> {
    let answers = wrong_answers(&state.db).await?;
    let analysis = analyze_wrong_answers(state.llm.as_ref(), &request.subject, &answers).await;
    Ok(Json(analysis))
}

/// POST /api/teacher/assistant/teaching-advice
pub async fn handle_teaching_advice(
    State(state): State<AppState>,
    Json(request): Json<TeachingAdviceRequest>,
) -> Result<Json<TeachingAdvice>, AppError> {
    require_text("topic", &request.topic)?;
    let average = class_average(&state.db).await?;
    let advice =
        teaching_advice(state.llm.as_ref(), &request.subject, &request.topic, average).await;
    Ok(Json(advice))
}
