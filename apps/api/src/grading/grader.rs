//! Essay grader: rubric grading of free-text answers through the LLM.
//!
//! Flow: validate → build rubric prompt → LLM JSON verdict (clamped) or
//!       fallback verdict → INSERT essay_gradings → response with mastery level.
//!
//! The grader never fails because of the LLM: an unusable reply produces the
//! fallback verdict (half marks, `graded_by = "FALLBACK"`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{require_text, AppError};
use crate::grading::prompts::{GRADING_PROMPT_TEMPLATE, GRADING_SYSTEM_ROLE};
use crate::llm_client::prompts::{fill_template, json_system, KOREAN_TEACHER_PERSONA};
use crate::llm_client::{complete_json, CompletionBackend};
use crate::models::grading::EssayGradingRow;
use crate::text::{round2, truncate_with_ellipsis};

pub const DEFAULT_MAX_SCORE: i32 = 100;
pub const HISTORY_QUESTION_CHARS: usize = 100;

const GRADING_TEMPERATURE: f32 = 0.3;
const MISSING_REASON: &str = "채점 근거를 생성할 수 없습니다.";
const MISSING_FEEDBACK: &str = "피드백을 생성할 수 없습니다.";
const FALLBACK_REASON: &str = "자동 채점에 실패하여 기본 점수가 부여되었습니다.";
const FALLBACK_FEEDBACK: &str = "교사의 직접 채점이 필요합니다.";
const DEFAULT_SUBJECT: &str = "국어";

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MasteryLevel {
    Pass,
    Partial,
    Fail,
}

impl MasteryLevel {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 80.0 {
            MasteryLevel::Pass
        } else if percentage >= 60.0 {
            MasteryLevel::Partial
        } else {
            MasteryLevel::Fail
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MasteryLevel::Pass => "PASS",
            MasteryLevel::Partial => "PARTIAL",
            MasteryLevel::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GradedBy {
    Ai,
    Fallback,
}

impl GradedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GradedBy::Ai => "AI",
            GradedBy::Fallback => "FALLBACK",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GradeRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub student_answer: String,
    #[serde(default)]
    pub model_answer: Option<String>,
    #[serde(default = "default_max_score")]
    pub max_score: i32,
}

fn default_max_score() -> i32 {
    DEFAULT_MAX_SCORE
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub score: f64,
    pub reason: String,
    pub feedback: String,
    pub graded_by: GradedBy,
}

impl Verdict {
    /// Half marks (integer division) with the fixed teacher-review texts.
    pub fn fallback(max_score: i32) -> Self {
        Self {
            score: f64::from(max_score / 2),
            reason: FALLBACK_REASON.to_string(),
            feedback: FALLBACK_FEEDBACK.to_string(),
            graded_by: GradedBy::Fallback,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GradeResponse {
    pub id: Uuid,
    pub score: f64,
    pub max_score: i32,
    pub percentage: f64,
    pub mastery_level: MasteryLevel,
    pub reason: String,
    pub feedback: String,
    pub graded_by: GradedBy,
    pub graded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct GradingHistoryItem {
    pub id: Uuid,
    pub subject: String,
    pub question: String,
    pub score: f64,
    pub graded_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<EssayGradingRow> for GradingHistoryItem {
    fn from(row: EssayGradingRow) -> Self {
        Self {
            id: row.id,
            question: truncate_with_ellipsis(&row.question, HISTORY_QUESTION_CHARS),
            subject: row.subject,
            score: row.score,
            graded_by: row.graded_by,
            created_at: row.created_at,
        }
    }
}

/// LLM reply. Scores occasionally arrive as strings, so the field stays loose.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    feedback: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Scoring helpers
// ────────────────────────────────────────────────────────────────────────────

pub fn clamp_score(raw: f64, max_score: i32) -> f64 {
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, f64::from(max_score))
}

pub fn percentage(score: f64, max_score: i32) -> f64 {
    if max_score <= 0 {
        return 0.0;
    }
    round2(score / f64::from(max_score) * 100.0)
}

fn score_from_value(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn non_blank(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn build_grading_prompt(request: &GradeRequest) -> String {
    let model_answer_section = request
        .model_answer
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .map(|a| format!("\n**모범 답안**:\n{a}\n"))
        .unwrap_or_default();

    fill_template(
        GRADING_PROMPT_TEMPLATE,
        &[
            ("persona", KOREAN_TEACHER_PERSONA),
            ("question", &request.question),
            ("model_answer_section", &model_answer_section),
            ("student_answer", &request.student_answer),
            ("max_score", &request.max_score.to_string()),
        ],
    )
}

fn validate(request: &GradeRequest) -> Result<(), AppError> {
    require_text("question", &request.question)?;
    require_text("student_answer", &request.student_answer)?;
    if request.max_score <= 0 {
        return Err(AppError::Validation(
            "max_score는 0보다 커야 합니다.".to_string(),
        ));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Grading
// ────────────────────────────────────────────────────────────────────────────

/// Asks the LLM for a verdict. Falls back instead of failing.
pub async fn evaluate_answer(llm: &dyn CompletionBackend, request: &GradeRequest) -> Verdict {
    let prompt = build_grading_prompt(request);
    let system = json_system(GRADING_SYSTEM_ROLE);

    match complete_json::<RawVerdict>(llm, &prompt, &system, GRADING_TEMPERATURE).await {
        Ok(raw) => Verdict {
            score: clamp_score(score_from_value(raw.score.as_ref()), request.max_score),
            reason: non_blank(raw.reason, MISSING_REASON),
            feedback: non_blank(raw.feedback, MISSING_FEEDBACK),
            graded_by: GradedBy::Ai,
        },
        Err(e) => {
            warn!("Essay grading fell back to default verdict: {e}");
            Verdict::fallback(request.max_score)
        }
    }
}

pub async fn grade_essay(
    pool: &PgPool,
    llm: &dyn CompletionBackend,
    request: GradeRequest,
) -> Result<GradeResponse, AppError> {
    validate(&request)?;
    require_text("username", &request.username)?;

    let verdict = evaluate_answer(llm, &request).await;
    let subject = request
        .subject
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_SUBJECT);

    let id = Uuid::new_v4();
    let graded_at: DateTime<Utc> = sqlx::query_scalar(
        r#"
        INSERT INTO essay_gradings
            (id, username, subject, question, student_answer, model_answer,
             score, max_score, grading_reason, feedback, graded_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING created_at
        "#,
    )
    .bind(id)
    .bind(&request.username)
    .bind(subject)
    .bind(&request.question)
    .bind(&request.student_answer)
    .bind(&request.model_answer)
    .bind(verdict.score)
    .bind(request.max_score)
    .bind(&verdict.reason)
    .bind(&verdict.feedback)
    .bind(verdict.graded_by.as_str())
    .fetch_one(pool)
    .await?;

    let percentage = percentage(verdict.score, request.max_score);
    let mastery_level = MasteryLevel::from_percentage(percentage);
    info!(
        "Graded essay {id} for {}: {}/{} ({}) by {}",
        request.username,
        verdict.score,
        request.max_score,
        mastery_level.as_str(),
        verdict.graded_by.as_str()
    );

    Ok(GradeResponse {
        id,
        score: verdict.score,
        max_score: request.max_score,
        percentage,
        mastery_level,
        reason: verdict.reason,
        feedback: verdict.feedback,
        graded_by: verdict.graded_by,
        graded_at,
    })
}

/// Latest gradings for a user, newest first.
pub async fn fetch_gradings(
    pool: &PgPool,
    username: &str,
    subject: Option<&str>,
    limit: i64,
) -> Result<Vec<EssayGradingRow>, sqlx::Error> {
    sqlx::query_as::<_, EssayGradingRow>(
        r#"
        SELECT * FROM essay_gradings
        WHERE username = $1 AND ($2::TEXT IS NULL OR subject = $2)
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(username)
    .bind(subject)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn grading_history(
    pool: &PgPool,
    username: &str,
    subject: Option<&str>,
    limit: i64,
) -> Result<Vec<GradingHistoryItem>, AppError> {
    let rows = fetch_gradings(pool, username, subject, limit.max(1)).await?;
    Ok(rows.into_iter().map(GradingHistoryItem::from).collect())
}

pub async fn grading_detail(pool: &PgPool, id: Uuid) -> Result<EssayGradingRow, AppError> {
    sqlx::query_as::<_, EssayGradingRow>("SELECT * FROM essay_gradings WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("채점 정보를 찾을 수 없습니다: {id}")))
}
