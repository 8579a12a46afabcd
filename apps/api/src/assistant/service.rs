//! Teacher assistant: LLM summaries of recent student questions, wrong-answer
//! patterns from graded essays, and lesson advice for a topic.
//!
//! Each operation degrades instead of failing: an LLM error yields empty lists
//! with `degraded: true`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::warn;

use crate::assistant::prompts::*;
use crate::errors::AppError;
use crate::grading::grader::{percentage, MasteryLevel};
use crate::llm_client::prompts::{fill_template, json_system};
use crate::llm_client::{complete_json, CompletionBackend};
use crate::models::grading::EssayGradingRow;
use crate::text::{round2, take_chars};

pub const DEFAULT_SUMMARY_DAYS: i64 = 7;
pub const MAX_SUMMARY_DAYS: i64 = 365;
pub const DEFAULT_CLASS_AVERAGE: f64 = 70.0;

const NO_QUESTIONS_MESSAGE: &str = "분석할 질문이 없습니다.";
const NO_WRONG_ANSWERS_MESSAGE: &str = "분석할 오답이 없습니다.";
const MAX_PROMPT_QUESTIONS: usize = 30;
const MAX_WRONG_ANSWERS: i64 = 50;
const MAX_PROMPT_SAMPLES: usize = 10;
const SAMPLE_QUESTION_CHARS: usize = 100;
const SAMPLE_ANSWER_CHARS: usize = 200;
const ANALYSIS_TEMPERATURE: f32 = 0.5;
const ADVICE_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuestionSummaryReply {
    summary: String,
    common_topics: Vec<String>,
    difficulty_areas: Vec<String>,
    teaching_suggestions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WrongAnswerReply {
    common_mistakes: Vec<String>,
    misconceptions: Vec<String>,
    improvement_strategies: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TeachingAdviceReply {
    lesson_objectives: Vec<String>,
    teaching_methods: Vec<String>,
    materials: Vec<String>,
    assessment_tips: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct QuestionSummary {
    pub period: String,
    pub question_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub summary: String,
    pub common_topics: Vec<String>,
    pub difficulty_areas: Vec<String>,
    pub teaching_suggestions: Vec<String>,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WrongAnswer {
    pub question: String,
    pub student_answer: String,
    pub mastery: MasteryLevel,
}

impl From<&EssayGradingRow> for WrongAnswer {
    fn from(row: &EssayGradingRow) -> Self {
        Self {
            question: row.question.clone(),
            student_answer: row.student_answer.clone(),
            mastery: MasteryLevel::from_percentage(percentage(row.score, row.max_score)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WrongAnswerAnalysis {
    pub analyzed_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub common_mistakes: Vec<String>,
    pub misconceptions: Vec<String>,
    pub improvement_strategies: Vec<String>,
    pub degraded: bool,
}

#[derive(Debug, Serialize)]
pub struct TeachingAdvice {
    pub topic: String,
    pub subject: String,
    pub class_average: f64,
    pub lesson_objectives: Vec<String>,
    pub teaching_methods: Vec<String>,
    pub materials: Vec<String>,
    pub assessment_tips: Vec<String>,
    pub degraded: bool,
}

/// Runs a JSON prompt; on failure returns the empty reply and `true`.
async fn ask<T: serde::de::DeserializeOwned + Default>(
    llm: &dyn CompletionBackend,
    prompt: &str,
    role: &str,
    temperature: f32,
    what: &str,
) -> (T, bool) {
    match complete_json::<T>(llm, prompt, &json_system(role), temperature).await {
        Ok(reply) => (reply, false),
        Err(e) => {
            warn!("Teacher assistant {what} degraded: {e}");
            (T::default(), true)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Operations over loaded data
// ────────────────────────────────────────────────────────────────────────────

pub async fn summarize_questions(
    llm: &dyn CompletionBackend,
    subject: &str,
    days: i64,
    questions: &[String],
) -> QuestionSummary {
    let period = format!("최근 {days}일");
    if questions.is_empty() {
        return QuestionSummary {
            period,
            question_count: 0,
            message: Some(NO_QUESTIONS_MESSAGE.to_string()),
            summary: String::new(),
            common_topics: Vec::new(),
            difficulty_areas: Vec::new(),
            teaching_suggestions: Vec::new(),
            degraded: false,
        };
    }

    let listing = questions
        .iter()
        .take(MAX_PROMPT_QUESTIONS)
        .map(|q| format!("- {q}"))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = fill_template(
        QUESTION_SUMMARY_PROMPT_TEMPLATE,
        &[("subject", subject), ("questions", &listing)],
    );

    let (reply, degraded): (QuestionSummaryReply, bool) = ask(
        llm,
        &prompt,
        QUESTION_SUMMARY_ROLE,
        ANALYSIS_TEMPERATURE,
        "question summary",
    )
    .await;

    QuestionSummary {
        period,
        question_count: questions.len(),
        message: None,
        summary: reply.summary,
        common_topics: reply.common_topics,
        difficulty_areas: reply.difficulty_areas,
        teaching_suggestions: reply.teaching_suggestions,
        degraded,
    }
}

pub async fn analyze_wrong_answers(
    llm: &dyn CompletionBackend,
    subject: &str,
    answers: &[WrongAnswer],
) -> WrongAnswerAnalysis {
    if answers.is_empty() {
        return WrongAnswerAnalysis {
            analyzed_count: 0,
            message: Some(NO_WRONG_ANSWERS_MESSAGE.to_string()),
            common_mistakes: Vec::new(),
            misconceptions: Vec::new(),
            improvement_strategies: Vec::new(),
            degraded: false,
        };
    }

    let samples = answers
        .iter()
        .take(MAX_PROMPT_SAMPLES)
        .map(|a| {
            format!(
                "질문: {}\n학생답안: {}\n평가: {}",
                take_chars(&a.question, SAMPLE_QUESTION_CHARS),
                take_chars(&a.student_answer, SAMPLE_ANSWER_CHARS),
                a.mastery.as_str()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    let prompt = fill_template(
        WRONG_ANSWER_PROMPT_TEMPLATE,
        &[("subject", subject), ("answers", &samples)],
    );

    let (reply, degraded): (WrongAnswerReply, bool) = ask(
        llm,
        &prompt,
        WRONG_ANSWER_ROLE,
        ANALYSIS_TEMPERATURE,
        "wrong-answer analysis",
    )
    .await;

    WrongAnswerAnalysis {
        analyzed_count: answers.len(),
        message: None,
        common_mistakes: reply.common_mistakes,
        misconceptions: reply.misconceptions,
        improvement_strategies: reply.improvement_strategies,
        degraded,
    }
}

pub async fn teaching_advice(
    llm: &dyn CompletionBackend,
    subject: &str,
    topic: &str,
    class_average: Option<f64>,
) -> TeachingAdvice {
    let average = round2(class_average.unwrap_or(DEFAULT_CLASS_AVERAGE));
    let average_text = average.to_string();
    let prompt = fill_template(
        TEACHING_ADVICE_PROMPT_TEMPLATE,
        &[("subject", subject), ("topic", topic), ("average", &average_text)],
    );

    let (reply, degraded): (TeachingAdviceReply, bool) = ask(
        llm,
        &prompt,
        TEACHING_ADVICE_ROLE,
        ADVICE_TEMPERATURE,
        "teaching advice",
    )
    .await;

    TeachingAdvice {
        topic: topic.to_string(),
        subject: subject.to_string(),
        class_average: average,
        lesson_objectives: reply.lesson_objectives,
        teaching_methods: reply.teaching_methods,
        materials: reply.materials,
        assessment_tips: reply.assessment_tips,
        degraded,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Loaders
// ────────────────────────────────────────────────────────────────────────────

/// Start of a `days`-long window ending at `now`. Accepts 1..=365 days.
pub fn question_window_start(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, AppError> {
    if !(1..=MAX_SUMMARY_DAYS).contains(&days) {
        return Err(AppError::Validation(format!(
            "days는 1 이상 {MAX_SUMMARY_DAYS} 이하여야 합니다."
        )));
    }
    Ok(now - Duration::days(days))
}

pub async fn recent_questions(pool: &PgPool, days: i64) -> Result<Vec<String>, AppError> {
    let since = question_window_start(Utc::now(), days)?;
    Ok(sqlx::query_scalar(
        r#"
        SELECT question FROM records
        WHERE created_at >= $1 AND question <> ''
        ORDER BY created_at DESC
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?)
}

/// Gradings below the PASS threshold, newest first.
pub async fn wrong_answers(pool: &PgPool) -> Result<Vec<WrongAnswer>, AppError> {
    let rows = sqlx::query_as::<_, EssayGradingRow>(
        r#"
        SELECT * FROM essay_gradings
        WHERE max_score > 0 AND score * 100.0 / max_score < 80.0
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(MAX_WRONG_ANSWERS)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(WrongAnswer::from).collect())
}

pub async fn class_average(pool: &PgPool) -> Result<Option<f64>, AppError> {
    Ok(sqlx::query_scalar("SELECT AVG(score) FROM records")
        .fetch_one(pool)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedLlm;
    use crate::llm_client::LlmError;

    #[test]
    fn test_question_window_bounds() {
        let now = Utc::now();
        assert_eq!(question_window_start(now, 7).unwrap(), now - Duration::days(7));
        assert_eq!(
            question_window_start(now, MAX_SUMMARY_DAYS).unwrap(),
            now - Duration::days(365)
        );
        assert!(matches!(
            question_window_start(now, 0),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            question_window_start(now, 1_000_000_000_000_000),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_days_rejected_before_query() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let result = recent_questions(&pool, 1_000_000_000_000_000).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_no_questions_skips_llm() {
        let llm = ScriptedLlm::new();
        let summary = summarize_questions(&llm, "국어", 7, &[]).await;

        assert_eq!(llm.calls(), 0);
        assert_eq!(summary.question_count, 0);
        assert_eq!(summary.message.as_deref(), Some("분석할 질문이 없습니다."));
        assert_eq!(summary.period, "최근 7일");
    }

    #[tokio::test]
    async fn test_question_prompt_caps_at_thirty() {
        let llm = ScriptedLlm::replying(
            r#"{"summary": "비유 질문이 많음", "common_topics": ["비유"]}"#,
        );
        let questions: Vec<String> = (0..40).map(|i| format!("질문{i}")).collect();

        let summary = summarize_questions(&llm, "국어", 7, &questions).await;

        assert_eq!(summary.question_count, 40);
        assert_eq!(summary.summary, "비유 질문이 많음");
        assert_eq!(summary.common_topics, ["비유"]);
        assert!(summary.difficulty_areas.is_empty());
        assert!(!summary.degraded);
        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.contains("- 질문29"));
        assert!(!prompt.contains("- 질문30"));
    }

    #[tokio::test]
    async fn test_question_summary_degrades_on_llm_error() {
        let llm = ScriptedLlm::failing(LlmError::Timeout);
        let summary = summarize_questions(&llm, "국어", 3, &["왜?".to_string()]).await;
        assert!(summary.degraded);
        assert!(summary.common_topics.is_empty());
        assert_eq!(summary.question_count, 1);
    }

    #[tokio::test]
    async fn test_wrong_answers_empty_and_truncated_samples() {
        let llm = ScriptedLlm::new();
        let empty = analyze_wrong_answers(&llm, "국어", &[]).await;
        assert_eq!(empty.message.as_deref(), Some("분석할 오답이 없습니다."));
        assert_eq!(llm.calls(), 0);

        let llm = ScriptedLlm::replying(r#"{"common_mistakes": ["근거 부족"]}"#);
        let answers = vec![WrongAnswer {
            question: "문".repeat(150),
            student_answer: "답".repeat(300),
            mastery: MasteryLevel::Partial,
        }];

        let analysis = analyze_wrong_answers(&llm, "국어", &answers).await;

        assert_eq!(analysis.analyzed_count, 1);
        assert_eq!(analysis.common_mistakes, ["근거 부족"]);
        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.contains(&format!("질문: {}\n", "문".repeat(100))));
        assert!(!prompt.contains(&"문".repeat(101)));
        assert!(!prompt.contains(&"답".repeat(201)));
        assert!(prompt.contains("평가: PARTIAL"));
    }

    #[tokio::test]
    async fn test_teaching_advice_defaults_average() {
        let llm = ScriptedLlm::replying(r#"{"lesson_objectives": ["비유 이해"]}"#);
        let advice = teaching_advice(&llm, "국어", "현대시의 비유", None).await;

        assert_eq!(advice.class_average, 70.0);
        assert_eq!(advice.lesson_objectives, ["비유 이해"]);
        assert!(llm.last_prompt().unwrap().contains("**학급 평균 점수**: 70점"));
    }

    #[tokio::test]
    async fn test_teaching_advice_degrades() {
        let llm = ScriptedLlm::replying("not json");
        let advice = teaching_advice(&llm, "국어", "토론", Some(81.456)).await;
        assert!(advice.degraded);
        assert_eq!(advice.class_average, 81.46);
        assert!(advice.materials.is_empty());
    }
}
