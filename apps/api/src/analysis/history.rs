//! Merged activity timeline and the report summary.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::grading::grader::{fetch_gradings, HISTORY_QUESTION_CHARS};
use crate::models::activity::{ActivityRow, ANALYSIS_CATEGORY_PREFIX, CHAT_CATEGORY};
use crate::models::grading::EssayGradingRow;
use crate::text::truncate_with_ellipsis;

pub const DEFAULT_HISTORY_LIMIT: i64 = 10;
const SUMMARY_FEEDBACK_COUNT: i64 = 3;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Grading,
    Chat,
    Analysis,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryItem {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub title: String,
    pub content: String,
    pub score: f64,
    pub time: DateTime<Utc>,
}

impl From<&EssayGradingRow> for HistoryItem {
    fn from(row: &EssayGradingRow) -> Self {
        Self {
            id: row.id,
            kind: HistoryKind::Grading,
            title: format!("[{}] 서술형 채점", row.subject),
            content: truncate_with_ellipsis(&row.question, HISTORY_QUESTION_CHARS),
            score: row.score,
            time: row.created_at,
        }
    }
}

impl From<&ActivityRow> for HistoryItem {
    fn from(row: &ActivityRow) -> Self {
        let kind = if row.category == CHAT_CATEGORY {
            HistoryKind::Chat
        } else {
            HistoryKind::Analysis
        };
        Self {
            id: row.id,
            kind,
            title: format!("[{}] 활동", row.category),
            content: row.question.clone(),
            score: row.score,
            time: row.created_at,
        }
    }
}

/// Newest first, at most `limit` items.
pub fn merge_history(
    gradings: &[EssayGradingRow],
    records: &[ActivityRow],
    limit: usize,
) -> Vec<HistoryItem> {
    let mut items: Vec<HistoryItem> = gradings
        .iter()
        .map(HistoryItem::from)
        .chain(records.iter().map(HistoryItem::from))
        .collect();
    items.sort_by(|a, b| b.time.cmp(&a.time));
    items.truncate(limit);
    items
}

pub async fn load_history(
    pool: &PgPool,
    username: &str,
    subject: Option<&str>,
    limit: i64,
) -> Result<Vec<HistoryItem>, AppError> {
    let limit = limit.max(1);
    let gradings = fetch_gradings(pool, username, subject, limit).await?;
    let records = sqlx::query_as::<_, ActivityRow>(
        r#"
        SELECT * FROM records
        WHERE username = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(username)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(merge_history(&gradings, &records, limit as usize))
}

#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub percent: i64,
    pub feedback: Vec<String>,
}

/// Integer part of the average; 0 without scored records.
pub fn summary_percent(average: Option<f64>) -> i64 {
    average.map(|a| a.trunc() as i64).unwrap_or(0)
}

pub async fn report_summary(pool: &PgPool, username: &str) -> Result<ReportSummary, AppError> {
    let average: Option<f64> = sqlx::query_scalar(
        "SELECT AVG(score) FROM records WHERE username = $1 AND score > 0",
    )
    .bind(username)
    .fetch_one(pool)
    .await?;

    let feedback: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT reply FROM records
        WHERE username = $1 AND category LIKE $2 AND reply <> ''
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(username)
    .bind(format!("{ANALYSIS_CATEGORY_PREFIX}%"))
    .bind(SUMMARY_FEEDBACK_COUNT)
    .fetch_all(pool)
    .await?;

    Ok(ReportSummary {
        percent: summary_percent(average),
        feedback,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn grading(subject: &str, minutes_ago: i64) -> EssayGradingRow {
        EssayGradingRow {
            id: Uuid::new_v4(),
            username: "student1".into(),
            subject: subject.into(),
            question: "시의 주제를 쓰시오".into(),
            student_answer: "그리움".into(),
            model_answer: None,
            score: 80.0,
            max_score: 100,
            grading_reason: "근거".into(),
            feedback: "좋아요".into(),
            graded_by: "AI".into(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    fn record(category: &str, minutes_ago: i64) -> ActivityRow {
        ActivityRow {
            id: Uuid::new_v4(),
            username: "student1".into(),
            question: "질문".into(),
            reply: "답변".into(),
            category: category.into(),
            score: 90.0,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_merge_orders_newest_first_and_truncates() {
        let gradings = vec![grading("국어", 5), grading("문학", 30)];
        let records = vec![record("AI 채팅", 1), record("분석-문법", 10)];

        let items = merge_history(&gradings, &records, 3);

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].kind, HistoryKind::Chat);
        assert_eq!(items[1].kind, HistoryKind::Grading);
        assert_eq!(items[1].title, "[국어] 서술형 채점");
        assert_eq!(items[2].kind, HistoryKind::Analysis);
        assert_eq!(items[2].title, "[분석-문법] 활동");
    }

    #[test]
    fn test_merge_empty_inputs() {
        assert!(merge_history(&[], &[], 10).is_empty());
    }

    #[test]
    fn test_summary_percent_truncates() {
        assert_eq!(summary_percent(Some(86.9)), 86);
        assert_eq!(summary_percent(None), 0);
    }
}
