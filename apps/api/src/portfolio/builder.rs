//! Student portfolio: lifetime totals, per-standard averages, a short score
//! trend and recent activity, persisted as one upserted row per username.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::dashboard::analyzer::{summarize_by_standard, STRONG_THRESHOLD, WEAK_THRESHOLD};
use crate::errors::AppError;
use crate::grading::grader::fetch_gradings;
use crate::models::activity::{AchievementRow, ActivityRow};
use crate::models::grading::EssayGradingRow;
use crate::models::report::PortfolioRow;
use crate::models::to_json;
use crate::text::{round2, take_chars, truncate_with_ellipsis};

const TREND_POINTS: usize = 5;
const HISTORY_ENTRIES: i64 = 10;
const RECENT_ESSAYS: i64 = 5;
const TOPIC_CHARS: usize = 30;
const ESSAY_QUESTION_CHARS: usize = 50;
const DEFAULT_SUBJECT: &str = "국어";
const DEFAULT_TOPIC: &str = "일반 학습";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioArea {
    pub standard_code: String,
    pub average_score: f64,
    pub attempt_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendPoint {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub date: String,
    pub subject: String,
    pub topic: String,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct EssayEntry {
    pub question: String,
    pub score: f64,
    pub date: String,
}

/// Freshly computed portfolio.
#[derive(Debug, Serialize)]
pub struct PortfolioData {
    pub username: String,
    pub subject: String,
    pub total_questions: i64,
    pub total_score: f64,
    pub average_score: f64,
    pub strong_areas: Vec<PortfolioArea>,
    pub weak_areas: Vec<PortfolioArea>,
    pub trend_data: Vec<TrendPoint>,
    pub area_scores: BTreeMap<String, f64>,
    pub learning_history: Vec<HistoryEntry>,
    pub recent_essays: Vec<EssayEntry>,
    pub generated_at: DateTime<Utc>,
}

/// Portfolio as stored in the `portfolios` table.
#[derive(Debug, Serialize)]
pub struct PortfolioSnapshot {
    pub username: String,
    pub subject: String,
    pub total_questions: i64,
    pub total_score: f64,
    pub average_score: f64,
    pub strong_areas: Vec<PortfolioArea>,
    pub weak_areas: Vec<PortfolioArea>,
    pub learning_progress: Vec<TrendPoint>,
    pub last_updated: DateTime<Utc>,
}

impl TryFrom<PortfolioRow> for PortfolioSnapshot {
    type Error = serde_json::Error;

    fn try_from(row: PortfolioRow) -> Result<Self, Self::Error> {
        Ok(Self {
            strong_areas: serde_json::from_value(row.strong_areas)?,
            weak_areas: serde_json::from_value(row.weak_areas)?,
            learning_progress: serde_json::from_value(row.learning_progress)?,
            username: row.username,
            subject: row.subject,
            total_questions: row.total_questions,
            total_score: row.total_score,
            average_score: row.average_score,
            last_updated: row.updated_at,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PortfolioView {
    Stored(PortfolioSnapshot),
    Generated(PortfolioData),
}

// ────────────────────────────────────────────────────────────────────────────
// Pure builders
// ────────────────────────────────────────────────────────────────────────────

/// Areas at or above 80 and below 60, in standard-code order.
pub fn portfolio_areas(
    rows: &[AchievementRow],
) -> (Vec<PortfolioArea>, Vec<PortfolioArea>, BTreeMap<String, f64>) {
    let stats = summarize_by_standard(rows);
    let mut strong = Vec::new();
    let mut weak = Vec::new();
    let mut area_scores = BTreeMap::new();

    for (code, stat) in stats {
        area_scores.insert(code.clone(), stat.average_score);
        let area = PortfolioArea {
            standard_code: code,
            average_score: stat.average_score,
            attempt_count: stat.attempt_count,
        };
        if area.average_score >= STRONG_THRESHOLD {
            strong.push(area);
        } else if area.average_score < WEAK_THRESHOLD {
            weak.push(area);
        }
    }
    (strong, weak, area_scores)
}

/// Last five records oldest first, labelled 1주..5주. `newest_first` is the
/// record list as queried.
pub fn trend(newest_first: &[ActivityRow]) -> Vec<TrendPoint> {
    newest_first
        .iter()
        .take(TREND_POINTS)
        .rev()
        .enumerate()
        .map(|(i, r)| TrendPoint {
            label: format!("{}주", i + 1),
            score: r.score,
        })
        .collect()
}

pub fn history_entry(record: &ActivityRow) -> HistoryEntry {
    let subject = if record.category.trim().is_empty() {
        DEFAULT_SUBJECT.to_string()
    } else {
        record.category.clone()
    };
    let topic = if record.question.trim().is_empty() {
        DEFAULT_TOPIC.to_string()
    } else {
        take_chars(&record.question, TOPIC_CHARS)
    };
    HistoryEntry {
        date: record.created_at.format("%Y-%m-%d").to_string(),
        subject,
        topic,
        score: record.score,
    }
}

pub fn essay_entry(grading: &EssayGradingRow) -> EssayEntry {
    EssayEntry {
        question: truncate_with_ellipsis(&grading.question, ESSAY_QUESTION_CHARS),
        score: grading.score,
        date: grading.created_at.format("%Y-%m-%d").to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Queries
// ────────────────────────────────────────────────────────────────────────────

pub async fn stored_portfolio(
    pool: &PgPool,
    username: &str,
) -> Result<Option<PortfolioSnapshot>, AppError> {
    let row = sqlx::query_as::<_, PortfolioRow>("SELECT * FROM portfolios WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    row.map(PortfolioSnapshot::try_from)
        .transpose()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Corrupt portfolio for {username}: {e}")))
}

/// Recomputes the portfolio and upserts the stored snapshot.
pub async fn generate_portfolio(
    pool: &PgPool,
    username: &str,
    subject: Option<&str>,
) -> Result<PortfolioData, AppError> {
    let (total_questions, total_score, average): (i64, Option<f64>, Option<f64>) =
        sqlx::query_as("SELECT COUNT(*), SUM(score), AVG(score) FROM records WHERE username = $1")
            .bind(username)
            .fetch_one(pool)
            .await?;

    let achievements = sqlx::query_as::<_, AchievementRow>(
        r#"
        SELECT * FROM achievement_records
        WHERE username = $1 AND ($2::TEXT IS NULL OR subject = $2)
        "#,
    )
    .bind(username)
    .bind(subject)
    .fetch_all(pool)
    .await?;
    let (strong_areas, weak_areas, area_scores) = portfolio_areas(&achievements);

    let recent = sqlx::query_as::<_, ActivityRow>(
        "SELECT * FROM records WHERE username = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(username)
    .bind(HISTORY_ENTRIES)
    .fetch_all(pool)
    .await?;

    let essays = fetch_gradings(pool, username, subject, RECENT_ESSAYS).await?;

    let data = PortfolioData {
        username: username.to_string(),
        subject: subject.unwrap_or(DEFAULT_SUBJECT).to_string(),
        total_questions,
        total_score: round2(total_score.unwrap_or(0.0)),
        average_score: round2(average.unwrap_or(0.0)),
        strong_areas,
        weak_areas,
        trend_data: trend(&recent),
        area_scores,
        learning_history: recent.iter().map(history_entry).collect(),
        recent_essays: essays.iter().map(essay_entry).collect(),
        generated_at: Utc::now(),
    };

    let strong = to_json(&data.strong_areas)?;
    let weak = to_json(&data.weak_areas)?;
    let progress = to_json(&data.trend_data)?;

    sqlx::query(
        r#"
        INSERT INTO portfolios
            (id, username, subject, total_questions, total_score, average_score,
             strong_areas, weak_areas, learning_progress)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (username) DO UPDATE SET
            subject = EXCLUDED.subject,
            total_questions = EXCLUDED.total_questions,
            total_score = EXCLUDED.total_score,
            average_score = EXCLUDED.average_score,
            strong_areas = EXCLUDED.strong_areas,
            weak_areas = EXCLUDED.weak_areas,
            learning_progress = EXCLUDED.learning_progress,
            updated_at = now()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(&data.subject)
    .bind(data.total_questions)
    .bind(data.total_score)
    .bind(data.average_score)
    .bind(strong)
    .bind(weak)
    .bind(progress)
    .execute(pool)
    .await?;

    info!(
        "Portfolio for {username}: {} records, average {}",
        data.total_questions, data.average_score
    );
    Ok(data)
}
