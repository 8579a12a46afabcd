//! Student achievement dashboard: per-standard averages over the last 30 days,
//! strong/weak areas and the recent-score heatmap.
//!
//! Aggregation is done in Rust over fetched rows so the thresholds and
//! orderings stay in one place.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::activity::AchievementRow;
use crate::text::round2;

pub const WINDOW_DAYS: i64 = 30;
const ANALYSIS_PERIOD: &str = "최근 30일";
const HEATMAP_RECENT_SCORES: usize = 10;

pub const STRONG_THRESHOLD: f64 = 80.0;
pub const WEAK_THRESHOLD: f64 = 60.0;

pub fn achievement_status(score: f64) -> &'static str {
    if score >= STRONG_THRESHOLD {
        "우수"
    } else if score >= WEAK_THRESHOLD {
        "보통"
    } else {
        "미흡"
    }
}

/// `floor(score / 10)` clamped to 0..=10.
pub fn heatmap_intensity(score: f64) -> u8 {
    (score / 10.0).floor().clamp(0.0, 10.0) as u8
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StandardStat {
    pub average_score: f64,
    pub attempt_count: i64,
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AreaScore {
    pub standard_code: String,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct OverallStats {
    pub average_score: f64,
    pub total_questions: i64,
    pub analysis_period: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AchievementDashboard {
    pub username: String,
    pub subject: Option<String>,
    pub overall_stats: OverallStats,
    pub achievement_by_standard: BTreeMap<String, StandardStat>,
    pub strong_areas: Vec<AreaScore>,
    pub weak_areas: Vec<AreaScore>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HeatmapCell {
    pub standard_code: String,
    pub score: f64,
    pub intensity: u8,
    pub recent_attempts: usize,
}

#[derive(Debug, Serialize)]
pub struct HeatmapLegend {
    pub high: &'static str,
    pub medium: &'static str,
    pub low: &'static str,
}

impl Default for HeatmapLegend {
    fn default() -> Self {
        Self {
            high: "80-100점 (강점)",
            medium: "60-79점 (보통)",
            low: "0-59점 (약점)",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Heatmap {
    pub username: String,
    pub subject: Option<String>,
    pub heatmap: Vec<HeatmapCell>,
    pub legend: HeatmapLegend,
}

// ────────────────────────────────────────────────────────────────────────────
// Pure aggregation
// ────────────────────────────────────────────────────────────────────────────

pub fn summarize_by_standard(rows: &[AchievementRow]) -> BTreeMap<String, StandardStat> {
    let mut totals: BTreeMap<&str, (f64, i64)> = BTreeMap::new();
    for row in rows {
        let entry = totals.entry(row.standard_code.as_str()).or_insert((0.0, 0));
        entry.0 += row.score;
        entry.1 += 1;
    }

    totals
        .into_iter()
        .map(|(code, (sum, count))| {
            let average = sum / count as f64;
            (
                code.to_string(),
                StandardStat {
                    average_score: round2(average),
                    attempt_count: count,
                    status: achievement_status(average),
                },
            )
        })
        .collect()
}

/// Strong areas sorted high to low, weak areas low to high.
pub fn split_areas(stats: &BTreeMap<String, StandardStat>) -> (Vec<AreaScore>, Vec<AreaScore>) {
    let mut strong = Vec::new();
    let mut weak = Vec::new();
    for (code, stat) in stats {
        let area = AreaScore {
            standard_code: code.clone(),
            score: stat.average_score,
        };
        if stat.average_score >= STRONG_THRESHOLD {
            strong.push(area);
        } else if stat.average_score < WEAK_THRESHOLD {
            weak.push(area);
        }
    }
    strong.sort_by(|a, b| b.score.total_cmp(&a.score));
    weak.sort_by(|a, b| a.score.total_cmp(&b.score));
    (strong, weak)
}

/// One cell per catalog code, in catalog order. `rows` must be newest first.
pub fn build_heatmap(codes: &[String], rows: &[AchievementRow]) -> Vec<HeatmapCell> {
    codes
        .iter()
        .map(|code| {
            let scores: Vec<f64> = rows
                .iter()
                .filter(|r| &r.standard_code == code)
                .take(HEATMAP_RECENT_SCORES)
                .map(|r| r.score)
                .collect();
            if scores.is_empty() {
                return HeatmapCell {
                    standard_code: code.clone(),
                    score: 0.0,
                    intensity: 0,
                    recent_attempts: 0,
                };
            }
            let average = scores.iter().sum::<f64>() / scores.len() as f64;
            HeatmapCell {
                standard_code: code.clone(),
                score: round2(average),
                intensity: heatmap_intensity(average),
                recent_attempts: scores.len(),
            }
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Queries
// ────────────────────────────────────────────────────────────────────────────

pub async fn achievement_dashboard(
    pool: &PgPool,
    username: &str,
    subject: Option<&str>,
) -> Result<AchievementDashboard, AppError> {
    let since = Utc::now() - Duration::days(WINDOW_DAYS);

    let rows = sqlx::query_as::<_, AchievementRow>(
        r#"
        SELECT id, username, subject, standard_code, score, created_at
        FROM achievement_records
        WHERE username = $1
          AND ($2::TEXT IS NULL OR subject = $2)
          AND created_at >= $3
        "#,
    )
    .bind(username)
    .bind(subject)
    .bind(since)
    .fetch_all(pool)
    .await?;

    let (average, total): (Option<f64>, i64) = sqlx::query_as(
        "SELECT AVG(score), COUNT(*) FROM records WHERE username = $1 AND created_at >= $2",
    )
    .bind(username)
    .bind(since)
    .fetch_one(pool)
    .await?;

    let achievement_by_standard = summarize_by_standard(&rows);
    let (strong_areas, weak_areas) = split_areas(&achievement_by_standard);

    Ok(AchievementDashboard {
        username: username.to_string(),
        subject: subject.map(str::to_string),
        overall_stats: OverallStats {
            average_score: round2(average.unwrap_or(0.0)),
            total_questions: total,
            analysis_period: ANALYSIS_PERIOD,
        },
        achievement_by_standard,
        strong_areas,
        weak_areas,
        last_updated: Utc::now(),
    })
}

pub async fn heatmap(
    pool: &PgPool,
    codes: &[String],
    username: &str,
    subject: Option<&str>,
) -> Result<Heatmap, AppError> {
    let rows = sqlx::query_as::<_, AchievementRow>(
        r#"
        SELECT id, username, subject, standard_code, score, created_at
        FROM (
            SELECT *, ROW_NUMBER() OVER (
                PARTITION BY standard_code ORDER BY created_at DESC
            ) AS recent_rank
            FROM achievement_records
            WHERE username = $1 AND ($2::TEXT IS NULL OR subject = $2)
        ) ranked
        WHERE recent_rank <= $3
        ORDER BY created_at DESC
        "#,
    )
    .bind(username)
    .bind(subject)
    .bind(HEATMAP_RECENT_SCORES as i64)
    .fetch_all(pool)
    .await?;

    Ok(Heatmap {
        username: username.to_string(),
        subject: subject.map(str::to_string),
        heatmap: build_heatmap(codes, &rows),
        legend: HeatmapLegend::default(),
    })
}
