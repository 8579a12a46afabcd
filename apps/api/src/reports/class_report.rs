//! Class report: class averages, top/struggling students, per-standard unit
//! analysis and LLM leading points, persisted and mirrored to S3 as Markdown.
//!
//! Flow: resolve students → per-student averages → rank → unit analysis →
//!       leading points (LLM, with fixed fallback) → INSERT class_reports →
//!       render Markdown → PUT class-reports/{id}.md → record s3_key.
//!
//! An S3 failure is logged and the report is returned without a key; the
//! download route then renders the Markdown from the stored row.

use std::collections::{BTreeSet, HashMap, HashSet};

use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dashboard::analyzer::STRONG_THRESHOLD;
use crate::errors::{require_text, AppError};
use crate::llm_client::prompts::{fill_template, KOREAN_TEACHER_PERSONA};
use crate::llm_client::CompletionBackend;
use crate::models::activity::AchievementRow;
use crate::models::report::ClassReportRow;
use crate::models::to_json;
use crate::reports::prompts::{LEADING_POINTS_PROMPT_TEMPLATE, LEADING_POINTS_SYSTEM};
use crate::text::round2;

pub const LEADING_POINTS_FALLBACK: &str = "리딩 포인트를 생성할 수 없습니다.";
const LEADING_POINTS_TEMPERATURE: f32 = 0.6;
const RANKED_STUDENTS: usize = 3;
const NO_DATA_STATUS: &str = "데이터 없음";

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ClassReportRequest {
    #[serde(default)]
    pub teacher_username: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_report_type")]
    pub report_type: String,
    #[serde(default)]
    pub student_list: Option<Vec<String>>,
}

fn default_subject() -> String {
    "국어".to_string()
}

fn default_report_type() -> String {
    "unit".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentScore {
    pub username: String,
    pub average_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitAnalysis {
    pub standard_code: String,
    pub average_score: f64,
    pub student_count: usize,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassSummary {
    pub average_score: f64,
    pub top_achievers: Vec<StudentScore>,
    pub struggling_students: Vec<StudentScore>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassReport {
    pub report_id: Uuid,
    pub teacher_username: String,
    pub class_name: String,
    pub subject: String,
    pub report_type: String,
    pub total_students: i32,
    pub average_score: f64,
    pub top_achievers: Vec<StudentScore>,
    pub struggling_students: Vec<StudentScore>,
    pub unit_analysis: Vec<UnitAnalysis>,
    pub leading_points: String,
    pub s3_key: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl TryFrom<ClassReportRow> for ClassReport {
    type Error = serde_json::Error;

    fn try_from(row: ClassReportRow) -> Result<Self, Self::Error> {
        Ok(Self {
            report_id: row.id,
            top_achievers: serde_json::from_value(row.top_achievers)?,
            struggling_students: serde_json::from_value(row.struggling_students)?,
            unit_analysis: serde_json::from_value(row.unit_analysis)?,
            teacher_username: row.teacher_username,
            class_name: row.class_name,
            subject: row.subject,
            report_type: row.report_type,
            total_students: row.total_students,
            average_score: row.average_score,
            leading_points: row.leading_points,
            s3_key: row.s3_key,
            generated_at: row.created_at,
        })
    }
}

/// Entry of the per-teacher report listing.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ClassReportListItem {
    pub id: Uuid,
    pub class_name: String,
    pub subject: String,
    pub report_type: String,
    pub total_students: i32,
    pub average_score: f64,
    pub created_at: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────────────
// Pure aggregation
// ────────────────────────────────────────────────────────────────────────────

/// Ranks students by average, highest first. Ties keep input order.
/// Struggling students are only reported once at least three are scored.
pub fn summarize_class(mut scores: Vec<StudentScore>) -> ClassSummary {
    let average_score = if scores.is_empty() {
        0.0
    } else {
        scores.iter().map(|s| s.average_score).sum::<f64>() / scores.len() as f64
    };

    scores.sort_by(|a, b| b.average_score.total_cmp(&a.average_score));
    let top_achievers = scores.iter().take(RANKED_STUDENTS).cloned().collect();
    let struggling_students = if scores.len() >= RANKED_STUDENTS {
        scores[scores.len() - RANKED_STUDENTS..].to_vec()
    } else {
        Vec::new()
    };

    ClassSummary {
        average_score: round2(average_score),
        top_achievers,
        struggling_students,
    }
}

pub fn unit_status(average: f64) -> &'static str {
    if average >= STRONG_THRESHOLD {
        "우수"
    } else {
        "보통"
    }
}

/// One entry per catalog code, in catalog order.
pub fn analyze_units(codes: &[String], rows: &[AchievementRow]) -> Vec<UnitAnalysis> {
    codes
        .iter()
        .map(|code| {
            let matching: Vec<&AchievementRow> =
                rows.iter().filter(|r| &r.standard_code == code).collect();
            if matching.is_empty() {
                return UnitAnalysis {
                    standard_code: code.clone(),
                    average_score: 0.0,
                    student_count: 0,
                    status: NO_DATA_STATUS.to_string(),
                };
            }
            let average =
                matching.iter().map(|r| r.score).sum::<f64>() / matching.len() as f64;
            let students: BTreeSet<&str> = matching.iter().map(|r| r.username.as_str()).collect();
            UnitAnalysis {
                standard_code: code.clone(),
                average_score: round2(average),
                student_count: students.len(),
                status: unit_status(average).to_string(),
            }
        })
        .collect()
}

fn build_leading_points_prompt(
    class_average: f64,
    units: &[UnitAnalysis],
    struggling_count: usize,
) -> String {
    let unit_summary = units
        .iter()
        .map(|u| format!("- {}: {}점 ({})", u.standard_code, u.average_score, u.status))
        .collect::<Vec<_>>()
        .join("\n");

    fill_template(
        LEADING_POINTS_PROMPT_TEMPLATE,
        &[
            ("persona", KOREAN_TEACHER_PERSONA),
            ("class_average", &class_average.to_string()),
            ("struggling_count", &struggling_count.to_string()),
            ("unit_summary", &unit_summary),
        ],
    )
}

/// Free-text teaching points. Never fails; falls back to a fixed message.
pub async fn leading_points(
    llm: &dyn CompletionBackend,
    class_average: f64,
    units: &[UnitAnalysis],
    struggling_count: usize,
) -> String {
    let prompt = build_leading_points_prompt(class_average, units, struggling_count);
    match llm
        .complete(&prompt, LEADING_POINTS_SYSTEM, LEADING_POINTS_TEMPERATURE)
        .await
    {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            warn!("Leading points reply was empty");
            LEADING_POINTS_FALLBACK.to_string()
        }
        Err(e) => {
            warn!("Leading points generation failed: {e}");
            LEADING_POINTS_FALLBACK.to_string()
        }
    }
}

pub fn render_markdown(report: &ClassReport) -> String {
    let mut md = format!("# 학급 성취도 리포트: {}\n\n", report.class_name);
    md.push_str(&format!("- **과목:** {}\n", report.subject));
    md.push_str(&format!("- **유형:** {}\n", report.report_type));
    md.push_str(&format!("- **담당 교사:** {}\n", report.teacher_username));
    md.push_str(&format!("- **학생 수:** {}\n", report.total_students));
    md.push_str(&format!("- **학급 평균:** {:.2}점\n", report.average_score));
    md.push_str(&format!(
        "- **생성 시각:** {}\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    let student_sections = [
        ("상위 학생", &report.top_achievers),
        ("학습 지원이 필요한 학생", &report.struggling_students),
    ];
    for (title, students) in student_sections {
        md.push_str(&format!("## {title}\n\n"));
        if students.is_empty() {
            md.push_str("- 해당 없음\n\n");
            continue;
        }
        for (rank, student) in students.iter().enumerate() {
            md.push_str(&format!(
                "{}. {} ({:.2}점)\n",
                rank + 1,
                student.username,
                student.average_score
            ));
        }
        md.push('\n');
    }

    md.push_str("## 단원별 성취도\n\n");
    md.push_str("| 성취기준 | 평균 | 학생 수 | 상태 |\n");
    md.push_str("|---|---|---|---|\n");
    for unit in &report.unit_analysis {
        md.push_str(&format!(
            "| {} | {:.2} | {} | {} |\n",
            unit.standard_code, unit.average_score, unit.student_count, unit.status
        ));
    }

    md.push_str("\n## 주요 지도 포인트\n\n");
    md.push_str(report.leading_points.trim());
    md.push('\n');
    md
}

pub fn report_key(id: Uuid) -> String {
    format!("class-reports/{id}.md")
}

// ────────────────────────────────────────────────────────────────────────────
// Queries and storage
// ────────────────────────────────────────────────────────────────────────────

/// Drops blank and repeated names, keeping first-seen order.
pub fn unique_students(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect()
}

async fn resolve_students(
    pool: &PgPool,
    requested: Option<Vec<String>>,
) -> Result<Vec<String>, sqlx::Error> {
    let requested = requested.map(unique_students);
    match requested {
        Some(list) if !list.is_empty() => Ok(list),
        _ => {
            sqlx::query_scalar("SELECT DISTINCT username FROM records ORDER BY username")
                .fetch_all(pool)
                .await
        }
    }
}

async fn student_scores(
    pool: &PgPool,
    students: &[String],
) -> Result<Vec<StudentScore>, sqlx::Error> {
    let averages: Vec<(String, f64)> = sqlx::query_as(
        r#"
        SELECT username, AVG(score)
        FROM records
        WHERE username = ANY($1)
        GROUP BY username
        "#,
    )
    .bind(students)
    .fetch_all(pool)
    .await?;

    let by_name: HashMap<String, f64> = averages.into_iter().collect();
    Ok(students
        .iter()
        .filter_map(|name| {
            by_name.get(name).map(|avg| StudentScore {
                username: name.clone(),
                average_score: round2(*avg),
            })
        })
        .collect())
}

async fn upload_markdown(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    markdown: String,
) -> Result<(), AppError> {
    s3.put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(markdown.into_bytes()))
        .content_type("text/markdown; charset=utf-8")
        .send()
        .await
        .map_err(|e| AppError::Storage(format!("S3 upload failed: {e}")))?;
    Ok(())
}

pub async fn generate_class_report(
    pool: &PgPool,
    s3: &aws_sdk_s3::Client,
    s3_bucket: &str,
    llm: &dyn CompletionBackend,
    codes: &[String],
    request: ClassReportRequest,
) -> Result<ClassReport, AppError> {
    require_text("teacher_username", &request.teacher_username)?;
    require_text("class_name", &request.class_name)?;

    let students = resolve_students(pool, request.student_list).await?;
    let scores = student_scores(pool, &students).await?;
    let summary = summarize_class(scores);

    let rows = sqlx::query_as::<_, AchievementRow>(
        "SELECT * FROM achievement_records WHERE username = ANY($1)",
    )
    .bind(&students)
    .fetch_all(pool)
    .await?;
    let unit_analysis = analyze_units(codes, &rows);

    let leading_points = leading_points(
        llm,
        summary.average_score,
        &unit_analysis,
        summary.struggling_students.len(),
    )
    .await;

    let id = Uuid::new_v4();
    let generated_at: DateTime<Utc> = sqlx::query_scalar(
        r#"
        INSERT INTO class_reports
            (id, teacher_username, class_name, subject, report_type, total_students,
             average_score, top_achievers, struggling_students, unit_analysis, leading_points)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING created_at
        "#,
    )
    .bind(id)
    .bind(&request.teacher_username)
    .bind(&request.class_name)
    .bind(&request.subject)
    .bind(&request.report_type)
    .bind(students.len() as i32)
    .bind(summary.average_score)
    .bind(to_json(&summary.top_achievers)?)
    .bind(to_json(&summary.struggling_students)?)
    .bind(to_json(&unit_analysis)?)
    .bind(&leading_points)
    .fetch_one(pool)
    .await?;

    let mut report = ClassReport {
        report_id: id,
        teacher_username: request.teacher_username,
        class_name: request.class_name,
        subject: request.subject,
        report_type: request.report_type,
        total_students: students.len() as i32,
        average_score: summary.average_score,
        top_achievers: summary.top_achievers,
        struggling_students: summary.struggling_students,
        unit_analysis,
        leading_points,
        s3_key: None,
        generated_at,
    };

    let key = report_key(id);
    match upload_markdown(s3, s3_bucket, &key, render_markdown(&report)).await {
        Ok(()) => {
            sqlx::query("UPDATE class_reports SET s3_key = $1 WHERE id = $2")
                .bind(&key)
                .bind(id)
                .execute(pool)
                .await?;
            info!("Uploaded class report to s3://{s3_bucket}/{key}");
            report.s3_key = Some(key);
        }
        Err(e) => warn!("Class report {id} stored without artifact: {e}"),
    }

    info!(
        "Generated class report {id} for {}: {} students, average {}",
        report.class_name, report.total_students, report.average_score
    );
    Ok(report)
}

pub async fn get_class_report(pool: &PgPool, id: Uuid) -> Result<ClassReport, AppError> {
    let row = sqlx::query_as::<_, ClassReportRow>("SELECT * FROM class_reports WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("리포트를 찾을 수 없습니다: {id}")))?;

    ClassReport::try_from(row)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Corrupt class report {id}: {e}")))
}

pub async fn list_class_reports(
    pool: &PgPool,
    teacher_username: &str,
) -> Result<Vec<ClassReportListItem>, AppError> {
    Ok(sqlx::query_as::<_, ClassReportListItem>(
        r#"
        SELECT id, class_name, subject, report_type, total_students, average_score, created_at
        FROM class_reports
        WHERE teacher_username = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(teacher_username)
    .fetch_all(pool)
    .await?)
}

/// Markdown artifact for a report. Reads S3 when a key is recorded,
/// otherwise renders from the stored row.
pub async fn download_class_report(
    pool: &PgPool,
    s3: &aws_sdk_s3::Client,
    s3_bucket: &str,
    id: Uuid,
) -> Result<String, AppError> {
    let report = get_class_report(pool, id).await?;
    let Some(key) = report.s3_key.as_deref() else {
        return Ok(render_markdown(&report));
    };

    let object = s3
        .get_object()
        .bucket(s3_bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| AppError::Storage(format!("S3 download failed: {e}")))?;
    let bytes = object
        .body
        .collect()
        .await
        .map_err(|e| AppError::Storage(format!("S3 body read failed: {e}")))?
        .into_bytes();

    String::from_utf8(bytes.to_vec())
        .map_err(|e| AppError::Storage(format!("Report {id} is not valid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::analyzer::tests::achievement;
    use crate::llm_client::testing::ScriptedLlm;
    use crate::llm_client::LlmError;

    fn score(username: &str, average_score: f64) -> StudentScore {
        StudentScore {
            username: username.to_string(),
            average_score,
        }
    }

    fn names(scores: &[StudentScore]) -> Vec<&str> {
        scores.iter().map(|s| s.username.as_str()).collect()
    }

    #[test]
    fn test_top_and_struggling_with_five_students() {
        let summary = summarize_class(vec![
            score("a", 70.0),
            score("b", 95.0),
            score("c", 55.0),
            score("d", 88.0),
            score("e", 62.0),
        ]);

        assert_eq!(summary.average_score, 74.0);
        assert_eq!(names(&summary.top_achievers), ["b", "d", "a"]);
        assert_eq!(names(&summary.struggling_students), ["a", "e", "c"]);
    }

    #[test]
    fn test_duplicate_names_are_counted_once() {
        let names = unique_students(vec![
            "kim".into(),
            " lee ".into(),
            "kim".into(),
            "".into(),
            "park".into(),
        ]);
        assert_eq!(names, vec!["kim", "lee", "park"]);
    }

    #[test]
    fn test_no_struggling_below_three_students() {
        let summary = summarize_class(vec![score("a", 40.0), score("b", 90.0)]);
        assert_eq!(names(&summary.top_achievers), ["b", "a"]);
        assert!(summary.struggling_students.is_empty());
    }

    #[test]
    fn test_empty_class() {
        let summary = summarize_class(Vec::new());
        assert_eq!(summary.average_score, 0.0);
        assert!(summary.top_achievers.is_empty());
    }

    #[test]
    fn test_unit_analysis_counts_distinct_students() {
        let rows = vec![
            achievement("kim", "K-HS-1", 90.0, 1),
            achievement("kim", "K-HS-1", 80.0, 2),
            achievement("lee", "K-HS-1", 100.0, 3),
            achievement("lee", "K-HS-2", 50.0, 4),
        ];
        let codes: Vec<String> = ["K-HS-1", "K-HS-2", "K-HS-3"]
            .iter()
            .map(|c| c.to_string())
            .collect();

        let units = analyze_units(&codes, &rows);

        assert_eq!(units[0].average_score, 90.0);
        assert_eq!(units[0].student_count, 2);
        assert_eq!(units[0].status, "우수");
        assert_eq!(units[1].status, "보통");
        assert_eq!(units[2].status, "데이터 없음");
        assert_eq!(units[2].student_count, 0);
    }

    #[tokio::test]
    async fn test_leading_points_falls_back_on_llm_error() {
        let llm = ScriptedLlm::failing(LlmError::Timeout);
        let text = leading_points(&llm, 72.5, &[], 1).await;
        assert_eq!(text, LEADING_POINTS_FALLBACK);
    }

    #[tokio::test]
    async fn test_leading_points_prompt_carries_class_data() {
        let llm = ScriptedLlm::replying("1. 문학 단원 복습\n");
        let units = vec![UnitAnalysis {
            standard_code: "K-HS-1".to_string(),
            average_score: 85.0,
            student_count: 3,
            status: "우수".to_string(),
        }];

        let text = leading_points(&llm, 72.5, &units, 2).await;

        assert_eq!(text, "1. 문학 단원 복습");
        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.contains("**학급 평균**: 72.5점"));
        assert!(prompt.contains("**학습 부진 학생 수**: 2명"));
        assert!(prompt.contains("- K-HS-1: 85점 (우수)"));
    }

    #[test]
    fn test_render_markdown_sections() {
        let report = ClassReport {
            report_id: Uuid::new_v4(),
            teacher_username: "teacher1".to_string(),
            class_name: "2학년 3반".to_string(),
            subject: "국어".to_string(),
            report_type: "unit".to_string(),
            total_students: 2,
            average_score: 81.234,
            top_achievers: vec![score("kim", 90.0)],
            struggling_students: Vec::new(),
            unit_analysis: vec![UnitAnalysis {
                standard_code: "K-HS-2".to_string(),
                average_score: 0.0,
                student_count: 0,
                status: "데이터 없음".to_string(),
            }],
            leading_points: "1. 토론 활동 확대".to_string(),
            s3_key: None,
            generated_at: Utc::now(),
        };

        let md = render_markdown(&report);

        assert!(md.starts_with("# 학급 성취도 리포트: 2학년 3반\n"));
        assert!(md.contains("- **학급 평균:** 81.23점"));
        assert!(md.contains("1. kim (90.00점)"));
        assert!(md.contains("## 학습 지원이 필요한 학생\n\n- 해당 없음"));
        assert!(md.contains("| K-HS-2 | 0.00 | 0 | 데이터 없음 |"));
        assert!(md.ends_with("1. 토론 활동 확대\n"));
    }

    #[test]
    fn test_report_key_layout() {
        let id = Uuid::nil();
        assert_eq!(
            report_key(id),
            "class-reports/00000000-0000-0000-0000-000000000000.md"
        );
    }
}
