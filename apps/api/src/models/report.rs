use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClassReportRow {
    pub id: Uuid,
    pub teacher_username: String,
    pub class_name: String,
    pub subject: String,
    pub report_type: String,
    pub total_students: i32,
    pub average_score: f64,
    pub top_achievers: Value,
    pub struggling_students: Value,
    pub unit_analysis: Value,
    pub leading_points: String,
    pub s3_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PortfolioRow {
    pub id: Uuid,
    pub username: String,
    pub subject: String,
    pub total_questions: i64,
    pub total_score: f64,
    pub average_score: f64,
    pub strong_areas: Value,
    pub weak_areas: Value,
    pub learning_progress: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
