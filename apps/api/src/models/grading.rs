use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EssayGradingRow {
    pub id: Uuid,
    pub username: String,
    pub subject: String,
    pub question: String,
    pub student_answer: String,
    pub model_answer: Option<String>,
    pub score: f64,
    pub max_score: i32,
    pub grading_reason: String,
    pub feedback: String,
    pub graded_by: String,
    pub created_at: DateTime<Utc>,
}
