use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Category written for chat turns.
pub const CHAT_CATEGORY: &str = "AI 채팅";
/// Prefix of the category written for analysed submissions.
pub const ANALYSIS_CATEGORY_PREFIX: &str = "분석-";

/// Row of the append-only `records` activity log.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityRow {
    pub id: Uuid,
    pub username: String,
    pub question: String,
    pub reply: String,
    pub category: String,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

/// Row of the append-only `achievement_records` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AchievementRow {
    pub id: Uuid,
    pub username: String,
    pub subject: String,
    pub standard_code: String,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}
