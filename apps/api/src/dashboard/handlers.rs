//! Axum route handlers for the student dashboard.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::dashboard::analyzer::{
    achievement_dashboard, heatmap, AchievementDashboard, AreaScore, Heatmap,
};
use crate::errors::{require_text, AppError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DashboardRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub subject: Option<String>,
}

impl DashboardRequest {
    fn subject(&self) -> Option<&str> {
        self.subject.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Flattened view consumed by the dashboard page.
#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub username: String,
    pub subject: Option<String>,
    pub achievement_scores: BTreeMap<String, f64>,
    pub total_questions: i64,
    pub average_score: f64,
    pub strong_areas: Vec<AreaScore>,
    pub weak_areas: Vec<AreaScore>,
}

impl From<AchievementDashboard> for DashboardSummary {
    fn from(dashboard: AchievementDashboard) -> Self {
        Self {
            achievement_scores: dashboard
                .achievement_by_standard
                .iter()
                .map(|(code, stat)| (code.clone(), stat.average_score))
                .collect(),
            username: dashboard.username,
            subject: dashboard.subject,
            total_questions: dashboard.overall_stats.total_questions,
            average_score: dashboard.overall_stats.average_score,
            strong_areas: dashboard.strong_areas,
            weak_areas: dashboard.weak_areas,
        }
    }
}

/// GET /api/dashboard?username=&subject=
pub async fn handle_dashboard(
    State(state): State<AppState>,
    Query(request): Query<DashboardRequest>,
) -> Result<Json<DashboardSummary>, AppError> {
    require_text("username", &request.username)?;
    let dashboard = achievement_dashboard(&state.db, &request.username, request.subject()).await?;
    Ok(Json(dashboard.into()))
}

/// POST /api/dashboard/achievement
pub async fn handle_achievement(
    State(state): State<AppState>,
    Json(request): Json<DashboardRequest>,
) -> Result<Json<AchievementDashboard>, AppError> {
    require_text("username", &request.username)?;
    let dashboard = achievement_dashboard(&state.db, &request.username, request.subject()).await?;
    Ok(Json(dashboard))
}

/// POST /api/dashboard/heatmap
///
/// Cells follow the loaded standards catalog.
pub async fn handle_heatmap(
    State(state): State<AppState>,
    Json(request): Json<DashboardRequest>,
) -> Result<Json<Heatmap>, AppError> {
    require_text("username", &request.username)?;
    let codes = state.catalog.codes();
    let map = heatmap(&state.db, &codes, &request.username, request.subject()).await?;
    Ok(Json(map))
}
