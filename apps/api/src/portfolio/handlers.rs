use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::{require_text, AppError};
use crate::portfolio::builder::{generate_portfolio, stored_portfolio, PortfolioData, PortfolioView};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PortfolioRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub subject: Option<String>,
}

impl PortfolioRequest {
    fn subject(&self) -> Option<&str> {
        self.subject.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// POST /api/portfolio/data
///
/// Returns the stored snapshot, generating one on first access.
pub async fn handle_portfolio_data(
    State(state): State<AppState>,
    Json(request): Json<PortfolioRequest>,
) -> Result<Json<PortfolioView>, AppError> {
    require_text("username", &request.username)?;
    if let Some(snapshot) = stored_portfolio(&state.db, &request.username).await? {
        return Ok(Json(PortfolioView::Stored(snapshot)));
    }
    let data = generate_portfolio(&state.db, &request.username, request.subject()).await?;
    Ok(Json(PortfolioView::Generated(data)))
}

/// POST /api/portfolio/refresh
pub async fn handle_portfolio_refresh(
    State(state): State<AppState>,
    Json(request): Json<PortfolioRequest>,
) -> Result<Json<PortfolioData>, AppError> {
    require_text("username", &request.username)?;
    let data = generate_portfolio(&state.db, &request.username, request.subject()).await?;
    Ok(Json(data))
}
