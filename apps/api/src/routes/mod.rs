pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::{analysis, assistant, dashboard, grading, portfolio, reports, standards};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Student analysis
        .route(
            "/api/student/analyze",
            post(analysis::handlers::handle_analyze),
        )
        .route(
            "/report/summary",
            get(analysis::handlers::handle_report_summary),
        )
        // Essay grading
        .route(
            "/api/grading/essay",
            post(grading::handlers::handle_grade_essay),
        )
        .route(
            "/api/grading/history",
            post(analysis::handlers::handle_history),
        )
        .route(
            "/api/grading/list",
            get(grading::handlers::handle_grading_list),
        )
        .route(
            "/api/grading/detail/:id",
            get(grading::handlers::handle_grading_detail),
        )
        // Dashboard
        .route("/api/dashboard", get(dashboard::handlers::handle_dashboard))
        .route(
            "/api/dashboard/achievement",
            post(dashboard::handlers::handle_achievement),
        )
        .route(
            "/api/dashboard/heatmap",
            post(dashboard::handlers::handle_heatmap),
        )
        // Portfolio
        .route(
            "/api/portfolio/data",
            post(portfolio::handlers::handle_portfolio_data),
        )
        .route(
            "/api/portfolio/refresh",
            post(portfolio::handlers::handle_portfolio_refresh),
        )
        // Teacher
        .route(
            "/api/teacher/auto-grade",
            post(grading::handlers::handle_grade_essay),
        )
        .route(
            "/api/teacher/assistant/summarize-questions",
            post(assistant::handlers::handle_summarize_questions),
        )
        .route(
            "/api/teacher/assistant/analyze-wrong-answers",
            post(assistant::handlers::handle_analyze_wrong_answers),
        )
        .route(
            "/api/teacher/assistant/teaching-advice",
            post(assistant::handlers::handle_teaching_advice),
        )
        .route(
            "/api/teacher/class-report/generate",
            post(reports::handlers::handle_generate_report),
        )
        .route(
            "/api/teacher/class-report/list",
            get(reports::handlers::handle_list_reports),
        )
        .route(
            "/api/teacher/class-report/:id",
            get(reports::handlers::handle_get_report),
        )
        .route(
            "/api/teacher/class-report/download/:id",
            get(reports::handlers::handle_download_report),
        )
        // Standards administration
        .route(
            "/api/standards",
            get(standards::handlers::handle_list_standards),
        )
        .route(
            "/api/standards/refresh",
            post(standards::handlers::handle_refresh_standards),
        )
        .route(
            "/api/standards/match",
            post(standards::handlers::handle_match_standard),
        )
        .with_state(state)
}
