use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::analysis::service::ActivityRecorder;
use crate::config::Config;
use crate::llm_client::CompletionBackend;
use crate::standards::catalog::StandardsCatalog;
use crate::standards::matcher::StandardsMatcher;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Report artifacts are written to `config.s3_bucket`.
    pub s3: S3Client,
    /// LLM backend. `LlmClient` in production; scripted in tests.
    pub llm: Arc<dyn CompletionBackend>,
    pub config: Config,
    pub catalog: Arc<StandardsCatalog>,
    pub matcher: Arc<StandardsMatcher>,
    /// Writes the activity and achievement rows of an analysis.
    pub recorder: Arc<dyn ActivityRecorder>,
}
