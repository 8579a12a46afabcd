//! Analysis pipeline: match → domain feedback → two appended rows → response.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::{require_text, AppError};
use crate::models::activity::ANALYSIS_CATEGORY_PREFIX;
use crate::standards::feedback::{feedback_for, teacher_tip};
use crate::standards::matcher::{MatchMethod, MatchOutcome, StandardsMatcher};

const ANONYMOUS: &str = "anonymous";

/// Activity-log row produced by one analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub username: String,
    pub question: String,
    pub reply: String,
    pub category: String,
    pub score: f64,
}

/// Achievement row produced by one analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAchievement {
    pub username: String,
    pub subject: String,
    pub standard_code: String,
    pub score: f64,
}

/// Persists the pair of rows an analysis produces.
#[async_trait]
pub trait ActivityRecorder: Send + Sync {
    async fn record_analysis(
        &self,
        activity: &NewActivity,
        achievement: &NewAchievement,
    ) -> Result<(), sqlx::Error>;
}

/// Writes both rows in a single transaction.
pub struct PgActivityRecorder {
    pool: PgPool,
}

impl PgActivityRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityRecorder for PgActivityRecorder {
    async fn record_analysis(
        &self,
        activity: &NewActivity,
        achievement: &NewAchievement,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO records (id, username, question, reply, category, score)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&activity.username)
        .bind(&activity.question)
        .bind(&activity.reply)
        .bind(&activity.category)
        .bind(activity.score)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO achievement_records (id, username, subject, standard_code, score)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&achievement.username)
        .bind(&achievement.subject)
        .bind(&achievement.standard_code)
        .bind(achievement.score)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub essay: String,
}

#[derive(Debug, Serialize)]
pub struct RelatedStandard {
    pub id: String,
    pub domain: String,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub related_standard: RelatedStandard,
    pub score: u32,
    pub feedback: String,
    pub teacher_tips: String,
    pub match_method: MatchMethod,
    /// False when the activity rows could not be written.
    pub saved: bool,
}

/// Builds the activity and achievement rows for a matched submission.
pub fn build_rows(
    username: &str,
    question: &str,
    outcome: &MatchOutcome,
    score: u32,
    feedback: &str,
) -> (NewActivity, NewAchievement) {
    let standard = &outcome.standard;
    let score = f64::from(score.min(100));
    (
        NewActivity {
            username: username.to_string(),
            question: question.to_string(),
            reply: feedback.to_string(),
            category: format!("{ANALYSIS_CATEGORY_PREFIX}{}", standard.domain),
            score,
        },
        NewAchievement {
            username: username.to_string(),
            subject: standard.domain.clone(),
            standard_code: standard.code.clone(),
            score,
        },
    )
}

pub async fn analyze_submission(
    matcher: &StandardsMatcher,
    recorder: &dyn ActivityRecorder,
    request: AnalyzeRequest,
) -> Result<AnalysisResponse, AppError> {
    require_text("essay", &request.essay)?;

    let username = request
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(ANONYMOUS)
        .to_string();

    let outcome = matcher
        .match_standard(&request.question, &request.essay)
        .await;
    if outcome.is_degraded() {
        warn!("Analysis for {username} stored without a standard match");
    }
    let (score, feedback) = feedback_for(&outcome.standard.domain);

    let (activity, achievement) =
        build_rows(&username, &request.question, &outcome, score, feedback);
    let saved = match recorder.record_analysis(&activity, &achievement).await {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to save analysis for {username}: {e}");
            false
        }
    };

    info!(
        "Analysis for {username}: standard={} method={} score={score}",
        outcome.standard.code,
        outcome.method.label()
    );

    let standard = outcome.standard;
    Ok(AnalysisResponse {
        teacher_tips: teacher_tip(&standard),
        related_standard: RelatedStandard {
            id: standard.code,
            domain: standard.domain,
            title: standard.description,
        },
        score,
        feedback: feedback.to_string(),
        match_method: outcome.method,
        saved,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::llm_client::testing::ScriptedLlm;
    use crate::standards::catalog::{StandardsCatalog, UNKNOWN_CODE};
    use crate::standards::matcher::tests::sample_standards;

    #[derive(Default)]
    pub(crate) struct MemoryRecorder {
        pub rows: Mutex<Vec<(NewActivity, NewAchievement)>>,
    }

    #[async_trait]
    impl ActivityRecorder for MemoryRecorder {
        async fn record_analysis(
            &self,
            activity: &NewActivity,
            achievement: &NewAchievement,
        ) -> Result<(), sqlx::Error> {
            self.rows
                .lock()
                .unwrap()
                .push((activity.clone(), achievement.clone()));
            Ok(())
        }
    }

    struct BrokenRecorder;

    #[async_trait]
    impl ActivityRecorder for BrokenRecorder {
        async fn record_analysis(
            &self,
            _activity: &NewActivity,
            _achievement: &NewAchievement,
        ) -> Result<(), sqlx::Error> {
            Err(sqlx::Error::PoolTimedOut)
        }
    }

    fn matcher(llm: Arc<ScriptedLlm>) -> StandardsMatcher {
        StandardsMatcher::new(
            Arc::new(StandardsCatalog::from_records(sample_standards())),
            llm,
        )
    }

    fn request(username: Option<&str>, question: &str, essay: &str) -> AnalyzeRequest {
        AnalyzeRequest {
            username: username.map(str::to_string),
            question: question.to_string(),
            essay: essay.to_string(),
        }
    }

    #[tokio::test]
    async fn test_grammar_keyword_end_to_end() {
        let llm = Arc::new(ScriptedLlm::new());
        let recorder = MemoryRecorder::default();

        let response = analyze_submission(
            &matcher(llm.clone()),
            &recorder,
            request(Some("student1"), "", "근거를 들어 문법 규칙을 설명했습니다."),
        )
        .await
        .unwrap();

        assert_eq!(llm.calls(), 0);
        assert_eq!(response.related_standard.id, "K-HS-2");
        assert_eq!(response.related_standard.domain, "문법");
        assert_eq!(response.score, 90);
        assert_eq!(
            response.feedback,
            "문법 개념을 정의하고 예문을 통해 설명하면 좋아요."
        );
        assert!(response.saved);

        let rows = recorder.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        let (activity, achievement) = &rows[0];
        assert_eq!(activity.username, "student1");
        assert_eq!(activity.category, "분석-문법");
        assert_eq!(activity.reply, response.feedback);
        assert_eq!(activity.score, 90.0);
        assert_eq!(achievement.subject, "문법");
        assert_eq!(achievement.standard_code, "K-HS-2");
        assert_eq!(achievement.score, activity.score);
    }

    #[tokio::test]
    async fn test_llm_failure_records_sentinel_with_default_score() {
        let llm = Arc::new(ScriptedLlm::failing(crate::llm_client::LlmError::Timeout));
        let recorder = MemoryRecorder::default();

        let response = analyze_submission(
            &matcher(llm),
            &recorder,
            request(None, "", "화자의 정서가 잘 드러난다"),
        )
        .await
        .unwrap();

        assert_eq!(response.related_standard.id, UNKNOWN_CODE);
        assert_eq!(response.score, 70);
        assert_eq!(response.match_method.label(), "unmatched");

        let rows = recorder.rows.lock().unwrap();
        assert_eq!(rows[0].0.username, "anonymous");
        assert_eq!(rows[0].1.standard_code, UNKNOWN_CODE);
    }

    #[tokio::test]
    async fn test_blank_essay_is_rejected() {
        let recorder = MemoryRecorder::default();
        let result = analyze_submission(
            &matcher(Arc::new(ScriptedLlm::new())),
            &recorder,
            request(Some("student1"), "질문", "   "),
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(recorder.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_essay_is_rejected_like_blank() {
        let request: AnalyzeRequest =
            serde_json::from_str(r#"{"username": "s", "question": "q"}"#).unwrap();
        assert!(request.essay.is_empty());

        let recorder = MemoryRecorder::default();
        let result =
            analyze_submission(&matcher(Arc::new(ScriptedLlm::new())), &recorder, request).await;

        assert!(matches!(result, Err(AppError::Validation(msg)) if msg.contains("essay")));
        assert!(recorder.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_still_returns_analysis() {
        let response = analyze_submission(
            &matcher(Arc::new(ScriptedLlm::new())),
            &BrokenRecorder,
            request(Some("student1"), "발표 전략", "청중을 바라보며 말했다"),
        )
        .await
        .unwrap();

        assert!(!response.saved);
        assert_eq!(response.score, 85);
        assert_eq!(
            response.teacher_tips,
            "화법 영역 학습을 강화해보세요! (화법 성취기준)"
        );
    }
}
