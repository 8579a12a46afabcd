//! Standards matcher: picks the achievement standard a submission addresses.
//!
//! Algorithm:
//! 1. Lowercase `"{question} {essay}"`.
//! 2. Scan standards in catalog order, and each standard's keywords in order;
//!    the first keyword contained in the text wins.
//! 3. Otherwise ask the LLM once for `{"matched_code": ...}` and look the code up.
//! 4. Any LLM, parse or lookup failure yields the `K-HS-?` sentinel.
//!
//! The outcome always carries a standard; `MatchMethod` says how it was reached,
//! so callers can tell "no match" apart from "LLM unavailable".

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::llm_client::prompts::{fill_template, KOREAN_TEACHER_PERSONA};
use crate::llm_client::{complete_json, CompletionBackend, LlmError};
use crate::standards::catalog::{StandardRecord, StandardsCatalog, UNKNOWN_CODE};
use crate::standards::prompts::{MATCH_PROMPT_TEMPLATE, MATCH_SYSTEM};

/// Why a submission ended up with the sentinel standard.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MatchFailure {
    #[error("no standards are loaded")]
    EmptyCatalog,

    #[error("the model found no relevant standard")]
    NoRelevantStandard,

    #[error("the model returned unknown code {0}")]
    UnknownCode(String),

    #[error("LLM unavailable: {0}")]
    Upstream(String),

    #[error("LLM reply could not be parsed: {0}")]
    Parse(String),
}

impl From<LlmError> for MatchFailure {
    fn from(err: LlmError) -> Self {
        if err.is_parse_failure() {
            MatchFailure::Parse(err.to_string())
        } else {
            MatchFailure::Upstream(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum MatchMethod {
    Keyword { keyword: String },
    Llm,
    Unmatched { reason: MatchFailure },
}

impl MatchMethod {
    pub fn label(&self) -> &'static str {
        match self {
            MatchMethod::Keyword { .. } => "keyword",
            MatchMethod::Llm => "llm",
            MatchMethod::Unmatched { .. } => "unmatched",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub standard: StandardRecord,
    pub method: MatchMethod,
}

impl MatchOutcome {
    fn unmatched(reason: MatchFailure) -> Self {
        Self {
            standard: StandardRecord::unknown(),
            method: MatchMethod::Unmatched { reason },
        }
    }

    /// True when the LLM fallback failed rather than simply finding nothing.
    pub fn is_degraded(&self) -> bool {
        matches!(
            &self.method,
            MatchMethod::Unmatched {
                reason: MatchFailure::Upstream(_) | MatchFailure::Parse(_)
            }
        )
    }
}

#[derive(Debug, Deserialize)]
struct MatchedCode {
    matched_code: Option<String>,
}

/// Returns the first standard (and the keyword) whose keyword occurs in `text`.
/// `text` must already be lowercased.
pub fn match_by_keyword<'a>(
    standards: &'a [StandardRecord],
    text: &str,
) -> Option<(&'a StandardRecord, &'a str)> {
    standards.iter().find_map(|standard| {
        standard
            .keywords
            .iter()
            .find(|k| !k.trim().is_empty() && text.contains(&k.to_lowercase()))
            .map(|k| (standard, k.as_str()))
    })
}

fn build_match_prompt(question: &str, essay: &str, standards: &[StandardRecord]) -> String {
    let listing = standards
        .iter()
        .map(|s| format!("- [{}] {}", s.code, s.description))
        .collect::<Vec<_>>()
        .join("\n");
    let question = if question.trim().is_empty() {
        "없음 (일반적인 문장 분석)"
    } else {
        question
    };

    fill_template(
        MATCH_PROMPT_TEMPLATE,
        &[
            ("persona", KOREAN_TEACHER_PERSONA),
            ("question", question),
            ("essay", essay),
            ("standards", &listing),
            ("unknown", UNKNOWN_CODE),
        ],
    )
}

pub struct StandardsMatcher {
    catalog: Arc<StandardsCatalog>,
    llm: Arc<dyn CompletionBackend>,
}

impl StandardsMatcher {
    pub fn new(catalog: Arc<StandardsCatalog>, llm: Arc<dyn CompletionBackend>) -> Self {
        Self { catalog, llm }
    }

    pub async fn match_standard(&self, question: &str, essay: &str) -> MatchOutcome {
        let standards = self.catalog.snapshot();
        let text = format!("{question} {essay}").to_lowercase();
        debug!(
            "Matching submission ({} chars) against {} standards",
            text.chars().count(),
            standards.len()
        );

        if let Some((standard, keyword)) = match_by_keyword(&standards, &text) {
            info!("Keyword '{keyword}' matched standard {}", standard.code);
            return MatchOutcome {
                standard: standard.clone(),
                method: MatchMethod::Keyword {
                    keyword: keyword.to_string(),
                },
            };
        }

        if standards.is_empty() {
            warn!("Standards catalog is empty; skipping LLM match");
            return MatchOutcome::unmatched(MatchFailure::EmptyCatalog);
        }

        match self.match_with_llm(question, essay, &standards).await {
            Ok(standard) => {
                info!("LLM matched standard {}", standard.code);
                MatchOutcome {
                    standard,
                    method: MatchMethod::Llm,
                }
            }
            Err(reason) => {
                warn!("Standards match fell back to {UNKNOWN_CODE}: {reason}");
                MatchOutcome::unmatched(reason)
            }
        }
    }

    async fn match_with_llm(
        &self,
        question: &str,
        essay: &str,
        standards: &[StandardRecord],
    ) -> Result<StandardRecord, MatchFailure> {
        let prompt = build_match_prompt(question, essay, standards);
        let reply: MatchedCode = complete_json(self.llm.as_ref(), &prompt, MATCH_SYSTEM, 0.0).await?;

        let code = reply
            .matched_code
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| MatchFailure::Parse("missing matched_code".to_string()))?;

        if code == UNKNOWN_CODE {
            return Err(MatchFailure::NoRelevantStandard);
        }

        standards
            .iter()
            .find(|s| s.code == code)
            .cloned()
            .ok_or(MatchFailure::UnknownCode(code))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedLlm;

    pub(crate) fn standard(code: &str, domain: &str, keywords: &[&str]) -> StandardRecord {
        StandardRecord {
            code: code.to_string(),
            domain: domain.to_string(),
            description: format!("{domain} 성취기준"),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub(crate) fn sample_standards() -> Vec<StandardRecord> {
        vec![
            standard("K-HS-1", "화법", &["발표", "토론"]),
            standard("K-HS-2", "문법", &["문법", "품사"]),
            standard("K-HS-3", "문학", &["비유", "은유", "인물"]),
            standard("K-HS-4", "작문", &["근거", "논거"]),
        ]
    }

    fn matcher_with(llm: Arc<ScriptedLlm>) -> StandardsMatcher {
        let catalog = Arc::new(StandardsCatalog::from_records(sample_standards()));
        StandardsMatcher::new(catalog, llm)
    }

    #[test]
    fn test_keyword_priority_follows_list_order() {
        let standards = sample_standards();
        // "근거" belongs to K-HS-4 but "문법" on K-HS-2 comes first in the list.
        let (hit, keyword) =
            match_by_keyword(&standards, "근거를 들어 문법 규칙을 설명했다").unwrap();
        assert_eq!(hit.code, "K-HS-2");
        assert_eq!(keyword, "문법");
    }

    #[test]
    fn test_keyword_priority_within_standard() {
        let standards = vec![standard("K-HS-3", "문학", &["인물", "비유"])];
        let (_, keyword) = match_by_keyword(&standards, "비유와 인물").unwrap();
        assert_eq!(keyword, "인물");
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let standards = vec![standard("K-HS-9", "매체", &["SNS"])];
        let (hit, _) = match_by_keyword(&standards, "sns 게시물을 분석").unwrap();
        assert_eq!(hit.code, "K-HS-9");
    }

    #[test]
    fn test_blank_keywords_never_match() {
        let standards = vec![standard("K-HS-9", "매체", &["", "  "])];
        assert!(match_by_keyword(&standards, "아무 텍스트").is_none());
    }

    #[tokio::test]
    async fn test_keyword_hit_skips_llm() {
        let llm = Arc::new(ScriptedLlm::new());
        let matcher = matcher_with(llm.clone());

        let outcome = matcher
            .match_standard("발표 전략은?", "청중을 고려했다")
            .await;
        assert_eq!(outcome.standard.code, "K-HS-1");
        assert_eq!(
            outcome.method,
            MatchMethod::Keyword {
                keyword: "발표".to_string()
            }
        );
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_llm_fallback_returns_named_standard() {
        let llm = Arc::new(ScriptedLlm::replying(r#"{"matched_code": "K-HS-3"}"#));
        let matcher = matcher_with(llm.clone());

        let outcome = matcher.match_standard("", "화자의 정서가 드러난다").await;
        assert_eq!(outcome.standard.code, "K-HS-3");
        assert_eq!(outcome.method, MatchMethod::Llm);
        assert_eq!(llm.calls(), 1);

        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.contains("- [K-HS-1] 화법 성취기준"));
        assert!(prompt.contains("없음 (일반적인 문장 분석)"));
    }

    #[tokio::test]
    async fn test_llm_fallback_accepts_fenced_json() {
        let llm = Arc::new(ScriptedLlm::replying(
            "```json\n{\"matched_code\": \"K-HS-4\"}\n```",
        ));
        let outcome = matcher_with(llm).match_standard("", "설득하는 글").await;
        assert_eq!(outcome.standard.code, "K-HS-4");
    }

    #[tokio::test]
    async fn test_llm_error_yields_sentinel() {
        let llm = Arc::new(ScriptedLlm::failing(LlmError::Api {
            status: 500,
            message: "overloaded".to_string(),
        }));
        let outcome = matcher_with(llm).match_standard("", "화자의 정서").await;
        assert_eq!(outcome.standard.code, UNKNOWN_CODE);
        assert!(outcome.is_degraded());
        assert!(matches!(
            outcome.method,
            MatchMethod::Unmatched {
                reason: MatchFailure::Upstream(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_llm_timeout_yields_sentinel() {
        let llm = Arc::new(ScriptedLlm::failing(LlmError::Timeout));
        let outcome = matcher_with(llm).match_standard("", "화자의 정서").await;
        assert_eq!(outcome.standard.code, UNKNOWN_CODE);
        assert!(outcome.is_degraded());
    }

    #[tokio::test]
    async fn test_invalid_json_yields_sentinel() {
        let llm = Arc::new(ScriptedLlm::replying("K-HS-3 입니다"));
        let outcome = matcher_with(llm).match_standard("", "화자의 정서").await;
        assert_eq!(outcome.standard, StandardRecord::unknown());
        assert!(matches!(
            outcome.method,
            MatchMethod::Unmatched {
                reason: MatchFailure::Parse(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_unknown_code_yields_sentinel() {
        let llm = Arc::new(ScriptedLlm::replying(r#"{"matched_code": "K-MS-1"}"#));
        let outcome = matcher_with(llm).match_standard("", "화자의 정서").await;
        assert_eq!(outcome.standard.code, UNKNOWN_CODE);
        assert_eq!(
            outcome.method,
            MatchMethod::Unmatched {
                reason: MatchFailure::UnknownCode("K-MS-1".to_string())
            }
        );
        assert!(!outcome.is_degraded());
    }

    #[tokio::test]
    async fn test_model_declining_yields_sentinel() {
        let llm = Arc::new(ScriptedLlm::replying(r#"{"matched_code": "K-HS-?"}"#));
        let outcome = matcher_with(llm).match_standard("", "오늘 점심 메뉴").await;
        assert_eq!(outcome.standard.code, UNKNOWN_CODE);
        assert_eq!(
            outcome.method,
            MatchMethod::Unmatched {
                reason: MatchFailure::NoRelevantStandard
            }
        );
    }

    #[tokio::test]
    async fn test_empty_catalog_skips_llm() {
        let llm = Arc::new(ScriptedLlm::new());
        let catalog = Arc::new(StandardsCatalog::from_records(vec![]));
        let matcher = StandardsMatcher::new(catalog, llm.clone());

        let outcome = matcher.match_standard("질문", "답안").await;
        assert_eq!(outcome.standard.code, UNKNOWN_CODE);
        assert_eq!(llm.calls(), 0);
    }

    #[test]
    fn test_prompt_keeps_placeholders_in_student_text() {
        let prompt = build_match_prompt("{essay}", "목록: {standards}", &sample_standards());
        assert!(prompt.contains("목록: {standards}"));
        assert!(prompt.contains("{essay}"));
        assert!(prompt.contains("- [K-HS-1] 화법 성취기준"));
        assert_eq!(prompt.matches("- [K-HS-1]").count(), 1);
    }

    #[test]
    fn test_method_serializes_with_tag() {
        let value = serde_json::to_value(MatchMethod::Keyword {
            keyword: "문법".to_string(),
        })
        .unwrap();
        assert_eq!(value["method"], "keyword");
        assert_eq!(value["keyword"], "문법");
    }
}
