//! Feedback generator: fixed (score, comment) pairs keyed by subject domain.

use crate::standards::catalog::StandardRecord;

const DEFAULT_FEEDBACK: (u32, &str) = (70, "핵심 개념을 중심으로 논리적으로 정리해 보세요.");

/// Domain labels (with their synonyms) and the feedback they map to.
const DOMAIN_FEEDBACK: &[(&[&str], u32, &str)] = &[
    (
        &["화법", "듣기·말하기"],
        85,
        "공감적 듣기나 명확한 말하기 전략을 구체적으로 서술해 보세요.",
    ),
    (
        &["문법"],
        90,
        "문법 개념을 정의하고 예문을 통해 설명하면 좋아요.",
    ),
    (
        &["독서", "읽기"],
        80,
        "글의 핵심 내용과 필자의 의도를 명확히 구분해 보세요.",
    ),
    (
        &["문학"],
        95,
        "작품의 주제와 인물의 관계를 구체적인 근거로 제시해 보세요.",
    ),
    (
        &["작문", "쓰기"],
        88,
        "글의 구조를 명확히 하고 예시나 근거를 들어 설득력을 높이세요.",
    ),
];

/// Returns the score and student-facing comment for a domain label.
/// Unknown domains fall back to `(70, ..)`.
pub fn feedback_for(domain: &str) -> (u32, &'static str) {
    let domain = domain.trim();
    DOMAIN_FEEDBACK
        .iter()
        .find(|(aliases, _, _)| aliases.contains(&domain))
        .map(|(_, score, comment)| (*score, *comment))
        .unwrap_or(DEFAULT_FEEDBACK)
}

/// Teacher-facing hint naming the standard's domain and description.
pub fn teacher_tip(standard: &StandardRecord) -> String {
    format!(
        "{} 영역 학습을 강화해보세요! ({})",
        standard.domain, standard.description
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hwabeop_and_alias() {
        let expected = (85, "공감적 듣기나 명확한 말하기 전략을 구체적으로 서술해 보세요.");
        assert_eq!(feedback_for("화법"), expected);
        assert_eq!(feedback_for("듣기·말하기"), expected);
    }

    #[test]
    fn test_grammar() {
        assert_eq!(
            feedback_for("문법"),
            (90, "문법 개념을 정의하고 예문을 통해 설명하면 좋아요.")
        );
    }

    #[test]
    fn test_reading_and_alias() {
        let expected = (80, "글의 핵심 내용과 필자의 의도를 명확히 구분해 보세요.");
        assert_eq!(feedback_for("독서"), expected);
        assert_eq!(feedback_for("읽기"), expected);
    }

    #[test]
    fn test_literature() {
        assert_eq!(
            feedback_for("문학"),
            (95, "작품의 주제와 인물의 관계를 구체적인 근거로 제시해 보세요.")
        );
    }

    #[test]
    fn test_writing_and_alias() {
        let expected = (88, "글의 구조를 명확히 하고 예시나 근거를 들어 설득력을 높이세요.");
        assert_eq!(feedback_for("작문"), expected);
        assert_eq!(feedback_for("쓰기"), expected);
    }

    #[test]
    fn test_other_domains_use_default() {
        assert_eq!(feedback_for("일반"), DEFAULT_FEEDBACK);
        assert_eq!(feedback_for(""), DEFAULT_FEEDBACK);
        assert_eq!(feedback_for("문학사"), DEFAULT_FEEDBACK);
    }

    #[test]
    fn test_domain_is_trimmed() {
        assert_eq!(feedback_for("  문학\n").0, 95);
    }

    #[test]
    fn test_teacher_tip_format() {
        let standard = StandardRecord {
            code: "K-HS-2".to_string(),
            domain: "문법".to_string(),
            description: "품사와 문장 성분을 구별한다.".to_string(),
            keywords: vec![],
        };
        assert_eq!(
            teacher_tip(&standard),
            "문법 영역 학습을 강화해보세요! (품사와 문장 성분을 구별한다.)"
        );
    }
}
