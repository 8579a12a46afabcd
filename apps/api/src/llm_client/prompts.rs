// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.

/// Appended to system prompts whose reply must be a bare JSON object.
pub const JSON_ONLY_INSTRUCTION: &str = "반드시 유효한 JSON 객체 하나만 출력하세요. \
    JSON 바깥에 설명, 인사말, 마크다운 코드 블록을 포함하지 마세요.";

/// Persona shared by every prompt that speaks as a Korean teacher.
pub const KOREAN_TEACHER_PERSONA: &str = "당신은 대한민국 고등학교 국어 교사입니다.";

/// Builds a system prompt that demands JSON-only output.
pub fn json_system(role: &str) -> String {
    format!("{role} {JSON_ONLY_INSTRUCTION}")
}

/// Substitutes `{name}` placeholders in a single pass. Inserted values are
/// never rescanned, so braces inside student text stay literal. Unknown
/// `{...}` spans (the JSON examples in templates) are copied through.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let hit = after.find('}').and_then(|end| {
            let name = &after[..end];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, end))
        });
        match hit {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_system_appends_instruction() {
        let system = json_system("당신은 교육 평가 전문가입니다.");
        assert!(system.starts_with("당신은 교육 평가 전문가입니다."));
        assert!(system.ends_with(JSON_ONLY_INSTRUCTION));
    }

    #[test]
    fn test_fill_template_substitutes_known_keys() {
        let filled = fill_template("{a} and {b}", &[("a", "1"), ("b", "2")]);
        assert_eq!(filled, "1 and 2");
    }

    #[test]
    fn test_fill_template_keeps_json_braces() {
        let template = "점수: {max}\n{\n  \"score\": 0\n}";
        let filled = fill_template(template, &[("max", "100")]);
        assert_eq!(filled, "점수: 100\n{\n  \"score\": 0\n}");
    }

    #[test]
    fn test_fill_template_does_not_expand_inserted_text() {
        let filled = fill_template(
            "{essay} / {max_score}",
            &[("essay", "만점은 {max_score}점"), ("max_score", "100")],
        );
        assert_eq!(filled, "만점은 {max_score}점 / 100");
    }
}
