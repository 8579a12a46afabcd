pub const MATCH_SYSTEM: &str =
    "교육과정 전문가로서 성취기준 코드를 정확히 매칭하세요. JSON 형식만 출력하세요.";

pub const MATCH_PROMPT_TEMPLATE: &str = r#"{persona} 다음 학생의 답안 내용과 가장 관련이 깊은 '2022 개정 국어과 성취기준' 하나를 선택하세요.

[학생이 보고 있는 질문/발문]
{question}

[학생의 서술형 답안/텍스트]
{essay}

[후보 성취기준 목록]
{standards}

가장 적절한 성취기준 코드 하나를 골라 아래 JSON 형식으로만 답하세요.
정확히 'matched_code' 필드만 포함해야 합니다.

{"matched_code": "코드입력"}

만약 관련성을 전혀 찾을 수 없다면 {"matched_code": "{unknown}"}를 반환하세요."#;
