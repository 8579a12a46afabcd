// Rubric grading prompt.
// Placeholders: {persona}, {question}, {model_answer_section}, {student_answer}, {max_score}

pub const GRADING_SYSTEM_ROLE: &str = "당신은 공정하고 세심한 교육 평가 전문가입니다.";

pub const GRADING_PROMPT_TEMPLATE: &str = r#"{persona} 다음 서술형 문제에 대한 학생의 답안을 채점해주세요.

**문제**:
{question}
{model_answer_section}
**학생 답안**:
{student_answer}

**채점 기준**:
1. 내용의 정확성 (40%)
2. 논리적 구성 (30%)
3. 표현의 적절성 (20%)
4. 창의성 및 심화 (10%)

다음 형식의 JSON으로 채점 결과를 작성해주세요:
{
  "score": 점수 (0-{max_score} 사이의 정수),
  "reason": "채점 근거 (각 기준별로 어떻게 평가했는지 구체적으로)",
  "feedback": "개선을 위한 피드백 (학생이 어떤 부분을 보완하면 좋을지)"
}"#;
