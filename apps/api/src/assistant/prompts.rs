// Teacher assistant prompts. Each reply is a single JSON object.

pub const QUESTION_SUMMARY_ROLE: &str = "당신은 교육 데이터 분석 전문가입니다.";
pub const WRONG_ANSWER_ROLE: &str = "당신은 학습 평가 전문가입니다.";
pub const TEACHING_ADVICE_ROLE: &str = "당신은 교육과정 설계 전문가입니다.";

// Placeholders: {subject}, {questions}
pub const QUESTION_SUMMARY_PROMPT_TEMPLATE: &str = r#"당신은 {subject} 교사입니다. 학생들이 최근에 한 질문들을 분석해주세요.

**학생 질문 목록**:
{questions}

다음 형식의 JSON으로 분석 결과를 작성해주세요:
{
  "summary": "전체 질문 요약 (2-3문장)",
  "common_topics": ["자주 나온 주제1", "주제2", "주제3"],
  "difficulty_areas": ["학생들이 어려워하는 영역1", "영역2"],
  "teaching_suggestions": ["교수 제안사항1", "제안사항2", "제안사항3"]
}"#;

// Placeholders: {subject}, {answers}
pub const WRONG_ANSWER_PROMPT_TEMPLATE: &str = r#"당신은 {subject} 교사입니다. 학생들의 오답을 분석하여 공통 패턴을 찾아주세요.

**오답 샘플**:
{answers}

다음 형식의 JSON으로 분석 결과를 작성해주세요:
{
  "common_mistakes": ["흔한 실수1", "실수2"],
  "misconceptions": ["오개념1", "오개념2"],
  "improvement_strategies": ["개선 전략1", "전략2"]
}"#;

// Placeholders: {subject}, {topic}, {average}
pub const TEACHING_ADVICE_PROMPT_TEMPLATE: &str = r#"당신은 {subject} 교사입니다. 다음 주제에 대한 수업을 준비하고 있습니다.

**수업 주제**: {topic}
**학급 평균 점수**: {average}점

효과적인 수업을 위한 조언을 다음 형식의 JSON으로 작성해주세요:
{
  "lesson_objectives": ["학습 목표1", "목표2"],
  "teaching_methods": ["교수 방법1", "방법2"],
  "materials": ["필요한 자료1", "자료2"],
  "assessment_tips": ["평가 팁1", "팁2"]
}"#;
