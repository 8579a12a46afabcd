// Leading-points prompt for class reports. Free-text reply, not JSON.
// Placeholders: {persona}, {class_average}, {struggling_count}, {unit_summary}

pub const LEADING_POINTS_SYSTEM: &str = "당신은 교육 평가 및 지도 전문가입니다.";

pub const LEADING_POINTS_PROMPT_TEMPLATE: &str = r#"{persona} 학급 성취도 리포트를 작성하고 있습니다.

**학급 평균**: {class_average}점
**학습 부진 학생 수**: {struggling_count}명

**단원별 성취도**:
{unit_summary}

이 데이터를 바탕으로 교사가 주목해야 할 **주요 지도 포인트**를 3-5개 작성해주세요."#;
