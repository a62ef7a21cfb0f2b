//! Prompts for the LLM Client (C3) and Explainer (C6).
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the full 22-type enumeration and the
//!    listening-specific rules live in exactly one place.
//! 2. **Testability** — unit tests can inspect and round-trip these
//!    constants directly without a live LLM call.
//!
//! Callers can override the schema prompt via
//! [`crate::config::AppConfig`]-level configuration if a future exam
//! format needs it; the constants here are the default.

use crate::model::QuestionType;
use std::fmt::Write as _;

/// The structuring prompt sent once per PDF by the LLM Client (§4.3).
///
/// Built at first use rather than as a literal `const` because it
/// interpolates the live [`QuestionType::ALL`] enumeration — if a tag is
/// ever added to the enum, the prompt updates itself rather than drifting
/// out of sync with a hand-maintained string.
pub fn schema_prompt() -> String {
    let mut tags = String::new();
    for (i, t) in QuestionType::ALL.iter().enumerate() {
        if i > 0 {
            tags.push_str(", ");
        }
        let _ = write!(tags, "{}", t.as_tag());
    }

    format!(
        r#"You are an expert exam-structuring assistant. You will be given the
full Markdown transcription of a Korean high-school English exam PDF.
Project it into a single JSON object matching this schema exactly:

{{
  "info": {{
    "title": string,
    "year": integer | null,
    "month": integer 1-12 | null,
    "grade": integer 1-3 | null,
    "subject": string
  }},
  "questions": [
    {{
      "number": integer,
      "question_type": one of [{tags}],
      "question_text": string,
      "passage": string,
      "choices": [{{ "number": 1-5, "text": string }}, ...],
      "points": integer 1-5,
      "vocabulary_notes": [string, ...],
      "has_image": boolean,
      "has_table": boolean,
      "sub_questions": [Question, ...],
      "group_range": [first, last] | null
    }},
    ...
  ]
}}

LISTENING RULES:
- Questions numbered 1 through 17 are listening questions: question_type
  must be "듣기", passage must be the empty string, and choices must
  contain exactly 5 entries even though no passage is given.

GENERAL RULES:
- Every non-listening MCQ type has exactly 5 choices numbered 1-5.
- "서술형" (free-response) questions may have zero choices.
- Circled-digit markers (①②③④⑤) in the source text mark choice
  boundaries; split on them.
- group_range applies to consecutive questions sharing one passage
  (e.g. 41 and 42): give every member of the group the same
  [first, last] pair.
- Output ONLY the JSON object. Do not wrap it in ```json fences. Do not
  add commentary before or after it.

Markdown to structure follows."#
    )
}

/// Default temperature for the structuring call (§4.3): near-zero so the
/// projection is faithful rather than creative.
pub const SCHEMA_TEMPERATURE: f32 = 0.1;

/// Default maximum output tokens for the structuring call.
pub const SCHEMA_MAX_TOKENS: usize = 16_384;

/// The batch explanation prompt built by the Explainer (§4.6).
///
/// `questions_json` is a JSON array of `{number, question_type,
/// question_text, passage, choices}` for every eligible question (see
/// [`crate::model::Question::is_explainable`]). The placeholder is
/// substituted by [`explainer_prompt`].
const EXPLAINER_TEMPLATE: &str = r#"다음은 한국 고등학교 영어 시험 문제 목록입니다. 각 문제에 대해 세 부분으로
구성된 해설을 작성하세요:

1. 정답 근거 (evidence for the answer)
2. 핵심 문법/어휘 포인트
3. 오답 분석

응답은 문제 번호를 키로 하고 해설 문자열을 값으로 하는 JSON 객체여야
합니다. 예: {{"41": "...", "42": "..."}}

문제 목록:
{questions_json}"#;

/// Build the explainer prompt for a batch of eligible questions.
pub fn explainer_prompt(questions_json: &str) -> String {
    EXPLAINER_TEMPLATE.replace("{questions_json}", questions_json)
}

/// Default temperature for the explainer call (§4.6).
pub const EXPLAINER_TEMPERATURE: f32 = 0.3;

/// Default maximum output tokens for the explainer call.
pub const EXPLAINER_MAX_TOKENS: usize = 8192;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_prompt_enumerates_all_22_tags() {
        let prompt = schema_prompt();
        for t in QuestionType::ALL {
            assert!(
                prompt.contains(t.as_tag()),
                "schema prompt missing tag {}",
                t.as_tag()
            );
        }
    }

    #[test]
    fn schema_prompt_states_listening_boundary() {
        let prompt = schema_prompt();
        assert!(prompt.contains("1 through 17"));
    }

    #[test]
    fn explainer_prompt_substitutes_payload() {
        let rendered = explainer_prompt(r#"[{"number":1}]"#);
        assert!(rendered.contains(r#"[{"number":1}]"#));
        assert!(!rendered.contains("{questions_json}"));
    }
}
