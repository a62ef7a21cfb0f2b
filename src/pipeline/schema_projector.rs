//! Schema Projector (C4): raw structuring JSON → `ParsedExam`.
//!
//! Coerces tolerable defects (stringly-typed numbers, missing defaults,
//! passage-derived groups, choices captured as one blob of text) and
//! rejects only what cannot be repaired. This is the one stage allowed to
//! mutate the shape of the data — the Validator downstream never does.

use crate::error::ExamParseError;
use crate::model::{Choice, ExamInfo, ParsedExam, Question, QuestionType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Circled-digit choice markers used throughout Korean exam PDFs.
const CIRCLED_DIGITS: [char; 5] = ['①', '②', '③', '④', '⑤'];

static IMAGE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[IMAGE:").unwrap());
static TABLE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[TABLE:").unwrap());

/// Project raw structuring JSON into a `ParsedExam`, repairing tolerable
/// defects and rejecting only irreparable ones (§4.4).
pub fn project(raw: &Value) -> Result<ParsedExam, ExamParseError> {
    let info_raw = raw.get("info").ok_or_else(|| schema_err("missing top-level 'info' object"))?;
    let questions_raw = raw
        .get("questions")
        .and_then(Value::as_array)
        .ok_or_else(|| schema_err("missing top-level 'questions' array"))?;

    let mut questions: Vec<Question> = questions_raw
        .iter()
        .map(project_question)
        .collect::<Result<_, _>>()?;

    reject_duplicate_numbers(&questions)?;
    normalize_groups_by_passage(&mut questions);

    let total_questions = questions.len();
    let info = ExamInfo {
        title: coerce_string(info_raw.get("title")).unwrap_or_default(),
        year: info_raw.get("year").and_then(coerce_i64).map(|v| v as i32),
        month: info_raw.get("month").and_then(coerce_i64).map(|v| v as u8),
        grade: info_raw.get("grade").and_then(coerce_i64).map(|v| v as u8),
        subject: coerce_string(info_raw.get("subject")).unwrap_or_default(),
        total_questions,
    };

    Ok(ParsedExam { info, questions })
}

fn project_question(raw: &Value) -> Result<Question, ExamParseError> {
    let number = raw
        .get("number")
        .and_then(coerce_i64)
        .ok_or_else(|| schema_err("question missing 'number'"))? as u32;

    let question_type_tag = coerce_string(raw.get("question_type"))
        .ok_or_else(|| schema_err(&format!("question {number} missing 'question_type'")))?;
    let question_type = QuestionType::from_tag(question_type_tag.trim())
        .ok_or_else(|| schema_err(&format!("question {number} has unknown question_type '{question_type_tag}'")))?;

    let question_text = coerce_string(raw.get("question_text")).unwrap_or_default().trim().to_string();
    if question_text.is_empty() && question_type != QuestionType::Listening {
        return Err(schema_err(&format!(
            "question {number} has empty question_text and is not a listening question"
        )));
    }

    let passage = coerce_string(raw.get("passage")).unwrap_or_default().trim().to_string();

    let choices = project_choices(raw.get("choices"))?;
    if !question_type.is_mcq_exempt() && choices.len() < 5 {
        return Err(schema_err(&format!(
            "question {number} ({question_type}) has {} choices after repair, fewer than the 5 required",
            choices.len()
        )));
    }

    let points = raw
        .get("points")
        .and_then(coerce_i64)
        .filter(|p| (1..=5).contains(p))
        .unwrap_or(2) as u8;

    let vocabulary_notes = raw
        .get("vocabulary_notes")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(coerce_string).collect())
        .unwrap_or_default();

    let has_image = raw
        .get("has_image")
        .and_then(Value::as_bool)
        .unwrap_or_else(|| IMAGE_MARKER.is_match(&question_text) || IMAGE_MARKER.is_match(&passage));
    let has_table = raw
        .get("has_table")
        .and_then(Value::as_bool)
        .unwrap_or_else(|| TABLE_MARKER.is_match(&question_text) || TABLE_MARKER.is_match(&passage));

    let sub_questions: Vec<Question> = raw
        .get("sub_questions")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(project_question).collect::<Result<_, _>>())
        .transpose()?
        .unwrap_or_default();

    let group_range = if !sub_questions.is_empty() {
        let min = sub_questions.iter().map(|q| q.number).min().unwrap_or(number);
        let max = sub_questions.iter().map(|q| q.number).max().unwrap_or(number);
        Some((min.min(number), max.max(number)))
    } else {
        raw.get("group_range")
            .and_then(Value::as_array)
            .filter(|arr| arr.len() == 2)
            .and_then(|arr| Some((coerce_i64(&arr[0])? as u32, coerce_i64(&arr[1])? as u32)))
    };

    Ok(Question {
        number,
        question_type,
        question_text,
        passage,
        choices,
        points,
        vocabulary_notes,
        has_image,
        has_table,
        sub_questions,
        group_range,
        explanation: None,
    })
}

/// Parse a `choices` field that may already be a well-formed array of
/// `{number, text}` objects, or a single string blob to split on circled
/// digits (§4.4 rule 4).
fn project_choices(raw: Option<&Value>) -> Result<Vec<Choice>, ExamParseError> {
    match raw {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(arr)) => arr
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let number = c
                    .get("number")
                    .and_then(coerce_i64)
                    .map(|n| n as u8)
                    .unwrap_or((i + 1) as u8);
                let text = coerce_string(c.get("text"))
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                if text.is_empty() {
                    return Err(schema_err(&format!("choice {number} has empty text")));
                }
                Ok(Choice { number, text })
            })
            .collect(),
        Some(Value::String(blob)) => Ok(split_choice_blob(blob)),
        Some(other) => Err(schema_err(&format!("'choices' has unexpected shape: {other}"))),
    }
}

/// Split a blob like `"① apple ② banana ③ cherry ④ date ⑤ elderberry"` on
/// circled-digit markers, renumbering 1–5 in order of appearance.
fn split_choice_blob(blob: &str) -> Vec<Choice> {
    let mut choices = Vec::new();
    let mut current = String::new();
    let mut started = false;

    for ch in blob.chars() {
        if CIRCLED_DIGITS.contains(&ch) {
            if started && !current.trim().is_empty() {
                choices.push(current.trim().to_string());
            }
            current = String::new();
            started = true;
        } else if started {
            current.push(ch);
        }
    }
    if started && !current.trim().is_empty() {
        choices.push(current.trim().to_string());
    }

    choices
        .into_iter()
        .enumerate()
        .map(|(i, text)| Choice {
            number: (i + 1) as u8,
            text,
        })
        .collect()
}

fn reject_duplicate_numbers(questions: &[Question]) -> Result<(), ExamParseError> {
    let mut seen = std::collections::HashSet::new();
    for q in questions {
        if !seen.insert(q.number) {
            return Err(schema_err(&format!("duplicate question number {}", q.number)));
        }
    }
    Ok(())
}

/// Detect runs of consecutive questions sharing an identical passage of
/// at least 20 characters and assign them a common `group_range`, when the
/// raw JSON expressed grouping via repeated passages rather than
/// `sub_questions` (§4.4 rule 3, second clause).
fn normalize_groups_by_passage(questions: &mut [Question]) {
    let mut i = 0;
    while i < questions.len() {
        if questions[i].group_range.is_some() || questions[i].passage.chars().count() < 20 {
            i += 1;
            continue;
        }
        let passage = questions[i].passage.clone();
        let mut j = i + 1;
        while j < questions.len() && questions[j].passage == passage {
            j += 1;
        }
        if j - i > 1 {
            let first = questions[i].number;
            let last = questions[j - 1].number;
            for q in &mut questions[i..j] {
                q.group_range = Some((first, last));
            }
        }
        i = j;
    }
}

fn coerce_string(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn schema_err(detail: &str) -> ExamParseError {
    ExamParseError::SchemaError(detail.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mcq_choices() -> Value {
        json!([
            {"number": 1, "text": "a"},
            {"number": 2, "text": "b"},
            {"number": 3, "text": "c"},
            {"number": 4, "text": "d"},
            {"number": 5, "text": "e"},
        ])
    }

    #[test]
    fn projects_minimal_valid_exam() {
        let raw = json!({
            "info": {"title": "2024 수능", "year": 2024, "month": 11, "grade": 3, "subject": "영어"},
            "questions": [{
                "number": 18,
                "question_type": "목적",
                "question_text": "What is the purpose?",
                "passage": "Dear Sir, ...",
                "choices": mcq_choices(),
                "points": 2
            }]
        });
        let exam = project(&raw).unwrap();
        assert_eq!(exam.info.total_questions, 1);
        assert_eq!(exam.questions[0].number, 18);
        assert_eq!(exam.questions[0].choices.len(), 5);
    }

    #[test]
    fn rejects_duplicate_numbers() {
        let raw = json!({
            "info": {"title": "t", "subject": "영어"},
            "questions": [
                {"number": 1, "question_type": "듣기", "question_text": "q", "passage": "", "choices": mcq_choices()},
                {"number": 1, "question_type": "듣기", "question_text": "q2", "passage": "", "choices": mcq_choices()},
            ]
        });
        assert!(matches!(project(&raw), Err(ExamParseError::SchemaError(_))));
    }

    #[test]
    fn rejects_mcq_with_too_few_choices() {
        let raw = json!({
            "info": {"title": "t", "subject": "영어"},
            "questions": [{
                "number": 20, "question_type": "목적", "question_text": "q",
                "passage": "p", "choices": [{"number": 1, "text": "a"}]
            }]
        });
        assert!(project(&raw).is_err());
    }

    #[test]
    fn splits_choice_blob_on_circled_digits() {
        let choices = split_choice_blob("① apple ② banana ③ cherry ④ date ⑤ elderberry");
        assert_eq!(choices.len(), 5);
        assert_eq!(choices[0].text, "apple");
        assert_eq!(choices[4].number, 5);
    }

    #[test]
    fn defaults_points_when_out_of_range() {
        let raw = json!({
            "info": {"title": "t", "subject": "영어"},
            "questions": [{
                "number": 21, "question_type": "목적", "question_text": "q",
                "passage": "p", "choices": mcq_choices(), "points": 99
            }]
        });
        let exam = project(&raw).unwrap();
        assert_eq!(exam.questions[0].points, 2);
    }

    #[test]
    fn groups_consecutive_questions_sharing_long_passage() {
        let long_passage = "a".repeat(25);
        let raw = json!({
            "info": {"title": "t", "subject": "영어"},
            "questions": [
                {"number": 41, "question_type": "주제/요지", "question_text": "q1", "passage": long_passage, "choices": mcq_choices()},
                {"number": 42, "question_type": "제목", "question_text": "q2", "passage": long_passage, "choices": mcq_choices()},
            ]
        });
        let exam = project(&raw).unwrap();
        assert_eq!(exam.questions[0].group_range, Some((41, 42)));
        assert_eq!(exam.questions[1].group_range, Some((41, 42)));
    }

    #[test]
    fn derives_has_image_from_markdown_marker_when_absent() {
        let raw = json!({
            "info": {"title": "t", "subject": "영어"},
            "questions": [{
                "number": 30, "question_type": "도표", "question_text": "q",
                "passage": "[IMAGE: page=3, caption=chart]", "choices": mcq_choices()
            }]
        });
        let exam = project(&raw).unwrap();
        assert!(exam.questions[0].has_image);
    }
}
