//! Validator (C5): structural and semantic checks over a `ParsedExam`.
//!
//! Never mutates its input and never raises — every finding is appended
//! to a [`ValidationResult`] as either an error or a warning, stable-coded
//! so callers and tests can assert on a specific check rather than a
//! message string (§4.5).

use crate::model::{ParsedExam, Question, QuestionType, ValidationResult};
use std::collections::HashMap;

const LISTENING_MIN: u32 = 1;
const LISTENING_MAX: u32 = 17;

/// Run every check in §4.5 over `exam`, returning the combined result.
pub fn validate(exam: &ParsedExam) -> ValidationResult {
    let mut result = ValidationResult::default();

    check_schema_completeness(exam, &mut result);
    check_numbering(exam, &mut result);
    check_choices(exam, &mut result);
    check_listening(exam, &mut result);
    check_groups(exam, &mut result);
    check_content_quality(exam, &mut result);

    result
}

fn check_schema_completeness(exam: &ParsedExam, result: &mut ValidationResult) {
    for q in &exam.questions {
        if !(1..=5).contains(&q.points) {
            result.push_error(
                "V-SCHEMA-001",
                Some(q.number),
                format!("points {} outside [1,5]", q.points),
            );
        }
        // V-SCHEMA-002 (question_type one of the 22 tags) is enforced by the
        // type system at projection time; unreachable here by construction.
        if q.question_text.trim().is_empty() && q.question_type != QuestionType::Listening {
            result.push_error("V-SCHEMA-003", Some(q.number), "question_text is empty");
        }
    }
}

fn check_numbering(exam: &ParsedExam, result: &mut ValidationResult) {
    let mut prev: Option<u32> = None;
    for q in &exam.questions {
        if let Some(p) = prev {
            if q.number <= p {
                result.push_error(
                    "V-NUM-001",
                    Some(q.number),
                    format!("number {} does not strictly increase after {p}", q.number),
                );
            }
        }
        prev = Some(q.number);
    }

    if let Some(max_number) = exam.questions.iter().map(|q| q.number).max() {
        let present: std::collections::HashSet<u32> = exam.questions.iter().map(|q| q.number).collect();
        let missing: Vec<u32> = (1..=max_number).filter(|n| !present.contains(n)).collect();
        if !missing.is_empty() {
            result.push_warning(
                "V-NUM-002",
                None,
                format!("question numbers missing from [1,{max_number}]: {missing:?}"),
            );
        }
    }

    if exam.info.total_questions != exam.questions.len() {
        result.push_error(
            "V-NUM-003",
            None,
            format!(
                "total_questions ({}) != len(questions) ({})",
                exam.info.total_questions,
                exam.questions.len()
            ),
        );
    }
}

fn check_choices(exam: &ParsedExam, result: &mut ValidationResult) {
    for q in &exam.questions {
        if q.question_type.is_mcq_exempt() {
            continue;
        }
        if q.choices.len() != 5 {
            result.push_error(
                "V-CHOICE-001",
                Some(q.number),
                format!("expected 5 choices, found {}", q.choices.len()),
            );
        }

        let numbers: std::collections::BTreeSet<u8> = q.choices.iter().map(|c| c.number).collect();
        if numbers != std::collections::BTreeSet::from([1, 2, 3, 4, 5]) {
            result.push_error(
                "V-CHOICE-002",
                Some(q.number),
                format!("choice numbers {numbers:?} != {{1,2,3,4,5}}"),
            );
        }

        for c in &q.choices {
            if c.text.trim().is_empty() {
                result.push_error("V-CHOICE-003", Some(q.number), format!("choice {} has empty text", c.number));
            }
        }

        let mut seen_text = HashMap::new();
        for c in &q.choices {
            if let Some(prior) = seen_text.insert(&c.text, c.number) {
                result.push_error(
                    "V-CHOICE-004",
                    Some(q.number),
                    format!("choices {prior} and {} have duplicate text", c.number),
                );
            }
        }
    }
}

fn check_listening(exam: &ParsedExam, result: &mut ValidationResult) {
    for q in &exam.questions {
        let in_listening_range = (LISTENING_MIN..=LISTENING_MAX).contains(&q.number);

        if q.question_type == QuestionType::Listening && !in_listening_range {
            result.push_error(
                "V-LIST-001",
                Some(q.number),
                format!("listening question numbered {} outside [1,17]", q.number),
            );
        }
        if in_listening_range && q.question_type != QuestionType::Listening {
            result.push_warning(
                "V-LIST-002",
                Some(q.number),
                format!("question {} is in [1,17] but tagged {}, not 듣기", q.number, q.question_type),
            );
        }
        if q.question_type == QuestionType::Listening && !q.passage.is_empty() {
            result.push_error("V-LIST-003", Some(q.number), "listening question has non-empty passage");
        }
    }
}

fn check_groups(exam: &ParsedExam, result: &mut ValidationResult) {
    let by_number: HashMap<u32, &Question> = exam.questions.iter().map(|q| (q.number, q)).collect();

    for q in &exam.questions {
        let Some((first, last)) = q.group_range else { continue };

        for n in first..=last {
            if !by_number.contains_key(&n) {
                result.push_error(
                    "V-GROUP-001",
                    Some(q.number),
                    format!("group ({first},{last}) references missing question {n}"),
                );
                continue;
            }
            if by_number[&n].group_range != Some((first, last)) {
                result.push_error(
                    "V-GROUP-001",
                    Some(q.number),
                    format!("question {n} does not carry the same group_range ({first},{last})"),
                );
            }
        }

        if let Some(first_q) = by_number.get(&first) {
            if first_q.passage.trim().is_empty() {
                result.push_error(
                    "V-GROUP-002",
                    Some(first),
                    format!("first member of group ({first},{last}) has an empty passage"),
                );
            }
        }
    }
}

fn check_content_quality(exam: &ParsedExam, result: &mut ValidationResult) {
    let mut seen_text: HashMap<&str, u32> = HashMap::new();
    for q in &exam.questions {
        if let Some(prior) = seen_text.insert(&q.question_text, q.number) {
            if !q.question_text.trim().is_empty() {
                result.push_warning(
                    "V-QUAL-001",
                    Some(q.number),
                    format!("question_text duplicates question {prior}"),
                );
            }
        }

        let passage_requiring = !matches!(
            q.question_type,
            QuestionType::Listening | QuestionType::Grammar | QuestionType::Vocabulary
        );
        if passage_requiring && q.passage.chars().count() < 20 {
            result.push_warning(
                "V-QUAL-002",
                Some(q.number),
                format!("passage is only {} characters for a passage-requiring type", q.passage.chars().count()),
            );
        }

        if q.has_image && !q.passage.contains("[IMAGE:") && !q.question_text.contains("[IMAGE:") {
            result.push_warning("V-QUAL-003", Some(q.number), "has_image is true but no [IMAGE: marker found");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Choice, ExamInfo};

    fn base_question(number: u32) -> Question {
        Question {
            number,
            question_type: QuestionType::Purpose,
            question_text: format!("question {number}"),
            passage: "x".repeat(30),
            choices: (1..=5).map(|n| Choice { number: n, text: format!("choice {n}") }).collect(),
            points: 2,
            vocabulary_notes: Vec::new(),
            has_image: false,
            has_table: false,
            sub_questions: Vec::new(),
            group_range: None,
            explanation: None,
        }
    }

    fn exam(questions: Vec<Question>) -> ParsedExam {
        let total_questions = questions.len();
        ParsedExam {
            info: ExamInfo {
                title: "t".to_string(),
                year: None,
                month: None,
                grade: None,
                subject: "영어".to_string(),
                total_questions,
            },
            questions,
        }
    }

    #[test]
    fn clean_exam_has_no_errors() {
        let result = validate(&exam(vec![base_question(18), base_question(19)]));
        assert!(result.is_valid(), "{:?}", result.errors);
    }

    #[test]
    fn flags_out_of_range_points() {
        let mut q = base_question(18);
        q.points = 9;
        let result = validate(&exam(vec![q]));
        assert!(result.errors.iter().any(|e| e.code == "V-SCHEMA-001"));
    }

    #[test]
    fn flags_non_increasing_numbers() {
        let result = validate(&exam(vec![base_question(20), base_question(19)]));
        assert!(result.errors.iter().any(|e| e.code == "V-NUM-001"));
    }

    #[test]
    fn warns_on_gaps_without_erroring() {
        let result = validate(&exam(vec![base_question(18), base_question(20)]));
        assert!(result.warnings.iter().any(|w| w.code == "V-NUM-002"));
        assert!(result.is_valid());
    }

    #[test]
    fn flags_wrong_choice_count() {
        let mut q = base_question(18);
        q.choices.truncate(3);
        let result = validate(&exam(vec![q]));
        assert!(result.errors.iter().any(|e| e.code == "V-CHOICE-001"));
    }

    #[test]
    fn listening_outside_range_is_an_error() {
        let mut q = base_question(18);
        q.question_type = QuestionType::Listening;
        q.passage = String::new();
        q.choices = (1..=5).map(|n| Choice { number: n, text: format!("c{n}") }).collect();
        let result = validate(&exam(vec![q]));
        assert!(result.errors.iter().any(|e| e.code == "V-LIST-001"));
    }

    #[test]
    fn non_listening_in_range_is_warning_only() {
        let result = validate(&exam(vec![base_question(5)]));
        assert!(result.warnings.iter().any(|w| w.code == "V-LIST-002"));
        assert!(result.is_valid());
    }

    #[test]
    fn group_member_missing_is_an_error() {
        let mut q1 = base_question(41);
        q1.group_range = Some((41, 42));
        let result = validate(&exam(vec![q1]));
        assert!(result.errors.iter().any(|e| e.code == "V-GROUP-001"));
    }
}
