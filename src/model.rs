//! The exam domain model: [`ExamInfo`], [`Question`], [`Choice`], [`ParsedExam`],
//! [`ValidationResult`], [`ParseJob`], and [`CostReport`].
//!
//! These types cross every layer boundary in the pipeline unchanged — the
//! Schema Projector constructs them, the Validator inspects them without
//! mutating them, and the Explainer touches only [`Question::explanation`].
//! Keeping them in one module (rather than scattering them across the
//! layers that produce or consume them) makes the full shape of a parsed
//! exam visible in one place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The 22 question-type tags used across Korean CSAT-style English exams.
///
/// Exactly these variants exist; an unrecognised tag in upstream JSON is a
/// hard [`crate::error::ExamParseError::SchemaError`], not a warning — the
/// type system is the source of truth for "one of the 22 tags"
/// (`V-SCHEMA-002` in the validator is therefore unreachable for this field
/// and exists only to keep the check-code table complete for callers that
/// construct a `Question` directly rather than through the projector).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "듣기")]
    Listening,
    #[serde(rename = "어휘")]
    Vocabulary,
    #[serde(rename = "문법")]
    Grammar,
    #[serde(rename = "목적")]
    Purpose,
    #[serde(rename = "함의")]
    Implication,
    #[serde(rename = "주제/요지")]
    TopicGist,
    #[serde(rename = "제목")]
    Title,
    #[serde(rename = "심경변화")]
    MoodChange,
    #[serde(rename = "주장")]
    Claim,
    #[serde(rename = "빈칸")]
    Blank,
    #[serde(rename = "순서")]
    Order,
    #[serde(rename = "삽입")]
    Insertion,
    #[serde(rename = "요약")]
    Summary,
    #[serde(rename = "무관한문장")]
    IrrelevantSentence,
    #[serde(rename = "지칭")]
    Reference,
    #[serde(rename = "내용일치")]
    ContentMatch,
    #[serde(rename = "도표")]
    Chart,
    #[serde(rename = "장문")]
    LongPassage,
    #[serde(rename = "서술형")]
    FreeResponse,
    #[serde(rename = "오류수정")]
    ErrorCorrection,
    #[serde(rename = "배열")]
    Arrangement,
    #[serde(rename = "문장전환")]
    SentenceTransformation,
}

impl QuestionType {
    /// All 22 tags, in the order given in the domain glossary.
    pub const ALL: [QuestionType; 22] = [
        QuestionType::Listening,
        QuestionType::Vocabulary,
        QuestionType::Grammar,
        QuestionType::Purpose,
        QuestionType::Implication,
        QuestionType::TopicGist,
        QuestionType::Title,
        QuestionType::MoodChange,
        QuestionType::Claim,
        QuestionType::Blank,
        QuestionType::Order,
        QuestionType::Insertion,
        QuestionType::Summary,
        QuestionType::IrrelevantSentence,
        QuestionType::Reference,
        QuestionType::ContentMatch,
        QuestionType::Chart,
        QuestionType::LongPassage,
        QuestionType::FreeResponse,
        QuestionType::ErrorCorrection,
        QuestionType::Arrangement,
        QuestionType::SentenceTransformation,
    ];

    /// The Korean tag as it appears in upstream JSON and in prompts.
    pub fn as_tag(&self) -> &'static str {
        match self {
            QuestionType::Listening => "듣기",
            QuestionType::Vocabulary => "어휘",
            QuestionType::Grammar => "문법",
            QuestionType::Purpose => "목적",
            QuestionType::Implication => "함의",
            QuestionType::TopicGist => "주제/요지",
            QuestionType::Title => "제목",
            QuestionType::MoodChange => "심경변화",
            QuestionType::Claim => "주장",
            QuestionType::Blank => "빈칸",
            QuestionType::Order => "순서",
            QuestionType::Insertion => "삽입",
            QuestionType::Summary => "요약",
            QuestionType::IrrelevantSentence => "무관한문장",
            QuestionType::Reference => "지칭",
            QuestionType::ContentMatch => "내용일치",
            QuestionType::Chart => "도표",
            QuestionType::LongPassage => "장문",
            QuestionType::FreeResponse => "서술형",
            QuestionType::ErrorCorrection => "오류수정",
            QuestionType::Arrangement => "배열",
            QuestionType::SentenceTransformation => "문장전환",
        }
    }

    /// Parse a raw tag string from upstream JSON into a known variant.
    pub fn from_tag(tag: &str) -> Option<QuestionType> {
        Self::ALL.into_iter().find(|t| t.as_tag() == tag)
    }

    /// `true` for 듣기 and 서술형, which are exempt from the 5-choice MCQ rule.
    pub fn is_mcq_exempt(&self) -> bool {
        matches!(self, QuestionType::Listening | QuestionType::FreeResponse)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Exam-level metadata. Created once per parse by the Schema Projector and
/// immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamInfo {
    pub title: String,
    pub year: Option<i32>,
    pub month: Option<u8>,
    pub grade: Option<u8>,
    pub subject: String,
    pub total_questions: usize,
}

/// One answer choice. `number` is 1–5; `text` is always non-empty and
/// unique within its question's choice list after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub number: u8,
    pub text: String,
}

/// An inclusive question-number range shared by a grouped set, e.g. `(41, 42)`.
pub type GroupRange = (u32, u32);

/// One problem. See module docs for the invariants that bind adjacent
/// fields together (listening numbering, MCQ cardinality, group membership).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub number: u32,
    pub question_type: QuestionType,
    pub question_text: String,
    pub passage: String,
    pub choices: Vec<Choice>,
    pub points: u8,
    pub vocabulary_notes: Vec<String>,
    pub has_image: bool,
    pub has_table: bool,
    pub sub_questions: Vec<Question>,
    pub group_range: Option<GroupRange>,
    pub explanation: Option<String>,
}

impl Question {
    /// Whether this question is eligible for the Explainer (§4.6): not
    /// listening, and either a passage or at least one choice is present.
    pub fn is_explainable(&self) -> bool {
        self.question_type != QuestionType::Listening
            && (!self.passage.is_empty() || !self.choices.is_empty())
    }
}

/// A fully projected and (usually) validated exam: metadata plus ordered
/// questions. Only phase-(c) records (post-validation) cross the service
/// boundary per the lifecycle in §3.3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedExam {
    pub info: ExamInfo,
    pub questions: Vec<Question>,
}

/// Severity of a single validation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One structured validator message: a stable check code, a human message,
/// and the question it concerns (`None` for exam-wide checks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMessage {
    pub code: &'static str,
    pub severity: Severity,
    pub question_number: Option<u32>,
    pub message: String,
}

/// The result of running the Validator (C5) over a `ParsedExam`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationMessage>,
    pub warnings: Vec<ValidationMessage>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn push_error(&mut self, code: &'static str, question_number: Option<u32>, message: impl Into<String>) {
        self.errors.push(ValidationMessage {
            code,
            severity: Severity::Error,
            question_number,
            message: message.into(),
        });
    }

    pub(crate) fn push_warning(&mut self, code: &'static str, question_number: Option<u32>, message: impl Into<String>) {
        self.warnings.push(ValidationMessage {
            code,
            severity: Severity::Warning,
            question_number,
            message: message.into(),
        });
    }
}

/// Per-layer token accounting and timing, surfaced by the Orchestrator (§4.7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostReport {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated_cost_usd: f64,
    pub layer_timings_ms: Vec<(String, u64)>,
    pub retry_count: u32,
}

impl CostReport {
    pub(crate) fn record_layer(&mut self, name: &str, elapsed: Duration) {
        self.layer_timings_ms
            .push((name.to_string(), elapsed.as_millis() as u64));
    }
}

/// Lifecycle state of an asynchronous parse job (Job Manager, C8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Failed,
}

/// A queued or completed parse job, as returned by `GET /api/jobs/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseJob {
    pub id: String,
    pub state: JobState,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub result: Option<ParsedExam>,
    pub validation: Option<ValidationResult>,
    pub error: Option<String>,
    pub model_spec: String,
}
