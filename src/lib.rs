//! # exam-pdf-parser
//!
//! Turn a scanned Korean high-school English exam PDF into a validated,
//! structured JSON record of its questions.
//!
//! ## Pipeline overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ C2  Document Parser   rasterise + VLM transcription → Markdown
//!  ├─ C3  LLM Client        Markdown + schema prompt → raw JSON
//!  ├─ C4  Schema Projector  raw JSON → ParsedExam (coerce, repair, group)
//!  ├─ C5  Validator         ParsedExam → ValidationResult (never raises)
//!  └─ C6  Explainer         optional batch explanation pass
//! ```
//!
//! [`orchestrator::parse`] wires C2 through C6 into one call; the `examparse`
//! CLI and `examparse-server` HTTP service are thin frontends over it. An
//! async job mode ([`job_manager`]) lets the HTTP service hand back a job id
//! immediately and poll for completion.
//!
//! ## Feature flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `examparse` binary |
//! | `server` | on      | Enables the `examparse-server` binary (axum) |
//! | `bundled`| off     | Statically links pdfium instead of requiring a system install |

pub mod config;
pub mod error;
pub mod job_manager;
pub mod model;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod prompts;

#[cfg(feature = "server")]
pub mod server;

pub use config::{AppConfig, AppConfigBuilder, ModelSpec};
pub use error::ExamParseError;
pub use job_manager::JobManager;
pub use model::{
    Choice, CostReport, ExamInfo, GroupRange, JobState, ParseJob, ParsedExam, Question, QuestionType, Severity,
    ValidationMessage, ValidationResult,
};
pub use orchestrator::{parse, ParseOptions};
pub use progress::{NoopProgress, OrchestratorProgress, ProgressCallback};
