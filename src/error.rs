//! Error types for exam-pdf-parser.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExamParseError`] — **Fatal**: the parse cannot proceed at all (bad
//!   input file, exhausted LLM retries, unrepairable schema violation).
//!   Returned as `Err(ExamParseError)` from the Orchestrator and every
//!   layer beneath it.
//!
//! * [`crate::model::ValidationResult`] — **Collected, not thrown**:
//!   Layer 5 never raises; structural and semantic problems are data,
//!   returned alongside a successfully parsed exam.
//!
//! The separation lets callers decide their own tolerance: abort on the
//! first fatal error, or publish a `ParsedExam` together with whatever
//! warnings the Validator collected.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors raised by the parsing pipeline.
///
/// Each variant maps to exactly one row of the error taxonomy; the HTTP
/// layer (`server::error::ApiError`) maps these onto status codes.
#[derive(Debug, Error)]
pub enum ExamParseError {
    // ── Input errors (C1, CLI, HTTP) ─────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The PDF has zero pages.
    #[error("PDF '{path}' has zero pages; nothing to parse.")]
    EmptyDocument { path: PathBuf },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Uploaded file exceeded `MAX_FILE_SIZE_MB`.
    #[error("Upload of {size_mb}MB exceeds the configured limit of {limit_mb}MB")]
    FileTooLarge { size_mb: u64, limit_mb: u64 },

    /// Uploaded content-type was not `application/pdf`.
    #[error("Unsupported content type '{content_type}'; expected application/pdf")]
    UnsupportedMediaType { content_type: String },

    // ── Document Parser errors (C2) ──────────────────────────────────────
    /// Model weights for the chosen parser variant could not be loaded.
    #[error("Document parser '{variant}' failed to initialise: {detail}\nOperator action required — check model weight availability.")]
    ParserInitError { variant: String, detail: String },

    /// Layout analysis failed on a specific page. Recoverable: downstream
    /// may proceed with partial Markdown if any pages succeeded.
    #[error("Document parser failed on page {page}: {detail}")]
    ParserRuntimeError { page: usize, detail: String },

    /// Every page failed; there is no partial Markdown to proceed with.
    #[error("Document parser produced no usable output: all {total} pages failed.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    // ── LLM Client errors (C3, C6) ───────────────────────────────────────
    /// The configured LLM provider is not initialised (missing API key, etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Network failure after retries exhausted.
    #[error("LLM transport failed after {retries} retries: {detail}")]
    LlmTransportError { retries: u32, detail: String },

    /// Non-retriable quota/billing condition reported by the provider.
    #[error("LLM quota exceeded for provider '{provider}': {detail}")]
    LlmQuotaError { provider: String, detail: String },

    /// Retries exhausted with output that still does not parse as JSON.
    #[error("LLM returned unparseable JSON after {retries} retries: {detail}")]
    LlmFormatError { retries: u32, detail: String },

    // ── Schema Projector errors (C4) ─────────────────────────────────────
    /// Irreparable schema violation — missing/duplicate number, missing
    /// stem, or an MCQ type with fewer than 5 choices after repair.
    #[error("Schema error: {0}")]
    SchemaError(String),

    // ── Job Manager errors (C8) ──────────────────────────────────────────
    /// The worker pool and its queue are both saturated.
    #[error("Job queue is full ({depth} jobs queued, limit {limit})")]
    QueueFull { depth: usize, limit: usize },

    /// Referenced job id does not exist (or its TTL has expired).
    #[error("Job '{0}' not found")]
    JobNotFound(String),

    // ── Orchestrator / config errors (C7, C9) ────────────────────────────
    /// `model_spec` named an unknown parser or LLM variant.
    #[error("Unknown model spec '{spec}': {detail}")]
    ConfigError { spec: String, detail: String },

    /// Builder validation failed (missing env var, out-of-range value).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to the pdfium shared library.
    #[error("Failed to bind to pdfium library: {0}\nSet LD_LIBRARY_PATH/DYLD_LIBRARY_PATH or enable the `bundled` feature.")]
    PdfiumBindingFailed(String),

    /// Could not write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExamParseError {
    /// The stable taxonomy name used in logs and the HTTP error body.
    pub fn kind(&self) -> &'static str {
        match self {
            ExamParseError::FileNotFound { .. }
            | ExamParseError::PermissionDenied { .. }
            | ExamParseError::NotAPdf { .. }
            | ExamParseError::EmptyDocument { .. }
            | ExamParseError::CorruptPdf { .. }
            | ExamParseError::PasswordRequired { .. }
            | ExamParseError::WrongPassword { .. }
            | ExamParseError::FileTooLarge { .. }
            | ExamParseError::UnsupportedMediaType { .. } => "InputError",
            ExamParseError::ParserInitError { .. } => "ParserInitError",
            ExamParseError::ParserRuntimeError { .. } | ExamParseError::AllPagesFailed { .. } => {
                "ParserRuntimeError"
            }
            ExamParseError::LlmTransportError { .. } => "LLMTransportError",
            ExamParseError::LlmQuotaError { .. } => "LLMQuotaError",
            ExamParseError::LlmFormatError { .. } => "LLMFormatError",
            ExamParseError::SchemaError(_) => "SchemaError",
            ExamParseError::QueueFull { .. } => "QueueFull",
            ExamParseError::JobNotFound(_) => "JobNotFound",
            ExamParseError::ConfigError { .. } | ExamParseError::InvalidConfig(_) => "ConfigError",
            ExamParseError::PdfiumBindingFailed(_) => "ConfigError",
            ExamParseError::OutputWriteFailed { .. } | ExamParseError::Internal(_) => "InternalError",
        }
    }

    /// CLI exit code per §6: 0 success, 2 input error, 3 LLM error, 4 validation error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExamParseError::FileNotFound { .. }
            | ExamParseError::PermissionDenied { .. }
            | ExamParseError::NotAPdf { .. }
            | ExamParseError::EmptyDocument { .. }
            | ExamParseError::CorruptPdf { .. }
            | ExamParseError::PasswordRequired { .. }
            | ExamParseError::WrongPassword { .. }
            | ExamParseError::FileTooLarge { .. }
            | ExamParseError::UnsupportedMediaType { .. }
            | ExamParseError::ConfigError { .. }
            | ExamParseError::InvalidConfig(_) => 2,
            ExamParseError::LlmTransportError { .. }
            | ExamParseError::LlmQuotaError { .. }
            | ExamParseError::LlmFormatError { .. } => 3,
            _ => 1,
        }
    }
}
