//! Route handlers (C10). Each named after the route it serves; business
//! logic stays in [`crate::orchestrator`] and [`crate::job_manager`] —
//! handlers only translate between HTTP and those calls.

use crate::error::ExamParseError;
use crate::model::{ParsedExam, ValidationResult};
use crate::orchestrator::{self, ParseOptions};
use crate::pipeline::document_parser::ParserVariant;
use crate::pipeline::llm_client::LlmVariant;
use crate::pipeline::validator;
use crate::server::error::ApiError;
use crate::server::state::AppState;
use axum::extract::{Json, Multipart, Path, State};
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::json;
use std::io::Write;

#[derive(Serialize)]
pub struct HealthBody {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> impl IntoResponse {
    Json(HealthBody {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct ModelEntry {
    spec: String,
    price_input_per_million: f64,
    price_output_per_million: f64,
}

pub async fn list_models() -> impl IntoResponse {
    let entries: Vec<ModelEntry> = ParserVariant::ALL
        .iter()
        .flat_map(|parser| {
            LlmVariant::ALL.iter().map(move |llm| {
                let (price_input, price_output) = llm.price_per_million();
                ModelEntry {
                    spec: format!("{}+{}", parser.name(), llm.model_name()),
                    price_input_per_million: price_input,
                    price_output_per_million: price_output,
                }
            })
        })
        .collect();
    Json(entries)
}

struct UploadedFile {
    path: tempfile::TempPath,
    model_spec: String,
}

/// Pull `file` and `model` fields out of a multipart body, writing the
/// upload to a managed temp file (mirrors the teacher's
/// `convert::convert_from_bytes`, which buffers caller-supplied bytes into a
/// `tempfile::NamedTempFile` rather than a hand-named path). Rejects
/// non-PDF content types and oversized bodies before buffering the rest of
/// the stream. The returned `TempPath` deletes the file on drop, whether
/// the caller consumes it synchronously or hands it to the job manager.
async fn receive_upload(state: &AppState, mut multipart: Multipart) -> Result<UploadedFile, ApiError> {
    let mut model_spec: Option<String> = None;
    let mut saved_path: Option<tempfile::TempPath> = None;
    let limit_bytes = state.config.max_file_size_mb * 1024 * 1024;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadMultipart(e.to_string()))?
    {
        match field.name() {
            Some("model") => {
                model_spec = Some(field.text().await.map_err(|e| ApiError::BadMultipart(e.to_string()))?);
            }
            Some("file") => {
                let content_type = field.content_type().unwrap_or("").to_string();
                if content_type != "application/pdf" {
                    return Err(ApiError::Parse(ExamParseError::UnsupportedMediaType { content_type }));
                }

                let bytes = field.bytes().await.map_err(|e| ApiError::BadMultipart(e.to_string()))?;
                if bytes.len() as u64 > limit_bytes {
                    return Err(ApiError::Parse(ExamParseError::FileTooLarge {
                        size_mb: bytes.len() as u64 / (1024 * 1024),
                        limit_mb: state.config.max_file_size_mb,
                    }));
                }

                let mut tmp = tempfile::Builder::new()
                    .prefix("examparse-")
                    .suffix(".pdf")
                    .tempfile()
                    .map_err(|e| ApiError::Parse(ExamParseError::Internal(format!("creating temp file: {e}"))))?;
                tmp.write_all(&bytes).map_err(|e| {
                    ApiError::Parse(ExamParseError::Internal(format!("writing upload: {e}")))
                })?;
                saved_path = Some(tmp.into_temp_path());
            }
            _ => {}
        }
    }

    let path = saved_path.ok_or_else(|| ApiError::BadMultipart("missing 'file' field".to_string()))?;
    Ok(UploadedFile {
        path,
        model_spec: model_spec.unwrap_or_else(|| "mineru+gemini-3-pro-preview".to_string()),
    })
}

pub async fn parse_sync(State(state): State<AppState>, multipart: Multipart) -> Result<impl IntoResponse, ApiError> {
    let upload = receive_upload(&state, multipart).await?;

    let result = orchestrator::parse(&upload.path, &upload.model_spec, &ParseOptions::default(), &state.config, None).await;
    // `upload.path` is a `tempfile::TempPath`; it deletes the file when dropped at
    // the end of this scope, whether `result` is `Ok` or `Err`.

    let (exam, validation, _cost) = result.map_err(ApiError::Parse)?;
    Ok(Json(json!({ "exam": exam, "validation": validation })))
}

pub async fn parse_async(State(state): State<AppState>, multipart: Multipart) -> Result<impl IntoResponse, ApiError> {
    let upload = receive_upload(&state, multipart).await?;
    let job_id = state
        .jobs
        .submit(upload.path, upload.model_spec, ParseOptions::default())
        .await
        .map_err(ApiError::Parse)?;
    Ok(Json(json!({ "job_id": job_id })))
}

pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    match state.jobs.get(&job_id) {
        Some(job) => Ok(Json(job)),
        None => Err(ApiError::Parse(ExamParseError::JobNotFound(job_id))),
    }
}

pub async fn validate_exam(Json(exam): Json<ParsedExam>) -> Json<ValidationResult> {
    Json(validator::validate(&exam))
}
