//! End-to-end integration tests for exam-pdf-parser.
//!
//! Most tests here exercise the pipeline without any network calls —
//! Schema Projector → Validator, the Job Manager, and the HTTP router —
//! and always run. A handful of tests drive the full `orchestrator::parse`
//! pipeline against a real PDF fixture and real LLM credentials; those are
//! gated behind `E2E_ENABLED` the way this corpus gates live-API tests.
//!
//! Run the live subset with:
//!   E2E_ENABLED=1 GOOGLE_API_KEY=... cargo test --test e2e -- --nocapture

use exam_pdf_parser::config::AppConfig;
use exam_pdf_parser::model::{ParsedExam, ValidationResult};
use exam_pdf_parser::orchestrator::{self, ParseOptions};
use exam_pdf_parser::pipeline::validator;
use serde_json::json;
use std::path::PathBuf;

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip unless E2E_ENABLED is set and the named fixture exists.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test fixture not found: {}", p.display());
            return;
        }
        p
    }};
}

fn sample_raw_exam() -> serde_json::Value {
    json!({
        "info": {"title": "2024 수능 영어", "year": 2024, "month": 11, "grade": 3, "subject": "영어"},
        "questions": [
            {
                "number": 18,
                "question_type": "목적",
                "question_text": "What is the purpose of the letter?",
                "passage": "Dear Residents, we are writing to inform you ...",
                "choices": [
                    {"number": 1, "text": "to apologize"},
                    {"number": 2, "text": "to announce"},
                    {"number": 3, "text": "to request"},
                    {"number": 4, "text": "to complain"},
                    {"number": 5, "text": "to invite"}
                ],
                "points": 2
            },
            {
                "number": 1,
                "question_type": "듣기",
                "question_text": "",
                "passage": "",
                "choices": [
                    {"number": 1, "text": "a"},
                    {"number": 2, "text": "b"},
                    {"number": 3, "text": "c"},
                    {"number": 4, "text": "d"},
                    {"number": 5, "text": "e"}
                ],
                "points": 2
            }
        ]
    })
}

// ── Schema Projector → Validator, no network ────────────────────────────────

#[test]
fn project_then_validate_a_well_formed_exam() {
    let raw = sample_raw_exam();
    let exam = exam_pdf_parser::pipeline::schema_projector::project(&raw).expect("projection should succeed");
    assert_eq!(exam.info.total_questions, 2);

    let validation = validator::validate(&exam);
    assert!(validation.errors.is_empty(), "expected no validation errors, got {:?}", validation.errors);
}

#[test]
fn validate_exam_with_out_of_range_listening_number_reports_error() {
    let mut raw = sample_raw_exam();
    raw["questions"][1]["number"] = json!(99);
    let exam = exam_pdf_parser::pipeline::schema_projector::project(&raw).expect("projection should succeed");
    let validation = validator::validate(&exam);
    assert!(!validation.errors.is_empty(), "listening question 99 is out of the 1-17 range");
}

#[test]
fn validation_result_round_trips_through_json() {
    let exam: ParsedExam =
        serde_json::from_value(serde_json::to_value(
            exam_pdf_parser::pipeline::schema_projector::project(&sample_raw_exam()).unwrap(),
        ).unwrap())
        .expect("ParsedExam must round-trip through JSON");
    let validation: ValidationResult = validator::validate(&exam);
    let json = serde_json::to_string(&validation).expect("ValidationResult must serialise");
    let back: ValidationResult = serde_json::from_str(&json).expect("ValidationResult must deserialise");
    assert_eq!(back.errors.len(), validation.errors.len());
}

// ── Job Manager, no network ─────────────────────────────────────────────────

#[tokio::test]
async fn job_manager_reports_unknown_job_as_none() {
    let config = std::sync::Arc::new(AppConfig::default());
    let jobs = exam_pdf_parser::job_manager::JobManager::spawn(config);
    assert!(jobs.get("does-not-exist").is_none());
}

#[tokio::test]
async fn job_manager_submit_creates_a_tracked_job() {
    let config = std::sync::Arc::new(AppConfig::default());
    let jobs = exam_pdf_parser::job_manager::JobManager::spawn(config);

    // Nonexistent PDF path: the worker will fail fast, but submission itself
    // must succeed and the job must show up in the table immediately.
    let job_id = jobs
        .submit(
            tempfile::TempPath::from_path("/nonexistent.pdf"),
            "mineru+gemini-3-pro-preview".to_string(),
            ParseOptions::default(),
        )
        .await
        .expect("submit should succeed while queue has room");

    assert!(jobs.get(&job_id).is_some());
}

// ── HTTP router, no network ──────────────────────────────────────────────────

#[tokio::test]
async fn validate_endpoint_accepts_a_parsed_exam_and_returns_a_validation_result() {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    let state = exam_pdf_parser::server::AppState::new(AppConfig::default());
    let app = exam_pdf_parser::server::build_router(state);

    let exam = exam_pdf_parser::pipeline::schema_projector::project(&sample_raw_exam()).unwrap();
    let body = serde_json::to_string(&exam).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/validate")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn models_endpoint_lists_every_parser_llm_combination() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let state = exam_pdf_parser::server::AppState::new(AppConfig::default());
    let app = exam_pdf_parser::server::build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/api/models").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let entries: Vec<serde_json::Value> = serde_json::from_slice(&bytes).unwrap();
    // 4 parser variants * 3 LLM variants
    assert_eq!(entries.len(), 12);
}

// ── Live pipeline tests (need a real PDF + real LLM credentials) ───────────

#[tokio::test]
async fn parse_real_exam_pdf_end_to_end() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample_exam.pdf"));
    let config = AppConfig::default();

    let (exam, validation, cost) = orchestrator::parse(&path, "native+gemini-3-flash-preview", &ParseOptions::default(), &config, None)
        .await
        .expect("end-to-end parse should succeed");

    assert!(exam.info.total_questions > 0);
    assert!(cost.input_tokens > 0, "structuring call should have consumed input tokens");
    println!("validation: {} errors, {} warnings", validation.errors.len(), validation.warnings.len());
}
