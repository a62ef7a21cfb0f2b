//! Pipeline stages for PDF-to-`ParsedExam` conversion.
//!
//! Each submodule implements exactly one layer from the system overview.
//! Keeping stages separate makes each independently testable against a
//! fixture and lets a variant be swapped (a different document-parser
//! engine, a different LLM) without touching its neighbours.
//!
//! ## Data Flow
//!
//! ```text
//! rasterize ─▶ document_parser ─▶ llm_client ─▶ schema_projector ─▶ validator ─▶ explainer
//! (pdfium,      (C2: Markdown)     (C3: raw       (C4: ParsedExam)  (C5)         (C6)
//!  C1, only                          JSON)
//!  if a variant
//!  needs pages)
//! ```
//!
//! 1. [`rasterize`] — rasterise selected pages via pdfium (C1); runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 2. [`document_parser`] — PDF → structured Markdown (C2); pluggable
//!    engine with lazy model initialisation
//! 3. [`llm_client`] — Markdown + schema prompt → raw JSON (C3); the only
//!    stage with network I/O and retry/backoff
//! 4. [`schema_projector`] — raw JSON → validated `ParsedExam` (C4);
//!    repairs tolerable defects, rejects hard ones
//! 5. [`validator`] — structural/semantic invariants over the projected
//!    exam (C5); never mutates, only collects
//! 6. [`explainer`] — batch explanation call (C6); graceful degradation on
//!    any failure

pub mod document_parser;
pub mod explainer;
pub mod llm_client;
pub mod rasterize;
pub mod schema_projector;
pub mod validator;
