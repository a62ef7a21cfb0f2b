//! Orchestrator (C7): wires C2 through C6 into one `parse` call.
//!
//! `tracing::info_span!` brackets each layer, the way the teacher's
//! `convert()` logs at each of its ten numbered steps; an optional
//! [`OrchestratorProgress`] callback is threaded through exactly like
//! `edgequake-pdf2md::progress::ConversionProgressCallback`.

use crate::config::{AppConfig, ModelSpec};
use crate::error::ExamParseError;
use crate::model::{CostReport, ParsedExam, ValidationResult};
use crate::pipeline::document_parser::{self, DocumentParserConfig, ParserVariant};
use crate::pipeline::llm_client::LlmVariant;
use crate::pipeline::{explainer, llm_client, schema_projector, validator};
use crate::progress::{NoopProgress, OrchestratorProgress};
use crate::prompts;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info_span, Instrument};

/// Per-call options that adjust the Orchestrator's behavior without
/// touching process-wide [`AppConfig`] defaults.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Run the Explainer (C6) after validation. Defaults to
    /// `AppConfig::explain_by_default` when left unset by a caller.
    pub explain: bool,
    pub document_parser_config: DocumentParserConfig,
}

/// Run the full pipeline: `model_spec` → (parsed exam, validation, cost).
pub async fn parse(
    pdf_path: &Path,
    model_spec: &str,
    options: &ParseOptions,
    config: &AppConfig,
    progress: Option<Arc<dyn OrchestratorProgress>>,
) -> Result<(ParsedExam, ValidationResult, CostReport), ExamParseError> {
    let progress = progress.unwrap_or_else(|| Arc::new(NoopProgress));
    let mut cost = CostReport::default();

    progress.on_parse_start(model_spec);

    let spec = match ModelSpec::parse(model_spec)
        .and_then(|s| Ok((ParserVariant::from_str(&s.parser)?, LlmVariant::parse(&s.llm)?)))
    {
        Ok(v) => v,
        Err(e) => {
            progress.on_parse_complete(false);
            return Err(e);
        }
    };
    let (parser_variant, llm_variant) = spec;

    let parser_config = DocumentParserConfig {
        max_rendered_pixels: config.max_rendered_pixels,
        ..options.document_parser_config.clone()
    };
    let markdown = match run_layer(&progress, "document_parser", async {
        let mut parser = document_parser::create_parser(parser_variant, parser_config);
        parser.set_pdf_path(pdf_path.to_path_buf());
        let extraction = parser.extract_from_pdf().await?;
        for w in &extraction.warnings {
            tracing::warn!("document_parser: {w}");
        }
        Ok(extraction.markdown)
    })
    .await
    {
        Ok((md, elapsed)) => {
            cost.record_layer("document_parser", elapsed);
            md
        }
        Err(e) => {
            progress.on_parse_complete(false);
            return Err(e);
        }
    };

    let provider = match llm_client::create_provider(llm_variant) {
        Ok(p) => p,
        Err(e) => {
            progress.on_parse_complete(false);
            return Err(e);
        }
    };

    let raw_json = match run_layer(
        &progress,
        "llm_client",
        llm_client::structure(
            &provider,
            &markdown,
            &prompts::schema_prompt(),
            config.max_retries,
            config.retry_backoff_ms,
            config.retry_backoff_cap_ms,
        ),
    )
    .await
    {
        Ok((result, elapsed)) => {
            cost.record_layer("llm_client", elapsed);
            cost.input_tokens += result.input_tokens;
            cost.output_tokens += result.output_tokens;
            cost.retry_count += result.retries;
            result.raw_json
        }
        Err(e) => {
            progress.on_parse_complete(false);
            return Err(e);
        }
    };

    let projected = match run_layer(&progress, "schema_projector", async { schema_projector::project(&raw_json) })
        .await
    {
        Ok((exam, elapsed)) => {
            cost.record_layer("schema_projector", elapsed);
            exam
        }
        Err(e) => {
            progress.on_parse_complete(false);
            return Err(e);
        }
    };

    let (validation, elapsed) = run_layer(&progress, "validator", async { Ok(validator::validate(&projected)) })
        .await
        .expect("validator never returns Err");
    cost.record_layer("validator", elapsed);

    let should_explain = options.explain || config.explain_by_default;

    let exam = if should_explain {
        let explain_start = Instant::now();
        progress.on_layer_start("explainer");
        let result = explainer::add_explanations(projected, &provider).await;
        cost.input_tokens += result.input_tokens;
        cost.output_tokens += result.output_tokens;
        cost.record_layer("explainer", explain_start.elapsed());
        progress.on_layer_complete("explainer", explain_start.elapsed().as_millis() as u64);
        if result.degraded {
            tracing::warn!("explainer degraded; returning exam without explanations");
        }
        result.exam
    } else {
        projected
    };

    let (price_in, price_out) = llm_variant.price_per_million();
    cost.estimated_cost_usd =
        (cost.input_tokens as f64 / 1_000_000.0) * price_in + (cost.output_tokens as f64 / 1_000_000.0) * price_out;

    progress.on_parse_complete(true);

    Ok((exam, validation, cost))
}

/// Run one layer inside an `info_span`, firing progress events and
/// returning its result alongside the elapsed wall-clock time so the
/// caller can fold it into the shared [`CostReport`] without fighting the
/// borrow checker over a mutable reference held across an `.await`.
async fn run_layer<T, Fut>(
    progress: &Arc<dyn OrchestratorProgress>,
    name: &'static str,
    fut: Fut,
) -> Result<(T, std::time::Duration), ExamParseError>
where
    Fut: std::future::Future<Output = Result<T, ExamParseError>>,
{
    let span = info_span!("orchestrator.layer", layer = name);
    progress.on_layer_start(name);
    let start = Instant::now();

    let result = fut.instrument(span).await;
    let elapsed = start.elapsed();

    match &result {
        Ok(_) => progress.on_layer_complete(name, elapsed.as_millis() as u64),
        Err(e) => progress.on_layer_error(name, e.to_string()),
    }

    result.map(|v| (v, elapsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_options_default_does_not_force_explain() {
        let options = ParseOptions::default();
        assert!(!options.explain);
    }
}
