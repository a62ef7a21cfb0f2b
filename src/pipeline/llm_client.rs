//! LLM Client (C3): Markdown + schema prompt → raw structuring JSON.
//!
//! The only pipeline stage with network I/O. A single call per document:
//! the whole Markdown transcription goes in, one JSON object comes back.
//! Retry/backoff and code-fence stripping are grounded directly on
//! `edgequake-pdf2md::pipeline::llm::process_page`'s retry loop and
//! `pipeline::postprocess`'s fence-stripping regex, adapted from a
//! per-page loop to a per-document one.

use crate::error::ExamParseError;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Variants published by the `{llm}` half of `model_spec` (§4.3, §4.7),
/// each with a per-million-token price used for the Orchestrator's cost
/// estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmVariant {
    GeminiFlash,
    GeminiPro,
    Gpt51,
}

impl LlmVariant {
    pub const ALL: [LlmVariant; 3] = [LlmVariant::GeminiFlash, LlmVariant::GeminiPro, LlmVariant::Gpt51];

    pub fn parse(spec: &str) -> Result<Self, ExamParseError> {
        match spec {
            "gemini-3-flash-preview" => Ok(LlmVariant::GeminiFlash),
            "gemini-3-pro-preview" => Ok(LlmVariant::GeminiPro),
            "gpt-5.1" => Ok(LlmVariant::Gpt51),
            other => Err(ExamParseError::ConfigError {
                spec: other.to_string(),
                detail: "unknown LLM variant; expected one of gemini-3-flash-preview, gemini-3-pro-preview, gpt-5.1"
                    .to_string(),
            }),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            LlmVariant::GeminiFlash | LlmVariant::GeminiPro => "gemini",
            LlmVariant::Gpt51 => "openai",
        }
    }

    pub fn model_name(&self) -> &'static str {
        match self {
            LlmVariant::GeminiFlash => "gemini-3-flash-preview",
            LlmVariant::GeminiPro => "gemini-3-pro-preview",
            LlmVariant::Gpt51 => "gpt-5.1",
        }
    }

    /// USD per million input / output tokens, for the Orchestrator's
    /// [`crate::model::CostReport::estimated_cost_usd`].
    pub fn price_per_million(&self) -> (f64, f64) {
        match self {
            LlmVariant::GeminiFlash => (0.15, 0.60),
            LlmVariant::GeminiPro => (2.50, 10.00),
            LlmVariant::Gpt51 => (3.00, 12.00),
        }
    }

    /// Recommended request timeout: pro-class models get a longer budget.
    pub fn timeout_secs(&self, config: &crate::config::AppConfig) -> u64 {
        match self {
            LlmVariant::GeminiFlash => config.llm_timeout_flash_secs,
            LlmVariant::GeminiPro | LlmVariant::Gpt51 => config.llm_timeout_pro_secs,
        }
    }
}

/// The raw, still-unvalidated structuring output plus accounting the
/// Orchestrator folds into its [`crate::model::CostReport`].
pub struct StructureCallResult {
    pub raw_json: serde_json::Value,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub retries: u32,
}

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> &str {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        // `captures` borrows `trimmed`; `get(1)` gives back a sub-slice of it.
        return caps.get(1).map(|m| m.as_str()).unwrap_or(trimmed);
    }
    trimmed
}

/// Construct the configured provider for a variant, reading its API key
/// from the environment the way `edgequake-llm`'s named-provider path does.
pub fn create_provider(variant: LlmVariant) -> Result<Arc<dyn LLMProvider>, ExamParseError> {
    ProviderFactory::create_llm_provider(variant.provider_name(), variant.model_name()).map_err(|e| {
        ExamParseError::ProviderNotConfigured {
            provider: variant.provider_name().to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Send the full document Markdown plus the schema prompt, retrying on
/// transient failures with `base * 2^attempt` backoff (§4.3).
pub async fn structure(
    provider: &Arc<dyn LLMProvider>,
    markdown: &str,
    schema_prompt: &str,
    max_retries: u32,
    backoff_base_ms: u64,
    backoff_cap_ms: u64,
) -> Result<StructureCallResult, ExamParseError> {
    let messages = vec![ChatMessage::system(schema_prompt), ChatMessage::user(markdown)];
    let options = CompletionOptions {
        temperature: Some(crate::prompts::SCHEMA_TEMPERATURE),
        max_tokens: Some(crate::prompts::SCHEMA_MAX_TOKENS),
        ..Default::default()
    };

    let mut last_transport_err: Option<String> = None;
    let mut last_format_err: Option<String> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = (backoff_base_ms * 2u64.pow(attempt - 1)).min(backoff_cap_ms);
            warn!("structuring call: retry {}/{} after {}ms", attempt, max_retries, backoff);
            sleep(Duration::from_millis(backoff)).await;
        }

        let start = Instant::now();
        match provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                let cleaned = strip_code_fences(&response.content);
                match serde_json::from_str::<serde_json::Value>(cleaned) {
                    Ok(value) => {
                        debug!(
                            "structuring call succeeded in {:?} ({} in / {} out tokens)",
                            start.elapsed(),
                            response.prompt_tokens,
                            response.completion_tokens
                        );
                        return Ok(StructureCallResult {
                            raw_json: value,
                            input_tokens: response.prompt_tokens as u64,
                            output_tokens: response.completion_tokens as u64,
                            retries: attempt,
                        });
                    }
                    Err(e) => {
                        warn!("structuring call returned unparseable JSON on attempt {}: {e}", attempt + 1);
                        last_format_err = Some(e.to_string());
                    }
                }
            }
            Err(e) => {
                let msg = e.to_string();
                if is_quota_error(&msg) {
                    return Err(ExamParseError::LlmQuotaError {
                        provider: "llm".to_string(),
                        detail: msg,
                    });
                }
                warn!("structuring call transport failure on attempt {}: {msg}", attempt + 1);
                last_transport_err = Some(msg);
            }
        }
    }

    if let Some(detail) = last_format_err {
        return Err(ExamParseError::LlmFormatError {
            retries: max_retries,
            detail,
        });
    }

    Err(ExamParseError::LlmTransportError {
        retries: max_retries,
        detail: last_transport_err.unwrap_or_else(|| "unknown transport failure".to_string()),
    })
}

fn is_quota_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("quota") || lower.contains("billing") || lower.contains("insufficient_quota")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_variant_parses_known_specs() {
        assert_eq!(LlmVariant::parse("gemini-3-flash-preview").unwrap(), LlmVariant::GeminiFlash);
        assert_eq!(LlmVariant::parse("gpt-5.1").unwrap(), LlmVariant::Gpt51);
    }

    #[test]
    fn llm_variant_rejects_unknown_spec() {
        assert!(LlmVariant::parse("claude-4").is_err());
    }

    #[test]
    fn strip_code_fences_removes_json_fence() {
        let input = "```json\n{\"a\":1}\n```";
        assert_eq!(strip_code_fences(input), "{\"a\":1}");
    }

    #[test]
    fn strip_code_fences_passthrough_when_absent() {
        let input = "{\"a\":1}";
        assert_eq!(strip_code_fences(input), "{\"a\":1}");
    }

    #[test]
    fn is_quota_error_matches_common_phrasings() {
        assert!(is_quota_error("Error: insufficient_quota"));
        assert!(is_quota_error("You have exceeded your current quota"));
        assert!(!is_quota_error("connection reset by peer"));
    }
}
