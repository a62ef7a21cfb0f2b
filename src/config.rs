//! Process-wide configuration (C9).
//!
//! All tunables are collected into [`AppConfig`], built via
//! [`AppConfig::builder()`] or loaded once at process start with
//! [`AppConfig::from_env()`]. Keeping every knob in one struct makes it easy
//! to share the config across the CLI and HTTP binaries, log it, and diff
//! two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-plus-field constructor is unreadable and breaks on every new
//! field. The builder lets callers set only what they care about and rely
//! on well-documented defaults for the rest, validating everything in one
//! place at `.build()` time rather than deferring validation to first use.

use crate::error::ExamParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Process-wide configuration for the parsing pipeline and HTTP service.
///
/// # Example
/// ```rust
/// use exam_pdf_parser::config::AppConfig;
///
/// let config = AppConfig::builder()
///     .max_concurrent_parses(4)
///     .max_file_size_mb(50)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AppConfig {
    /// Default model spec `{parser}+{llm}` when the caller does not name one.
    pub default_model_spec: String,

    /// Rendering DPI used when a document-parser variant needs rasterised
    /// pages rather than native text. Range 72–400. Default: 200.
    pub dpi: u32,

    /// Maximum rendered image dimension in pixels, same rationale as the
    /// DPI cap: bounds memory independent of physical page size.
    pub max_rendered_pixels: u32,

    /// Number of worker tasks processing jobs concurrently. Default: 4.
    ///
    /// Document-parser inference and LLM calls are both either CPU- or
    /// network-bound, never both idle at once; four workers keeps pipeline
    /// latency reasonable without oversubscribing a single host's model
    /// weights.
    pub max_concurrent_parses: usize,

    /// Maximum jobs waiting behind the worker pool before `QueueFull`. Default: 32.
    pub max_queue_depth: usize,

    /// TTL for completed/failed jobs before the reaper discards them. Default: 1 hour.
    pub job_ttl_secs: u64,

    /// Maximum retry attempts on a transient LLM failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 2000.
    ///
    /// Doubles after each attempt, capped at `retry_backoff_cap_ms`: 2s → 4s
    /// → 8s … avoiding a thundering herd against a recovering provider.
    pub retry_backoff_ms: u64,

    /// Upper bound on the exponential backoff delay. Default: 30_000 (30s).
    pub retry_backoff_cap_ms: u64,

    /// Per-attempt LLM call timeout in seconds for the flash-tier model. Default: 120.
    pub llm_timeout_flash_secs: u64,

    /// Per-attempt LLM call timeout in seconds for the pro-tier model. Default: 300.
    pub llm_timeout_pro_secs: u64,

    /// Reject uploads above this size before consuming memory. Default: 50.
    pub max_file_size_mb: u64,

    /// Comma-separated API keys accepted on `X-API-Key` / `api_key`. Empty disables auth.
    pub api_keys: Vec<String>,

    /// Sustained request rate allowed per API key per minute. Default: 60.
    pub rate_limit_per_minute: u32,

    /// Allowed CORS origins for the HTTP service. Empty means same-origin only.
    pub cors_origins: Vec<String>,

    /// Whether to run the Explainer (C6) by default when a request omits the flag.
    pub explain_by_default: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model_spec: "mineru+gemini-3-pro-preview".to_string(),
            dpi: 200,
            max_rendered_pixels: 2000,
            max_concurrent_parses: 4,
            max_queue_depth: 32,
            job_ttl_secs: 3600,
            max_retries: 3,
            retry_backoff_ms: 2000,
            retry_backoff_cap_ms: 30_000,
            llm_timeout_flash_secs: 120,
            llm_timeout_pro_secs: 300,
            max_file_size_mb: 50,
            api_keys: Vec::new(),
            rate_limit_per_minute: 60,
            cors_origins: Vec::new(),
            explain_by_default: true,
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("default_model_spec", &self.default_model_spec)
            .field("dpi", &self.dpi)
            .field("max_concurrent_parses", &self.max_concurrent_parses)
            .field("max_queue_depth", &self.max_queue_depth)
            .field("job_ttl_secs", &self.job_ttl_secs)
            .field("max_retries", &self.max_retries)
            .field("max_file_size_mb", &self.max_file_size_mb)
            .field("api_keys", &self.api_keys.iter().map(|_| "<redacted>").collect::<Vec<_>>())
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

impl AppConfig {
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load configuration from the environment variables listed in the
    /// external-interfaces table: `API_KEYS`, `RATE_LIMIT_PER_MINUTE`,
    /// `MAX_CONCURRENT_PARSES`, `MAX_FILE_SIZE_MB`, `CORS_ORIGINS`. Also
    /// checks that `GOOGLE_API_KEY` (required per §6) is present; its value
    /// isn't read here — `edgequake_llm`'s `ProviderFactory` reads it
    /// directly when a Gemini provider is constructed — this only fails
    /// fast at startup rather than on the first request. `OPENAI_API_KEY`
    /// is optional and is not checked: only the `gpt-5.1` variant needs it.
    pub fn from_env() -> Result<Self, ExamParseError> {
        let mut builder = Self::builder();

        if std::env::var("GOOGLE_API_KEY").unwrap_or_default().is_empty() {
            return Err(ExamParseError::InvalidConfig(
                "GOOGLE_API_KEY is required (see §6); set it before starting the service".to_string(),
            ));
        }

        if let Ok(v) = std::env::var("API_KEYS") {
            builder = builder.api_keys(v.split(',').map(str::trim).filter(|s| !s.is_empty()));
        }
        if let Ok(v) = std::env::var("RATE_LIMIT_PER_MINUTE") {
            let n: u32 = v
                .parse()
                .map_err(|_| ExamParseError::InvalidConfig(format!("RATE_LIMIT_PER_MINUTE '{v}' is not a u32")))?;
            builder = builder.rate_limit_per_minute(n);
        }
        if let Ok(v) = std::env::var("MAX_CONCURRENT_PARSES") {
            let n: usize = v
                .parse()
                .map_err(|_| ExamParseError::InvalidConfig(format!("MAX_CONCURRENT_PARSES '{v}' is not a usize")))?;
            builder = builder.max_concurrent_parses(n);
        }
        if let Ok(v) = std::env::var("MAX_FILE_SIZE_MB") {
            let n: u64 = v
                .parse()
                .map_err(|_| ExamParseError::InvalidConfig(format!("MAX_FILE_SIZE_MB '{v}' is not a u64")))?;
            builder = builder.max_file_size_mb(n);
        }
        if let Ok(v) = std::env::var("CORS_ORIGINS") {
            builder = builder.cors_origins(v.split(',').map(str::trim).filter(|s| !s.is_empty()));
        }

        builder.build()
    }
}

/// Builder for [`AppConfig`].
#[derive(Debug)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn default_model_spec(mut self, spec: impl Into<String>) -> Self {
        self.config.default_model_spec = spec.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn max_concurrent_parses(mut self, n: usize) -> Self {
        self.config.max_concurrent_parses = n.max(1);
        self
    }

    pub fn max_queue_depth(mut self, n: usize) -> Self {
        self.config.max_queue_depth = n;
        self
    }

    pub fn job_ttl_secs(mut self, secs: u64) -> Self {
        self.config.job_ttl_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn retry_backoff_cap_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_cap_ms = ms;
        self
    }

    pub fn max_file_size_mb(mut self, mb: u64) -> Self {
        self.config.max_file_size_mb = mb;
        self
    }

    pub fn api_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.api_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn rate_limit_per_minute(mut self, n: u32) -> Self {
        self.config.rate_limit_per_minute = n;
        self
    }

    pub fn cors_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.cors_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn explain_by_default(mut self, v: bool) -> Self {
        self.config.explain_by_default = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AppConfig, ExamParseError> {
        let c = &self.config;
        if c.max_concurrent_parses == 0 {
            return Err(ExamParseError::InvalidConfig(
                "max_concurrent_parses must be >= 1".into(),
            ));
        }
        if c.max_file_size_mb == 0 {
            return Err(ExamParseError::InvalidConfig(
                "max_file_size_mb must be >= 1".into(),
            ));
        }
        Ok(self.config)
    }
}

/// A `{parser}+{llm}` model spec, split and validated by the Orchestrator (§4.7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub parser: String,
    pub llm: String,
}

impl ModelSpec {
    pub fn parse(spec: &str) -> Result<Self, ExamParseError> {
        let (parser, llm) = spec.split_once('+').ok_or_else(|| ExamParseError::ConfigError {
            spec: spec.to_string(),
            detail: "expected '{parser}+{llm}', e.g. 'mineru+gemini-3-pro-preview'".to_string(),
        })?;
        if parser.is_empty() || llm.is_empty() {
            return Err(ExamParseError::ConfigError {
                spec: spec.to_string(),
                detail: "parser and llm components must both be non-empty".to_string(),
            });
        }
        Ok(ModelSpec {
            parser: parser.to_string(),
            llm: llm.to_string(),
        })
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.parser, self.llm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_spec_splits_on_first_plus() {
        let spec = ModelSpec::parse("mineru+gemini-3-pro-preview").unwrap();
        assert_eq!(spec.parser, "mineru");
        assert_eq!(spec.llm, "gemini-3-pro-preview");
    }

    #[test]
    fn model_spec_rejects_missing_separator() {
        assert!(ModelSpec::parse("mineru").is_err());
    }

    #[test]
    fn model_spec_rejects_empty_component() {
        assert!(ModelSpec::parse("+gemini-3-pro-preview").is_err());
        assert!(ModelSpec::parse("mineru+").is_err());
    }

    #[test]
    fn builder_clamps_dpi() {
        let config = AppConfig::builder().dpi(1000).build().unwrap();
        assert_eq!(config.dpi, 400);
    }

    #[test]
    fn builder_clamps_zero_concurrency_to_one() {
        let config = AppConfig::builder().max_concurrent_parses(0).build().unwrap();
        assert_eq!(config.max_concurrent_parses, 1);
    }
}
