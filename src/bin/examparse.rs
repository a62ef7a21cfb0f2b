//! CLI binary for exam-pdf-parser.
//!
//! A thin shim over the library crate: maps flags to an [`AppConfig`] and
//! [`ParseOptions`], runs [`orchestrator::parse`], and prints the result.

use anyhow::Context;
use clap::Parser;
use exam_pdf_parser::config::AppConfig;
use exam_pdf_parser::orchestrator::{self, ParseOptions};
use exam_pdf_parser::pipeline::document_parser::{DocumentParserConfig, ParserVariant};
use exam_pdf_parser::pipeline::llm_client::LlmVariant;
use exam_pdf_parser::pipeline::validator;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Parse a Korean high-school exam PDF into validated, structured JSON.
#[derive(Parser, Debug)]
#[command(name = "examparse", version, about = "Parse Korean exam PDFs into structured JSON")]
struct Cli {
    /// Local PDF file path.
    input: Option<PathBuf>,

    /// Model spec `{parser}+{llm}`, e.g. mineru+gemini-3-pro-preview.
    #[arg(short, long, env = "EXAMPARSE_MODEL")]
    model: Option<String>,

    /// Write JSON output to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run validation and exit non-zero on errors.
    #[arg(long)]
    validate: bool,

    /// Cross-reference an answer key file in Markdown (unscored otherwise).
    #[arg(long)]
    answer_key: Option<PathBuf>,

    /// List available `{parser}+{llm}` model specs and exit.
    #[arg(long)]
    list_models: bool,

    /// List available document-parser variants and exit.
    #[arg(long)]
    list_ocr: bool,

    /// Skip the Explainer layer (C6).
    #[arg(long)]
    skip_explain: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    if cli.list_models {
        for parser in ParserVariant::ALL {
            for llm in LlmVariant::ALL {
                println!("{}+{}", parser.name(), llm.model_name());
            }
        }
        return ExitCode::SUCCESS;
    }

    if cli.list_ocr {
        for parser in ParserVariant::ALL {
            println!("{}", parser.name());
        }
        return ExitCode::SUCCESS;
    }

    match run(&cli).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<i32> {
    let input = cli.input.as_ref().context("PDF path is required unless --list-models/--list-ocr is given")?;

    let config = AppConfig::builder().explain_by_default(!cli.skip_explain).build().context("invalid configuration")?;

    let model_spec = cli.model.clone().unwrap_or_else(|| config.default_model_spec.clone());

    let options = ParseOptions {
        explain: !cli.skip_explain,
        document_parser_config: DocumentParserConfig::default(),
    };

    let result = orchestrator::parse(input, &model_spec, &options, &config, None).await;

    let (exam, validation) = match result {
        Ok((exam, validation, _cost)) => (exam, validation),
        Err(e) => {
            eprintln!("{}: {e}", e.kind());
            return Ok(e.exit_code());
        }
    };

    let validation = if cli.validate { validator::validate(&exam) } else { validation };

    let json = serde_json::to_string_pretty(&serde_json::json!({ "exam": exam, "validation": validation }))
        .context("failed to serialise output")?;

    if let Some(ref path) = cli.output {
        std::fs::write(path, &json).with_context(|| format!("failed to write {path:?}"))?;
    } else {
        println!("{json}");
    }

    if cli.validate && !validation.is_valid() {
        for err in &validation.errors {
            eprintln!("{}: {}", err.code, err.message);
        }
        return Ok(4);
    }

    Ok(0)
}
