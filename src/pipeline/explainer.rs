//! Explainer (C6): batch one-shot explanation of eligible questions.
//!
//! A single LLM call per document, built from every question for which
//! [`Question::is_explainable`] holds. Any failure degrades gracefully —
//! the exam is returned exactly as given, never partially annotated
//! (§4.6's idempotence and graceful-degradation rules).

use crate::model::ParsedExam;
use crate::prompts;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

/// Result of an explanation pass: the (possibly unchanged) exam plus
/// token accounting for the Orchestrator's cost report.
pub struct ExplainResult {
    pub exam: ParsedExam,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub degraded: bool,
}

/// Annotate every explainable question in `exam` with a three-part
/// explanation. Overwrites any prior explanation (idempotent). On any
/// failure, returns `exam` unchanged with `degraded: true`.
pub async fn add_explanations(mut exam: ParsedExam, provider: &Arc<dyn LLMProvider>) -> ExplainResult {
    let eligible: Vec<usize> = exam
        .questions
        .iter()
        .enumerate()
        .filter(|(_, q)| q.is_explainable())
        .map(|(i, _)| i)
        .collect();

    if eligible.is_empty() {
        return ExplainResult {
            exam,
            input_tokens: 0,
            output_tokens: 0,
            degraded: false,
        };
    }

    let payload: Vec<Value> = eligible
        .iter()
        .map(|&i| {
            let q = &exam.questions[i];
            json!({
                "number": q.number,
                "question_type": q.question_type.as_tag(),
                "question_text": q.question_text,
                "passage": q.passage,
                "choices": q.choices,
            })
        })
        .collect();

    let questions_json = match serde_json::to_string(&payload) {
        Ok(s) => s,
        Err(e) => {
            warn!("failed to serialise explainer payload: {e}");
            return ExplainResult {
                exam,
                input_tokens: 0,
                output_tokens: 0,
                degraded: true,
            };
        }
    };

    let prompt = prompts::explainer_prompt(&questions_json);
    let messages = vec![ChatMessage::user(&prompt)];
    let options = CompletionOptions {
        temperature: Some(prompts::EXPLAINER_TEMPERATURE),
        max_tokens: Some(prompts::EXPLAINER_MAX_TOKENS),
        ..Default::default()
    };

    let response = match provider.chat(&messages, Some(&options)).await {
        Ok(r) => r,
        Err(e) => {
            warn!("explainer call failed, returning exam unchanged: {e}");
            return ExplainResult {
                exam,
                input_tokens: 0,
                output_tokens: 0,
                degraded: true,
            };
        }
    };

    let cleaned = strip_fences(&response.content);
    let explanations: std::collections::HashMap<String, String> = match serde_json::from_str(cleaned) {
        Ok(map) => map,
        Err(e) => {
            warn!("explainer reply was not the expected JSON map, returning exam unchanged: {e}");
            return ExplainResult {
                exam,
                input_tokens: response.prompt_tokens as u64,
                output_tokens: response.completion_tokens as u64,
                degraded: true,
            };
        }
    };

    for &i in &eligible {
        let number = exam.questions[i].number.to_string();
        if let Some(explanation) = explanations.get(&number) {
            exam.questions[i].explanation = Some(explanation.clone());
        }
    }

    ExplainResult {
        exam,
        input_tokens: response.prompt_tokens as u64,
        output_tokens: response.completion_tokens as u64,
        degraded: false,
    }
}

fn strip_fences(input: &str) -> &str {
    let trimmed = input.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.strip_suffix("```").unwrap_or(s))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_fences_handles_json_fence() {
        assert_eq!(strip_fences("```json\n{\"1\":\"x\"}\n```"), "{\"1\":\"x\"}");
    }

    #[test]
    fn strip_fences_passthrough() {
        assert_eq!(strip_fences("{\"1\":\"x\"}"), "{\"1\":\"x\"}");
    }
}
