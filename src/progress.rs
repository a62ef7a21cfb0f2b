//! Progress-callback trait for per-layer orchestration events.
//!
//! Inject an [`Arc<dyn OrchestratorProgress>`] into [`crate::orchestrator::parse`]
//! to receive events as the pipeline moves through C2–C6. All methods have
//! default no-op implementations so callers only override what they need.
//! `Send + Sync` and owned `String` error payloads throughout, so the trait
//! object can cross the `spawn_blocking`/`tokio::spawn` boundary used by the
//! rasteriser and the job worker pool without fighting higher-ranked trait
//! bounds on borrowed data (the same reason the teacher's page-level
//! callback switched `on_page_error`'s argument from `&str` to `String`).

use std::sync::Arc;

/// Called by the Orchestrator as it moves a document through each layer.
pub trait OrchestratorProgress: Send + Sync {
    /// Called once before any layer runs.
    fn on_parse_start(&self, model_spec: &str) {
        let _ = model_spec;
    }

    /// Called when a named layer (`"document_parser"`, `"llm_client"`,
    /// `"schema_projector"`, `"validator"`, `"explainer"`) begins.
    fn on_layer_start(&self, layer: &str) {
        let _ = layer;
    }

    /// Called when a named layer finishes successfully.
    fn on_layer_complete(&self, layer: &str, elapsed_ms: u64) {
        let _ = (layer, elapsed_ms);
    }

    /// Called when a layer fails fatally. No further layers will run.
    fn on_layer_error(&self, layer: &str, error: String) {
        let _ = (layer, error);
    }

    /// Called once after the pipeline finishes, successfully or not.
    fn on_parse_complete(&self, success: bool) {
        let _ = success;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl OrchestratorProgress for NoopProgress {}

/// Convenience alias matching the type threaded through [`crate::orchestrator`].
pub type ProgressCallback = Arc<dyn OrchestratorProgress>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn noop_progress_does_not_panic() {
        let p = NoopProgress;
        p.on_parse_start("mineru+gemini-3-pro-preview");
        p.on_layer_start("document_parser");
        p.on_layer_complete("document_parser", 120);
        p.on_layer_error("llm_client", "timeout".to_string());
        p.on_parse_complete(false);
    }

    struct TrackingProgress {
        layer_starts: Arc<AtomicUsize>,
        errors: Arc<Mutex<Vec<String>>>,
    }

    impl OrchestratorProgress for TrackingProgress {
        fn on_layer_start(&self, _layer: &str) {
            self.layer_starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_layer_error(&self, _layer: &str, error: String) {
            self.errors.lock().unwrap().push(error);
        }
    }

    #[test]
    fn tracking_progress_counts_layer_starts() {
        let tracker = TrackingProgress {
            layer_starts: Arc::new(AtomicUsize::new(0)),
            errors: Arc::new(Mutex::new(Vec::new())),
        };
        tracker.on_layer_start("document_parser");
        tracker.on_layer_start("llm_client");
        assert_eq!(tracker.layer_starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn progress_callback_is_send_across_spawn() {
        let tracker: Arc<dyn OrchestratorProgress> = Arc::new(TrackingProgress {
            layer_starts: Arc::new(AtomicUsize::new(0)),
            errors: Arc::new(Mutex::new(Vec::new())),
        });

        let t = Arc::clone(&tracker);
        tokio::spawn(async move {
            t.on_layer_start("document_parser");
            t.on_layer_error("llm_client", "quota exceeded".to_string());
        })
        .await
        .unwrap();
    }
}
