//! Job Manager (C8): bounded worker pool backing the async HTTP API.
//!
//! A `tokio::sync::mpsc` submission channel feeds `MAX_CONCURRENT_PARSES`
//! worker tasks; a `Mutex<HashMap<JobId, ParseJob>>` job table is read and
//! written only for the instant needed to copy a state in or out — no I/O
//! ever runs while the lock is held. A `tokio::time::interval` reaper
//! evicts completed/failed jobs once their TTL elapses.

use crate::config::AppConfig;
use crate::error::ExamParseError;
use crate::model::{JobState, ParseJob};
use crate::orchestrator::{self, ParseOptions};
use crate::progress::OrchestratorProgress;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Owns the uploaded PDF for the lifetime of the job. `pdf_path` is a
/// `tempfile::TempPath` rather than a bare `PathBuf` so the file is removed
/// automatically when this struct (and thus the job) is dropped at the end
/// of `worker_loop`'s iteration — covering both the success and failure
/// match arms without an explicit `remove_file` call.
struct SubmittedJob {
    id: String,
    pdf_path: tempfile::TempPath,
    model_spec: String,
    options: ParseOptions,
}

/// Handle shared by every caller (HTTP handlers, tests) that wants to
/// submit or poll jobs. Cheap to clone: everything inside is `Arc`.
#[derive(Clone)]
pub struct JobManager {
    table: Arc<Mutex<HashMap<String, ParseJob>>>,
    tx: mpsc::Sender<SubmittedJob>,
    queue_depth_limit: usize,
    queued: Arc<std::sync::atomic::AtomicUsize>,
}

impl JobManager {
    /// Spawn `config.max_concurrent_parses` worker tasks and a reaper,
    /// returning a handle that can be cloned freely.
    pub fn spawn(config: Arc<AppConfig>) -> Self {
        let (tx, rx) = mpsc::channel::<SubmittedJob>(config.max_queue_depth);
        let table: Arc<Mutex<HashMap<String, ParseJob>>> = Arc::new(Mutex::new(HashMap::new()));
        let queued = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        for worker_id in 0..config.max_concurrent_parses {
            let rx = Arc::clone(&rx);
            let table = Arc::clone(&table);
            let config = Arc::clone(&config);
            let queued = Arc::clone(&queued);
            tokio::spawn(async move {
                worker_loop(worker_id, rx, table, config, queued).await;
            });
        }

        spawn_reaper(Arc::clone(&table), config.job_ttl_secs);

        JobManager {
            table,
            tx,
            queue_depth_limit: config.max_queue_depth,
            queued,
        }
    }

    /// Enqueue a parse job, returning its id immediately. Fails with
    /// `QueueFull` if the channel's buffer (sized to `MAX_QUEUE_DEPTH`) is
    /// already saturated.
    pub async fn submit(
        &self,
        pdf_path: tempfile::TempPath,
        model_spec: String,
        options: ParseOptions,
    ) -> Result<String, ExamParseError> {
        let depth = self.queued.load(std::sync::atomic::Ordering::SeqCst);
        if depth >= self.queue_depth_limit {
            return Err(ExamParseError::QueueFull {
                depth,
                limit: self.queue_depth_limit,
            });
        }

        let id = uuid::Uuid::new_v4().to_string();
        {
            let mut table = self.table.lock().unwrap();
            table.insert(
                id.clone(),
                ParseJob {
                    id: id.clone(),
                    state: JobState::Pending,
                    created_at: Utc::now(),
                    completed_at: None,
                    result: None,
                    validation: None,
                    error: None,
                    model_spec: model_spec.clone(),
                },
            );
        }

        self.queued.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.tx
            .send(SubmittedJob {
                id: id.clone(),
                pdf_path,
                model_spec,
                options,
            })
            .await
            .map_err(|_| ExamParseError::Internal("job channel closed; no workers running".to_string()))?;

        Ok(id)
    }

    /// Look up a job by id. Returns `None` if it never existed or its TTL
    /// already elapsed.
    pub fn get(&self, job_id: &str) -> Option<ParseJob> {
        self.table.lock().unwrap().get(job_id).cloned()
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<SubmittedJob>>>,
    table: Arc<Mutex<HashMap<String, ParseJob>>>,
    config: Arc<AppConfig>,
    queued: Arc<std::sync::atomic::AtomicUsize>,
) {
    loop {
        let job = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            info!("worker {worker_id}: submission channel closed, exiting");
            return;
        };
        queued.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);

        transition(&table, &job.id, JobState::Running, |_| {});

        let progress: Option<Arc<dyn OrchestratorProgress>> = None;
        let result = orchestrator::parse(&job.pdf_path, &job.model_spec, &job.options, &config, progress).await;

        match result {
            Ok((exam, validation, _cost)) => {
                transition(&table, &job.id, JobState::Done, |j| {
                    j.result = Some(exam.clone());
                    j.validation = Some(validation.clone());
                    j.completed_at = Some(Utc::now());
                });
            }
            Err(e) => {
                warn!("worker {worker_id}: job {} failed: {e}", job.id);
                transition(&table, &job.id, JobState::Failed, |j| {
                    j.error = Some(e.to_string());
                    j.completed_at = Some(Utc::now());
                });
            }
        }
        // `job` (and its `TempPath`) drops here, deleting the uploaded PDF
        // regardless of which arm above ran.
    }
}

fn transition(table: &Mutex<HashMap<String, ParseJob>>, job_id: &str, state: JobState, mutate: impl FnOnce(&mut ParseJob)) {
    let mut table = table.lock().unwrap();
    if let Some(job) = table.get_mut(job_id) {
        job.state = state;
        mutate(job);
    }
}

fn spawn_reaper(table: Arc<Mutex<HashMap<String, ParseJob>>>, ttl_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60.min(ttl_secs.max(1))));
        loop {
            interval.tick().await;
            let now = Utc::now();
            let mut table = table.lock().unwrap();
            table.retain(|_, job| match job.completed_at {
                Some(completed) => (now - completed).num_seconds() < ttl_secs as i64,
                None => true,
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_job_id_returns_none() {
        let config = Arc::new(AppConfig::default());
        let manager = JobManager::spawn(config);
        assert!(manager.get("does-not-exist").is_none());
    }

    #[tokio::test]
    async fn submit_creates_a_pending_or_later_job_record() {
        let config = Arc::new(AppConfig::builder().max_concurrent_parses(1).build().unwrap());
        let manager = JobManager::spawn(config);
        let id = manager
            .submit(
                tempfile::TempPath::from_path("/nonexistent.pdf"),
                "native+gemini-3-flash-preview".to_string(),
                ParseOptions::default(),
            )
            .await
            .unwrap();
        let job = manager.get(&id).unwrap();
        assert_eq!(job.id, id);
    }
}
