//! Shared axum state (C10): one `Arc<AppState>` cloned into every handler.

use crate::config::AppConfig;
use crate::job_manager::JobManager;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jobs: JobManager,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let jobs = JobManager::spawn(Arc::clone(&config));
        let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(config.rate_limit_per_minute)));
        AppState { config, jobs, rate_limiter }
    }
}

/// Per-key sliding-window rate limiter, grounded on
/// `ktiyab-coheara::api::types::RateLimiter` (per-minute window only —
/// §6 names a single `RATE_LIMIT_PER_MINUTE` knob, not an hourly tier).
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
}

impl RateLimiter {
    pub fn new(per_minute: u32) -> Self {
        RateLimiter {
            windows: HashMap::new(),
            per_minute,
        }
    }

    /// `Ok(())` if `key` is within its budget, else `Err(retry_after_secs)`.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        let entries = self.windows.entry(key.to_string()).or_default();
        entries.retain(|ts| now.duration_since(*ts) < Duration::from_secs(60));

        if entries.len() as u32 >= self.per_minute {
            return Err(60);
        }

        entries.push(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_requests_under_the_limit() {
        let mut limiter = RateLimiter::new(2);
        assert!(limiter.check("k").is_ok());
        assert!(limiter.check("k").is_ok());
        assert_eq!(limiter.check("k"), Err(60));
    }

    #[test]
    fn tracks_keys_independently() {
        let mut limiter = RateLimiter::new(1);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("b").is_ok());
        assert_eq!(limiter.check("a"), Err(60));
    }
}
