//! API key middleware (C10): checked against `AppConfig::api_keys`.
//!
//! Disabled entirely when no keys are configured, per §6's
//! "otherwise auth is disabled" rule.

use crate::server::error::ApiError;
use crate::server::state::AppState;
use axum::extract::{Extension, Request};
use axum::middleware::Next;
use axum::response::Response;

pub async fn require_api_key(Extension(state): Extension<AppState>, req: Request, next: Next) -> Result<Response, ApiError> {
    if state.config.api_keys.is_empty() {
        return Ok(next.run(req).await);
    }

    let header_key = req.headers().get("X-API-Key").and_then(|v| v.to_str().ok());
    let query_key = req.uri().query().and_then(|q| {
        q.split('&')
            .find_map(|pair| pair.strip_prefix("api_key=").map(str::to_string))
    });

    let supplied = header_key.map(str::to_string).or(query_key);

    match supplied {
        Some(key) if state.config.api_keys.iter().any(|k| k == &key) => Ok(next.run(req).await),
        _ => Err(ApiError::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn auth_disabled_when_no_keys_configured() {
        let state = AppState::new(AppConfig::default());
        assert!(state.config.api_keys.is_empty());
    }
}
