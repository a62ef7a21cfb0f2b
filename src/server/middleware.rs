//! Rate-limiting middleware (C10), grounded on
//! `ktiyab-coheara::api::middleware::rate::limit`.

use crate::server::error::ApiError;
use crate::server::state::AppState;
use axum::extract::{Extension, Request};
use axum::middleware::Next;
use axum::response::Response;

fn rate_key(req: &Request) -> String {
    req.headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| "anonymous".to_string())
}

pub async fn rate_limit(Extension(state): Extension<AppState>, req: Request, next: Next) -> Result<Response, ApiError> {
    let key = rate_key(&req);

    {
        // MutexGuard is !Send; dropped before `next.run(req).await`.
        let mut limiter = state.rate_limiter.lock().unwrap();
        limiter.check(&key).map_err(|retry_after| ApiError::RateLimited { retry_after })?;
    }

    Ok(next.run(req).await)
}
