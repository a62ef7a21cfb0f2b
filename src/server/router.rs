//! Route table (C10), grounded on `ktiyab-coheara::api::router::mobile_api_router`:
//! routes nested under `/api`, an `Extension<AppState>` layer outermost so
//! `from_fn` middleware (which runs on `Router<()>`, no `State` access) can
//! still reach it, and `tower-http`'s tracing/CORS layers wrapping the whole
//! thing.

use crate::server::handlers;
use crate::server::state::AppState;
use crate::server::{auth, middleware};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let cors = if state.config.cors_origins.is_empty() {
        CorsLayer::new()
    } else {
        let origins: Vec<axum::http::HeaderValue> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    let api = Router::new()
        .route("/models", get(handlers::list_models))
        .route("/parse", post(handlers::parse_sync))
        .route("/parse/async", post(handlers::parse_async))
        .route("/jobs/{job_id}", get(handlers::get_job))
        .route("/validate", post(handlers::validate_exam))
        .with_state(state.clone())
        .layer(axum::middleware::from_fn(middleware::rate_limit))
        .layer(axum::middleware::from_fn(auth::require_api_key))
        .layer(axum::Extension(state.clone()));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_requires_no_auth() {
        let state = AppState::new(AppConfig::default());
        let app = build_router(state);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn api_route_rejects_missing_key_when_configured() {
        let config = AppConfig::builder().api_keys(["secret"]).build().unwrap();
        let state = AppState::new(config);
        let app = build_router(state);
        let response = app
            .oneshot(Request::builder().uri("/api/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn api_route_open_when_no_keys_configured() {
        let state = AppState::new(AppConfig::default());
        let app = build_router(state);
        let response = app
            .oneshot(Request::builder().uri("/api/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_job_returns_404() {
        let state = AppState::new(AppConfig::default());
        let app = build_router(state);
        let response = app
            .oneshot(Request::builder().uri("/api/jobs/does-not-exist").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
