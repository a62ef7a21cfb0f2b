//! HTTP service binary (C10): binds `examparse-server` and serves
//! [`exam_pdf_parser::server::build_router`], grounded on
//! `ktiyab-coheara::api::server::start_mobile_api_server_on`'s
//! bind-then-`axum::serve` shape.

use exam_pdf_parser::config::AppConfig;
use exam_pdf_parser::server::{build_router, AppState};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    let addr: SocketAddr = std::env::var("EXAMPARSE_HTTP_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;

    let state = AppState::new(config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "examparse-server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
