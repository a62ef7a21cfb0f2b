//! HTTP service (C10): an axum app fronting the pipeline's sync and async
//! entry points. See [`router::build_router`] for the route table.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
