//! Docshift Server Library
//!
//! Accepts a single uploaded document, runs it through a conversion backend
//! and streams the result back. Every file written along the way lives in a
//! scratch directory and is removed before the response leaves.
//!
//! # Modules
//!
//! - `upload`: multipart extraction, extension checks, filename sanitizing
//! - `transient`: scratch directory and per-request cleanup guard
//! - `convert`: conversion backends (remote APIs, Ghostscript, image-to-PDF)
//! - `pipeline`: the validate/save/convert/respond sequence
//! - `routes`: HTTP handlers

pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod transient;
pub mod upload;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let max_upload_bytes = state.config().server.max_upload_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::router())
        .merge(routes::convert::router(max_upload_bytes))
        .merge(routes::compress::router(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
