//! malscout-web library interface
//!
//! Exposes state and router construction for integration testing.

pub mod api;
pub mod config;
pub mod error;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::trace::TraceLayer;

use malscout_core::lookup::DescriptionSource;

use crate::config::Settings;

/// Uploads larger than this are rejected before multipart parsing.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Description source shared by every pipeline run of this process
    pub source: Arc<dyn DescriptionSource>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(source: Arc<dyn DescriptionSource>, settings: Settings) -> Self {
        Self {
            source,
            settings: Arc::new(settings),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let mut router = Router::new()
        .route("/api/lookup", post(api::lookup::lookup_names))
        .route("/api/analyze", post(api::analyze::analyze_upload))
        .route("/health", get(api::health::health));

    // Optional web UI; everything that is not an API route is a static asset.
    if let Some(static_dir) = state.settings.static_dir.as_ref() {
        router = router.fallback_service(tower_http::services::ServeDir::new(static_dir));
    }

    router
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
