//! malscout-web - import-table enrichment service
//!
//! Accepts PE uploads or raw symbol lists, enriches the imported API names
//! with descriptions from the MalAPI knowledge base, and returns the result
//! as JSON or a live SSE stream.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use malscout_core::lookup::MalapiClient;
use malscout_web::config::{Args, Settings};
use malscout_web::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::resolve(Args::parse())?;

    info!("Starting malscout-web");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Lookup endpoint: {}", settings.lookup_base_url);
    info!("Lookup concurrency: {}", settings.concurrency);

    let client =
        MalapiClient::with_base_url(settings.lookup_base_url.as_str(), settings.request_timeout)
            .map_err(|e| anyhow::anyhow!("failed to build lookup client: {e}"))?;

    let addr = format!("{}:{}", settings.host, settings.port);
    let state = AppState::new(Arc::new(client), settings);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
