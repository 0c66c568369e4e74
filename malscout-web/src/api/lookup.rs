//! Batch symbol lookup endpoint

use std::collections::BTreeSet;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use malscout_core::pipeline::{self, PipelineOptions};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    api: Option<NameInput>,
}

/// Accepts `"VirtualAlloc, CreateFileW"` as well as `["VirtualAlloc", ...]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NameInput {
    One(String),
    Many(Vec<String>),
}

/// POST /api/lookup - fetch descriptions for a caller-supplied name list
///
/// Whitespace-only input yields an empty result set without touching the
/// description source.
pub async fn lookup_names(
    State(state): State<AppState>,
    Json(request): Json<LookupRequest>,
) -> ApiResult<Json<Value>> {
    let Some(input) = request.api else {
        return Err(ApiError::BadRequest("Missing 'api' name(s)".to_string()));
    };

    let names = match &input {
        NameInput::One(text) => tokenize_names(text),
        NameInput::Many(items) => items.iter().flat_map(|item| tokenize_names(item)).collect(),
    };

    if names.is_empty() {
        return Ok(Json(json!({ "results": {} })));
    }

    tracing::info!(names = names.len(), "batch lookup");

    let options = PipelineOptions {
        concurrency: state.settings.concurrency,
        verbose: false,
    };
    let results = pipeline::fetch_descriptions(
        state.source.as_ref(),
        &names,
        &options,
        &CancellationToken::new(),
        None,
    )
    .await;

    Ok(Json(json!({ "results": results })))
}

/// Split free-form input on commas and any whitespace, dropping empties.
fn tokenize_names(text: &str) -> BTreeSet<String> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}
