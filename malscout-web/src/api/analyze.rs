//! Binary analysis endpoints
//!
//! One handler, two shapes: a JSON batch response, or (with
//! `stream=true&verbose=true`) a live SSE stream of progress events bridged
//! from the pipeline's notification channel.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use malscout_core::imports;
use malscout_core::pipeline::{self, PipelineOptions, ProgressEvent};
use malscout_core::report;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzeParams {
    verbose: bool,
    export: bool,
    stream: bool,
}

/// POST /api/analyze - extract a PE's imports and enrich them
///
/// Multipart upload with a `file` field. Extraction failures reject the
/// request before any lookup runs.
pub async fn analyze_upload(
    State(state): State<AppState>,
    Query(params): Query<AnalyzeParams>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let upload = read_upload(multipart).await?;

    let candidates = imports::extract_candidates(&upload.data)?;
    tracing::info!(
        sample = %upload.filename,
        candidates = candidates.len(),
        "import extraction complete"
    );

    if params.stream && params.verbose {
        Ok(stream_response(state, candidates).into_response())
    } else {
        let body = batch_response(state, candidates, &upload.filename, &params).await?;
        Ok(body.into_response())
    }
}

struct Upload {
    filename: String,
    data: Vec<u8>,
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("uploaded.bin").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("cannot read upload: {e}")))?;
        if data.is_empty() {
            return Err(ApiError::BadRequest("Empty file.".to_string()));
        }
        return Ok(Upload {
            filename,
            data: data.to_vec(),
        });
    }

    Err(ApiError::BadRequest(
        "No file provided. Use multipart/form-data with a 'file' field.".to_string(),
    ))
}

async fn batch_response(
    state: AppState,
    candidates: BTreeSet<String>,
    filename: &str,
    params: &AnalyzeParams,
) -> ApiResult<Json<Value>> {
    let options = PipelineOptions {
        concurrency: state.settings.concurrency,
        verbose: params.verbose,
    };
    let results = pipeline::fetch_descriptions(
        state.source.as_ref(),
        &candidates,
        &options,
        &CancellationToken::new(),
        None,
    )
    .await;

    let export_path = if params.export {
        let path = report::write_report(&results, Some(filename), &state.settings.reports_dir)?;
        Some(path.display().to_string())
    } else {
        None
    };

    Ok(Json(json!({ "results": results, "export_path": export_path })))
}

/// Run the pipeline in a background task and relay its progress channel as
/// SSE. The cancellation guard lives in the response stream, so a client
/// that disconnects mid-run cancels the outstanding lookups.
fn stream_response(
    state: AppState,
    candidates: BTreeSet<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let source = Arc::clone(&state.source);
    let concurrency = state.settings.concurrency;
    tokio::spawn(async move {
        let options = PipelineOptions {
            concurrency,
            verbose: true,
        };
        pipeline::fetch_descriptions(source.as_ref(), &candidates, &options, &cancel, Some(tx))
            .await;
    });

    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = rx.recv().await {
            let done = matches!(event, ProgressEvent::Finished { .. });
            yield Ok(sse_event(event));
            if done {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

fn sse_event(event: ProgressEvent) -> Event {
    match event {
        ProgressEvent::Started { total } => {
            Event::default().event("meta").data(format!("total={total}"))
        }
        ProgressEvent::Hit { name, description } => Event::default()
            .event("hit")
            .data(format!("{name}\\n--> {description}")),
        ProgressEvent::Miss { name } => Event::default().event("log").data(format!("{name} miss")),
        ProgressEvent::LookupFailed { name, message } => Event::default()
            .event("log")
            .data(format!("{name} ERROR: {message}")),
        ProgressEvent::Finished { .. } => Event::default().event("done").data("END"),
    }
}
