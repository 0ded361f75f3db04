use std::{
    convert::Infallible,
    time::{Duration, Instant},
};

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::header::CONTENT_TYPE,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    directory::{self, ModelListing},
    errors::AppError,
    health::{self, HealthReport},
    logs::{self, RecentLogs},
    models::{RelayFrame, StreamChunk},
    normalize::normalize,
    router::RouteTarget,
    selection::{BackendKind, BackendSelection},
    state::AppState,
};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(10);

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(health::report(&state.router).await)
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(error) => AppError::Internal(format!("metrics render failed: {error}")).into_response(),
    }
}

pub async fn chat(State(state): State<AppState>, body: Bytes) -> Response {
    let started = Instant::now();
    let _inflight = state.metrics.inflight_guard();

    let response = match process_chat(state.clone(), body).await {
        Ok(response) => response,
        Err(error) => {
            warn!(error = %error, "chat request rejected");
            error.into_response()
        }
    };

    state.metrics.observe_request(
        "/chat",
        "POST",
        response.status().as_u16(),
        started.elapsed(),
    );
    response
}

async fn process_chat(state: AppState, body: Bytes) -> Result<Response, AppError> {
    let request_id = format!("req_{}", Uuid::new_v4());
    let request = normalize(&body)?;
    let routed = state.router.route(request).await?;

    let backend_label = match routed.target {
        RouteTarget::Mock => "mock",
        RouteTarget::Backend(kind) => kind.as_str(),
    };
    info!(
        request_id = %request_id,
        backend = backend_label,
        model = %routed.model,
        "chat stream started"
    );

    let metrics = state.metrics.clone();
    let mut frames = routed.frames;
    let outbound = async_stream::stream! {
        let mut relayed = 0usize;
        while let Some(frame) = frames.next().await {
            if frame.is_error() {
                metrics.observe_backend_error(backend_label, "stream");
                warn!(request_id = %request_id, backend = backend_label, "stream ended with error chunk");
            }
            relayed += 1;
            yield Ok::<Event, Infallible>(frame_event(frame));
        }
        debug!(request_id = %request_id, frames = relayed, "chat stream finished");
    };

    Ok(Sse::new(outbound)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct SwitchParams {
    pub model_name: String,
    #[serde(default)]
    pub backend: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SwitchResponse {
    pub status: &'static str,
    pub previous: BackendSelection,
    pub current: BackendSelection,
}

pub async fn switch_model(
    State(state): State<AppState>,
    params: Result<Query<SwitchParams>, QueryRejection>,
) -> Result<Json<SwitchResponse>, AppError> {
    let Query(params) = params.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    let backend = match params.backend.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(name) => Some(
            name.parse::<BackendKind>()
                .map_err(|_| AppError::InvalidBackend(name.to_owned()))?,
        ),
    };

    let (previous, current) = state
        .router
        .selection()
        .switch(params.model_name, backend)
        .await;
    info!(
        from_backend = %previous.backend,
        from_model = %previous.model,
        to_backend = %current.backend,
        to_model = %current.model,
        "model switched"
    );

    Ok(Json(SwitchResponse {
        status: "success",
        previous,
        current,
    }))
}

pub async fn list_models(State(state): State<AppState>) -> Result<Json<ModelListing>, AppError> {
    let selection = state.router.selection().snapshot().await;
    directory::list(state.router.backends(), &selection)
        .await
        .map(Json)
        .inspect_err(|_| {
            state
                .metrics
                .observe_backend_error(selection.backend.as_str(), "list");
        })
}

#[derive(Debug, Serialize)]
pub struct CurrentModel {
    pub name: String,
    pub backend: BackendKind,
    pub status: &'static str,
}

pub async fn current_model(State(state): State<AppState>) -> Json<CurrentModel> {
    let selection = state.router.selection().snapshot().await;
    Json(CurrentModel {
        name: selection.model,
        backend: selection.backend,
        status: "active",
    })
}

#[derive(Debug, Deserialize)]
pub struct LogsParams {
    #[serde(default)]
    pub lines: Option<usize>,
}

pub async fn recent_logs(
    State(state): State<AppState>,
    Query(params): Query<LogsParams>,
) -> Json<RecentLogs> {
    let lines = params.lines.unwrap_or(logs::DEFAULT_LINES);
    Json(logs::recent(&state.log_file, lines).await)
}

fn frame_event(frame: RelayFrame) -> Event {
    match frame {
        RelayFrame::Chunk(chunk) => json_event(&chunk),
        // Event::data rejects carriage returns.
        RelayFrame::Passthrough(payload) => Event::default().data(payload.replace('\r', "")),
    }
}

fn json_event(chunk: &StreamChunk) -> Event {
    match serde_json::to_string(chunk) {
        Ok(serialized) => Event::default().data(serialized),
        Err(error) => {
            let fallback = StreamChunk::error(format!("serialization error: {error}"));
            Event::default().data(
                serde_json::to_string(&fallback)
                    .unwrap_or_else(|_| r#"{"done":false,"error":"serialization error"}"#.to_owned()),
            )
        }
    }
}
