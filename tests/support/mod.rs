#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use llm_chat_gateway::{build_app, build_state, config::GatewayConfig};
use serde_json::{json, Value};
use tower::util::ServiceExt;

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake backend");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake backend serve");
    });
    format!("http://{addr}")
}

/// A base URL nothing is listening on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

/// Bodies received by a fake backend, in arrival order.
#[derive(Clone, Default)]
pub struct Recorded(Arc<Mutex<Vec<Value>>>);

impl Recorded {
    pub fn bodies(&self) -> Vec<Value> {
        self.0.lock().expect("recorded lock").clone()
    }
}

#[derive(Clone)]
struct FakeState {
    recorded: Recorded,
    status: StatusCode,
    body: String,
}

async fn fake_chat(State(state): State<FakeState>, Json(body): Json<Value>) -> Response {
    state.recorded.0.lock().expect("recorded lock").push(body);
    (
        state.status,
        [(CONTENT_TYPE, "application/x-ndjson")],
        state.body.clone(),
    )
        .into_response()
}

/// Local-inference style backend replying to `/api/chat` with `body`.
pub async fn fake_local_backend(status: StatusCode, body: &str) -> (String, Recorded) {
    let recorded = Recorded::default();
    let state = FakeState {
        recorded: recorded.clone(),
        status,
        body: body.to_owned(),
    };
    let app = Router::new()
        .route("/api/chat", post(fake_chat))
        .route(
            "/api/tags",
            get(|| async {
                Json(json!({
                    "models": [
                        {"name": "phi3:mini", "size": 2_300_000_000u64},
                        {"name": "llama3:8b", "size": 4_700_000_000u64}
                    ]
                }))
            }),
        )
        .with_state(state);
    (spawn_server(app).await, recorded)
}

/// OpenAI-compatible backend replying to `/v1/chat/completions` with `body`.
pub async fn fake_openai_backend(status: StatusCode, body: &str) -> (String, Recorded) {
    let recorded = Recorded::default();
    let state = FakeState {
        recorded: recorded.clone(),
        status,
        body: body.to_owned(),
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(fake_chat))
        .route(
            "/v1/models",
            get(|| async {
                Json(json!({
                    "object": "list",
                    "data": [{"id": "Qwen/Qwen2.5-Coder-1.5B", "object": "model"}]
                }))
            }),
        )
        .with_state(state);
    (spawn_server(app).await, recorded)
}

/// Local-inference style backend whose `/api/chat` body comes from `make_body`.
pub async fn fake_local_stream<F>(make_body: F) -> String
where
    F: Fn() -> Body + Clone + Send + Sync + 'static,
{
    let app = Router::new().route(
        "/api/chat",
        post(move || {
            let make_body = make_body.clone();
            async move { ([(CONTENT_TYPE, "application/x-ndjson")], make_body()) }
        }),
    );
    spawn_server(app).await
}

pub fn config(local_url: &str, openai_url: &str, mock_mode: bool) -> GatewayConfig {
    GatewayConfig {
        local_base_url: local_url.to_owned(),
        openai_base_url: openai_url.to_owned(),
        mock_mode,
        ..GatewayConfig::default()
    }
}

pub fn gateway(config: &GatewayConfig) -> Router {
    build_app(build_state(config).expect("state should build"))
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder
        .body(body.map(|text| Body::from(text.to_owned())).unwrap_or_else(Body::empty))
        .expect("request build");
    app.clone()
        .oneshot(request)
        .await
        .expect("request execution")
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body should be readable");
    String::from_utf8(bytes.to_vec()).expect("body should be UTF-8")
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).expect("body should be JSON")
}

/// `data:` payloads of a server-sent-event body, in order.
pub fn data_frames(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest).to_owned())
        .collect()
}

pub fn json_frames(body: &str) -> Vec<Value> {
    data_frames(body)
        .iter()
        .map(|frame| serde_json::from_str(frame).expect("frame should be JSON"))
        .collect()
}
