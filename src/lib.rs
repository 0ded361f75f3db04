pub mod backend;
pub mod config;
pub mod directory;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod logging;
pub mod logs;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod router;
pub mod selection;
pub mod state;

use std::{path::Path, sync::Arc};

use axum::{
    routing::{get, post},
    Router,
};
use backend::{local::LocalAdapter, openai::OpenAiAdapter, BackendSet};
use config::GatewayConfig;
use router::{ChatRouter, GenerationDefaults};
use selection::{BackendSelection, SelectionHandle};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

pub fn build_state(config: &GatewayConfig) -> Result<state::AppState, std::io::Error> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|error| std::io::Error::other(format!("failed to build HTTP client: {error}")))?;

    let backends = BackendSet::new(
        Arc::new(LocalAdapter::new(
            client.clone(),
            config.local_base_url.clone(),
            config.context_window,
        )),
        Arc::new(OpenAiAdapter::new(
            client,
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
        )),
    );
    let selection = SelectionHandle::new(BackendSelection {
        backend: config.default_backend,
        model: config.default_model.clone(),
    });
    let router = ChatRouter::new(
        backends,
        selection,
        GenerationDefaults::from(config),
        config.mock_mode,
    );

    info!(
        backend = %config.default_backend,
        model = %config.default_model,
        local_url = %config.local_base_url,
        openai_url = %config.openai_base_url,
        mock_mode = config.mock_mode,
        "chat router configured"
    );
    Ok(state::AppState::new(router, config.log_file.clone()))
}

pub fn build_app(state: state::AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/chat", post(handlers::chat))
        .route("/models/switch", post(handlers::switch_model))
        .route("/models/list", get(handlers::list_models))
        .route("/models/current", get(handlers::current_model))
        .route("/logs/recent", get(handlers::recent_logs))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub fn with_frontend(app: Router, frontend_dir: &Path) -> Router {
    if frontend_dir.is_dir() {
        info!(dir = %frontend_dir.display(), "frontend mounted");
        app.fallback_service(ServeDir::new(frontend_dir))
    } else {
        warn!(dir = %frontend_dir.display(), "frontend build not found, serving API only");
        app
    }
}
