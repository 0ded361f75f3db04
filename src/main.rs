use llm_chat_gateway::{config::GatewayConfig, health, logging, selection::BackendKind};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::from_env()?;
    let file_writer = logging::file_writer(&config.log_file);
    let (file_layer, _guard, file_error) = match file_writer {
        Ok((writer, guard)) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
            ),
            Some(guard),
            None,
        ),
        Err(error) => (None, None, Some(error)),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,llm_chat_gateway=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    if let Some(error) = file_error {
        warn!(
            path = %config.log_file.display(),
            error = %error,
            "log file unavailable, logging to stdout only"
        );
    }

    let state = llm_chat_gateway::build_state(&config)?;
    warn_if_no_backend(&state, config.mock_mode).await;

    let app = llm_chat_gateway::build_app(state);
    let app = llm_chat_gateway::with_frontend(app, &config.frontend_dir);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "gateway listening");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn warn_if_no_backend(state: &llm_chat_gateway::state::AppState, mock_mode: bool) {
    let backends = state.router.backends();
    let local = backends.get(BackendKind::Local);
    let openai = backends.get(BackendKind::OpenAiCompatible);
    let (local_ok, openai_ok) = tokio::join!(
        health::probe(local.as_ref()),
        health::probe(openai.as_ref())
    );

    if local_ok || openai_ok {
        info!(local_ok, openai_ok, "backend availability checked");
    } else if !mock_mode {
        warn!("no backends available; enable MOCK_MODE or start a backend");
    }
}
