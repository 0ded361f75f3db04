use tracing::info;

use crate::{
    backend::{mock, BackendSet, RelayStream},
    config::GatewayConfig,
    errors::AppError,
    models::{ChatRequest, ResolvedChat},
    selection::{BackendKind, SelectionHandle},
};

#[derive(Debug, Clone, Copy)]
pub struct GenerationDefaults {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl From<&GatewayConfig> for GenerationDefaults {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

pub enum RouteTarget {
    Mock,
    Backend(BackendKind),
}

pub struct RoutedChat {
    pub target: RouteTarget,
    pub model: String,
    pub frames: RelayStream,
}

#[derive(Clone)]
pub struct ChatRouter {
    backends: BackendSet,
    selection: SelectionHandle,
    defaults: GenerationDefaults,
    mock_mode: bool,
}

impl ChatRouter {
    pub fn new(
        backends: BackendSet,
        selection: SelectionHandle,
        defaults: GenerationDefaults,
        mock_mode: bool,
    ) -> Self {
        Self {
            backends,
            selection,
            defaults,
            mock_mode,
        }
    }

    pub fn backends(&self) -> &BackendSet {
        &self.backends
    }

    pub fn selection(&self) -> &SelectionHandle {
        &self.selection
    }

    pub fn mock_mode(&self) -> bool {
        self.mock_mode
    }

    pub async fn route(&self, request: ChatRequest) -> Result<RoutedChat, AppError> {
        if !request.stream {
            return Err(AppError::UnsupportedMode);
        }

        let selection = self.selection.snapshot().await;
        let resolved = ResolvedChat {
            model: request
                .model
                .filter(|model| !model.trim().is_empty())
                .unwrap_or(selection.model),
            temperature: request.temperature.unwrap_or(self.defaults.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.defaults.max_tokens),
            messages: request.messages,
        };

        if self.mock_mode {
            info!(model = %resolved.model, messages = resolved.messages.len(), "chat routed to mock");
            return Ok(RoutedChat {
                target: RouteTarget::Mock,
                model: resolved.model.clone(),
                frames: mock::canned_stream(&resolved),
            });
        }

        let backend = self.backends.get(selection.backend);
        info!(
            backend = %selection.backend,
            model = %resolved.model,
            messages = resolved.messages.len(),
            "chat routed"
        );
        let model = resolved.model.clone();
        Ok(RoutedChat {
            target: RouteTarget::Backend(selection.backend),
            model,
            frames: backend.stream_chat(resolved),
        })
    }
}
