use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{
    backend::{
        build_url, relay_lines, truncate, BackendError, ChatBackend, LineOutcome, RelayStream,
        LIST_TIMEOUT, PROBE_TIMEOUT,
    },
    models::{RelayFrame, ResolvedChat},
    selection::BackendKind,
};

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Clone)]
pub struct OpenAiAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiAdapter {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        build_url(&self.base_url, path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(api_key) => builder.bearer_auth(api_key),
            None => builder,
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::OpenAiCompatible
    }

    fn stream_chat(&self, request: ResolvedChat) -> RelayStream {
        let payload = json!({
            "model": request.model,
            "messages": request.messages,
            "stream": true,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens
        });

        let call = self.authorize(self.client.post(self.url("/v1/chat/completions")).json(&payload));
        relay_lines(self.kind(), call, parse_line)
    }

    async fn check_health(&self) -> Result<(), BackendError> {
        let response = self
            .authorize(self.client.get(self.url("/v1/models")))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let response = self
            .authorize(self.client.get(self.url("/v1/models")))
            .timeout(LIST_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }

        let listing: ModelsResponse = response.json().await?;
        Ok(listing.data.into_iter().map(|model| model.id).collect())
    }
}

fn parse_line(line: &str) -> LineOutcome {
    let Some(payload) = line.strip_prefix("data: ") else {
        return LineOutcome::Skip;
    };
    debug!(raw = %truncate(payload, 100), "openai-compatible backend line");

    let frame = RelayFrame::Passthrough(payload.to_owned());
    if payload.trim() == DONE_SENTINEL {
        LineOutcome::Finish(frame)
    } else {
        LineOutcome::Emit(frame)
    }
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}
