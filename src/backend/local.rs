use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    backend::{
        build_url, relay_lines, truncate, BackendError, ChatBackend, LineOutcome, RelayStream,
        LIST_TIMEOUT, PROBE_TIMEOUT,
    },
    models::{RelayFrame, ResolvedChat, StreamChunk},
    selection::BackendKind,
};

#[derive(Clone)]
pub struct LocalAdapter {
    client: reqwest::Client,
    base_url: String,
    context_window: u32,
}

impl LocalAdapter {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, context_window: u32) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            context_window,
        }
    }

    fn url(&self, path: &str) -> String {
        build_url(&self.base_url, path)
    }
}

#[async_trait]
impl ChatBackend for LocalAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn stream_chat(&self, request: ResolvedChat) -> RelayStream {
        let payload = json!({
            "model": request.model,
            "messages": request.messages,
            "stream": true,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
                "num_ctx": self.context_window
            }
        });

        let call = self.client.post(self.url("/api/chat")).json(&payload);
        relay_lines(self.kind(), call, parse_line)
    }

    async fn check_health(&self) -> Result<(), BackendError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
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
            .client
            .get(self.url("/api/tags"))
            .timeout(LIST_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags
            .models
            .unwrap_or_default()
            .into_iter()
            .map(|model| model.name)
            .collect())
    }
}

fn parse_line(line: &str) -> LineOutcome {
    let line = line.trim();
    if line.is_empty() {
        return LineOutcome::Skip;
    }
    debug!(raw = %truncate(line, 100), "local backend line");

    let parsed: LocalChatLine = match serde_json::from_str(line) {
        Ok(parsed) => parsed,
        Err(error) => {
            warn!(raw = %truncate(line, 100), error = %error, "skipping unparsable backend line");
            return LineOutcome::Skip;
        }
    };

    if let Some(message) = parsed.error {
        return LineOutcome::Finish(RelayFrame::from(StreamChunk::error(format!(
            "{} error: {message}",
            BackendKind::Local.label()
        ))));
    }

    let done = parsed.done.unwrap_or(false);
    match parsed.message.and_then(|message| message.content) {
        Some(content) if done => LineOutcome::Finish(StreamChunk::content(content, true).into()),
        Some(content) => LineOutcome::Emit(StreamChunk::content(content, false).into()),
        None if done => LineOutcome::Finish(StreamChunk::done().into()),
        None => LineOutcome::Skip,
    }
}

#[derive(Debug, Deserialize)]
struct LocalChatLine {
    #[serde(default)]
    message: Option<LocalMessage>,
    #[serde(default)]
    done: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocalMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Option<Vec<TagModel>>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(outcome: LineOutcome) -> StreamChunk {
        match outcome {
            LineOutcome::Emit(RelayFrame::Chunk(chunk))
            | LineOutcome::Finish(RelayFrame::Chunk(chunk)) => chunk,
            other => panic!("expected a chunk, got {other:?}"),
        }
    }

    #[test]
    fn content_lines_become_content_chunks() {
        let outcome =
            parse_line(r#"{"model":"phi3","message":{"role":"assistant","content":"Hel"},"done":false}"#);
        assert!(matches!(outcome, LineOutcome::Emit(_)));
        assert_eq!(chunk(outcome), StreamChunk::content("Hel".to_owned(), false));
    }

    #[test]
    fn final_line_with_message_finishes_the_stream() {
        let outcome =
            parse_line(r#"{"message":{"role":"assistant","content":""},"done":true,"eval_count":12}"#);
        assert!(matches!(outcome, LineOutcome::Finish(_)));
        assert_eq!(chunk(outcome), StreamChunk::content(String::new(), true));
    }

    #[test]
    fn bare_done_flag_finishes_the_stream() {
        let outcome = parse_line(r#"{"done":true}"#);
        assert_eq!(chunk(outcome), StreamChunk::done());
    }

    #[test]
    fn malformed_and_irrelevant_lines_are_skipped() {
        assert_eq!(parse_line("{oops"), LineOutcome::Skip);
        assert_eq!(parse_line("42"), LineOutcome::Skip);
        assert_eq!(parse_line("   "), LineOutcome::Skip);
        assert_eq!(parse_line(r#"{"done":false}"#), LineOutcome::Skip);
    }

    #[test]
    fn backend_error_lines_end_the_stream_in_band() {
        let outcome = parse_line(r#"{"error":"model 'nope' not found"}"#);
        assert!(matches!(outcome, LineOutcome::Finish(_)));
        assert_eq!(
            chunk(outcome).error.as_deref(),
            Some("Local backend error: model 'nope' not found")
        );
    }
}
