pub mod local;
pub mod mock;
pub mod openai;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::{stream::BoxStream, StreamExt};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{
    models::{RelayFrame, ResolvedChat, StreamChunk},
    selection::BackendKind,
};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const LIST_TIMEOUT: Duration = Duration::from_secs(10);

pub type RelayStream = BoxStream<'static, RelayFrame>;

#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    // Starts the streaming call lazily: nothing is sent until the returned
    // stream is first polled.
    fn stream_chat(&self, request: ResolvedChat) -> RelayStream;

    async fn check_health(&self) -> Result<(), BackendError>;

    async fn list_models(&self) -> Result<Vec<String>, BackendError>;
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend returned status {0}")]
    Status(u16),
    #[error("backend invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Unavailable(error.to_string())
        }
    }
}

#[derive(Clone)]
pub struct BackendSet {
    local: Arc<dyn ChatBackend>,
    openai: Arc<dyn ChatBackend>,
}

impl BackendSet {
    pub fn new(local: Arc<dyn ChatBackend>, openai: Arc<dyn ChatBackend>) -> Self {
        Self { local, openai }
    }

    pub fn get(&self, kind: BackendKind) -> Arc<dyn ChatBackend> {
        match kind {
            BackendKind::Local => self.local.clone(),
            BackendKind::OpenAiCompatible => self.openai.clone(),
        }
    }
}

// Splits a byte stream into lines. Bytes are buffered until a newline so
// multi-byte characters split across network reads survive intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    pub fn next_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&byte| byte == b'\n')?;
        let line = self.pending.drain(..=end).collect::<Vec<_>>();
        Some(decode_line(&line))
    }

    // Whatever is left once the body ended without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LineOutcome {
    Skip,
    Emit(RelayFrame),
    // Emit and stop reading the backend body.
    Finish(RelayFrame),
}

pub(crate) fn relay_lines(
    kind: BackendKind,
    request: reqwest::RequestBuilder,
    parse: fn(&str) -> LineOutcome,
) -> RelayStream {
    let stream = async_stream::stream! {
        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => {
                warn!(backend = %kind, error = %error, "backend connection failed");
                yield RelayFrame::from(StreamChunk::error(format!("Connection failed: {error}")));
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                backend = %kind,
                status = status.as_u16(),
                body = %truncate(&body, 400),
                "backend rejected chat request"
            );
            yield RelayFrame::from(StreamChunk::error(format!(
                "{} error: {}",
                kind.label(),
                status.as_u16()
            )));
            return;
        }

        debug!(backend = %kind, "backend stream opened");
        let mut upstream = response.bytes_stream();
        let mut lines = LineBuffer::default();
        let mut body_ended = false;

        while !body_ended {
            match upstream.next().await {
                Some(Ok(bytes)) => lines.push(&bytes),
                Some(Err(error)) => {
                    warn!(backend = %kind, error = %error, "backend stream interrupted");
                    yield RelayFrame::from(StreamChunk::error(format!("Connection failed: {error}")));
                    return;
                }
                None => body_ended = true,
            }

            let mut ready = Vec::new();
            while let Some(line) = lines.next_line() {
                ready.push(line);
            }
            if body_ended {
                ready.extend(lines.finish());
            }

            for line in ready {
                match parse(&line) {
                    LineOutcome::Skip => {}
                    LineOutcome::Emit(frame) => {
                        yield frame;
                    }
                    LineOutcome::Finish(frame) => {
                        yield frame;
                        return;
                    }
                }
            }
        }

        debug!(backend = %kind, "backend body ended without completion marker");
        yield RelayFrame::from(StreamChunk::done());
    };

    stream.boxed()
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\n', '\r'])
        .to_owned()
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

pub(crate) fn build_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
