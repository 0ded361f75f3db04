use futures_util::StreamExt;
use tracing::debug;

use crate::{
    backend::RelayStream,
    models::{RelayFrame, ResolvedChat, StreamChunk},
};

const PROMPT_PREVIEW_CHARS: usize = 100;

pub fn canned_stream(request: &ResolvedChat) -> RelayStream {
    let content = render_response(request.last_user_message());
    debug!(model = %request.model, "serving canned mock response");

    let frames: Vec<RelayFrame> = vec![
        StreamChunk::content(content, false).into(),
        StreamChunk::done().into(),
    ];
    tokio_stream::iter(frames).boxed()
}

fn render_response(prompt: &str) -> String {
    let mut preview = prompt.chars().take(PROMPT_PREVIEW_CHARS).collect::<String>();
    if prompt.chars().count() > PROMPT_PREVIEW_CHARS {
        preview.push_str("...");
    }

    format!(
        "# Mock Response (No Backend Available)\n\n\
         I'm a fallback mock assistant.\n\n\
         **Your question:** {preview}\n\n\
         **To enable real responses:**\n\
         1. Start a local inference server (OLLAMA_BASE_URL) and pull a model\n\
         2. Or point VLLM_BASE_URL at an OpenAI-compatible server\n\
         3. Unset MOCK_MODE and restart the gateway\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;

    #[tokio::test]
    async fn canned_stream_is_content_then_done() {
        let request = ResolvedChat {
            messages: vec![Message::user("how do lifetimes work?")],
            model: "phi3:mini".to_owned(),
            temperature: 0.7,
            max_tokens: 128,
        };

        let frames = canned_stream(&request).collect::<Vec<_>>().await;
        assert_eq!(frames.len(), 2);
        match &frames[0] {
            RelayFrame::Chunk(chunk) => {
                assert!(!chunk.done);
                assert!(chunk
                    .content
                    .as_deref()
                    .is_some_and(|text| text.contains("how do lifetimes work?")));
            }
            other => panic!("unexpected frame {other:?}"),
        }
        assert_eq!(frames[1], RelayFrame::Chunk(StreamChunk::done()));
    }

    #[test]
    fn long_prompts_are_truncated_in_the_preview() {
        let prompt = "x".repeat(150);
        let rendered = render_response(&prompt);
        assert!(rendered.contains(&format!("{}...", "x".repeat(100))));
        assert!(!rendered.contains(&"x".repeat(101)));
    }
}
