use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{
    errors::AppError,
    models::{ChatRequest, Message, MessageRole},
};

const LOGGED_BODY_CHARS: usize = 200;

#[derive(Debug)]
enum ClientBody {
    Simple(Value),
    Conversation(Value),
}

#[derive(Debug, Deserialize)]
struct RequestOptions {
    #[serde(default)]
    model: Option<String>,
    #[serde(default = "default_stream")]
    stream: bool,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    max_tokens: Option<u32>,
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    role: MessageRole,
    content: Option<String>,
}

pub fn normalize(body: &[u8]) -> Result<ChatRequest, AppError> {
    info!(
        body = %String::from_utf8_lossy(body).chars().take(LOGGED_BODY_CHARS).collect::<String>(),
        "received chat request body"
    );

    let value: Value =
        serde_json::from_slice(body).map_err(|error| AppError::MalformedInput(error.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(AppError::Validation(
            "request body must be a JSON object".to_owned(),
        ));
    };

    let client_body = split_body(&mut fields)?;
    let options: RequestOptions = serde_json::from_value(Value::Object(fields))
        .map_err(|error| AppError::Validation(error.to_string()))?;

    let messages = match client_body {
        ClientBody::Simple(message) => {
            debug!("converted simple message format to messages array");
            let Value::String(content) = message else {
                return Err(AppError::Validation("message must be a string".to_owned()));
            };
            vec![Message::user(content)]
        }
        ClientBody::Conversation(messages) => parse_messages(messages)?,
    };

    Ok(ChatRequest {
        messages,
        model: options.model,
        stream: options.stream,
        temperature: options.temperature,
        max_tokens: options.max_tokens,
    })
}

fn split_body(fields: &mut Map<String, Value>) -> Result<ClientBody, AppError> {
    let message = fields.remove("message");
    match (fields.remove("messages"), message) {
        (Some(messages), _) => Ok(ClientBody::Conversation(messages)),
        (None, Some(message)) => Ok(ClientBody::Simple(message)),
        (None, None) => Err(AppError::Validation(
            "either 'message' or 'messages' is required".to_owned(),
        )),
    }
}

fn parse_messages(value: Value) -> Result<Vec<Message>, AppError> {
    let Value::Array(items) = value else {
        return Err(AppError::Validation("messages must be a list".to_owned()));
    };
    if items.is_empty() {
        return Err(AppError::Validation(
            "messages must not be empty".to_owned(),
        ));
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| parse_message(index, item))
        .collect()
}

fn parse_message(index: usize, item: Value) -> Result<Message, AppError> {
    let has_fields = item
        .as_object()
        .is_some_and(|fields| fields.contains_key("role") && fields.contains_key("content"));
    if !has_fields {
        return Err(AppError::Validation(format!(
            "message {index}: each message must have 'role' and 'content' fields"
        )));
    }

    let raw: RawMessage = serde_json::from_value(item)
        .map_err(|error| AppError::Validation(format!("message {index}: {error}")))?;
    let content = raw.content.ok_or_else(|| {
        AppError::Validation(format!("message {index}: content must not be null"))
    })?;

    Ok(Message {
        role: raw.role,
        content,
    })
}
