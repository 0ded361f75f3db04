use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::selection::BackendKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DEFAULT_BACKEND must be 'local' or 'openai-compatible', got '{0}'")]
    UnknownBackend(String),
    #[error("GATEWAY_ADDR is not a socket address: {0}")]
    InvalidAddr(String),
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub local_base_url: String,
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
    pub default_backend: BackendKind,
    pub default_model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub context_window: u32,
    pub mock_mode: bool,
    pub request_timeout: Duration,
    pub log_file: PathBuf,
    pub frontend_dir: PathBuf,
    pub bind_addr: SocketAddr,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            local_base_url: "http://localhost:11434".to_owned(),
            openai_base_url: "http://localhost:8000".to_owned(),
            openai_api_key: None,
            default_backend: BackendKind::Local,
            default_model: "phi3:mini".to_owned(),
            max_tokens: 2048,
            temperature: 0.7,
            context_window: 4096,
            mock_mode: false,
            request_timeout: Duration::from_secs(120),
            log_file: PathBuf::from("chatbot.log"),
            frontend_dir: PathBuf::from("../frontend/dist"),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let default_backend = match read("DEFAULT_BACKEND") {
            Some(value) => value
                .parse::<BackendKind>()
                .map_err(|_| ConfigError::UnknownBackend(value))?,
            None => defaults.default_backend,
        };
        let bind_addr = match read("GATEWAY_ADDR") {
            Some(value) => value
                .parse::<SocketAddr>()
                .map_err(|_| ConfigError::InvalidAddr(value))?,
            None => defaults.bind_addr,
        };

        Ok(Self {
            local_base_url: read("OLLAMA_BASE_URL")
                .map(|value| trim_base_url(&value))
                .unwrap_or(defaults.local_base_url),
            openai_base_url: read("VLLM_BASE_URL")
                .map(|value| trim_base_url(&value))
                .unwrap_or(defaults.openai_base_url),
            openai_api_key: read("VLLM_API_KEY"),
            default_backend,
            default_model: read("DEFAULT_MODEL").unwrap_or(defaults.default_model),
            max_tokens: parse_or(read("MAX_TOKENS"), defaults.max_tokens),
            temperature: parse_or(read("TEMPERATURE"), defaults.temperature),
            context_window: parse_or(read("CONTEXT_WINDOW"), defaults.context_window),
            mock_mode: read("MOCK_MODE")
                .map(|value| value.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.mock_mode),
            request_timeout: read("REQUEST_TIMEOUT_SECS")
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            log_file: read("LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_file),
            frontend_dir: read("FRONTEND_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.frontend_dir),
            bind_addr,
        })
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn trim_base_url(value: &str) -> String {
    value.trim().trim_end_matches('/').to_owned()
}
