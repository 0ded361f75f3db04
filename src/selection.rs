use std::{fmt, str::FromStr, sync::Arc};

use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BackendKind {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "openai-compatible")]
    OpenAiCompatible,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::OpenAiCompatible => "openai-compatible",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Local => "Local backend",
            Self::OpenAiCompatible => "OpenAI-compatible backend",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBackend(pub String);

impl FromStr for BackendKind {
    type Err = UnknownBackend;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "local" => Ok(Self::Local),
            "openai-compatible" => Ok(Self::OpenAiCompatible),
            other => Err(UnknownBackend(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendSelection {
    pub backend: BackendKind,
    pub model: String,
}

// Readers snapshot the selection once per request; concurrent switches are
// last-write-wins.
#[derive(Debug, Clone)]
pub struct SelectionHandle {
    inner: Arc<RwLock<BackendSelection>>,
}

impl SelectionHandle {
    pub fn new(initial: BackendSelection) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub async fn snapshot(&self) -> BackendSelection {
        self.inner.read().await.clone()
    }

    pub async fn switch(
        &self,
        model: String,
        backend: Option<BackendKind>,
    ) -> (BackendSelection, BackendSelection) {
        let mut guard = self.inner.write().await;
        let previous = guard.clone();
        guard.model = model;
        if let Some(backend) = backend {
            guard.backend = backend;
        }
        (previous, guard.clone())
    }
}
