use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::warn;

use crate::{
    backend::ChatBackend,
    router::ChatRouter,
    selection::{BackendKind, BackendSelection},
};

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub backend: BackendKind,
    pub model: String,
    pub local_available: bool,
    pub openai_compatible_available: bool,
    pub timestamp: String,
}

pub async fn probe(backend: &dyn ChatBackend) -> bool {
    match backend.check_health().await {
        Ok(()) => true,
        Err(error) => {
            warn!(backend = %backend.kind(), error = %error, "health check failed");
            false
        }
    }
}

pub async fn report(router: &ChatRouter) -> HealthReport {
    let local = router.backends().get(BackendKind::Local);
    let openai = router.backends().get(BackendKind::OpenAiCompatible);
    let (local_available, openai_compatible_available) =
        tokio::join!(probe(local.as_ref()), probe(openai.as_ref()));
    let BackendSelection { backend, model } = router.selection().snapshot().await;

    let healthy = local_available || openai_compatible_available || router.mock_mode();
    HealthReport {
        status: if healthy { "healthy" } else { "degraded" },
        backend,
        model,
        local_available,
        openai_compatible_available,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
    }
}
