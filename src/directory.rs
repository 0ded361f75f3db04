use serde::Serialize;
use tracing::{debug, error};

use crate::{
    backend::BackendSet,
    errors::AppError,
    selection::{BackendKind, BackendSelection},
};

#[derive(Debug, Clone, Serialize)]
pub struct ModelListing {
    pub backend: BackendKind,
    pub models: Vec<String>,
}

pub async fn list(
    backends: &BackendSet,
    selection: &BackendSelection,
) -> Result<ModelListing, AppError> {
    let backend = backends.get(selection.backend);
    let models = backend.list_models().await.map_err(|failure| {
        error!(backend = %selection.backend, error = %failure, "failed to list models");
        AppError::BackendUnavailable(failure.to_string())
    })?;

    debug!(backend = %selection.backend, count = models.len(), "models listed");
    Ok(ModelListing {
        backend: selection.backend,
        models,
    })
}
