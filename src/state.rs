use std::{path::PathBuf, sync::Arc};

use crate::{metrics::AppMetrics, router::ChatRouter};

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ChatRouter>,
    pub metrics: Arc<AppMetrics>,
    pub log_file: Arc<PathBuf>,
}

impl AppState {
    pub fn new(router: ChatRouter, log_file: PathBuf) -> Self {
        Self {
            router: Arc::new(router),
            metrics: Arc::new(AppMetrics::new()),
            log_file: Arc::new(log_file),
        }
    }
}
