use services::Forum;

use super::metrics::Metrics;

/// State shared across all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub forum: Forum,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(forum: Forum) -> Self {
        Self {
            forum,
            metrics: Metrics::new(),
        }
    }
}
