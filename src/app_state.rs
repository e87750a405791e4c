use sqlx::PgPool;
use std::sync::Arc;

use crate::config::JobSettings;
use crate::services::{cache::ResultCache, queue::JobQueue, store::TaskStore};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub store: Arc<dyn TaskStore>,
    pub queue: Arc<JobQueue>,
    pub cache: Arc<dyn ResultCache>,
    pub settings: JobSettings,
}

impl AppState {
    pub fn new(
        db: PgPool,
        store: Arc<dyn TaskStore>,
        queue: JobQueue,
        cache: Arc<dyn ResultCache>,
        settings: JobSettings,
    ) -> Self {
        Self {
            db,
            store,
            queue: Arc::new(queue),
            cache,
            settings,
        }
    }
}
