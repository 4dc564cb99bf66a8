use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::personalization::PersonalizationEngine;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    engine: Arc<PersonalizationEngine>,
    cache_backend: &'static str,
}

impl AppState {
    pub fn new(engine: Arc<PersonalizationEngine>, cache_backend: &'static str) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            engine,
            cache_backend,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn engine(&self) -> Arc<PersonalizationEngine> {
        Arc::clone(&self.engine)
    }

    pub fn cache_backend(&self) -> &'static str {
        self.cache_backend
    }
}
