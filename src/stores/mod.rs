//! Boundaries to the collaborators the engine consumes but does not own: the
//! content catalog, the telemetry log and the assessment question bank.

pub mod memory;

use std::collections::BTreeMap;

use futures::future::BoxFuture;

use crate::personalization::types::{
    ContentItem, DifficultyLevel, InteractionSample, RecommendationConstraints, SampleWindow,
};

pub use memory::{
    load_catalog, Catalog, InMemoryContentStore, InMemoryQuestionBank, InMemoryTelemetryStore,
};

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Read-only access to learning content and learner mastery.
pub trait ContentStore: Send + Sync {
    fn get_eligible_content<'a>(
        &'a self,
        learner_id: &'a str,
        subject: &'a str,
        constraints: &'a RecommendationConstraints,
    ) -> BoxFuture<'a, Result<Vec<ContentItem>, StoreError>>;

    fn get_mastery_record<'a>(
        &'a self,
        learner_id: &'a str,
    ) -> BoxFuture<'a, Result<BTreeMap<String, f64>, StoreError>>;
}

#[derive(Debug, Clone, Default)]
pub struct TelemetrySlice {
    pub samples: Vec<InteractionSample>,
    pub version: u64,
}

/// Append-only, per-learner ordered log of interaction samples. `version` grows by
/// one on every append so derived data can be keyed on it.
pub trait TelemetryStore: Send + Sync {
    fn append(&self, sample: InteractionSample) -> BoxFuture<'_, Result<u64, StoreError>>;

    fn read<'a>(
        &'a self,
        learner_id: &'a str,
        window: SampleWindow,
    ) -> BoxFuture<'a, Result<TelemetrySlice, StoreError>>;

    fn version<'a>(&'a self, learner_id: &'a str) -> BoxFuture<'a, Result<u64, StoreError>>;
}

pub trait QuestionBank: Send + Sync {
    fn questions<'a>(
        &'a self,
        subject: &'a str,
        level: DifficultyLevel,
    ) -> BoxFuture<'a, Result<Vec<String>, StoreError>>;
}
