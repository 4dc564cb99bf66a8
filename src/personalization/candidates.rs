use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::{self, keys, CacheStore};
use crate::personalization::config::CandidateConfig;
use crate::personalization::error::EngineError;
use crate::personalization::types::{ContentItem, RecommendationConstraints};
use crate::stores::{ContentStore, StoreError};

pub struct CandidateGenerator {
    content: Arc<dyn ContentStore>,
    cache: Option<Arc<dyn CacheStore>>,
    config: CandidateConfig,
    content_version: AtomicU64,
}

impl CandidateGenerator {
    pub fn new(content: Arc<dyn ContentStore>, config: CandidateConfig) -> Self {
        Self {
            content,
            cache: None,
            config,
            content_version: AtomicU64::new(1),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn content_version(&self) -> u64 {
        self.content_version.load(Ordering::SeqCst)
    }

    /// Invalidates every cached candidate set by moving all keys to a new version.
    pub fn bump_content_version(&self) -> u64 {
        self.content_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let timeout_ms = self.config.store_timeout_ms;
        let result = tokio::time::timeout(Duration::from_millis(timeout_ms), fut)
            .await
            .map_err(|_| StoreError::Timeout {
                operation,
                timeout_ms,
            })??;
        Ok(result)
    }

    async fn mastery_record(
        &self,
        learner_id: &str,
    ) -> Result<BTreeMap<String, f64>, EngineError> {
        self.bounded(
            "get_mastery_record",
            self.content.get_mastery_record(learner_id),
        )
        .await
    }

    /// Eligible items for the learner, sorted by id and bounded to `max_candidates`,
    /// together with the mastery record they were filtered against. The store's
    /// content list is cached; prerequisite filtering always uses fresh mastery.
    /// An empty result is not an error.
    pub async fn generate(
        &self,
        learner_id: &str,
        subject: &str,
        constraints: &RecommendationConstraints,
    ) -> Result<CandidateSet, EngineError> {
        constraints.validate().map_err(EngineError::Validation)?;

        let items = self.eligible_content(learner_id, subject, constraints).await?;
        let mastery = self.mastery_record(learner_id).await?;

        let items = filter_candidates(
            items,
            &mastery,
            constraints,
            self.config.mastery_threshold,
            self.config.max_candidates,
        );
        if items.is_empty() {
            info!(learner_id = %learner_id, subject = %subject, "no eligible candidates");
        }
        Ok(CandidateSet { items, mastery })
    }

    async fn eligible_content(
        &self,
        learner_id: &str,
        subject: &str,
        constraints: &RecommendationConstraints,
    ) -> Result<Vec<ContentItem>, EngineError> {
        let key = keys::candidates_key(
            learner_id,
            subject,
            &constraints.fingerprint(),
            self.content_version(),
        );
        if let Some(ref cache) = self.cache {
            if let Some(items) = cache::get_json::<Vec<ContentItem>>(cache.as_ref(), &key).await {
                debug!(learner_id = %learner_id, subject = %subject, count = items.len(), "candidate cache hit");
                return Ok(items);
            }
        }

        let items = self
            .bounded(
                "get_eligible_content",
                self.content
                    .get_eligible_content(learner_id, subject, constraints),
            )
            .await?;

        if let Some(ref cache) = self.cache {
            let ttl = Duration::from_secs(self.config.cache_ttl_secs);
            cache::set_json(cache.as_ref(), &key, &items, ttl).await;
        }
        Ok(items)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    pub items: Vec<ContentItem>,
    pub mastery: BTreeMap<String, f64>,
}

pub fn prerequisites_met(
    item: &ContentItem,
    mastery: &BTreeMap<String, f64>,
    threshold: f64,
) -> bool {
    item.prerequisites
        .iter()
        .all(|skill| mastery.get(skill).copied().unwrap_or(0.0) >= threshold)
}

pub fn satisfies_constraints(item: &ContentItem, constraints: &RecommendationConstraints) -> bool {
    if let Some(max) = constraints.max_minutes {
        if item.estimated_minutes > max {
            return false;
        }
    }
    if !constraints.content_types.is_empty()
        && !constraints.content_types.contains(&item.content_type)
    {
        return false;
    }
    if !constraints
        .required_accessibility
        .iter()
        .all(|feature| item.accessibility_features.contains(feature))
    {
        return false;
    }
    !constraints.exclude_content_ids.contains(&item.id)
}

pub fn filter_candidates(
    items: Vec<ContentItem>,
    mastery: &BTreeMap<String, f64>,
    constraints: &RecommendationConstraints,
    mastery_threshold: f64,
    max_candidates: usize,
) -> Vec<ContentItem> {
    let mut seen = BTreeSet::new();
    let mut eligible: Vec<ContentItem> = items
        .into_iter()
        .filter(|item| {
            prerequisites_met(item, mastery, mastery_threshold)
                && satisfies_constraints(item, constraints)
        })
        .collect();
    eligible.sort_by(|a, b| a.id.cmp(&b.id));
    eligible.retain(|item| seen.insert(item.id.clone()));
    eligible.truncate(max_candidates);
    eligible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::personalization::types::{ContentType, DifficultyLevel};
    use crate::stores::InMemoryContentStore;

    fn item(id: &str, content_type: ContentType, minutes: u32, prereqs: &[&str]) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            subject: "math".to_string(),
            content_type,
            difficulty: DifficultyLevel::Medium,
            prerequisites: prereqs.iter().map(|s| s.to_string()).collect(),
            skills: vec!["fractions".to_string()],
            estimated_minutes: minutes,
            cultural_tags: vec![],
            accessibility_features: vec!["captions".to_string()],
            cultural_relevance: 0.5,
            accessibility_score: 0.5,
        }
    }

    #[test]
    fn prerequisites_need_threshold_mastery() {
        let mut mastery = BTreeMap::new();
        mastery.insert("counting".to_string(), 0.7);
        mastery.insert("division".to_string(), 0.4);
        assert!(prerequisites_met(&item("a", ContentType::Quiz, 5, &["counting"]), &mastery, 0.7));
        assert!(!prerequisites_met(&item("b", ContentType::Quiz, 5, &["division"]), &mastery, 0.7));
        assert!(!prerequisites_met(&item("c", ContentType::Quiz, 5, &["unknown"]), &mastery, 0.7));
    }

    #[test]
    fn hard_constraints_filter_items() {
        let constraints = RecommendationConstraints {
            max_minutes: Some(10),
            content_types: vec![ContentType::Video],
            required_accessibility: vec!["captions".to_string()],
            exclude_content_ids: vec!["v2".to_string()],
            max_results: None,
        };
        let items = vec![
            item("v1", ContentType::Video, 8, &[]),
            item("v2", ContentType::Video, 8, &[]),
            item("v3", ContentType::Video, 25, &[]),
            item("q1", ContentType::Quiz, 5, &[]),
        ];
        let out = filter_candidates(items, &BTreeMap::new(), &constraints, 0.7, 200);
        let ids: Vec<&str> = out.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["v1"]);
    }

    #[test]
    fn output_is_sorted_deduplicated_and_bounded() {
        let items = vec![
            item("c", ContentType::Quiz, 5, &[]),
            item("a", ContentType::Quiz, 5, &[]),
            item("b", ContentType::Quiz, 5, &[]),
            item("a", ContentType::Quiz, 5, &[]),
        ];
        let out = filter_candidates(
            items,
            &BTreeMap::new(),
            &RecommendationConstraints::default(),
            0.7,
            2,
        );
        let ids: Vec<&str> = out.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn version_bump_invalidates_cached_sets() {
        let store = Arc::new(InMemoryContentStore::new(vec![item("a", ContentType::Quiz, 5, &[])]));
        let generator = CandidateGenerator::new(store.clone(), CandidateConfig::default())
            .with_cache(Arc::new(MemoryCache::new(32)));
        let constraints = RecommendationConstraints::default();

        let count = |set: CandidateSet| set.items.len();
        assert_eq!(count(generator.generate("l1", "math", &constraints).await.unwrap()), 1);
        store.upsert_item(item("b", ContentType::Quiz, 5, &[]));
        assert_eq!(count(generator.generate("l1", "math", &constraints).await.unwrap()), 1);

        assert_eq!(generator.bump_content_version(), 2);
        assert_eq!(count(generator.generate("l1", "math", &constraints).await.unwrap()), 2);
    }

    #[tokio::test]
    async fn rising_mastery_unlocks_items_from_a_cached_set() {
        let store = Arc::new(InMemoryContentStore::new(vec![
            item("a", ContentType::Quiz, 5, &[]),
            item("b", ContentType::Quiz, 5, &["fractions"]),
        ]));
        let generator = CandidateGenerator::new(store.clone(), CandidateConfig::default())
            .with_cache(Arc::new(MemoryCache::new(32)));
        let constraints = RecommendationConstraints::default();

        let before = generator.generate("l1", "math", &constraints).await.unwrap();
        let ids: Vec<&str> = before.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);

        store.set_mastery("l1", "fractions", 0.95);
        let after = generator.generate("l1", "math", &constraints).await.unwrap();
        let ids: Vec<&str> = after.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(after.mastery.get("fractions"), Some(&0.95));
        assert_eq!(generator.content_version(), 1);
    }

    #[tokio::test]
    async fn invalid_constraints_are_rejected() {
        let generator = CandidateGenerator::new(
            Arc::new(InMemoryContentStore::default()),
            CandidateConfig::default(),
        );
        let constraints = RecommendationConstraints {
            max_results: Some(0),
            ..Default::default()
        };
        let err = generator.generate("l1", "math", &constraints).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
