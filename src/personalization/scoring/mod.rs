//! Independent scoring strategies and the bounded fan-out that runs them.

pub mod affinity;
pub mod compatibility;
pub mod exploration;
pub mod peer;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::personalization::config::{FeatureFlags, ScoringConfig};
use crate::personalization::engagement::EngagementSnapshot;
use crate::personalization::error::EngineError;
use crate::personalization::metrics::{ComponentKind, MetricsRegistry};
use crate::personalization::types::{
    ContentItem, LearnerProfile, RecommendationContext, ScoringStrategyResult,
};

pub use affinity::ContentAffinityStrategy;
pub use compatibility::NeedCompatibilityStrategy;
pub use exploration::ExplorationStrategy;
pub use peer::PeerSimilarityStrategy;

pub const PEER_SIMILARITY: &str = "peer-similarity";
pub const CONTENT_AFFINITY: &str = "content-affinity";
pub const EXPLORATION: &str = "exploration";
pub const NEED_COMPATIBILITY: &str = "need-compatibility";

/// Request-scoped inputs shared by every strategy.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub request: RecommendationContext,
    pub engagement: EngagementSnapshot,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StrategyError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("{0}")]
    Failed(String),
}

pub trait ScoringStrategy: Send + Sync {
    fn id(&self) -> &str;

    /// Score in [0,1] plus a short human-readable rationale.
    fn score(
        &self,
        item: &ContentItem,
        profile: &LearnerProfile,
        context: &ScoringContext,
    ) -> Result<(f64, String), StrategyError>;
}

/// Strategies enabled by the feature flags, in fusion order.
pub fn default_strategies(
    config: &ScoringConfig,
    flags: &FeatureFlags,
) -> Vec<Arc<dyn ScoringStrategy>> {
    let mut strategies: Vec<Arc<dyn ScoringStrategy>> = Vec::new();
    if flags.peer_similarity_enabled {
        strategies.push(Arc::new(PeerSimilarityStrategy::new(
            config.peer_top_k,
            config.peer_min_similarity,
        )));
    }
    if flags.content_affinity_enabled {
        strategies.push(Arc::new(ContentAffinityStrategy::new(
            config.zpd_optimal_gap,
            config.zpd_width,
        )));
    }
    if flags.exploration_enabled {
        strategies.push(Arc::new(ExplorationStrategy::new(config.exploration_c)));
    }
    if flags.need_compatibility_enabled {
        strategies.push(Arc::new(NeedCompatibilityStrategy::default()));
    }
    strategies
}

#[derive(Debug, Default)]
pub struct ScoreBatch {
    /// One entry per strategy that produced at least one score, in registration order.
    pub results: Vec<Vec<ScoringStrategyResult>>,
    /// Strategies that failed or timed out; they contributed nothing.
    pub degraded: Vec<EngineError>,
}

type StrategyOutcome = (usize, Result<Vec<ScoringStrategyResult>, EngineError>);

enum RunFailure {
    Deadline,
    Panicked(String),
    AllItemsFailed(String),
}

pub struct MultiStrategyScorer {
    strategies: Vec<Arc<dyn ScoringStrategy>>,
    config: ScoringConfig,
    metrics: Arc<MetricsRegistry>,
}

impl MultiStrategyScorer {
    pub fn new(
        strategies: Vec<Arc<dyn ScoringStrategy>>,
        config: ScoringConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            strategies,
            config,
            metrics,
        }
    }

    pub fn strategy_ids(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.id().to_string()).collect()
    }

    /// Runs every strategy over the candidates with at most `max_concurrency` in
    /// flight. Each strategy gets its own deadline; a strategy that errors, panics
    /// or overruns is reported in `degraded` and omitted from `results`.
    pub async fn score(
        &self,
        candidates: &[ContentItem],
        profile: &LearnerProfile,
        context: &ScoringContext,
    ) -> ScoreBatch {
        if candidates.is_empty() || self.strategies.is_empty() {
            return ScoreBatch::default();
        }

        let items: Arc<Vec<ContentItem>> = Arc::new(candidates.to_vec());
        let profile = Arc::new(profile.clone());
        let context = Arc::new(context.clone());
        let timeout = Duration::from_millis(self.config.strategy_timeout_ms.max(1));
        let concurrency = self
            .strategies
            .len()
            .min(self.config.max_concurrency.max(1));

        // Boxed so the request future stays `Send` for every borrow lifetime.
        let runs: Vec<BoxFuture<'_, StrategyOutcome>> = self
            .strategies
            .iter()
            .enumerate()
            .map(|(index, strategy)| {
                let strategy = Arc::clone(strategy);
                let items = Arc::clone(&items);
                let profile = Arc::clone(&profile);
                let context = Arc::clone(&context);
                async move {
                    let outcome = self
                        .run_strategy(strategy, items, profile, context, timeout)
                        .await;
                    (index, outcome)
                }
                .boxed()
            })
            .collect();

        let mut outcomes: Vec<StrategyOutcome> =
            stream::iter(runs)
                .buffer_unordered(concurrency)
                .collect()
                .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let mut batch = ScoreBatch::default();
        for (_, outcome) in outcomes {
            match outcome {
                Ok(results) if !results.is_empty() => batch.results.push(results),
                Ok(_) => {}
                Err(err) => batch.degraded.push(err),
            }
        }
        batch
    }

    async fn run_strategy(
        &self,
        strategy: Arc<dyn ScoringStrategy>,
        items: Arc<Vec<ContentItem>>,
        profile: Arc<LearnerProfile>,
        context: Arc<ScoringContext>,
        timeout: Duration,
    ) -> Result<Vec<ScoringStrategyResult>, EngineError> {
        let id = strategy.id().to_string();
        let learner_id = profile.learner_id.clone();
        let start = Instant::now();
        let deadline = start + timeout;

        let worker_id = id.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let mut results = Vec::with_capacity(items.len());
            let mut item_errors = 0usize;
            let mut last_error = String::new();
            for item in items.iter() {
                if Instant::now() >= deadline {
                    return Err(RunFailure::Deadline);
                }
                match strategy.score(item, &profile, &context) {
                    Ok((score, rationale)) if score.is_finite() => {
                        results.push(ScoringStrategyResult {
                            strategy_id: worker_id.clone(),
                            content_id: item.id.clone(),
                            score: score.clamp(0.0, 1.0),
                            rationale,
                        });
                    }
                    Ok(_) => item_errors += 1,
                    Err(err) => {
                        item_errors += 1;
                        last_error = err.to_string();
                    }
                }
            }
            if results.is_empty() && item_errors > 0 {
                return Err(RunFailure::AllItemsFailed(last_error));
            }
            if item_errors > 0 {
                debug!(strategy = %worker_id, item_errors, "strategy dropped item scores");
            }
            Ok(results)
        });

        let outcome = tokio::time::timeout(timeout, handle).await;
        self.metrics.record(
            ComponentKind::Strategy,
            &id,
            start.elapsed().as_micros() as u64,
        );

        let failure = match outcome {
            Ok(Ok(Ok(results))) => return Ok(results),
            Ok(Ok(Err(failure))) => failure,
            Ok(Err(join_err)) => RunFailure::Panicked(join_err.to_string()),
            Err(_) => RunFailure::Deadline,
        };

        let err = match failure {
            RunFailure::Deadline => {
                self.metrics.record_timeout(ComponentKind::Strategy, &id);
                EngineError::StrategyTimeout {
                    strategy: id.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                }
            }
            RunFailure::Panicked(reason) | RunFailure::AllItemsFailed(reason) => {
                self.metrics.record_error(ComponentKind::Strategy, &id);
                EngineError::StrategyFailure {
                    strategy: id.clone(),
                    reason,
                }
            }
        };
        warn!(learner_id = %learner_id, strategy = %id, error = %err, "strategy degraded");
        Err(err)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::personalization::types::{ContentType, DifficultyLevel, LearnerSignalVector};
    use std::collections::BTreeMap;

    pub(crate) fn item(id: &str, content_type: ContentType, difficulty: DifficultyLevel) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            subject: "math".to_string(),
            content_type,
            difficulty,
            prerequisites: vec![],
            skills: vec!["fractions".to_string()],
            estimated_minutes: 10,
            cultural_tags: vec![],
            accessibility_features: vec![],
            cultural_relevance: 0.5,
            accessibility_score: 0.5,
        }
    }

    pub(crate) fn profile() -> LearnerProfile {
        LearnerProfile {
            learner_id: "l1".to_string(),
            signals: LearnerSignalVector::neutral("l1", 1),
            needs: vec![],
            mastery: BTreeMap::new(),
        }
    }

    pub(crate) fn context() -> ScoringContext {
        ScoringContext {
            request: RecommendationContext::new("math"),
            engagement: EngagementSnapshot::default(),
        }
    }

    struct Constant(&'static str, f64);

    impl ScoringStrategy for Constant {
        fn id(&self) -> &str {
            self.0
        }

        fn score(
            &self,
            _: &ContentItem,
            _: &LearnerProfile,
            _: &ScoringContext,
        ) -> Result<(f64, String), StrategyError> {
            Ok((self.1, "constant".to_string()))
        }
    }

    struct Slow;

    impl ScoringStrategy for Slow {
        fn id(&self) -> &str {
            "slow"
        }

        fn score(
            &self,
            _: &ContentItem,
            _: &LearnerProfile,
            _: &ScoringContext,
        ) -> Result<(f64, String), StrategyError> {
            std::thread::sleep(Duration::from_millis(200));
            Ok((1.0, "slow".to_string()))
        }
    }

    struct FailsOn(&'static str);

    impl ScoringStrategy for FailsOn {
        fn id(&self) -> &str {
            "picky"
        }

        fn score(
            &self,
            item: &ContentItem,
            _: &LearnerProfile,
            _: &ScoringContext,
        ) -> Result<(f64, String), StrategyError> {
            if item.id == self.0 {
                Err(StrategyError::Failed("bad item".to_string()))
            } else {
                Ok((0.4, "ok".to_string()))
            }
        }
    }

    struct Panics;

    impl ScoringStrategy for Panics {
        fn id(&self) -> &str {
            "panics"
        }

        fn score(
            &self,
            _: &ContentItem,
            _: &LearnerProfile,
            _: &ScoringContext,
        ) -> Result<(f64, String), StrategyError> {
            panic!("strategy bug")
        }
    }

    fn scorer(strategies: Vec<Arc<dyn ScoringStrategy>>, timeout_ms: u64) -> MultiStrategyScorer {
        MultiStrategyScorer::new(
            strategies,
            ScoringConfig {
                strategy_timeout_ms: timeout_ms,
                ..ScoringConfig::default()
            },
            Arc::new(MetricsRegistry::new()),
        )
    }

    #[tokio::test]
    async fn results_are_clamped_and_ordered_by_registration() {
        let scorer = scorer(
            vec![Arc::new(Constant("high", 3.0)), Arc::new(Constant("nan", f64::NAN)), Arc::new(Constant("low", -1.0))],
            1000,
        );
        let items = vec![item("a", ContentType::Quiz, DifficultyLevel::Easy)];
        let batch = scorer.score(&items, &profile(), &context()).await;

        assert_eq!(batch.results.len(), 2);
        assert_eq!(batch.results[0][0].strategy_id, "high");
        assert_eq!(batch.results[0][0].score, 1.0);
        assert_eq!(batch.results[1][0].score, 0.0);
        assert_eq!(batch.degraded.len(), 1);
    }

    #[tokio::test]
    async fn slow_and_panicking_strategies_degrade() {
        let scorer = scorer(
            vec![Arc::new(Slow), Arc::new(Panics), Arc::new(Constant("ok", 0.6))],
            50,
        );
        let items = vec![
            item("a", ContentType::Quiz, DifficultyLevel::Easy),
            item("b", ContentType::Video, DifficultyLevel::Hard),
        ];
        let batch = scorer.score(&items, &profile(), &context()).await;

        assert_eq!(batch.results.len(), 1);
        assert_eq!(batch.results[0].len(), 2);
        assert!(batch
            .degraded
            .iter()
            .any(|e| matches!(e, EngineError::StrategyTimeout { strategy, .. } if strategy == "slow")));
        assert!(batch
            .degraded
            .iter()
            .any(|e| matches!(e, EngineError::StrategyFailure { strategy, .. } if strategy == "panics")));
    }

    #[tokio::test]
    async fn item_errors_drop_only_that_item() {
        let scorer = scorer(vec![Arc::new(FailsOn("b"))], 1000);
        let items = vec![
            item("a", ContentType::Quiz, DifficultyLevel::Easy),
            item("b", ContentType::Quiz, DifficultyLevel::Easy),
        ];
        let batch = scorer.score(&items, &profile(), &context()).await;
        let ids: Vec<&str> = batch.results[0].iter().map(|r| r.content_id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert!(batch.degraded.is_empty());
    }

    #[tokio::test]
    async fn empty_candidates_score_nothing() {
        let scorer = scorer(vec![Arc::new(Constant("c", 0.5))], 1000);
        let batch = scorer.score(&[], &profile(), &context()).await;
        assert!(batch.results.is_empty());
    }

    #[test]
    fn feature_flags_select_strategies() {
        let flags = FeatureFlags {
            exploration_enabled: false,
            ..FeatureFlags::default()
        };
        let ids: Vec<String> = default_strategies(&ScoringConfig::default(), &flags)
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(ids, vec![PEER_SIMILARITY, CONTENT_AFFINITY, NEED_COMPATIBILITY]);
    }
}
