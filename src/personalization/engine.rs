use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{CacheStore, MemoryCache};
use crate::personalization::candidates::{CandidateGenerator, CandidateSet};
use crate::personalization::config::EngineConfig;
use crate::personalization::difficulty::DifficultyController;
use crate::personalization::diversify::{seeded_rng, Diversifier};
use crate::personalization::engagement::EngagementStore;
use crate::personalization::error::EngineError;
use crate::personalization::fusion;
use crate::personalization::metrics::{ComponentStatus, MetricsRegistry};
use crate::personalization::needs::{Detector, NeedDetector, RuleBasedDetector};
use crate::personalization::performance::LearnerPerformance;
use crate::personalization::scoring::{
    default_strategies, MultiStrategyScorer, ScoringContext, ScoringStrategy,
};
use crate::personalization::sessions::SessionManager;
use crate::personalization::signals::{FeatureExtractor, SignalExtractor, WindowFeatureExtractor};
use crate::personalization::types::{
    AssessmentResults, AssessmentSession, Feedback, InteractionSample, LearnerProfile,
    NeedProfile, Recommendation, RecommendationConstraints, RecommendationContext, Response,
    SessionConfig, SubmitOutcome,
};
use crate::stores::{ContentStore, QuestionBank, TelemetryStore};
use crate::track_stage;

const DEFAULT_CACHE_CAPACITY: usize = 10_000;
const MAX_SERVED_PER_LEARNER: usize = 500;

type ServedScores = HashMap<String, HashMap<String, BTreeMap<String, f64>>>;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    pub sessions_expired: usize,
    pub sessions_removed: usize,
    pub cache_entries_purged: usize,
}

pub struct EngineBuilder {
    content: Arc<dyn ContentStore>,
    telemetry: Arc<dyn TelemetryStore>,
    config: EngineConfig,
    cache: Option<Arc<dyn CacheStore>>,
    questions: Option<Arc<dyn QuestionBank>>,
    detectors: Vec<Arc<dyn Detector>>,
    strategies: Option<Vec<Arc<dyn ScoringStrategy>>>,
    extra_strategies: Vec<Arc<dyn ScoringStrategy>>,
    extractor: Option<Arc<dyn FeatureExtractor>>,
}

impl EngineBuilder {
    pub fn new(content: Arc<dyn ContentStore>, telemetry: Arc<dyn TelemetryStore>) -> Self {
        Self {
            content,
            telemetry,
            config: EngineConfig::default(),
            cache: None,
            questions: None,
            detectors: Vec::new(),
            strategies: None,
            extra_strategies: Vec::new(),
            extractor: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn question_bank(mut self, questions: Arc<dyn QuestionBank>) -> Self {
        self.questions = Some(questions);
        self
    }

    /// Adds a detector alongside the built-in threshold rules.
    pub fn detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Adds a strategy alongside the flag-enabled defaults.
    pub fn strategy(mut self, strategy: Arc<dyn ScoringStrategy>) -> Self {
        self.extra_strategies.push(strategy);
        self
    }

    /// Replaces the default strategy set entirely.
    pub fn strategies(mut self, strategies: Vec<Arc<dyn ScoringStrategy>>) -> Self {
        self.strategies = Some(strategies);
        self
    }

    pub fn feature_extractor(mut self, extractor: Arc<dyn FeatureExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn build(self) -> PersonalizationEngine {
        let config = self.config;
        let flags = config.feature_flags.clone();
        let metrics = Arc::new(MetricsRegistry::new());
        let cache: Arc<dyn CacheStore> = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryCache::new(DEFAULT_CACHE_CAPACITY)));

        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(WindowFeatureExtractor::new(config.signals.clone())));
        let signals = SignalExtractor::new(self.telemetry, extractor, config.signals.clone());

        let mut needs = NeedDetector::new(config.needs.clone(), Arc::clone(&metrics))
            .with_detector(Arc::new(RuleBasedDetector::new(config.signals.clone())));
        for detector in self.detectors {
            needs = needs.with_detector(detector);
        }
        if flags.need_cache_enabled {
            needs = needs.with_cache(Arc::clone(&cache));
        }

        let mut candidates = CandidateGenerator::new(self.content, config.candidates.clone());
        if flags.candidate_cache_enabled {
            candidates = candidates.with_cache(Arc::clone(&cache));
        }

        let mut strategies = self
            .strategies
            .unwrap_or_else(|| default_strategies(&config.scoring, &flags));
        strategies.extend(self.extra_strategies);
        let scorer = MultiStrategyScorer::new(strategies, config.scoring.clone(), Arc::clone(&metrics));

        let sessions = SessionManager::new(
            DifficultyController::new(config.difficulty.clone()),
            self.questions,
            config.sessions.clone(),
        );

        info!(
            strategies = ?scorer.strategy_ids(),
            detectors = ?needs.detector_ids(),
            "personalization engine ready"
        );

        PersonalizationEngine {
            performance: LearnerPerformance::new(config.fusion.clone()),
            diversifier: Diversifier::new(config.diversity.clone()),
            engagement: Arc::new(EngagementStore::new()),
            served: Mutex::new(HashMap::new()),
            signals,
            needs,
            candidates,
            scorer,
            sessions,
            metrics,
            cache,
            config,
        }
    }
}

/// Entry point for everything the engine does. All collaborators are injected
/// through [`EngineBuilder`]; no state is shared between engine instances.
pub struct PersonalizationEngine {
    config: EngineConfig,
    signals: SignalExtractor,
    needs: NeedDetector,
    candidates: CandidateGenerator,
    scorer: MultiStrategyScorer,
    engagement: Arc<EngagementStore>,
    performance: LearnerPerformance,
    diversifier: Diversifier,
    sessions: SessionManager,
    metrics: Arc<MetricsRegistry>,
    cache: Arc<dyn CacheStore>,
    served: Mutex<ServedScores>,
}

fn require_learner(learner_id: &str) -> Result<(), EngineError> {
    if learner_id.trim().is_empty() {
        return Err(EngineError::validation("learnerId must not be empty"));
    }
    Ok(())
}

impl PersonalizationEngine {
    pub fn builder(
        content: Arc<dyn ContentStore>,
        telemetry: Arc<dyn TelemetryStore>,
    ) -> EngineBuilder {
        EngineBuilder::new(content, telemetry)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn engagement(&self) -> Arc<EngagementStore> {
        Arc::clone(&self.engagement)
    }

    pub fn metrics(&self) -> Arc<MetricsRegistry> {
        Arc::clone(&self.metrics)
    }

    pub fn metrics_snapshot(&self) -> Vec<ComponentStatus> {
        self.metrics.snapshot()
    }

    pub async fn submit_interaction(
        &self,
        learner_id: &str,
        mut sample: InteractionSample,
    ) -> Result<(), EngineError> {
        require_learner(learner_id)?;
        if sample.learner_id.is_empty() {
            sample.learner_id = learner_id.to_string();
        } else if sample.learner_id != learner_id {
            return Err(EngineError::validation(format!(
                "sample learnerId {} does not match {}",
                sample.learner_id, learner_id
            )));
        }

        let version = self.signals.record(sample).await?;
        let vector = self
            .signals
            .extract(learner_id, self.signals.default_window())
            .await?;
        self.engagement.record_vector(&vector);
        debug!(learner_id = %learner_id, version, "interaction recorded");
        Ok(())
    }

    pub async fn need_profile(&self, learner_id: &str) -> Result<NeedProfile, EngineError> {
        require_learner(learner_id)?;
        let vector = self
            .signals
            .extract(learner_id, self.signals.default_window())
            .await?;
        Ok(self.needs.profile(&vector).await)
    }

    /// Ranked, diversified recommendations. Strategies that fail or overrun are left
    /// out of the fusion; store failures surface as `DataAccess`.
    pub async fn get_recommendations(
        &self,
        learner_id: &str,
        context: RecommendationContext,
        constraints: RecommendationConstraints,
    ) -> Result<Vec<Recommendation>, EngineError> {
        require_learner(learner_id)?;
        context.validate().map_err(EngineError::Validation)?;
        constraints.validate().map_err(EngineError::Validation)?;

        let signals = track_stage!(
            self.metrics,
            "signal_extraction",
            self.signals
                .extract(learner_id, self.signals.default_window())
                .await
        )?;
        self.engagement.record_vector(&signals);

        let profile = track_stage!(self.metrics, "need_detection", self.needs.profile(&signals).await);

        let CandidateSet {
            items: candidates,
            mastery,
        } = track_stage!(
            self.metrics,
            "candidate_generation",
            self.candidates
                .generate(learner_id, &context.subject, &constraints)
                .await
        )?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let learner = LearnerProfile {
            learner_id: learner_id.to_string(),
            signals,
            needs: profile.needs,
            mastery,
        };
        let scoring_context = ScoringContext {
            request: context,
            engagement: self.engagement.snapshot(learner_id),
        };
        let batch = track_stage!(
            self.metrics,
            "scoring",
            self.scorer.score(&candidates, &learner, &scoring_context).await
        );
        if !batch.degraded.is_empty() {
            debug!(
                learner_id = %learner_id,
                degraded = batch.degraded.len(),
                "ranking with degraded strategies"
            );
        }

        let fusion_config = &self.config.fusion;
        let mut weights =
            fusion::adjusted_weights(fusion_config, &self.scorer.strategy_ids(), &learner);
        if self.config.feature_flags.trust_blending_enabled {
            weights = self.performance.blend(learner_id, &weights);
        }
        fusion::finalize_weights(&mut weights, fusion_config.min_weight);

        let generated_at = chrono::Utc::now().timestamp_millis();
        let ranked = track_stage!(
            self.metrics,
            "fusion",
            fusion::fuse(&batch.results, &weights, &candidates, generated_at)
        );

        let output_size = constraints
            .max_results
            .unwrap_or_else(|| self.diversifier.output_size());
        let mut rng = seeded_rng(learner_id, learner.signals.version, self.config.diversity.seed);
        let recommendations = track_stage!(
            self.metrics,
            "diversification",
            self.diversifier.diversify(ranked, output_size, &mut rng)
        );

        self.remember_served(learner_id, &recommendations);
        info!(
            learner_id = %learner_id,
            candidates = candidates.len(),
            returned = recommendations.len(),
            "recommendations generated"
        );
        Ok(recommendations)
    }

    fn remember_served(&self, learner_id: &str, recommendations: &[Recommendation]) {
        let mut served = self.served.lock();
        let entry = served.entry(learner_id.to_string()).or_default();
        if entry.len() + recommendations.len() > MAX_SERVED_PER_LEARNER {
            entry.clear();
        }
        for rec in recommendations {
            entry.insert(rec.content_id.clone(), rec.metadata.strategy_scores.clone());
        }
    }

    /// Records an observed outcome. Updates engagement statistics, and the learner's
    /// strategy trust when the item was served with per-strategy scores.
    pub async fn record_feedback(
        &self,
        learner_id: &str,
        feedback: Feedback,
    ) -> Result<(), EngineError> {
        require_learner(learner_id)?;
        feedback.validate().map_err(EngineError::Validation)?;

        self.engagement
            .record_outcome(learner_id, &feedback.content_id, feedback.reward);
        let predicted = self
            .served
            .lock()
            .get(learner_id)
            .and_then(|items| items.get(&feedback.content_id).cloned());
        match predicted {
            Some(scores) => self.performance.record(learner_id, &scores, feedback.reward),
            None => debug!(
                learner_id = %learner_id,
                content_id = %feedback.content_id,
                "feedback for content not served to this learner"
            ),
        }
        Ok(())
    }

    pub async fn start_session(
        &self,
        learner_id: &str,
        subject: &str,
        config: SessionConfig,
    ) -> Result<AssessmentSession, EngineError> {
        let profile = self.need_profile(learner_id).await?;
        self.sessions
            .start(learner_id, subject, config, &profile.needs)
            .await
    }

    pub async fn submit_response(
        &self,
        session_id: &str,
        response: Response,
    ) -> Result<SubmitOutcome, EngineError> {
        self.sessions.submit(session_id, response).await
    }

    pub async fn complete_session(&self, session_id: &str) -> Result<AssessmentResults, EngineError> {
        self.sessions.complete(session_id).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<AssessmentSession, EngineError> {
        self.sessions.get(session_id).await
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.active_count()
    }

    /// Invalidates all cached candidate sets.
    pub fn bump_content_version(&self) -> u64 {
        let version = self.candidates.bump_content_version();
        info!(content_version = version, "content version bumped");
        version
    }

    pub fn run_maintenance(&self) -> MaintenanceReport {
        let sweep = self
            .sessions
            .sweep(self.sessions.retention(), self.sessions.idle_timeout());
        let report = MaintenanceReport {
            sessions_expired: sweep.expired,
            sessions_removed: sweep.removed,
            cache_entries_purged: self.cache.purge_expired(),
        };
        if report.sessions_expired > 0 || report.sessions_removed > 0 || report.cache_entries_purged > 0 {
            info!(
                sessions_expired = report.sessions_expired,
                sessions_removed = report.sessions_removed,
                cache_entries_purged = report.cache_entries_purged,
                "maintenance sweep finished"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personalization::types::{ContentItem, ContentType, DifficultyLevel, LearnerSignalVector};
    use crate::stores::{InMemoryContentStore, InMemoryTelemetryStore};

    fn item(id: &str) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            subject: "math".to_string(),
            content_type: ContentType::Quiz,
            difficulty: DifficultyLevel::Medium,
            prerequisites: vec![],
            skills: vec!["fractions".to_string()],
            estimated_minutes: 10,
            cultural_tags: vec![],
            accessibility_features: vec![],
            cultural_relevance: 0.5,
            accessibility_score: 0.5,
        }
    }

    fn engine() -> PersonalizationEngine {
        let content = Arc::new(InMemoryContentStore::new(vec![item("a"), item("b")]));
        let telemetry = Arc::new(InMemoryTelemetryStore::new());
        PersonalizationEngine::builder(content, telemetry).build()
    }

    #[tokio::test]
    async fn mismatched_sample_learner_is_rejected() {
        let err = engine()
            .submit_interaction("l1", InteractionSample::new("l2", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn feedback_on_served_items_builds_trust() {
        let engine = engine();
        let recs = engine
            .get_recommendations("l1", RecommendationContext::new("math"), Default::default())
            .await
            .unwrap();
        assert!(!recs.is_empty());

        let feedback = Feedback {
            content_id: recs[0].content_id.clone(),
            reward: 1.0,
            completed: true,
        };
        engine.record_feedback("l1", feedback).await.unwrap();
        let tracker = engine.performance.tracker("l1").unwrap();
        assert_eq!(tracker.feedback_count(), 1);
        assert_eq!(engine.engagement().total_events(), 1);
    }

    struct CountingExtractor(std::sync::atomic::AtomicUsize);

    impl FeatureExtractor for CountingExtractor {
        fn extract(
            &self,
            learner_id: &str,
            version: u64,
            _samples: &[InteractionSample],
        ) -> LearnerSignalVector {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            LearnerSignalVector::neutral(learner_id, version)
        }
    }

    #[tokio::test]
    async fn custom_feature_extractor_is_used() {
        let extractor = Arc::new(CountingExtractor(Default::default()));
        let engine = PersonalizationEngine::builder(
            Arc::new(InMemoryContentStore::new(vec![item("a")])),
            Arc::new(InMemoryTelemetryStore::new()),
        )
        .feature_extractor(extractor.clone())
        .build();

        engine
            .submit_interaction("l1", InteractionSample::new("l1", 1))
            .await
            .unwrap();
        assert!(extractor.0.load(std::sync::atomic::Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn stages_are_tracked() {
        let engine = engine();
        engine
            .get_recommendations("l1", RecommendationContext::new("math"), Default::default())
            .await
            .unwrap();
        let names: Vec<String> = engine.metrics_snapshot().into_iter().map(|s| s.name).collect();
        assert!(names.contains(&"scoring".to_string()));
        assert!(names.contains(&"diversification".to_string()));
    }
}
