//! Need detection: every detector (the fixed rule set included) runs isolated,
//! and their contributions are merged into one de-duplicated, ranked set.

pub mod linear;
pub mod rules;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture, FutureExt};
use tracing::{debug, warn};

use crate::cache::{self, keys, CacheStore};
use crate::personalization::config::NeedConfig;
use crate::personalization::metrics::{ComponentKind, MetricsRegistry};
use crate::personalization::types::{DetectedNeed, LearnerSignalVector, NeedProfile, NeedType};

pub use linear::{LinearModel, LinearNeedDetector};
pub use rules::RuleBasedDetector;

#[derive(Debug, Clone, thiserror::Error)]
pub enum DetectorError {
    #[error("detector failed: {0}")]
    Failed(String),
    #[error("insufficient evidence: {0}")]
    InsufficientEvidence(String),
}

pub trait Detector: Send + Sync {
    fn id(&self) -> &str;

    fn detect(&self, vector: &LearnerSignalVector) -> Result<Vec<DetectedNeed>, DetectorError>;
}

pub struct NeedDetector {
    detectors: Vec<Arc<dyn Detector>>,
    config: NeedConfig,
    metrics: Arc<MetricsRegistry>,
    cache: Option<Arc<dyn CacheStore>>,
}

impl NeedDetector {
    pub fn new(config: NeedConfig, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            detectors: Vec::new(),
            config,
            metrics,
            cache: None,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn detector_ids(&self) -> Vec<String> {
        self.detectors.iter().map(|d| d.id().to_string()).collect()
    }

    /// Runs every detector and merges what they report. A detector that errors,
    /// panics or exceeds its timeout contributes nothing.
    pub async fn detect_needs(
        &self,
        learner_id: &str,
        vector: &LearnerSignalVector,
    ) -> Vec<DetectedNeed> {
        let timeout = Duration::from_millis(self.config.detector_timeout_ms.max(1));
        let runs: Vec<BoxFuture<'_, Vec<DetectedNeed>>> = self
            .detectors
            .iter()
            .map(|detector| {
                let detector = Arc::clone(detector);
                let vector = vector.clone();
                async move { self.run_isolated(learner_id, detector, vector, timeout).await }.boxed()
            })
            .collect();
        let contributions: Vec<Vec<DetectedNeed>> = join_all(runs).await;
        merge_needs(contributions, self.config.confidence_floor)
    }

    async fn run_isolated(
        &self,
        learner_id: &str,
        detector: Arc<dyn Detector>,
        vector: LearnerSignalVector,
        timeout: Duration,
    ) -> Vec<DetectedNeed> {
        let id = detector.id().to_string();
        let start = Instant::now();
        let handle = tokio::task::spawn_blocking(move || detector.detect(&vector));
        let outcome = tokio::time::timeout(timeout, handle).await;
        self.metrics.record(
            ComponentKind::Detector,
            &id,
            start.elapsed().as_micros() as u64,
        );

        match outcome {
            Ok(Ok(Ok(needs))) => needs
                .into_iter()
                .map(|need| {
                    if need.sources.iter().any(|s| s == &id) {
                        need
                    } else {
                        need.with_source(id.clone())
                    }
                })
                .collect(),
            Ok(Ok(Err(DetectorError::InsufficientEvidence(reason)))) => {
                debug!(learner_id = %learner_id, detector = %id, reason = %reason, "detector skipped");
                Vec::new()
            }
            Ok(Ok(Err(err))) => {
                self.metrics.record_error(ComponentKind::Detector, &id);
                warn!(learner_id = %learner_id, detector = %id, error = %err, "detector failed");
                Vec::new()
            }
            Ok(Err(join_err)) => {
                self.metrics.record_error(ComponentKind::Detector, &id);
                warn!(learner_id = %learner_id, detector = %id, error = %join_err, "detector panicked");
                Vec::new()
            }
            Err(_) => {
                self.metrics.record_timeout(ComponentKind::Detector, &id);
                warn!(
                    learner_id = %learner_id,
                    detector = %id,
                    timeout_ms = timeout.as_millis() as u64,
                    "detector timed out"
                );
                Vec::new()
            }
        }
    }

    /// Need profile for the given signal vector, served from cache while the entry
    /// matches the vector's version and has not expired.
    pub async fn profile(&self, vector: &LearnerSignalVector) -> NeedProfile {
        let key = keys::need_profile_key(&vector.learner_id, vector.version);
        if let Some(ref cache) = self.cache {
            if let Some(profile) = cache::get_json::<NeedProfile>(cache.as_ref(), &key).await {
                if profile.version == vector.version {
                    debug!(learner_id = %vector.learner_id, version = vector.version, "need profile cache hit");
                    return profile;
                }
            }
        }

        let needs = self.detect_needs(&vector.learner_id, vector).await;
        let profile = NeedProfile {
            learner_id: vector.learner_id.clone(),
            version: vector.version,
            needs,
            computed_at: chrono::Utc::now().timestamp_millis(),
        };

        if let Some(ref cache) = self.cache {
            let ttl = Duration::from_secs(self.config.profile_ttl_secs);
            cache::set_json(cache.as_ref(), &key, &profile, ttl).await;
        }
        profile
    }
}

struct MergedNeed {
    need: DetectedNeed,
    confidence_sum: f64,
    contributions: usize,
}

fn push_unique(target: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

/// Merges per-detector findings: one entry per need type with the mean confidence,
/// the maximum severity and the ordered union of evidence, recommendations and
/// sources. Entries under `floor` are dropped; the rest are ordered by confidence
/// (descending), then type name.
pub fn merge_needs(contributions: Vec<Vec<DetectedNeed>>, floor: f64) -> Vec<DetectedNeed> {
    let mut merged: BTreeMap<NeedType, MergedNeed> = BTreeMap::new();

    for need in contributions.into_iter().flatten() {
        if !need.confidence.is_finite() {
            continue;
        }
        match merged.get_mut(&need.need_type) {
            Some(entry) => {
                entry.confidence_sum += need.confidence;
                entry.contributions += 1;
                entry.need.severity = entry.need.severity.max(need.severity);
                push_unique(&mut entry.need.evidence, need.evidence);
                push_unique(&mut entry.need.recommendations, need.recommendations);
                push_unique(&mut entry.need.sources, need.sources);
            }
            None => {
                merged.insert(
                    need.need_type,
                    MergedNeed {
                        confidence_sum: need.confidence,
                        contributions: 1,
                        need,
                    },
                );
            }
        }
    }

    let mut needs: Vec<DetectedNeed> = merged
        .into_values()
        .map(|entry| {
            let mut need = entry.need;
            need.confidence = (entry.confidence_sum / entry.contributions as f64).clamp(0.0, 1.0);
            need
        })
        .filter(|need| need.confidence >= floor)
        .collect();

    needs.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.need_type.as_str().cmp(b.need_type.as_str()))
    });
    needs
}
