use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::personalization::config::FusionConfig;

const COLD_TRUST: f64 = 0.33;
const TRUST_FLOOR: f64 = 0.2;
const BLEND_RAMP: f64 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StrategyPerformance {
    pub ema_accuracy: f64,
    pub sample_count: u64,
    pub trust_score: f64,
}

/// How well each strategy's score predicted the outcome a learner later reported.
#[derive(Debug, Clone)]
pub struct PerformanceTracker {
    pub strategies: BTreeMap<String, StrategyPerformance>,
    feedback_count: u64,
    ema_alpha: f64,
    min_samples: u64,
    max_blend: f64,
}

impl PerformanceTracker {
    pub fn new(ema_alpha: f64, min_samples: u64, max_blend: f64) -> Self {
        Self {
            strategies: BTreeMap::new(),
            feedback_count: 0,
            ema_alpha: ema_alpha.clamp(0.0, 1.0),
            min_samples,
            max_blend: max_blend.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &FusionConfig) -> Self {
        Self::new(
            config.trust_ema_alpha,
            config.trust_min_samples,
            config.trust_max_blend,
        )
    }

    pub fn feedback_count(&self) -> u64 {
        self.feedback_count
    }

    /// Records one outcome against the scores each strategy gave the item.
    /// Accuracy is counted only once the warm-up sample count is reached.
    pub fn update(&mut self, predicted: &BTreeMap<String, f64>, actual_reward: f64) {
        if predicted.is_empty() {
            return;
        }
        self.feedback_count += 1;
        let warm = self.feedback_count > self.min_samples;

        for (strategy, score) in predicted {
            let perf = self.strategies.entry(strategy.clone()).or_default();
            perf.sample_count += 1;
            if warm {
                let accuracy = 1.0 - (score - actual_reward).abs().min(1.0);
                perf.ema_accuracy =
                    (1.0 - self.ema_alpha) * perf.ema_accuracy + self.ema_alpha * accuracy;
            }
        }
        if warm {
            self.update_trust_scores();
        }
    }

    fn update_trust_scores(&mut self) {
        if self.strategies.is_empty() {
            return;
        }
        let max = self
            .strategies
            .values()
            .map(|p| p.ema_accuracy)
            .fold(f64::NEG_INFINITY, f64::max);
        let min = self
            .strategies
            .values()
            .map(|p| p.ema_accuracy)
            .fold(f64::INFINITY, f64::min);
        let range = (max - min).max(1e-6);

        for perf in self.strategies.values_mut() {
            perf.trust_score = ((perf.ema_accuracy - min) / range).clamp(TRUST_FLOOR, 1.0);
        }
    }

    pub fn blend_factor(&self) -> f64 {
        if self.feedback_count < self.min_samples {
            0.0
        } else {
            ((self.feedback_count - self.min_samples) as f64 / BLEND_RAMP).min(self.max_blend)
        }
    }

    /// Mixes `weights` toward the trust scores; unchanged until warm-up completes.
    pub fn blend(&self, weights: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        let blend = self.blend_factor();
        if blend <= 0.0 {
            return weights.clone();
        }
        weights
            .iter()
            .map(|(id, w)| {
                let trust = self
                    .strategies
                    .get(id)
                    .map(|p| p.trust_score)
                    .unwrap_or(COLD_TRUST);
                (id.clone(), (1.0 - blend) * w + blend * trust)
            })
            .collect()
    }
}

/// One tracker per learner.
pub struct LearnerPerformance {
    config: FusionConfig,
    trackers: Mutex<HashMap<String, PerformanceTracker>>,
}

impl LearnerPerformance {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            config,
            trackers: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, learner_id: &str, predicted: &BTreeMap<String, f64>, reward: f64) {
        let mut trackers = self.trackers.lock();
        trackers
            .entry(learner_id.to_string())
            .or_insert_with(|| PerformanceTracker::from_config(&self.config))
            .update(predicted, reward);
    }

    pub fn blend(&self, learner_id: &str, weights: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        match self.trackers.lock().get(learner_id) {
            Some(tracker) => tracker.blend(weights),
            None => weights.clone(),
        }
    }

    pub fn tracker(&self, learner_id: &str) -> Option<PerformanceTracker> {
        self.trackers.lock().get(learner_id).cloned()
    }
}
