use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::personalization::config::SignalConfig;
use crate::personalization::error::EngineError;
use crate::personalization::types::{
    InteractionSample, LearnerSignalVector, SampleWindow, SignalCoverage, NEUTRAL_SIGNAL,
};
use crate::stores::{StoreError, TelemetryStore};

/// Turns a window of samples into a signal vector. Implementations must be pure.
pub trait FeatureExtractor: Send + Sync {
    fn extract(
        &self,
        learner_id: &str,
        version: u64,
        samples: &[InteractionSample],
    ) -> LearnerSignalVector;
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: f64) {
        if value.is_finite() {
            self.sum += value;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    fn or_neutral(&self) -> f64 {
        self.value().unwrap_or(NEUTRAL_SIGNAL).clamp(0.0, 1.0)
    }
}

fn capped(value: f64, cap: f64) -> f64 {
    if cap <= 0.0 {
        return 0.0;
    }
    (value.max(0.0) / cap).min(1.0)
}

/// Averages each metric over the window and scales it into [0,1] with fixed caps.
pub struct WindowFeatureExtractor {
    config: SignalConfig,
}

impl WindowFeatureExtractor {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }
}

impl Default for WindowFeatureExtractor {
    fn default() -> Self {
        Self::new(SignalConfig::default())
    }
}

impl FeatureExtractor for WindowFeatureExtractor {
    fn extract(
        &self,
        learner_id: &str,
        version: u64,
        samples: &[InteractionSample],
    ) -> LearnerSignalVector {
        let mut vector = LearnerSignalVector::neutral(learner_id, version);
        if samples.is_empty() {
            return vector;
        }
        let cfg = &self.config;

        let mut reading_speed = Mean::default();
        let mut reading_accuracy = Mean::default();
        let mut reversals = Mean::default();
        let mut math_accuracy = Mean::default();
        let mut attention_span = Mean::default();
        let mut focus_switching = Mean::default();
        let mut visual = Mean::default();
        let mut auditory = Mean::default();
        let mut kinesthetic = Mean::default();
        let mut latency = Mean::default();
        let mut help = Mean::default();
        let mut raw_latencies: Vec<f64> = Vec::new();

        for sample in samples {
            let m = &sample.metrics;
            if let Some(ref r) = m.reading {
                reading_speed.push(capped(r.words_per_minute, cfg.reading_speed_cap_wpm));
                reading_accuracy.push(r.accuracy);
                reversals.push(capped(r.reversal_errors as f64, cfg.reversal_error_cap));
            }
            if let Some(ref math) = m.math {
                math_accuracy.push(math.accuracy);
            }
            if let Some(ref a) = m.attention {
                attention_span.push(capped(a.span_seconds, cfg.attention_span_cap_secs));
                focus_switching.push(capped(a.focus_switches as f64, cfg.focus_switch_cap));
            }
            if let Some(ref s) = m.sensory {
                visual.push(s.visual);
                auditory.push(s.auditory);
                kinesthetic.push(s.kinesthetic);
            }
            if let Some(ms) = sample.response_latency_ms {
                let ms = (ms as f64).min(cfg.latency_cap_ms);
                raw_latencies.push(ms);
                latency.push(capped(ms, cfg.latency_cap_ms));
            }
            if sample.items_attempted > 0 {
                let rate = sample.help_requests as f64 / sample.items_attempted as f64;
                help.push(capped(rate, cfg.help_rate_cap));
            } else if sample.help_requests > 0 {
                help.push(1.0);
            }
        }

        vector.sample_count = samples.len();
        vector.reading_speed = reading_speed.or_neutral();
        vector.reading_accuracy = reading_accuracy.or_neutral();
        vector.reversal_errors = reversals.or_neutral();
        vector.math_accuracy = math_accuracy.or_neutral();
        vector.attention_span = attention_span.or_neutral();
        vector.focus_switching = focus_switching.or_neutral();
        vector.visual_preference = visual.or_neutral();
        vector.auditory_preference = auditory.or_neutral();
        vector.kinesthetic_preference = kinesthetic.or_neutral();
        vector.response_latency = latency.or_neutral();
        vector.help_seeking = help.or_neutral();

        let variation = coefficient_of_variation(&raw_latencies);
        vector.latency_variability = variation
            .map(|cv| cv.clamp(0.0, 1.0))
            .unwrap_or(NEUTRAL_SIGNAL);

        vector.cognitive_flexibility = match variation {
            Some(cv) => {
                let mut parts = vec![1.0 - cv.clamp(0.0, 1.0)];
                if let (Some(ra), Some(ma)) = (reading_accuracy.value(), math_accuracy.value()) {
                    parts.push(1.0 - (ra - ma).abs());
                }
                (parts.iter().sum::<f64>() / parts.len() as f64).clamp(0.0, 1.0)
            }
            None => NEUTRAL_SIGNAL,
        };

        vector.coverage = SignalCoverage {
            reading: reading_accuracy.count > 0,
            math: math_accuracy.count > 0,
            attention: attention_span.count > 0,
            sensory: visual.count > 0,
            latency: latency.count > 0,
            help: help.count > 0,
        };

        vector
    }
}

fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= f64::EPSILON {
        return Some(0.0);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt() / mean)
}

pub struct SignalExtractor {
    telemetry: Arc<dyn TelemetryStore>,
    extractor: Arc<dyn FeatureExtractor>,
    config: SignalConfig,
}

impl SignalExtractor {
    pub fn new(
        telemetry: Arc<dyn TelemetryStore>,
        extractor: Arc<dyn FeatureExtractor>,
        config: SignalConfig,
    ) -> Self {
        Self {
            telemetry,
            extractor,
            config,
        }
    }

    pub fn default_window(&self) -> SampleWindow {
        SampleWindow::Latest {
            count: self.config.window_size.max(1),
        }
    }

    /// Validates and appends one sample, returning the learner's new log version.
    pub async fn record(&self, sample: InteractionSample) -> Result<u64, EngineError> {
        sample.validate().map_err(EngineError::Validation)?;
        let timeout_ms = self.config.store_timeout_ms;
        let version = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.telemetry.append(sample),
        )
        .await
        .map_err(|_| StoreError::Timeout {
            operation: "telemetry_append",
            timeout_ms,
        })??;
        Ok(version)
    }

    /// Reads the window from the telemetry log and computes the vector. The vector's
    /// version is the log version observed by that read.
    pub async fn extract(
        &self,
        learner_id: &str,
        window: SampleWindow,
    ) -> Result<LearnerSignalVector, EngineError> {
        window.validate().map_err(EngineError::Validation)?;
        let timeout_ms = self.config.store_timeout_ms;
        let slice = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.telemetry.read(learner_id, window),
        )
        .await
        .map_err(|_| StoreError::Timeout {
            operation: "telemetry_read",
            timeout_ms,
        })??;

        debug!(
            learner_id = %learner_id,
            samples = slice.samples.len(),
            version = slice.version,
            "extracting signal vector"
        );
        Ok(self.extract_from_samples(learner_id, slice.version, &slice.samples))
    }

    pub fn extract_from_samples(
        &self,
        learner_id: &str,
        version: u64,
        samples: &[InteractionSample],
    ) -> LearnerSignalVector {
        self.extractor.extract(learner_id, version, samples)
    }
}
