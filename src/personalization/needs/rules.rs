use crate::personalization::config::SignalConfig;
use crate::personalization::types::{DetectedNeed, LearnerSignalVector, NeedType, Severity};

use super::{Detector, DetectorError};

const DYSLEXIA_ACCURACY: f64 = 0.85;
const DYSLEXIA_REVERSALS: f64 = 3.0;
const DYSLEXIA_HEAVY_REVERSALS: f64 = 10.0;
const SLOW_READING_WPM: f64 = 80.0;

const DYSCALCULIA_ACCURACY: f64 = 0.70;
const SLOW_LATENCY_MS: f64 = 6000.0;
const VERY_SLOW_LATENCY_MS: f64 = 8000.0;
const HEAVY_HELP_RATE: f64 = 0.5;

const SHORT_ATTENTION_SECS: f64 = 300.0;
const VERY_SHORT_ATTENTION_SECS: f64 = 120.0;
const FREQUENT_SWITCHES: f64 = 5.0;
const VERY_FREQUENT_SWITCHES: f64 = 8.0;

const ADEQUATE_ACCURACY: f64 = 0.75;

const DOMINANT_CHANNEL_SHARE: f64 = 0.6;
const WEAK_PERFORMANCE: f64 = 0.70;

const BASE_CONFIDENCE: f64 = 0.5;
const CONFIDENCE_STEP: f64 = 0.1;

fn confidence(conditions: &[bool]) -> f64 {
    let hits = conditions.iter().filter(|c| **c).count() as f64;
    (BASE_CONFIDENCE + CONFIDENCE_STEP * hits).min(1.0)
}

/// Fixed threshold rules over the signal vector. Features are mapped back to raw
/// units through the same caps the extractor used.
pub struct RuleBasedDetector {
    caps: SignalConfig,
}

impl RuleBasedDetector {
    pub const ID: &'static str = "rules";

    pub fn new(caps: SignalConfig) -> Self {
        Self { caps }
    }

    fn reading_wpm(&self, v: &LearnerSignalVector) -> f64 {
        v.reading_speed * self.caps.reading_speed_cap_wpm
    }

    fn reversals(&self, v: &LearnerSignalVector) -> f64 {
        v.reversal_errors * self.caps.reversal_error_cap
    }

    fn latency_ms(&self, v: &LearnerSignalVector) -> f64 {
        v.response_latency * self.caps.latency_cap_ms
    }

    fn attention_secs(&self, v: &LearnerSignalVector) -> f64 {
        v.attention_span * self.caps.attention_span_cap_secs
    }

    fn switches(&self, v: &LearnerSignalVector) -> f64 {
        v.focus_switching * self.caps.focus_switch_cap
    }

    fn help_rate(&self, v: &LearnerSignalVector) -> f64 {
        v.help_seeking * self.caps.help_rate_cap
    }

    fn observed_accuracies(v: &LearnerSignalVector) -> Vec<f64> {
        let mut out = Vec::with_capacity(2);
        if v.coverage.reading {
            out.push(v.reading_accuracy);
        }
        if v.coverage.math {
            out.push(v.math_accuracy);
        }
        out
    }

    fn dyslexia(&self, v: &LearnerSignalVector) -> Option<DetectedNeed> {
        if !v.coverage.reading {
            return None;
        }
        let accuracy = v.reading_accuracy;
        let reversals = self.reversals(v);
        let wpm = self.reading_wpm(v);
        if !(accuracy < DYSLEXIA_ACCURACY && reversals > DYSLEXIA_REVERSALS) {
            return None;
        }

        let slow = wpm < SLOW_READING_WPM;
        let conf = confidence(&[
            accuracy < DYSLEXIA_ACCURACY,
            reversals > DYSLEXIA_REVERSALS,
            slow,
            reversals > DYSLEXIA_HEAVY_REVERSALS,
        ]);
        let severity = if accuracy < 0.70 || reversals > DYSLEXIA_HEAVY_REVERSALS {
            Severity::Severe
        } else if accuracy < 0.82 || slow {
            Severity::Moderate
        } else {
            Severity::Mild
        };

        let mut need = DetectedNeed::new(NeedType::Dyslexia, severity, conf)
            .with_evidence(format!("reading accuracy {:.2}", accuracy))
            .with_evidence(format!("{:.1} letter reversals per sample", reversals));
        if slow {
            need = need.with_evidence(format!("reading speed {:.0} wpm", wpm));
        }
        Some(need)
    }

    fn dyscalculia(&self, v: &LearnerSignalVector) -> Option<DetectedNeed> {
        if !v.coverage.math {
            return None;
        }
        let accuracy = v.math_accuracy;
        let slow = v.coverage.latency && self.latency_ms(v) > SLOW_LATENCY_MS;
        let heavy_help = v.coverage.help && self.help_rate(v) > HEAVY_HELP_RATE;
        if !(accuracy < DYSCALCULIA_ACCURACY && (slow || heavy_help)) {
            return None;
        }

        let conf = confidence(&[
            accuracy < DYSCALCULIA_ACCURACY,
            slow,
            heavy_help,
            accuracy < 0.5,
        ]);
        let severity = if accuracy < 0.5 {
            Severity::Severe
        } else if accuracy < 0.6 || (slow && heavy_help) {
            Severity::Moderate
        } else {
            Severity::Mild
        };

        let mut need = DetectedNeed::new(NeedType::Dyscalculia, severity, conf)
            .with_evidence(format!("math accuracy {:.2}", accuracy));
        if slow {
            need = need.with_evidence(format!("response latency {:.0}ms", self.latency_ms(v)));
        }
        if heavy_help {
            need = need.with_evidence(format!("help requests per item {:.2}", self.help_rate(v)));
        }
        Some(need)
    }

    fn adhd(&self, v: &LearnerSignalVector) -> Option<DetectedNeed> {
        if !v.coverage.attention {
            return None;
        }
        let span = self.attention_secs(v);
        let switches = self.switches(v);
        if !(span < SHORT_ATTENTION_SECS && switches >= FREQUENT_SWITCHES) {
            return None;
        }

        let erratic = v.coverage.latency && v.latency_variability > 0.5;
        let conf = confidence(&[
            span < SHORT_ATTENTION_SECS,
            switches >= FREQUENT_SWITCHES,
            span < VERY_SHORT_ATTENTION_SECS,
            switches >= VERY_FREQUENT_SWITCHES || erratic,
        ]);
        let severity = if span < VERY_SHORT_ATTENTION_SECS && switches >= VERY_FREQUENT_SWITCHES {
            Severity::Severe
        } else if span < 180.0 || switches >= 7.0 {
            Severity::Moderate
        } else {
            Severity::Mild
        };

        Some(
            DetectedNeed::new(NeedType::Adhd, severity, conf)
                .with_evidence(format!("attention span {:.0}s", span))
                .with_evidence(format!("{:.1} focus switches per sample", switches)),
        )
    }

    fn processing_speed(&self, v: &LearnerSignalVector) -> Option<DetectedNeed> {
        if !v.coverage.latency {
            return None;
        }
        let latency = self.latency_ms(v);
        let accuracies = Self::observed_accuracies(v);
        let best = accuracies.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let adequate = best >= ADEQUATE_ACCURACY;
        if !(latency > SLOW_LATENCY_MS && adequate) {
            return None;
        }

        let slow_reader = v.coverage.reading && self.reading_wpm(v) < SLOW_READING_WPM;
        let conf = confidence(&[
            latency > SLOW_LATENCY_MS,
            adequate,
            latency > VERY_SLOW_LATENCY_MS,
            slow_reader,
        ]);
        let severity = if latency > 8500.0 {
            Severity::Severe
        } else if latency > 7000.0 {
            Severity::Moderate
        } else {
            Severity::Mild
        };

        Some(
            DetectedNeed::new(NeedType::ProcessingSpeed, severity, conf)
                .with_evidence(format!("response latency {:.0}ms", latency))
                .with_evidence(format!("accuracy holds at {:.2}", best)),
        )
    }

    fn sensory_processing(&self, v: &LearnerSignalVector) -> Option<DetectedNeed> {
        if !v.coverage.sensory {
            return None;
        }
        let accuracies = Self::observed_accuracies(v);
        if accuracies.is_empty() {
            return None;
        }
        let performance = accuracies.iter().sum::<f64>() / accuracies.len() as f64;
        let (channel, share) = v.dominant_channel();
        if !(share >= DOMINANT_CHANNEL_SHARE && performance < WEAK_PERFORMANCE) {
            return None;
        }

        let conf = confidence(&[
            share >= DOMINANT_CHANNEL_SHARE,
            performance < WEAK_PERFORMANCE,
            share >= 0.75,
            performance < 0.55,
        ]);
        let severity = if share >= 0.8 && performance < 0.55 {
            Severity::Severe
        } else if share >= 0.7 || performance < 0.6 {
            Severity::Moderate
        } else {
            Severity::Mild
        };

        Some(
            DetectedNeed::new(NeedType::SensoryProcessing, severity, conf)
                .with_evidence(format!("{} channel share {:.2}", channel.as_str(), share))
                .with_evidence(format!("mean accuracy {:.2}", performance)),
        )
    }
}

impl Default for RuleBasedDetector {
    fn default() -> Self {
        Self::new(SignalConfig::default())
    }
}

impl Detector for RuleBasedDetector {
    fn id(&self) -> &str {
        Self::ID
    }

    fn detect(&self, vector: &LearnerSignalVector) -> Result<Vec<DetectedNeed>, DetectorError> {
        if vector.sample_count == 0 {
            return Err(DetectorError::InsufficientEvidence(
                "no samples in window".to_string(),
            ));
        }
        Ok([
            self.dyslexia(vector),
            self.dyscalculia(vector),
            self.adhd(vector),
            self.processing_speed(vector),
            self.sensory_processing(vector),
        ]
        .into_iter()
        .flatten()
        .collect())
    }
}
