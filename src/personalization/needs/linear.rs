use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::personalization::types::{
    DetectedNeed, LearnerSignalVector, NeedType, Severity, SignalCoverage,
};

use super::{Detector, DetectorError};

const FEATURE_COUNT: usize = LearnerSignalVector::LABELS.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceDomain {
    Reading,
    Math,
    Attention,
    Sensory,
    Latency,
}

impl EvidenceDomain {
    fn covered(&self, coverage: &SignalCoverage) -> bool {
        match self {
            Self::Reading => coverage.reading,
            Self::Math => coverage.math,
            Self::Attention => coverage.attention,
            Self::Sensory => coverage.sensory,
            Self::Latency => coverage.latency,
        }
    }
}

/// Logistic model over the signal vector, weights ordered as
/// `LearnerSignalVector::LABELS`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub bias: f64,
    pub weights: [f64; FEATURE_COUNT],
    pub requires: Vec<EvidenceDomain>,
}

impl LinearModel {
    pub fn probability(&self, vector: &LearnerSignalVector) -> f64 {
        let z = self.bias
            + self
                .weights
                .iter()
                .zip(vector.values())
                .map(|(w, x)| w * x)
                .sum::<f64>();
        1.0 / (1.0 + (-z).exp())
    }
}

pub struct LinearNeedDetector {
    id: String,
    models: BTreeMap<NeedType, LinearModel>,
    emit_threshold: f64,
}

impl LinearNeedDetector {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            models: BTreeMap::new(),
            emit_threshold: 0.5,
        }
    }

    pub fn with_model(mut self, need: NeedType, model: LinearModel) -> Self {
        self.models.insert(need, model);
        self
    }

    /// Hand-tuned reading and attention models.
    pub fn baseline() -> Self {
        let mut dyslexia = [0.0; FEATURE_COUNT];
        dyslexia[0] = -3.0;
        dyslexia[1] = -5.0;
        dyslexia[2] = 12.0;

        let mut adhd = [0.0; FEATURE_COUNT];
        adhd[4] = -6.0;
        adhd[5] = 4.0;
        adhd[10] = 1.5;

        Self::new("linear")
            .with_model(
                NeedType::Dyslexia,
                LinearModel {
                    bias: 2.0,
                    weights: dyslexia,
                    requires: vec![EvidenceDomain::Reading],
                },
            )
            .with_model(
                NeedType::Adhd,
                LinearModel {
                    bias: 1.5,
                    weights: adhd,
                    requires: vec![EvidenceDomain::Attention],
                },
            )
    }

    fn severity(probability: f64) -> Severity {
        if probability >= 0.85 {
            Severity::Severe
        } else if probability >= 0.7 {
            Severity::Moderate
        } else {
            Severity::Mild
        }
    }
}

impl Detector for LinearNeedDetector {
    fn id(&self) -> &str {
        &self.id
    }

    fn detect(&self, vector: &LearnerSignalVector) -> Result<Vec<DetectedNeed>, DetectorError> {
        if vector.sample_count == 0 {
            return Err(DetectorError::InsufficientEvidence(
                "no samples in window".to_string(),
            ));
        }

        let mut needs = Vec::new();
        for (need_type, model) in &self.models {
            if !model.requires.iter().all(|d| d.covered(&vector.coverage)) {
                continue;
            }
            let p = model.probability(vector);
            if !p.is_finite() {
                return Err(DetectorError::Failed(format!(
                    "non-finite output for {}",
                    need_type.as_str()
                )));
            }
            if p >= self.emit_threshold {
                needs.push(
                    DetectedNeed::new(*need_type, Self::severity(p), p)
                        .with_evidence(format!("{} model probability {:.2}", self.id, p)),
                );
            }
        }
        Ok(needs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading_vector(speed: f64, accuracy: f64, reversals: f64) -> LearnerSignalVector {
        let mut v = LearnerSignalVector::neutral("l1", 1);
        v.sample_count = 5;
        v.coverage.reading = true;
        v.reading_speed = speed;
        v.reading_accuracy = accuracy;
        v.reversal_errors = reversals;
        v
    }

    #[test]
    fn baseline_flags_struggling_reader() {
        let needs = LinearNeedDetector::baseline()
            .detect(&reading_vector(0.275, 0.8, 0.3))
            .unwrap();
        assert_eq!(needs.len(), 1);
        assert_eq!(needs[0].need_type, NeedType::Dyslexia);
        assert!(needs[0].confidence > 0.6 && needs[0].confidence < 0.75);
    }

    #[test]
    fn baseline_ignores_fluent_reader() {
        let needs = LinearNeedDetector::baseline()
            .detect(&reading_vector(0.6, 0.95, 0.05))
            .unwrap();
        assert!(needs.is_empty());
    }

    #[test]
    fn models_skip_uncovered_domains() {
        let mut v = reading_vector(0.275, 0.8, 0.3);
        v.coverage.reading = false;
        assert!(LinearNeedDetector::baseline().detect(&v).unwrap().is_empty());
    }

    #[test]
    fn severity_follows_probability() {
        assert_eq!(LinearNeedDetector::severity(0.9), Severity::Severe);
        assert_eq!(LinearNeedDetector::severity(0.72), Severity::Moderate);
        assert_eq!(LinearNeedDetector::severity(0.55), Severity::Mild);
    }
}
