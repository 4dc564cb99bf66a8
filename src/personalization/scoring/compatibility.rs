use crate::personalization::types::{ContentItem, LearnerProfile, NeedType, NEUTRAL_SIGNAL};

use super::{ScoringContext, ScoringStrategy, StrategyError, NEED_COMPATIBILITY};

const COVERAGE_WEIGHT: f64 = 0.8;
const ACCESSIBILITY_WEIGHT: f64 = 0.2;
const MIN_DURATION_FACTOR: f64 = 0.4;

/// How well an item's accessibility features accommodate the learner's needs.
pub struct NeedCompatibilityStrategy {
    attention_minutes: u32,
}

impl NeedCompatibilityStrategy {
    pub fn new(attention_minutes: u32) -> Self {
        Self {
            attention_minutes: attention_minutes.max(1),
        }
    }

    fn duration_factor(&self, item: &ContentItem) -> f64 {
        if item.estimated_minutes <= self.attention_minutes {
            1.0
        } else {
            (self.attention_minutes as f64 / item.estimated_minutes as f64).max(MIN_DURATION_FACTOR)
        }
    }
}

impl Default for NeedCompatibilityStrategy {
    fn default() -> Self {
        Self::new(15)
    }
}

impl ScoringStrategy for NeedCompatibilityStrategy {
    fn id(&self) -> &str {
        NEED_COMPATIBILITY
    }

    fn score(
        &self,
        item: &ContentItem,
        profile: &LearnerProfile,
        _context: &ScoringContext,
    ) -> Result<(f64, String), StrategyError> {
        if profile.needs.is_empty() {
            return Ok((NEUTRAL_SIGNAL, "no detected needs".to_string()));
        }

        let mut weighted = 0.0;
        let mut weight_total = 0.0;
        let mut matched_features: Vec<&str> = Vec::new();

        for need in &profile.needs {
            let accommodations = &need.recommendations;
            let matched: Vec<&str> = accommodations
                .iter()
                .filter(|a| item.accessibility_features.contains(a))
                .map(String::as_str)
                .collect();
            let coverage = if accommodations.is_empty() {
                0.0
            } else {
                matched.len() as f64 / accommodations.len() as f64
            };
            let mut fit = COVERAGE_WEIGHT * coverage
                + ACCESSIBILITY_WEIGHT * item.accessibility_score.clamp(0.0, 1.0);
            if need.need_type == NeedType::Adhd {
                fit *= self.duration_factor(item);
            }

            let weight = need.confidence * need.severity.weight();
            weighted += weight * fit;
            weight_total += weight;
            for feature in matched {
                if !matched_features.contains(&feature) {
                    matched_features.push(feature);
                }
            }
        }

        if weight_total <= f64::EPSILON {
            return Ok((NEUTRAL_SIGNAL, "needs carry no weight".to_string()));
        }
        let score = weighted / weight_total;
        let rationale = if matched_features.is_empty() {
            "no matching accommodations".to_string()
        } else {
            format!("supports {}", matched_features.join(", "))
        };
        Ok((score, rationale))
    }
}
