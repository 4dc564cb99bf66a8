use std::collections::BTreeMap;

use crate::personalization::config::FusionConfig;
use crate::personalization::scoring::{
    CONTENT_AFFINITY, EXPLORATION, NEED_COMPATIBILITY, PEER_SIMILARITY,
};
use crate::personalization::types::{
    ContentItem, LearnerProfile, Recommendation, RecommendationMetadata, ScoringStrategyResult,
    NEUTRAL_SIGNAL,
};

const MAX_MULTIPLIER: f64 = 1.5;

pub fn base_weight(config: &FusionConfig, strategy_id: &str) -> f64 {
    let w = &config.base_weights;
    match strategy_id {
        PEER_SIMILARITY => w.peer_similarity,
        CONTENT_AFFINITY => w.content_affinity,
        EXPLORATION => w.exploration,
        NEED_COMPATIBILITY => w.need_compatibility,
        _ => {
            (w.peer_similarity + w.content_affinity + w.exploration + w.need_compatibility) / 4.0
        }
    }
}

/// Per-learner weights before trust blending: base weights, plus an exploration
/// boost for cognitively flexible learners and a need-compatibility boost scaled by
/// the strongest detected need.
pub fn adjusted_weights(
    config: &FusionConfig,
    strategy_ids: &[String],
    profile: &LearnerProfile,
) -> BTreeMap<String, f64> {
    let mut weights: BTreeMap<String, f64> = strategy_ids
        .iter()
        .map(|id| (id.clone(), base_weight(config, id)))
        .collect();

    let flexibility = profile.signals.cognitive_flexibility;
    if flexibility > config.flexibility_threshold {
        let span = (1.0 - config.flexibility_threshold).max(1e-6);
        if let Some(w) = weights.get_mut(EXPLORATION) {
            *w += config.flexibility_boost * (flexibility - config.flexibility_threshold) / span;
        }
    }

    let top_need = profile.max_need_confidence();
    if top_need >= config.need_confidence_threshold {
        if let Some(w) = weights.get_mut(NEED_COMPATIBILITY) {
            *w += config.need_boost * top_need;
        }
    }
    weights
}

/// Floors each weight and rescales the map to sum to one.
pub fn finalize_weights(weights: &mut BTreeMap<String, f64>, min_weight: f64) {
    for w in weights.values_mut() {
        if !w.is_finite() {
            *w = min_weight;
        }
        *w = w.max(min_weight);
    }
    normalize(weights);
}

fn normalize(weights: &mut BTreeMap<String, f64>) {
    let total: f64 = weights.values().sum();
    if total > 1e-9 {
        for w in weights.values_mut() {
            *w /= total;
        }
    } else if !weights.is_empty() {
        let even = 1.0 / weights.len() as f64;
        for w in weights.values_mut() {
            *w = even;
        }
    }
}

pub fn multiplier(item: &ContentItem) -> f64 {
    (0.5 + 0.3 * item.cultural_relevance + 0.2 * item.accessibility_score).clamp(0.0, MAX_MULTIPLIER)
}

/// Fuses per-strategy results into one recommendation per candidate.
///
/// Weights of strategies with no results are redistributed over the rest, and an
/// item missing a strategy's score is fused over the strategies that did score it.
/// When no strategy produced anything, every candidate gets the neutral score.
/// Results for ids outside `candidates` are ignored. Output is ordered by fused
/// score descending, then content id ascending.
pub fn fuse(
    strategy_results: &[Vec<ScoringStrategyResult>],
    weights: &BTreeMap<String, f64>,
    candidates: &[ContentItem],
    generated_at: i64,
) -> Vec<Recommendation> {
    let mut by_item: BTreeMap<&str, Vec<&ScoringStrategyResult>> = BTreeMap::new();
    let mut active: BTreeMap<String, f64> = BTreeMap::new();
    for results in strategy_results {
        for result in results {
            active
                .entry(result.strategy_id.clone())
                .or_insert_with(|| weights.get(&result.strategy_id).copied().unwrap_or(0.0));
            by_item
                .entry(result.content_id.as_str())
                .or_default()
                .push(result);
        }
    }
    normalize(&mut active);

    let mut seen = std::collections::BTreeSet::new();
    let mut recommendations: Vec<Recommendation> = candidates
        .iter()
        .filter(|item| seen.insert(item.id.as_str()))
        .map(|item| {
            let results = by_item.get(item.id.as_str()).cloned().unwrap_or_default();
            let mut strategy_scores = BTreeMap::new();
            let mut rationale: Vec<String> = Vec::new();
            for result in &results {
                strategy_scores
                    .entry(result.strategy_id.clone())
                    .or_insert(result.score);
                let line = format!("{}: {}", result.strategy_id, result.rationale);
                if !rationale.contains(&line) {
                    rationale.push(line);
                }
            }

            let weight_present: f64 = strategy_scores
                .keys()
                .map(|id| active.get(id).copied().unwrap_or(0.0))
                .sum();
            let base = if weight_present > 1e-9 {
                strategy_scores
                    .iter()
                    .map(|(id, score)| score * active.get(id).copied().unwrap_or(0.0))
                    .sum::<f64>()
                    / weight_present
            } else {
                if rationale.is_empty() {
                    rationale.push("no strategy produced a score".to_string());
                }
                NEUTRAL_SIGNAL
            };

            let multiplier = multiplier(item);
            Recommendation {
                content_id: item.id.clone(),
                fused_score: base * multiplier,
                rationale,
                metadata: RecommendationMetadata {
                    algorithm_mix: active.clone(),
                    strategy_scores,
                    content_type: item.content_type,
                    difficulty: item.difficulty,
                    multiplier,
                    generated_at,
                },
            }
        })
        .collect();

    recommendations.sort_by(|a, b| {
        b.fused_score
            .total_cmp(&a.fused_score)
            .then_with(|| a.content_id.cmp(&b.content_id))
    });
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personalization::scoring::tests::{item, profile};
    use crate::personalization::types::{ContentType, DetectedNeed, DifficultyLevel, NeedType, Severity};

    fn ids() -> Vec<String> {
        [PEER_SIMILARITY, CONTENT_AFFINITY, EXPLORATION, NEED_COMPATIBILITY]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn result(strategy: &str, content: &str, score: f64) -> ScoringStrategyResult {
        ScoringStrategyResult {
            strategy_id: strategy.to_string(),
            content_id: content.to_string(),
            score,
            rationale: format!("{strategy} says {score}"),
        }
    }

    #[test]
    fn neutral_learner_keeps_base_weights() {
        let config = FusionConfig::default();
        let mut weights = adjusted_weights(&config, &ids(), &profile());
        finalize_weights(&mut weights, config.min_weight);
        assert!((weights[CONTENT_AFFINITY] - 0.35).abs() < 1e-9);
        assert!((weights.values().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn flexibility_and_needs_shift_weight() {
        let config = FusionConfig::default();
        let mut learner = profile();
        learner.signals.cognitive_flexibility = 0.9;
        learner.needs = vec![DetectedNeed::new(NeedType::Adhd, Severity::Moderate, 0.8)];

        let mut weights = adjusted_weights(&config, &ids(), &learner);
        finalize_weights(&mut weights, config.min_weight);
        assert!(weights[EXPLORATION] > 0.15);
        assert!(weights[NEED_COMPATIBILITY] > 0.25);
        assert!(weights[CONTENT_AFFINITY] < 0.35);
    }

    #[test]
    fn floor_applies_before_normalizing() {
        let mut weights = BTreeMap::new();
        weights.insert("a".to_string(), 0.0);
        weights.insert("b".to_string(), 0.95);
        finalize_weights(&mut weights, 0.05);
        assert!((weights["a"] - 0.05).abs() < 1e-9);
        assert!((weights["b"] - 0.95).abs() < 1e-9);
    }

    #[test]
    fn multiplier_is_bounded() {
        let mut it = item("a", ContentType::Quiz, DifficultyLevel::Easy);
        it.cultural_relevance = 1.0;
        it.accessibility_score = 1.0;
        assert!((multiplier(&it) - 1.0).abs() < 1e-9);
        it.cultural_relevance = 5.0;
        assert_eq!(multiplier(&it), 1.5);
    }

    #[test]
    fn missing_strategies_have_weight_redistributed() {
        let candidates = vec![
            item("a", ContentType::Quiz, DifficultyLevel::Easy),
            item("b", ContentType::Quiz, DifficultyLevel::Easy),
        ];
        let mut weights = BTreeMap::new();
        weights.insert("x".to_string(), 0.6);
        weights.insert("y".to_string(), 0.4);

        let results = vec![vec![result("x", "a", 0.8), result("x", "b", 0.4)]];
        let recs = fuse(&results, &weights, &candidates, 0);
        assert_eq!(recs[0].content_id, "a");
        assert!((recs[0].metadata.algorithm_mix["x"] - 1.0).abs() < 1e-9);
        assert!((recs[0].fused_score - 0.8 * multiplier(&candidates[0])).abs() < 1e-9);
    }

    #[test]
    fn ties_break_on_content_id_and_unknown_ids_are_ignored() {
        let candidates = vec![
            item("b", ContentType::Quiz, DifficultyLevel::Easy),
            item("a", ContentType::Quiz, DifficultyLevel::Easy),
        ];
        let mut weights = BTreeMap::new();
        weights.insert("x".to_string(), 1.0);
        let results = vec![vec![
            result("x", "a", 0.5),
            result("x", "b", 0.5),
            result("x", "ghost", 0.9),
        ]];
        let recs = fuse(&results, &weights, &candidates, 0);
        let ids: Vec<&str> = recs.iter().map(|r| r.content_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn partial_item_scores_fuse_over_present_strategies() {
        let candidates = vec![item("a", ContentType::Quiz, DifficultyLevel::Easy)];
        let mut weights = BTreeMap::new();
        weights.insert("x".to_string(), 0.5);
        weights.insert("y".to_string(), 0.5);
        let results = vec![
            vec![result("x", "a", 0.6)],
            vec![result("y", "other", 0.1)],
        ];
        let recs = fuse(&results, &weights, &candidates, 0);
        let expected = 0.6 * multiplier(&candidates[0]);
        assert!((recs[0].fused_score - expected).abs() < 1e-9);
        assert_eq!(recs[0].rationale.len(), 1);
    }

    #[test]
    fn no_results_fall_back_to_neutral_scores() {
        let candidates = vec![item("a", ContentType::Quiz, DifficultyLevel::Easy)];
        let recs = fuse(&[], &BTreeMap::new(), &candidates, 0);
        assert_eq!(recs.len(), 1);
        assert!((recs[0].fused_score - NEUTRAL_SIGNAL * multiplier(&candidates[0])).abs() < 1e-9);
    }
}
