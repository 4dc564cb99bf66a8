//! Property-based tests for the ranking pipeline and the difficulty controller.
//!
//! - Fusion: one recommendation per distinct candidate, ordered by score then id
//! - Diversification: output is an ordered subsequence that honors the category cap
//! - Weights: finalized weights are positive and sum to one
//! - Difficulty: a single response moves at most one level

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use adaptive_engine::personalization::difficulty::DifficultyController;
use adaptive_engine::personalization::diversify::{diversify, seeded_rng};
use adaptive_engine::personalization::fusion::{finalize_weights, fuse};
use adaptive_engine::personalization::{
    ContentItem, ContentType, DifficultyLevel, Direction, Response, ScoringStrategyResult,
};

const STRATEGIES: [&str; 4] = ["affinity", "compatibility", "exploration", "peer"];
const TYPES: [ContentType; 3] = [ContentType::Quiz, ContentType::Video, ContentType::Reading];

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_unit() -> impl Strategy<Value = f64> {
    (0u64..=1000u64).prop_map(|v| v as f64 / 1000.0)
}

fn arb_level() -> impl Strategy<Value = DifficultyLevel> {
    (0usize..3).prop_map(|i| DifficultyLevel::ALL[i])
}

fn arb_item() -> impl Strategy<Value = ContentItem> {
    (0u32..40, 0usize..TYPES.len(), arb_level(), arb_unit(), arb_unit()).prop_map(
        |(n, t, difficulty, relevance, accessibility)| ContentItem {
            id: format!("item-{n:02}"),
            subject: "math".to_string(),
            content_type: TYPES[t],
            difficulty,
            prerequisites: vec![],
            skills: vec!["fractions".to_string()],
            estimated_minutes: 10,
            cultural_tags: vec![],
            accessibility_features: vec![],
            cultural_relevance: relevance,
            accessibility_score: accessibility,
        },
    )
}

fn arb_results(
    candidates: Vec<ContentItem>,
) -> impl Strategy<Value = (Vec<ContentItem>, Vec<Vec<ScoringStrategyResult>>)> {
    let len = candidates.len();
    let per_strategy = proptest::collection::vec((0..len.max(1), arb_unit()), 0..len + 1);
    proptest::collection::vec(per_strategy, 0..STRATEGIES.len() + 1).prop_map(move |all| {
        let results = all
            .into_iter()
            .enumerate()
            .map(|(s, scores)| {
                scores
                    .into_iter()
                    .filter(|(i, _)| *i < candidates.len())
                    .map(|(i, score)| ScoringStrategyResult {
                        strategy_id: STRATEGIES[s].to_string(),
                        content_id: candidates[i].id.clone(),
                        score,
                        rationale: "generated".to_string(),
                    })
                    .collect()
            })
            .collect();
        (candidates.clone(), results)
    })
}

fn arb_fusion_input() -> impl Strategy<Value = (Vec<ContentItem>, Vec<Vec<ScoringStrategyResult>>)> {
    proptest::collection::vec(arb_item(), 0..25).prop_flat_map(arb_results)
}

fn arb_response() -> impl Strategy<Value = Response> {
    (any::<bool>(), arb_unit(), 0u64..20_000, 0u32..4, 1u32..6).prop_map(
        |(correct, confidence, latency_ms, hints_used, attempts)| Response {
            question_id: "q".to_string(),
            correct,
            latency_ms,
            confidence,
            hints_used,
            attempts,
        },
    )
}

fn default_weights() -> BTreeMap<String, f64> {
    STRATEGIES.iter().map(|s| (s.to_string(), 0.25)).collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn fused_output_is_sorted_and_distinct((candidates, results) in arb_fusion_input()) {
        let fused = fuse(&results, &default_weights(), &candidates, 0);

        let distinct: BTreeSet<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        prop_assert_eq!(fused.len(), distinct.len());
        let ids: BTreeSet<&str> = fused.iter().map(|r| r.content_id.as_str()).collect();
        prop_assert_eq!(ids, distinct);

        for rec in &fused {
            prop_assert!((0.0..=1.0).contains(&rec.fused_score));
        }
        for pair in fused.windows(2) {
            let ordered = pair[0].fused_score > pair[1].fused_score
                || (pair[0].fused_score == pair[1].fused_score
                    && pair[0].content_id < pair[1].content_id);
            prop_assert!(ordered);
        }
    }

    #[test]
    fn diversified_output_is_an_ordered_subsequence(
        (candidates, results) in arb_fusion_input(),
        max_per_category in 1usize..5,
        max_per_difficulty in 1usize..5,
        head in 0usize..4,
        output_size in 1usize..15,
        seed in any::<u64>(),
    ) {
        let ranked = fuse(&results, &default_weights(), &candidates, 0);
        let ranked_ids: Vec<String> = ranked.iter().map(|r| r.content_id.clone()).collect();
        let head_types: Vec<ContentType> = ranked
            .iter()
            .take(head)
            .map(|r| r.metadata.content_type)
            .collect();

        let mut rng = seeded_rng("learner", 1, seed);
        let out = diversify(
            ranked,
            max_per_category,
            max_per_difficulty,
            head,
            0.3,
            output_size,
            &mut rng,
        );

        prop_assert!(out.len() <= output_size);
        let mut cursor = ranked_ids.iter();
        for rec in &out {
            prop_assert!(cursor.any(|id| *id == rec.content_id));
        }

        let mut counts: BTreeMap<ContentType, usize> = BTreeMap::new();
        for rec in &out {
            *counts.entry(rec.metadata.content_type).or_default() += 1;
        }
        for (content_type, count) in counts {
            let in_head = head_types.iter().filter(|t| **t == content_type).count();
            prop_assert!(count <= max_per_category.max(in_head));
        }
    }

    #[test]
    fn diversification_is_reproducible_for_a_seed(
        (candidates, results) in arb_fusion_input(),
        seed in any::<u64>(),
    ) {
        let ranked = fuse(&results, &default_weights(), &candidates, 0);
        let run = |ranked| {
            let mut rng = seeded_rng("learner", 3, seed);
            diversify(ranked, 1, 1, 1, 0.3, 10, &mut rng)
                .into_iter()
                .map(|r| r.content_id)
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(run(ranked.clone()), run(ranked));
    }

    #[test]
    fn finalized_weights_sum_to_one(
        raw in proptest::collection::vec(-1.0f64..3.0, 1..STRATEGIES.len() + 1),
        min_weight in 0.01f64..0.2,
    ) {
        let mut weights: BTreeMap<String, f64> = raw
            .iter()
            .enumerate()
            .map(|(i, w)| (STRATEGIES[i].to_string(), *w))
            .collect();
        finalize_weights(&mut weights, min_weight);

        let total: f64 = weights.values().sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
        for w in weights.values() {
            prop_assert!(*w > 0.0);
        }
    }

    #[test]
    fn difficulty_moves_at_most_one_level(current in arb_level(), response in arb_response()) {
        let state = DifficultyController::default().next(current, &response);

        prop_assert_eq!(state.from, current);
        prop_assert!(state.from.rank().abs_diff(state.to.rank()) <= 1);
        match state.direction {
            Direction::Increase => prop_assert!(state.to > state.from),
            Direction::Decrease => prop_assert!(state.to < state.from),
            Direction::Hold => prop_assert_eq!(state.to, state.from),
        }
        if !response.correct {
            prop_assert!(state.to <= current);
        }
    }
}
