//! Benchmark suite for the ranking pipeline
//!
//! Run with: cargo bench

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use adaptive_engine::personalization::diversify::{seeded_rng, Diversifier};
use adaptive_engine::personalization::config::DiversityConfig;
use adaptive_engine::personalization::fusion::fuse;
use adaptive_engine::personalization::{
    ContentItem, ContentType, DifficultyLevel, ScoringStrategyResult,
};

const STRATEGIES: [&str; 4] = ["affinity", "compatibility", "exploration", "peer"];
const TYPES: [ContentType; 4] = [
    ContentType::Quiz,
    ContentType::Video,
    ContentType::Reading,
    ContentType::Game,
];

fn catalog(size: usize) -> Vec<ContentItem> {
    (0..size)
        .map(|i| ContentItem {
            id: format!("item-{i:04}"),
            subject: "math".to_string(),
            content_type: TYPES[i % TYPES.len()],
            difficulty: DifficultyLevel::ALL[i % 3],
            prerequisites: vec![],
            skills: vec!["fractions".to_string()],
            estimated_minutes: 10,
            cultural_tags: vec![],
            accessibility_features: vec![],
            cultural_relevance: (i % 10) as f64 / 10.0,
            accessibility_score: 0.5,
        })
        .collect()
}

fn results(items: &[ContentItem]) -> Vec<Vec<ScoringStrategyResult>> {
    STRATEGIES
        .iter()
        .enumerate()
        .map(|(s, id)| {
            items
                .iter()
                .enumerate()
                .map(|(i, item)| ScoringStrategyResult {
                    strategy_id: id.to_string(),
                    content_id: item.id.clone(),
                    score: ((i * 7 + s * 13) % 100) as f64 / 100.0,
                    rationale: "bench".to_string(),
                })
                .collect()
        })
        .collect()
}

fn bench_fuse(c: &mut Criterion) {
    let items = catalog(500);
    let scored = results(&items);
    let weights: BTreeMap<String, f64> =
        STRATEGIES.iter().map(|s| (s.to_string(), 0.25)).collect();

    c.bench_function("fuse 500 candidates x 4 strategies", |b| {
        b.iter(|| fuse(black_box(&scored), black_box(&weights), black_box(&items), 0))
    });
}

fn bench_fuse_and_diversify(c: &mut Criterion) {
    let items = catalog(500);
    let scored = results(&items);
    let weights: BTreeMap<String, f64> =
        STRATEGIES.iter().map(|s| (s.to_string(), 0.25)).collect();
    let diversifier = Diversifier::new(DiversityConfig::default());

    c.bench_function("fuse + diversify 500 candidates", |b| {
        b.iter(|| {
            let ranked = fuse(&scored, &weights, &items, 0);
            let mut rng = seeded_rng("bench-learner", 1, 42);
            diversifier.diversify(ranked, diversifier.output_size(), &mut rng)
        })
    });
}

criterion_group!(benches, bench_fuse, bench_fuse_and_diversify);
criterion_main!(benches);
