#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;

use adaptive_engine::personalization::{
    ContentItem, ContentType, DifficultyLevel, DomainMetrics, EngineBuilder, InteractionSample,
    PersonalizationEngine, ReadingMetrics, RecommendationConstraints,
};
use adaptive_engine::stores::{
    ContentStore, InMemoryContentStore, InMemoryQuestionBank, InMemoryTelemetryStore, StoreError,
};

pub fn item(
    id: &str,
    content_type: ContentType,
    difficulty: DifficultyLevel,
    skills: &[&str],
) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        subject: "math".to_string(),
        content_type,
        difficulty,
        prerequisites: vec![],
        skills: skills.iter().map(|s| s.to_string()).collect(),
        estimated_minutes: 10,
        cultural_tags: vec![],
        accessibility_features: vec![],
        cultural_relevance: 0.5,
        accessibility_score: 0.5,
    }
}

/// Ten quizzes and five videos across difficulties and two skills.
pub fn math_catalog() -> Vec<ContentItem> {
    let levels = [DifficultyLevel::Easy, DifficultyLevel::Medium, DifficultyLevel::Hard];
    let mut items = Vec::new();
    for i in 0..10 {
        let skill = if i % 2 == 0 { "fractions" } else { "decimals" };
        items.push(item(&format!("quiz-{i:02}"), ContentType::Quiz, levels[i % 3], &[skill]));
    }
    for i in 0..5 {
        items.push(item(&format!("video-{i:02}"), ContentType::Video, levels[i % 3], &["fractions"]));
    }
    items
}

pub fn question_bank() -> InMemoryQuestionBank {
    let bank = InMemoryQuestionBank::new();
    for (level, prefix) in [
        (DifficultyLevel::Easy, "e"),
        (DifficultyLevel::Medium, "m"),
        (DifficultyLevel::Hard, "h"),
    ] {
        bank.add("math", level, (1..=20).map(|i| format!("{prefix}{i}")));
        bank.add("reading", level, (1..=20).map(|i| format!("r{prefix}{i}")));
    }
    bank
}

pub fn builder(items: Vec<ContentItem>) -> EngineBuilder {
    let content = InMemoryContentStore::new(items);
    content.set_mastery("learner-1", "fractions", 0.3);
    content.set_mastery("learner-1", "decimals", 0.8);
    PersonalizationEngine::builder(Arc::new(content), Arc::new(InMemoryTelemetryStore::new()))
        .question_bank(Arc::new(question_bank()))
}

pub fn engine() -> PersonalizationEngine {
    builder(math_catalog()).build()
}

pub fn reading_sample(learner_id: &str, ts: i64, wpm: f64, accuracy: f64, reversals: u32) -> InteractionSample {
    InteractionSample {
        metrics: DomainMetrics {
            reading: Some(ReadingMetrics {
                words_per_minute: wpm,
                accuracy,
                reversal_errors: reversals,
            }),
            ..DomainMetrics::default()
        },
        ..InteractionSample::new(learner_id, ts)
    }
}

pub fn no_constraints() -> RecommendationConstraints {
    RecommendationConstraints::default()
}

/// Content store whose every call fails.
pub struct UnavailableContentStore;

impl ContentStore for UnavailableContentStore {
    fn get_eligible_content<'a>(
        &'a self,
        _learner_id: &'a str,
        _subject: &'a str,
        _constraints: &'a RecommendationConstraints,
    ) -> BoxFuture<'a, Result<Vec<ContentItem>, StoreError>> {
        Box::pin(async { Err(StoreError::Unavailable("catalog offline".to_string())) })
    }

    fn get_mastery_record<'a>(
        &'a self,
        _learner_id: &'a str,
    ) -> BoxFuture<'a, Result<BTreeMap<String, f64>, StoreError>> {
        Box::pin(async { Err(StoreError::Unavailable("catalog offline".to_string())) })
    }
}
