use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::Deserialize;

use super::{ContentStore, QuestionBank, StoreError, TelemetrySlice, TelemetryStore};
use crate::personalization::types::{
    ContentItem, DifficultyLevel, InteractionSample, RecommendationConstraints, SampleWindow,
};

const DEFAULT_MAX_SAMPLES_PER_LEARNER: usize = 5000;

#[derive(Default)]
pub struct InMemoryContentStore {
    items: RwLock<Vec<ContentItem>>,
    mastery: RwLock<HashMap<String, BTreeMap<String, f64>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    items: Vec<ContentItem>,
    #[serde(default)]
    mastery: HashMap<String, BTreeMap<String, f64>>,
    #[serde(default)]
    questions: Vec<QuestionSet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionSet {
    subject: String,
    difficulty: DifficultyLevel,
    ids: Vec<String>,
}

/// Content and questions loaded together from one JSON catalog file.
pub struct Catalog {
    pub content: InMemoryContentStore,
    pub questions: InMemoryQuestionBank,
}

pub fn load_catalog(path: impl AsRef<Path>) -> Result<Catalog, StoreError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
    let file: CatalogFile =
        serde_json::from_str(&raw).map_err(|e| StoreError::InvalidRecord(e.to_string()))?;

    let content = InMemoryContentStore::new(file.items);
    *content.mastery.write() = file.mastery;
    let questions = InMemoryQuestionBank::new();
    for set in file.questions {
        questions.add(&set.subject, set.difficulty, set.ids);
    }
    Ok(Catalog { content, questions })
}

impl InMemoryContentStore {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self {
            items: RwLock::new(items),
            mastery: RwLock::new(HashMap::new()),
        }
    }

    pub fn upsert_item(&self, item: ContentItem) {
        let mut items = self.items.write();
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
    }

    pub fn set_mastery(&self, learner_id: &str, skill: &str, level: f64) {
        self.mastery
            .write()
            .entry(learner_id.to_string())
            .or_default()
            .insert(skill.to_string(), level.clamp(0.0, 1.0));
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl ContentStore for InMemoryContentStore {
    fn get_eligible_content<'a>(
        &'a self,
        _learner_id: &'a str,
        subject: &'a str,
        _constraints: &'a RecommendationConstraints,
    ) -> BoxFuture<'a, Result<Vec<ContentItem>, StoreError>> {
        Box::pin(async move {
            let items = self.items.read();
            Ok(items
                .iter()
                .filter(|item| item.subject.eq_ignore_ascii_case(subject))
                .cloned()
                .collect())
        })
    }

    fn get_mastery_record<'a>(
        &'a self,
        learner_id: &'a str,
    ) -> BoxFuture<'a, Result<BTreeMap<String, f64>, StoreError>> {
        Box::pin(async move {
            Ok(self
                .mastery
                .read()
                .get(learner_id)
                .cloned()
                .unwrap_or_default())
        })
    }
}

#[derive(Default)]
struct LearnerLog {
    samples: Vec<InteractionSample>,
    version: u64,
}

pub struct InMemoryTelemetryStore {
    logs: RwLock<HashMap<String, LearnerLog>>,
    max_samples_per_learner: usize,
}

impl InMemoryTelemetryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SAMPLES_PER_LEARNER)
    }

    pub fn with_capacity(max_samples_per_learner: usize) -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
            max_samples_per_learner: max_samples_per_learner.max(1),
        }
    }

    pub fn learner_count(&self) -> usize {
        self.logs.read().len()
    }
}

impl Default for InMemoryTelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryStore for InMemoryTelemetryStore {
    fn append(&self, sample: InteractionSample) -> BoxFuture<'_, Result<u64, StoreError>> {
        Box::pin(async move {
            let mut logs = self.logs.write();
            let log = logs.entry(sample.learner_id.clone()).or_default();
            // Samples with equal timestamps keep arrival order.
            let pos = log
                .samples
                .partition_point(|s| s.timestamp <= sample.timestamp);
            log.samples.insert(pos, sample);
            if log.samples.len() > self.max_samples_per_learner {
                let overflow = log.samples.len() - self.max_samples_per_learner;
                log.samples.drain(..overflow);
            }
            log.version += 1;
            Ok(log.version)
        })
    }

    fn read<'a>(
        &'a self,
        learner_id: &'a str,
        window: SampleWindow,
    ) -> BoxFuture<'a, Result<TelemetrySlice, StoreError>> {
        Box::pin(async move {
            let logs = self.logs.read();
            let Some(log) = logs.get(learner_id) else {
                return Ok(TelemetrySlice::default());
            };
            let samples = match window {
                SampleWindow::Latest { count } => {
                    let start = log.samples.len().saturating_sub(count);
                    log.samples[start..].to_vec()
                }
                SampleWindow::Range { from, to } => log
                    .samples
                    .iter()
                    .filter(|s| s.timestamp >= from && s.timestamp <= to)
                    .cloned()
                    .collect(),
            };
            Ok(TelemetrySlice {
                samples,
                version: log.version,
            })
        })
    }

    fn version<'a>(&'a self, learner_id: &'a str) -> BoxFuture<'a, Result<u64, StoreError>> {
        Box::pin(async move { Ok(self.logs.read().get(learner_id).map(|l| l.version).unwrap_or(0)) })
    }
}

#[derive(Default)]
pub struct InMemoryQuestionBank {
    questions: RwLock<HashMap<(String, DifficultyLevel), Vec<String>>>,
}

impl InMemoryQuestionBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<I, S>(&self, subject: &str, level: DifficultyLevel, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.questions
            .write()
            .entry((subject.to_lowercase(), level))
            .or_default()
            .extend(ids.into_iter().map(Into::into));
    }
}

impl QuestionBank for InMemoryQuestionBank {
    fn questions<'a>(
        &'a self,
        subject: &'a str,
        level: DifficultyLevel,
    ) -> BoxFuture<'a, Result<Vec<String>, StoreError>> {
        Box::pin(async move {
            Ok(self
                .questions
                .read()
                .get(&(subject.to_lowercase(), level))
                .cloned()
                .unwrap_or_default())
        })
    }
}
