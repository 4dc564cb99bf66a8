use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::personalization::types::LearnerSignalVector;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStats {
    pub visits: u64,
    pub reward_sum: f64,
}

impl ContentStats {
    fn record(&mut self, reward: f64) {
        self.visits += 1;
        self.reward_sum += reward;
    }

    pub fn mean_reward(&self) -> Option<f64> {
        (self.visits > 0).then(|| self.reward_sum / self.visits as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeerRecord {
    pub learner_id: String,
    pub features: [f64; 13],
    pub rewards: BTreeMap<String, f64>,
}

/// Point-in-time view handed to scoring strategies so one request sees one state.
#[derive(Debug, Clone, Default)]
pub struct EngagementSnapshot {
    pub content: BTreeMap<String, ContentStats>,
    pub total_events: u64,
    pub peers: Vec<PeerRecord>,
}

impl EngagementSnapshot {
    pub fn stats(&self, content_id: &str) -> ContentStats {
        self.content.get(content_id).copied().unwrap_or_default()
    }
}

/// In-process record of observed outcomes: per-item visit counts and rewards, each
/// learner's outcome history and their most recent signal vector.
#[derive(Default)]
pub struct EngagementStore {
    content: RwLock<BTreeMap<String, ContentStats>>,
    learner_outcomes: RwLock<HashMap<String, BTreeMap<String, ContentStats>>>,
    latest_vectors: RwLock<HashMap<String, [f64; 13]>>,
    total_events: AtomicU64,
}

impl EngagementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&self, learner_id: &str, content_id: &str, reward: f64) {
        let reward = reward.clamp(0.0, 1.0);
        self.content
            .write()
            .entry(content_id.to_string())
            .or_default()
            .record(reward);
        self.learner_outcomes
            .write()
            .entry(learner_id.to_string())
            .or_default()
            .entry(content_id.to_string())
            .or_default()
            .record(reward);
        self.total_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_vector(&self, vector: &LearnerSignalVector) {
        if vector.is_neutral() {
            return;
        }
        self.latest_vectors
            .write()
            .insert(vector.learner_id.clone(), vector.values());
    }

    pub fn total_events(&self) -> u64 {
        self.total_events.load(Ordering::Relaxed)
    }

    pub fn learner_count(&self) -> usize {
        self.latest_vectors.read().len()
    }

    /// Snapshot excluding `learner_id` from the peer list. Peers are ordered by id.
    pub fn snapshot(&self, learner_id: &str) -> EngagementSnapshot {
        let content = self.content.read().clone();
        let vectors = self.latest_vectors.read();
        let outcomes = self.learner_outcomes.read();

        let mut peers: Vec<PeerRecord> = vectors
            .iter()
            .filter(|(id, _)| id.as_str() != learner_id)
            .filter_map(|(id, features)| {
                let history = outcomes.get(id)?;
                let rewards = history
                    .iter()
                    .filter_map(|(content_id, stats)| {
                        stats.mean_reward().map(|r| (content_id.clone(), r))
                    })
                    .collect::<BTreeMap<_, _>>();
                Some(PeerRecord {
                    learner_id: id.clone(),
                    features: *features,
                    rewards,
                })
            })
            .collect();
        peers.sort_by(|a, b| a.learner_id.cmp(&b.learner_id));

        EngagementSnapshot {
            content,
            total_events: self.total_events(),
            peers,
        }
    }
}
