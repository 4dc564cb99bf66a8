use crate::personalization::types::{ContentItem, LearnerProfile, NEUTRAL_SIGNAL};

use super::{ScoringContext, ScoringStrategy, StrategyError, PEER_SIMILARITY};

/// Collaborative score: how learners with similar signal vectors fared on the item.
pub struct PeerSimilarityStrategy {
    top_k: usize,
    min_similarity: f64,
}

impl PeerSimilarityStrategy {
    pub fn new(top_k: usize, min_similarity: f64) -> Self {
        Self {
            top_k: top_k.max(1),
            min_similarity,
        }
    }
}

/// Cosine similarity of two feature vectors centred on the neutral value, so that
/// "no evidence" contributes nothing. Zero-norm vectors have similarity 0.
pub fn centred_cosine(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let x = x - NEUTRAL_SIGNAL;
        let y = y - NEUTRAL_SIGNAL;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= f64::EPSILON || norm_b <= f64::EPSILON {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

impl ScoringStrategy for PeerSimilarityStrategy {
    fn id(&self) -> &str {
        PEER_SIMILARITY
    }

    fn score(
        &self,
        item: &ContentItem,
        profile: &LearnerProfile,
        context: &ScoringContext,
    ) -> Result<(f64, String), StrategyError> {
        let own = profile.signals.values();

        let mut neighbours: Vec<(f64, &str, f64)> = context
            .engagement
            .peers
            .iter()
            .filter_map(|peer| {
                let reward = *peer.rewards.get(&item.id)?;
                let similarity = centred_cosine(&own, &peer.features);
                (similarity >= self.min_similarity)
                    .then_some((similarity, peer.learner_id.as_str(), reward))
            })
            .collect();
        neighbours.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        neighbours.truncate(self.top_k);

        let weight_sum: f64 = neighbours.iter().map(|(s, _, _)| s).sum();
        if !neighbours.is_empty() && weight_sum > f64::EPSILON {
            let score = neighbours.iter().map(|(s, _, r)| s * r).sum::<f64>() / weight_sum;
            return Ok((
                score,
                format!("{} similar learners rated this {:.2}", neighbours.len(), score),
            ));
        }

        match context.engagement.stats(&item.id).mean_reward() {
            Some(mean) => Ok((mean, format!("average learner reward {:.2}", mean))),
            None => Ok((NEUTRAL_SIGNAL, "no peer engagement yet".to_string())),
        }
    }
}
