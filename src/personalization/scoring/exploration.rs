use crate::personalization::types::{ContentItem, LearnerProfile, NEUTRAL_SIGNAL};

use super::{ScoringContext, ScoringStrategy, StrategyError, EXPLORATION};

/// Upper-confidence-bound bonus for rarely visited items.
pub struct ExplorationStrategy {
    c: f64,
}

impl ExplorationStrategy {
    pub fn new(c: f64) -> Self {
        Self { c: c.max(0.0) }
    }

    /// `value + c * sqrt(ln(t) / (visits + 1))`, unbounded above.
    pub fn ucb(&self, value: f64, visits: u64, total_events: u64) -> f64 {
        let t = (total_events + 1) as f64;
        value + self.c * (t.ln() / (visits as f64 + 1.0)).sqrt()
    }
}

impl ScoringStrategy for ExplorationStrategy {
    fn id(&self) -> &str {
        EXPLORATION
    }

    fn score(
        &self,
        item: &ContentItem,
        _profile: &LearnerProfile,
        context: &ScoringContext,
    ) -> Result<(f64, String), StrategyError> {
        let stats = context.engagement.stats(&item.id);
        let value = stats.mean_reward().unwrap_or(NEUTRAL_SIGNAL);
        let ucb = self.ucb(value, stats.visits, context.engagement.total_events);
        let score = ucb.max(0.0).tanh();
        Ok((
            score,
            format!("visited {} times, ucb {:.2}", stats.visits, ucb),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personalization::engagement::ContentStats;
    use crate::personalization::scoring::tests::{context, item, profile};
    use crate::personalization::types::{ContentType, DifficultyLevel};

    #[test]
    fn cold_start_scores_the_prior() {
        let strategy = ExplorationStrategy::new(1.0);
        assert_eq!(strategy.ucb(0.5, 0, 0), 0.5);
        let (score, _) = strategy
            .score(&item("a", ContentType::Quiz, DifficultyLevel::Easy), &profile(), &context())
            .unwrap();
        assert!((score - 0.5f64.tanh()).abs() < 1e-12);
    }

    #[test]
    fn unvisited_items_get_a_larger_bonus() {
        let strategy = ExplorationStrategy::new(1.0);
        let mut ctx = context();
        ctx.engagement.total_events = 50;
        ctx.engagement.content.insert(
            "seen".to_string(),
            ContentStats {
                visits: 40,
                reward_sum: 20.0,
            },
        );

        let seen = item("seen", ContentType::Quiz, DifficultyLevel::Easy);
        let fresh = item("fresh", ContentType::Quiz, DifficultyLevel::Easy);
        let (seen_score, _) = strategy.score(&seen, &profile(), &ctx).unwrap();
        let (fresh_score, _) = strategy.score(&fresh, &profile(), &ctx).unwrap();
        assert!(fresh_score > seen_score);
        assert!(fresh_score <= 1.0);
    }
}
