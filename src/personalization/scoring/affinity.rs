use serde::{Deserialize, Serialize};

use crate::personalization::types::{ContentItem, LearnerProfile, NEUTRAL_SIGNAL};

use super::{ScoringContext, ScoringStrategy, StrategyError, CONTENT_AFFINITY};

const SKILL_GAP_WEIGHT: f64 = 0.6;
const ZPD_WEIGHT: f64 = 0.25;
const SENSORY_WEIGHT: f64 = 0.15;

const WEAK_SKILL: f64 = 0.5;
const STRONG_SKILL: f64 = 0.75;
const UNKNOWN_SKILL_GAP: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Zone {
    TooEasy,
    Zpd,
    TooHard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZpdConfig {
    pub optimal_gap: f64,
    pub width: f64,
}

impl Default for ZpdConfig {
    fn default() -> Self {
        Self {
            optimal_gap: 0.1,
            width: 0.25,
        }
    }
}

/// Gaussian fit of an item's difficulty position around `ability + optimal_gap`.
pub fn zpd_score(ability: f64, difficulty_position: f64, config: &ZpdConfig) -> f64 {
    let gap = difficulty_position - ability;
    let distance = gap - config.optimal_gap;
    let width = config.width.max(1e-3);
    (-distance.powi(2) / (2.0 * width.powi(2))).exp()
}

pub fn classify_zone(ability: f64, difficulty_position: f64) -> Zone {
    let gap = difficulty_position - ability;
    if gap < -0.3 {
        Zone::TooEasy
    } else if gap > 0.4 {
        Zone::TooHard
    } else {
        Zone::Zpd
    }
}

/// 1.0 for weak skills, 0.0 for strong ones, linear in between.
pub fn skill_gap(mastery: f64) -> f64 {
    if mastery < WEAK_SKILL {
        1.0
    } else {
        ((STRONG_SKILL - mastery) / (STRONG_SKILL - WEAK_SKILL)).clamp(0.0, 1.0)
    }
}

pub struct ContentAffinityStrategy {
    zpd: ZpdConfig,
}

impl ContentAffinityStrategy {
    pub fn new(optimal_gap: f64, width: f64) -> Self {
        Self {
            zpd: ZpdConfig { optimal_gap, width },
        }
    }

    fn skill_match(item: &ContentItem, profile: &LearnerProfile) -> f64 {
        if item.skills.is_empty() {
            return NEUTRAL_SIGNAL;
        }
        let total: f64 = item
            .skills
            .iter()
            .map(|skill| {
                profile
                    .mastery_of(skill)
                    .map(skill_gap)
                    .unwrap_or(UNKNOWN_SKILL_GAP)
            })
            .sum();
        total / item.skills.len() as f64
    }

    fn sensory_match(item: &ContentItem, profile: &LearnerProfile) -> f64 {
        if !profile.signals.coverage.sensory {
            return NEUTRAL_SIGNAL;
        }
        match item.content_type.channel() {
            Some(channel) => profile.signals.channel_preference(channel),
            None => NEUTRAL_SIGNAL,
        }
    }
}

impl Default for ContentAffinityStrategy {
    fn default() -> Self {
        let zpd = ZpdConfig::default();
        Self::new(zpd.optimal_gap, zpd.width)
    }
}

impl ScoringStrategy for ContentAffinityStrategy {
    fn id(&self) -> &str {
        CONTENT_AFFINITY
    }

    fn score(
        &self,
        item: &ContentItem,
        profile: &LearnerProfile,
        _context: &ScoringContext,
    ) -> Result<(f64, String), StrategyError> {
        let skill = Self::skill_match(item, profile);
        let ability = profile.ability(&item.skills);
        let position = item.difficulty.position();
        let zpd = zpd_score(ability, position, &self.zpd);
        let sensory = Self::sensory_match(item, profile);

        let score = SKILL_GAP_WEIGHT * skill + ZPD_WEIGHT * zpd + SENSORY_WEIGHT * sensory;
        let zone = match classify_zone(ability, position) {
            Zone::TooEasy => "below current level",
            Zone::Zpd => "within reach",
            Zone::TooHard => "above current level",
        };
        Ok((
            score,
            format!(
                "skill gap {:.2}, {} difficulty {}, format fit {:.2}",
                skill,
                zone,
                item.difficulty.as_str(),
                sensory
            ),
        ))
    }
}
