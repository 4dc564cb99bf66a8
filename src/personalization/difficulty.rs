use crate::personalization::config::DifficultyConfig;
use crate::personalization::types::{
    DetectedNeed, DifficultyLevel, DifficultyState, Direction, Response, Severity,
};

/// Raises, holds or lowers question difficulty one level at a time.
pub struct DifficultyController {
    config: DifficultyConfig,
}

impl DifficultyController {
    pub fn new(config: DifficultyConfig) -> Self {
        Self { config }
    }

    pub fn fast_latency_ms(&self) -> u64 {
        self.config.fast_latency_ms
    }

    /// Starting level for a session plus the reason it was chosen. A need of at
    /// least moderate severity that affects the subject starts one level lower.
    pub fn initial_level(
        &self,
        requested: Option<DifficultyLevel>,
        needs: &[DetectedNeed],
        subject: &str,
    ) -> (DifficultyLevel, String) {
        let start = requested.unwrap_or(self.config.starting);
        let limiting = needs
            .iter()
            .filter(|n| n.severity >= Severity::Moderate && n.need_type.affects_subject(subject))
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence));

        match limiting {
            Some(need) if start != DifficultyLevel::Easy => (
                start.easier(),
                format!(
                    "started below {} for {} {} need",
                    start.as_str(),
                    need.severity.as_str(),
                    need.need_type.as_str()
                ),
            ),
            Some(need) => (
                start,
                format!(
                    "already at easiest level despite {} need",
                    need.need_type.as_str()
                ),
            ),
            None => (start, format!("starting at {}", start.as_str())),
        }
    }

    pub fn next(&self, current: DifficultyLevel, response: &Response) -> DifficultyState {
        let cfg = &self.config;
        let fast = response.latency_ms < cfg.fast_latency_ms;

        if response.correct && response.confidence > cfg.raise_confidence && fast {
            let to = current.harder();
            let reason = if to == current {
                "confident fast answer at the highest level".to_string()
            } else {
                format!(
                    "correct with confidence {:.2} in {}ms",
                    response.confidence, response.latency_ms
                )
            };
            return DifficultyState {
                direction: if to == current {
                    Direction::Hold
                } else {
                    Direction::Increase
                },
                reason,
                from: current,
                to,
            };
        }

        if !response.correct
            && response.confidence < cfg.lower_confidence
            && response.attempts > cfg.lower_min_attempts
        {
            let to = current.easier();
            let reason = if to == current {
                "struggling at the lowest level".to_string()
            } else {
                format!(
                    "incorrect after {} attempts with confidence {:.2}",
                    response.attempts, response.confidence
                )
            };
            return DifficultyState {
                direction: if to == current {
                    Direction::Hold
                } else {
                    Direction::Decrease
                },
                reason,
                from: current,
                to,
            };
        }

        DifficultyState {
            direction: Direction::Hold,
            reason: if response.correct {
                "correct but not yet fluent".to_string()
            } else {
                "incorrect, still within reach".to_string()
            },
            from: current,
            to: current,
        }
    }

    pub fn feedback_message(response: &Response, state: &DifficultyState) -> String {
        match (response.correct, state.direction) {
            (true, Direction::Increase) => "Great work! Moving to a harder question.".to_string(),
            (true, _) => "Correct! Keep going.".to_string(),
            (false, Direction::Decrease) => {
                "Let's try an easier question to build confidence.".to_string()
            }
            (false, _) => "Not quite. Give the next one a try.".to_string(),
        }
    }
}

impl Default for DifficultyController {
    fn default() -> Self {
        Self::new(DifficultyConfig::default())
    }
}
