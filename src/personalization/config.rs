use serde::{Deserialize, Serialize};

use crate::cache::keys;
use crate::personalization::types::DifficultyLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    pub window_size: usize,
    pub reading_speed_cap_wpm: f64,
    pub reversal_error_cap: f64,
    pub attention_span_cap_secs: f64,
    pub focus_switch_cap: f64,
    pub latency_cap_ms: f64,
    pub help_rate_cap: f64,
    pub store_timeout_ms: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            window_size: 50,
            reading_speed_cap_wpm: 200.0,
            reversal_error_cap: 20.0,
            attention_span_cap_secs: 1800.0,
            focus_switch_cap: 10.0,
            latency_cap_ms: 10_000.0,
            help_rate_cap: 1.0,
            store_timeout_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeedConfig {
    pub confidence_floor: f64,
    pub detector_timeout_ms: u64,
    pub profile_ttl_secs: u64,
}

impl Default for NeedConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.6,
            detector_timeout_ms: 500,
            profile_ttl_secs: keys::NEED_PROFILE_TTL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateConfig {
    pub mastery_threshold: f64,
    pub max_candidates: usize,
    pub cache_ttl_secs: u64,
    pub store_timeout_ms: u64,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            mastery_threshold: 0.7,
            max_candidates: 200,
            cache_ttl_secs: keys::CANDIDATES_TTL.as_secs(),
            store_timeout_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub strategy_timeout_ms: u64,
    pub max_concurrency: usize,
    pub exploration_c: f64,
    pub peer_top_k: usize,
    pub peer_min_similarity: f64,
    pub zpd_optimal_gap: f64,
    pub zpd_width: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            strategy_timeout_ms: 2000,
            max_concurrency: 4,
            exploration_c: 1.0,
            peer_top_k: 20,
            peer_min_similarity: 0.5,
            zpd_optimal_gap: 0.1,
            zpd_width: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyWeights {
    pub peer_similarity: f64,
    pub content_affinity: f64,
    pub exploration: f64,
    pub need_compatibility: f64,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            peer_similarity: 0.25,
            content_affinity: 0.35,
            exploration: 0.15,
            need_compatibility: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    pub base_weights: StrategyWeights,
    pub flexibility_threshold: f64,
    pub flexibility_boost: f64,
    pub need_confidence_threshold: f64,
    pub need_boost: f64,
    pub min_weight: f64,
    pub trust_ema_alpha: f64,
    pub trust_min_samples: u64,
    pub trust_max_blend: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            base_weights: StrategyWeights::default(),
            flexibility_threshold: 0.6,
            flexibility_boost: 0.2,
            need_confidence_threshold: 0.7,
            need_boost: 0.25,
            min_weight: 0.05,
            trust_ema_alpha: 0.1,
            trust_min_samples: 20,
            trust_max_blend: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiversityConfig {
    pub max_per_category: usize,
    pub max_per_difficulty: usize,
    pub unconditional_head: usize,
    pub overflow_admit_probability: f64,
    pub output_size: usize,
    pub seed: u64,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            max_per_category: 4,
            max_per_difficulty: 8,
            unconditional_head: 3,
            overflow_admit_probability: 0.3,
            output_size: 20,
            seed: 0x5eed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyConfig {
    pub starting: DifficultyLevel,
    pub fast_latency_ms: u64,
    pub raise_confidence: f64,
    pub lower_confidence: f64,
    pub lower_min_attempts: u32,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            starting: DifficultyLevel::Medium,
            fast_latency_ms: 5000,
            raise_confidence: 0.7,
            lower_confidence: 0.3,
            lower_min_attempts: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPolicy {
    pub lock_wait_ms: u64,
    pub lock_retries: u32,
    pub retention_secs: u64,
    /// Active sessions untouched for this long are closed by maintenance.
    pub idle_timeout_secs: u64,
    pub question_timeout_ms: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            lock_wait_ms: 250,
            lock_retries: 8,
            retention_secs: 3600,
            idle_timeout_secs: 1800,
            question_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub peer_similarity_enabled: bool,
    pub content_affinity_enabled: bool,
    pub exploration_enabled: bool,
    pub need_compatibility_enabled: bool,
    pub trust_blending_enabled: bool,
    pub need_cache_enabled: bool,
    pub candidate_cache_enabled: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            peer_similarity_enabled: true,
            content_affinity_enabled: true,
            exploration_enabled: true,
            need_compatibility_enabled: true,
            trust_blending_enabled: true,
            need_cache_enabled: true,
            candidate_cache_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    pub signals: SignalConfig,
    pub needs: NeedConfig,
    pub candidates: CandidateConfig,
    pub scoring: ScoringConfig,
    pub fusion: FusionConfig,
    pub diversity: DiversityConfig,
    pub difficulty: DifficultyConfig,
    pub sessions: SessionPolicy,
    pub feature_flags: FeatureFlags,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(val) = env_parse("PERSONALIZATION_WINDOW_SIZE") {
            config.signals.window_size = val;
        }
        if let Some(val) = env_parse("PERSONALIZATION_NEED_FLOOR") {
            config.needs.confidence_floor = val;
        }
        if let Some(val) = env_parse("PERSONALIZATION_NEED_TTL_SECS") {
            config.needs.profile_ttl_secs = val;
        }
        if let Some(val) = env_parse("PERSONALIZATION_CANDIDATE_TTL_SECS") {
            config.candidates.cache_ttl_secs = val;
        }
        if let Some(val) = env_parse("PERSONALIZATION_MAX_CANDIDATES") {
            config.candidates.max_candidates = val;
        }
        if let Some(val) = env_parse("PERSONALIZATION_STRATEGY_TIMEOUT_MS") {
            config.scoring.strategy_timeout_ms = val;
        }
        if let Some(val) = env_parse("PERSONALIZATION_MAX_CONCURRENCY") {
            config.scoring.max_concurrency = val;
        }
        if let Some(val) = env_parse("PERSONALIZATION_OUTPUT_SIZE") {
            config.diversity.output_size = val;
        }
        if let Some(val) = env_parse("PERSONALIZATION_MAX_PER_CATEGORY") {
            config.diversity.max_per_category = val;
        }
        if let Some(val) = env_parse("PERSONALIZATION_MAX_PER_DIFFICULTY") {
            config.diversity.max_per_difficulty = val;
        }
        if let Some(val) = env_parse("PERSONALIZATION_OVERFLOW_PROBABILITY") {
            config.diversity.overflow_admit_probability = val;
        }
        if let Some(val) = env_parse("PERSONALIZATION_SEED") {
            config.diversity.seed = val;
        }
        if let Some(val) = env_parse("PERSONALIZATION_FAST_LATENCY_MS") {
            config.difficulty.fast_latency_ms = val;
        }
        if let Some(val) = env_parse("PERSONALIZATION_SESSION_RETENTION_SECS") {
            config.sessions.retention_secs = val;
        }
        if let Some(val) = env_parse("PERSONALIZATION_SESSION_IDLE_SECS") {
            config.sessions.idle_timeout_secs = val;
        }
        if let Some(val) = env_parse("PERSONALIZATION_QUESTION_TIMEOUT_MS") {
            config.sessions.question_timeout_ms = val;
        }
        if let Ok(val) = std::env::var("PERSONALIZATION_STARTING_DIFFICULTY") {
            config.difficulty.starting = DifficultyLevel::parse(&val);
        }
        if let Ok(val) = std::env::var("PERSONALIZATION_EXPLORATION_ENABLED") {
            config.feature_flags.exploration_enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("PERSONALIZATION_PEER_ENABLED") {
            config.feature_flags.peer_similarity_enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("PERSONALIZATION_TRUST_BLENDING_ENABLED") {
            config.feature_flags.trust_blending_enabled = val.parse().unwrap_or(true);
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
