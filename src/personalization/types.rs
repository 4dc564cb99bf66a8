use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl DifficultyLevel {
    pub const ALL: [DifficultyLevel; 3] = [Self::Easy, Self::Medium, Self::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    pub fn harder(&self) -> Self {
        match self {
            Self::Easy => Self::Medium,
            _ => Self::Hard,
        }
    }

    pub fn easier(&self) -> Self {
        match self {
            Self::Hard => Self::Medium,
            _ => Self::Easy,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "easy" => Self::Easy,
            "hard" => Self::Hard,
            _ => Self::Medium,
        }
    }

    pub fn rank(&self) -> usize {
        match self {
            Self::Easy => 0,
            Self::Medium => 1,
            Self::Hard => 2,
        }
    }

    /// Position on the [0,1] ability axis used by zone-of-proximal-development scoring.
    pub fn position(&self) -> f64 {
        match self {
            Self::Easy => 0.25,
            Self::Medium => 0.55,
            Self::Hard => 0.85,
        }
    }

    /// Credit weight of a correct answer at this level.
    pub fn score_weight(&self) -> f64 {
        match self {
            Self::Easy => 1.0,
            Self::Medium => 1.5,
            Self::Hard => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Quiz,
    Reading,
    Interactive,
    Audio,
    Game,
    Worksheet,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Quiz => "quiz",
            Self::Reading => "reading",
            Self::Interactive => "interactive",
            Self::Audio => "audio",
            Self::Game => "game",
            Self::Worksheet => "worksheet",
        }
    }

    pub fn channel(&self) -> Option<SensoryChannel> {
        match self {
            Self::Video | Self::Reading | Self::Worksheet => Some(SensoryChannel::Visual),
            Self::Audio => Some(SensoryChannel::Auditory),
            Self::Interactive | Self::Game => Some(SensoryChannel::Kinesthetic),
            Self::Quiz => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensoryChannel {
    Visual,
    Auditory,
    Kinesthetic,
}

impl SensoryChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visual => "visual",
            Self::Auditory => "auditory",
            Self::Kinesthetic => "kinesthetic",
        }
    }
}

// ============================================================================
// Telemetry
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingMetrics {
    pub words_per_minute: f64,
    pub accuracy: f64,
    #[serde(default)]
    pub reversal_errors: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MathMetrics {
    pub accuracy: f64,
    #[serde(default)]
    pub problems_attempted: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionMetrics {
    pub span_seconds: f64,
    #[serde(default)]
    pub focus_switches: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensoryMetrics {
    pub visual: f64,
    pub auditory: f64,
    pub kinesthetic: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DomainMetrics {
    #[serde(default)]
    pub reading: Option<ReadingMetrics>,
    #[serde(default)]
    pub math: Option<MathMetrics>,
    #[serde(default)]
    pub attention: Option<AttentionMetrics>,
    #[serde(default)]
    pub sensory: Option<SensoryMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionSample {
    #[serde(default)]
    pub learner_id: String,
    pub timestamp: i64,
    #[serde(default)]
    pub metrics: DomainMetrics,
    #[serde(default)]
    pub response_latency_ms: Option<u64>,
    #[serde(default)]
    pub help_requests: u32,
    #[serde(default)]
    pub items_attempted: u32,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub context_tags: Vec<String>,
}

impl InteractionSample {
    pub fn new(learner_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            learner_id: learner_id.into(),
            timestamp,
            metrics: DomainMetrics::default(),
            response_latency_ms: None,
            help_requests: 0,
            items_attempted: 0,
            device: None,
            context_tags: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.learner_id.trim().is_empty() {
            return Err("learnerId must not be empty".to_string());
        }
        if self.timestamp <= 0 {
            return Err("timestamp must be positive".to_string());
        }
        if let Some(ref reading) = self.metrics.reading {
            if !reading.words_per_minute.is_finite() || reading.words_per_minute < 0.0 {
                return Err("reading.wordsPerMinute must be a non-negative number".to_string());
            }
            check_unit("reading.accuracy", reading.accuracy)?;
        }
        if let Some(ref math) = self.metrics.math {
            check_unit("math.accuracy", math.accuracy)?;
        }
        if let Some(ref attention) = self.metrics.attention {
            if !attention.span_seconds.is_finite() || attention.span_seconds < 0.0 {
                return Err("attention.spanSeconds must be a non-negative number".to_string());
            }
        }
        if let Some(ref sensory) = self.metrics.sensory {
            check_unit("sensory.visual", sensory.visual)?;
            check_unit("sensory.auditory", sensory.auditory)?;
            check_unit("sensory.kinesthetic", sensory.kinesthetic)?;
        }
        Ok(())
    }
}

fn check_unit(field: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{field} must be within [0, 1]"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum SampleWindow {
    Latest { count: usize },
    Range { from: i64, to: i64 },
}

impl SampleWindow {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Latest { count } if *count == 0 => {
                Err("window count must be positive".to_string())
            }
            Self::Range { from, to } if from > to => {
                Err("window range start must not exceed its end".to_string())
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Signals and needs
// ============================================================================

pub const NEUTRAL_SIGNAL: f64 = 0.5;

/// Which telemetry domains contributed at least one observation to a signal vector.
/// Features of an unobserved domain sit at the neutral value and carry no evidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalCoverage {
    pub reading: bool,
    pub math: bool,
    pub attention: bool,
    pub sensory: bool,
    pub latency: bool,
    pub help: bool,
}

/// Normalized summary of a learner's recent behavior. Every feature lies in [0,1];
/// 0.5 means "no evidence".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerSignalVector {
    pub learner_id: String,
    pub version: u64,
    pub sample_count: usize,
    pub reading_speed: f64,
    pub reading_accuracy: f64,
    pub reversal_errors: f64,
    pub math_accuracy: f64,
    pub attention_span: f64,
    pub focus_switching: f64,
    pub visual_preference: f64,
    pub auditory_preference: f64,
    pub kinesthetic_preference: f64,
    pub response_latency: f64,
    pub latency_variability: f64,
    pub help_seeking: f64,
    pub cognitive_flexibility: f64,
    #[serde(default)]
    pub coverage: SignalCoverage,
}

impl LearnerSignalVector {
    pub const LABELS: [&'static str; 13] = [
        "readingSpeed",
        "readingAccuracy",
        "reversalErrors",
        "mathAccuracy",
        "attentionSpan",
        "focusSwitching",
        "visualPreference",
        "auditoryPreference",
        "kinestheticPreference",
        "responseLatency",
        "latencyVariability",
        "helpSeeking",
        "cognitiveFlexibility",
    ];

    pub fn neutral(learner_id: impl Into<String>, version: u64) -> Self {
        Self {
            learner_id: learner_id.into(),
            version,
            sample_count: 0,
            reading_speed: NEUTRAL_SIGNAL,
            reading_accuracy: NEUTRAL_SIGNAL,
            reversal_errors: NEUTRAL_SIGNAL,
            math_accuracy: NEUTRAL_SIGNAL,
            attention_span: NEUTRAL_SIGNAL,
            focus_switching: NEUTRAL_SIGNAL,
            visual_preference: NEUTRAL_SIGNAL,
            auditory_preference: NEUTRAL_SIGNAL,
            kinesthetic_preference: NEUTRAL_SIGNAL,
            response_latency: NEUTRAL_SIGNAL,
            latency_variability: NEUTRAL_SIGNAL,
            help_seeking: NEUTRAL_SIGNAL,
            cognitive_flexibility: NEUTRAL_SIGNAL,
            coverage: SignalCoverage::default(),
        }
    }

    pub fn values(&self) -> [f64; 13] {
        [
            self.reading_speed,
            self.reading_accuracy,
            self.reversal_errors,
            self.math_accuracy,
            self.attention_span,
            self.focus_switching,
            self.visual_preference,
            self.auditory_preference,
            self.kinesthetic_preference,
            self.response_latency,
            self.latency_variability,
            self.help_seeking,
            self.cognitive_flexibility,
        ]
    }

    pub fn is_neutral(&self) -> bool {
        self.sample_count == 0
    }

    pub fn channel_preference(&self, channel: SensoryChannel) -> f64 {
        match channel {
            SensoryChannel::Visual => self.visual_preference,
            SensoryChannel::Auditory => self.auditory_preference,
            SensoryChannel::Kinesthetic => self.kinesthetic_preference,
        }
    }

    pub fn dominant_channel(&self) -> (SensoryChannel, f64) {
        [
            SensoryChannel::Visual,
            SensoryChannel::Auditory,
            SensoryChannel::Kinesthetic,
        ]
        .into_iter()
        .map(|c| (c, self.channel_preference(c)))
        .fold((SensoryChannel::Visual, f64::NEG_INFINITY), |best, cur| {
            if cur.1 > best.1 {
                cur
            } else {
                best
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NeedType {
    Dyslexia,
    Dyscalculia,
    Adhd,
    ProcessingSpeed,
    SensoryProcessing,
}

impl NeedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dyslexia => "DYSLEXIA",
            Self::Dyscalculia => "DYSCALCULIA",
            Self::Adhd => "ADHD",
            Self::ProcessingSpeed => "PROCESSING_SPEED",
            Self::SensoryProcessing => "SENSORY_PROCESSING",
        }
    }

    /// Accessibility features that accommodate this need, matched against
    /// `ContentItem::accessibility_features`.
    pub fn accommodations(&self) -> &'static [&'static str] {
        match self {
            Self::Dyslexia => &["dyslexia-font", "audio-narration", "text-to-speech", "highlighting"],
            Self::Dyscalculia => &["manipulatives", "visual-aids", "step-by-step", "extended-time"],
            Self::Adhd => &["chunked", "short-segments", "progress-markers", "minimal-distraction"],
            Self::ProcessingSpeed => &["extended-time", "self-paced", "step-by-step"],
            Self::SensoryProcessing => &["captions", "reduced-motion", "adjustable-audio", "minimal-distraction"],
        }
    }

    pub fn affects_subject(&self, subject: &str) -> bool {
        let subject = subject.to_lowercase();
        match self {
            Self::Dyslexia => ["reading", "literacy", "language", "writing", "english", "spelling"]
                .iter()
                .any(|s| subject.contains(s)),
            Self::Dyscalculia => ["math", "arithmetic", "algebra", "geometry", "numeracy"]
                .iter()
                .any(|s| subject.contains(s)),
            Self::Adhd | Self::ProcessingSpeed | Self::SensoryProcessing => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Self::Mild => 0.5,
            Self::Moderate => 0.75,
            Self::Severe => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedNeed {
    #[serde(rename = "type")]
    pub need_type: NeedType,
    pub severity: Severity,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl DetectedNeed {
    pub fn new(need_type: NeedType, severity: Severity, confidence: f64) -> Self {
        Self {
            need_type,
            severity,
            confidence: confidence.clamp(0.0, 1.0),
            evidence: Vec::new(),
            recommendations: need_type
                .accommodations()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sources: Vec::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence.push(evidence.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeedProfile {
    pub learner_id: String,
    pub version: u64,
    pub needs: Vec<DetectedNeed>,
    pub computed_at: i64,
}

// ============================================================================
// Content and recommendations
// ============================================================================

fn default_half() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub subject: String,
    pub content_type: ContentType,
    pub difficulty: DifficultyLevel,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub estimated_minutes: u32,
    #[serde(default)]
    pub cultural_tags: Vec<String>,
    #[serde(default)]
    pub accessibility_features: Vec<String>,
    #[serde(default = "default_half")]
    pub cultural_relevance: f64,
    #[serde(default = "default_half")]
    pub accessibility_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationConstraints {
    #[serde(default)]
    pub max_minutes: Option<u32>,
    #[serde(default)]
    pub content_types: Vec<ContentType>,
    #[serde(default)]
    pub required_accessibility: Vec<String>,
    #[serde(default)]
    pub exclude_content_ids: Vec<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl RecommendationConstraints {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_minutes == Some(0) {
            return Err("maxMinutes must be positive".to_string());
        }
        if let Some(max) = self.max_results {
            if max == 0 || max > 100 {
                return Err("maxResults must be within [1, 100]".to_string());
            }
        }
        Ok(())
    }

    /// Stable textual form used as part of cache keys.
    pub fn fingerprint(&self) -> String {
        let mut types: Vec<&str> = self.content_types.iter().map(|t| t.as_str()).collect();
        types.sort_unstable();
        let mut access: Vec<&str> = self.required_accessibility.iter().map(String::as_str).collect();
        access.sort_unstable();
        let mut excluded: Vec<&str> = self.exclude_content_ids.iter().map(String::as_str).collect();
        excluded.sort_unstable();
        format!(
            "t={}|a={}|m={}|x={}",
            types.join(","),
            access.join(","),
            self.max_minutes.map(|m| m.to_string()).unwrap_or_default(),
            excluded.join(",")
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationContext {
    pub subject: String,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub session_minutes: Option<f64>,
}

impl RecommendationContext {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            device: None,
            session_minutes: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.subject.trim().is_empty() {
            return Err("subject must not be empty".to_string());
        }
        if let Some(minutes) = self.session_minutes {
            if !minutes.is_finite() || minutes < 0.0 {
                return Err("sessionMinutes must be a non-negative number".to_string());
            }
        }
        Ok(())
    }
}

/// Everything the scoring strategies may know about the learner for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerProfile {
    pub learner_id: String,
    pub signals: LearnerSignalVector,
    pub needs: Vec<DetectedNeed>,
    pub mastery: BTreeMap<String, f64>,
}

impl LearnerProfile {
    pub fn mastery_of(&self, skill: &str) -> Option<f64> {
        self.mastery.get(skill).copied()
    }

    /// Mean mastery across the given skills, or across all known skills when none
    /// of them has a record.
    pub fn ability(&self, skills: &[String]) -> f64 {
        let known: Vec<f64> = skills.iter().filter_map(|s| self.mastery_of(s)).collect();
        if !known.is_empty() {
            return known.iter().sum::<f64>() / known.len() as f64;
        }
        if self.mastery.is_empty() {
            return NEUTRAL_SIGNAL;
        }
        self.mastery.values().sum::<f64>() / self.mastery.len() as f64
    }

    pub fn max_need_confidence(&self) -> f64 {
        self.needs.iter().map(|n| n.confidence).fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringStrategyResult {
    pub strategy_id: String,
    pub content_id: String,
    pub score: f64,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationMetadata {
    pub algorithm_mix: BTreeMap<String, f64>,
    pub strategy_scores: BTreeMap<String, f64>,
    pub content_type: ContentType,
    pub difficulty: DifficultyLevel,
    pub multiplier: f64,
    pub generated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub content_id: String,
    pub fused_score: f64,
    pub rationale: Vec<String>,
    pub metadata: RecommendationMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub content_id: String,
    pub reward: f64,
    #[serde(default)]
    pub completed: bool,
}

impl Feedback {
    pub fn validate(&self) -> Result<(), String> {
        if self.content_id.trim().is_empty() {
            return Err("contentId must not be empty".to_string());
        }
        check_unit("reward", self.reward)
    }
}

// ============================================================================
// Assessment sessions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Hold,
    Decrease,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyState {
    pub direction: Direction,
    pub reason: String,
    pub from: DifficultyLevel,
    pub to: DifficultyLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub question_id: String,
    pub correct: bool,
    pub latency_ms: u64,
    pub confidence: f64,
    #[serde(default)]
    pub hints_used: u32,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_attempts() -> u32 {
    1
}

impl Response {
    pub fn validate(&self) -> Result<(), String> {
        if self.question_id.trim().is_empty() {
            return Err("questionId must not be empty".to_string());
        }
        check_unit("confidence", self.confidence)?;
        if self.attempts == 0 {
            return Err("attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    pub response: Response,
    pub answered_at: DifficultyLevel,
    pub state: DifficultyState,
    pub next_question_id: Option<String>,
    pub recorded_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default)]
    pub starting_difficulty: Option<DifficultyLevel>,
    #[serde(default)]
    pub max_questions: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSession {
    pub id: String,
    pub learner_id: String,
    pub subject: String,
    pub status: SessionStatus,
    pub current_difficulty: DifficultyLevel,
    pub initial_reason: String,
    pub history: Vec<SessionEntry>,
    pub asked_questions: Vec<String>,
    pub current_question_id: Option<String>,
    pub config: SessionConfig,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub last_activity_at: i64,
}

impl AssessmentSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub feedback: String,
    pub next_difficulty: DifficultyLevel,
    pub difficulty_state: DifficultyState,
    pub next_question_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteryLevel {
    Novice,
    Developing,
    Proficient,
    Advanced,
}

impl MasteryLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Advanced
        } else if score >= 60.0 {
            Self::Proficient
        } else if score >= 35.0 {
            Self::Developing
        } else {
            Self::Novice
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPathSuggestion {
    pub next_difficulty: DifficultyLevel,
    pub focus_areas: Vec<String>,
    pub recommended_content_types: Vec<ContentType>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResults {
    pub session_id: String,
    pub learner_id: String,
    pub subject: String,
    pub total_responses: usize,
    pub correct_responses: usize,
    pub accuracy: f64,
    pub score: f64,
    pub mastery_level: MasteryLevel,
    pub final_difficulty: DifficultyLevel,
    pub peak_difficulty: DifficultyLevel,
    pub learning_path: LearningPathSuggestion,
}
