use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::personalization::config::SessionPolicy;
use crate::personalization::difficulty::DifficultyController;
use crate::personalization::error::EngineError;
use crate::personalization::types::{
    AssessmentResults, AssessmentSession, ContentType, DetectedNeed, DifficultyLevel,
    LearningPathSuggestion, MasteryLevel, Response, SessionConfig, SessionEntry, SessionStatus,
    SubmitOutcome,
};
use crate::stores::QuestionBank;

const HINT_PENALTY: f64 = 0.1;
const MIN_HINT_CREDIT: f64 = 0.5;
const LEVEL_FOCUS_ACCURACY: f64 = 0.6;
const HEAVY_HINTS: f64 = 1.0;

/// Owns assessment sessions. Each session sits behind its own async mutex so
/// concurrent submissions against one session apply one at a time.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Mutex<AssessmentSession>>>>,
    controller: DifficultyController,
    questions: Option<Arc<dyn QuestionBank>>,
    policy: SessionPolicy,
}

impl SessionManager {
    pub fn new(
        controller: DifficultyController,
        questions: Option<Arc<dyn QuestionBank>>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            controller,
            questions,
            policy,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn handle(&self, session_id: &str) -> Result<Arc<Mutex<AssessmentSession>>, EngineError> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))
    }

    async fn lock(&self, session_id: &str) -> Result<OwnedMutexGuard<AssessmentSession>, EngineError> {
        let handle = self.handle(session_id)?;
        let wait = Duration::from_millis(self.policy.lock_wait_ms.max(1));
        for attempt in 0..self.policy.lock_retries.max(1) {
            match tokio::time::timeout(wait, Arc::clone(&handle).lock_owned()).await {
                Ok(guard) => return Ok(guard),
                Err(_) => {
                    debug!(session_id = %session_id, attempt, "session lock busy");
                }
            }
        }
        warn!(session_id = %session_id, "session lock retries exhausted");
        Err(EngineError::ConcurrencyConflict(session_id.to_string()))
    }

    async fn pick_question(
        &self,
        subject: &str,
        level: DifficultyLevel,
        asked: &[String],
    ) -> Option<String> {
        let bank = self.questions.as_ref()?;
        let timeout = Duration::from_millis(self.policy.question_timeout_ms.max(1));
        match tokio::time::timeout(timeout, bank.questions(subject, level)).await {
            Ok(Ok(ids)) => ids.into_iter().find(|id| !asked.contains(id)),
            Ok(Err(err)) => {
                warn!(subject = %subject, level = level.as_str(), error = %err, "question bank unavailable");
                None
            }
            Err(_) => {
                warn!(
                    subject = %subject,
                    level = level.as_str(),
                    timeout_ms = timeout.as_millis() as u64,
                    "question bank timed out"
                );
                None
            }
        }
    }

    pub async fn start(
        &self,
        learner_id: &str,
        subject: &str,
        config: SessionConfig,
        needs: &[DetectedNeed],
    ) -> Result<AssessmentSession, EngineError> {
        if learner_id.trim().is_empty() {
            return Err(EngineError::validation("learnerId must not be empty"));
        }
        if subject.trim().is_empty() {
            return Err(EngineError::validation("subject must not be empty"));
        }
        if config.max_questions == Some(0) {
            return Err(EngineError::validation("maxQuestions must be at least 1"));
        }

        let (level, reason) = self
            .controller
            .initial_level(config.starting_difficulty, needs, subject);
        let first_question = self.pick_question(subject, level, &[]).await;

        let now = chrono::Utc::now().timestamp_millis();
        let session = AssessmentSession {
            id: Uuid::new_v4().to_string(),
            learner_id: learner_id.to_string(),
            subject: subject.to_string(),
            status: SessionStatus::Active,
            current_difficulty: level,
            initial_reason: reason,
            history: Vec::new(),
            asked_questions: first_question.iter().cloned().collect(),
            current_question_id: first_question,
            config,
            started_at: now,
            completed_at: None,
            last_activity_at: now,
        };

        self.sessions
            .write()
            .insert(session.id.clone(), Arc::new(Mutex::new(session.clone())));
        info!(
            session_id = %session.id,
            learner_id = %learner_id,
            subject = %subject,
            difficulty = level.as_str(),
            "assessment session started"
        );
        Ok(session)
    }

    pub async fn submit(
        &self,
        session_id: &str,
        response: Response,
    ) -> Result<SubmitOutcome, EngineError> {
        response.validate().map_err(EngineError::Validation)?;
        let mut session = self.lock(session_id).await?;
        if !session.is_active() {
            return Err(EngineError::SessionClosed(session_id.to_string()));
        }

        let answered_at = session.current_difficulty;
        let state = self.controller.next(answered_at, &response);
        if !session.asked_questions.contains(&response.question_id) {
            session.asked_questions.push(response.question_id.clone());
        }

        let answered = session.history.len() + 1;
        let limit_reached = session
            .config
            .max_questions
            .is_some_and(|max| answered >= max);
        let next_question_id = if limit_reached {
            None
        } else {
            self.pick_question(&session.subject, state.to, &session.asked_questions)
                .await
        };
        if let Some(ref id) = next_question_id {
            session.asked_questions.push(id.clone());
        }

        let feedback = DifficultyController::feedback_message(&response, &state);
        let recorded_at = chrono::Utc::now().timestamp_millis();
        session.current_difficulty = state.to;
        session.last_activity_at = recorded_at;
        session.current_question_id = next_question_id.clone();
        session.history.push(SessionEntry {
            response,
            answered_at,
            state: state.clone(),
            next_question_id: next_question_id.clone(),
            recorded_at,
        });

        debug!(
            session_id = %session_id,
            from = state.from.as_str(),
            to = state.to.as_str(),
            answered,
            "response recorded"
        );
        Ok(SubmitOutcome {
            feedback,
            next_difficulty: state.to,
            difficulty_state: state,
            next_question_id,
        })
    }

    /// Closes the session and summarises it. Completing an already completed
    /// session returns the same summary again.
    pub async fn complete(&self, session_id: &str) -> Result<AssessmentResults, EngineError> {
        let mut session = self.lock(session_id).await?;
        if session.is_active() {
            close(&mut session, chrono::Utc::now().timestamp_millis());
            info!(
                session_id = %session_id,
                responses = session.history.len(),
                "assessment session completed"
            );
        }
        Ok(summarize(&session, self.controller.fast_latency_ms()))
    }

    pub async fn get(&self, session_id: &str) -> Result<AssessmentSession, EngineError> {
        let session = self.lock(session_id).await?;
        Ok(session.clone())
    }

    /// Sessions not yet completed. A session whose lock is held is counted as active.
    pub fn active_count(&self) -> usize {
        self.sessions
            .read()
            .values()
            .filter(|handle| handle.try_lock().map(|s| s.is_active()).unwrap_or(true))
            .count()
    }

    /// Closes active sessions idle for longer than `idle`, then drops completed
    /// sessions that finished more than `retention` ago. Sessions whose lock is
    /// held are left for the next sweep.
    pub fn sweep(&self, retention: Duration, idle: Duration) -> SessionSweep {
        let now = chrono::Utc::now().timestamp_millis();
        let retention_cutoff = now - retention.as_millis() as i64;
        let idle_cutoff = now - idle.as_millis() as i64;
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        let mut expired = 0;
        sessions.retain(|id, handle| {
            let Ok(mut session) = handle.try_lock() else {
                return true;
            };
            if session.is_active() && session.last_activity_at <= idle_cutoff {
                close(&mut session, now);
                expired += 1;
                info!(session_id = %id, "idle assessment session closed");
            }
            !matches!(session.completed_at, Some(at) if at <= retention_cutoff)
        });
        SessionSweep {
            expired,
            removed: before - sessions.len(),
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.policy.retention_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.policy.idle_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSweep {
    /// Idle sessions closed by this sweep.
    pub expired: usize,
    /// Completed sessions dropped by this sweep.
    pub removed: usize,
}

fn close(session: &mut AssessmentSession, now: i64) {
    session.status = SessionStatus::Completed;
    session.completed_at = Some(now);
    session.last_activity_at = now;
    session.current_question_id = None;
}

fn credit(entry: &SessionEntry) -> f64 {
    if !entry.response.correct {
        return 0.0;
    }
    let hint_factor =
        (1.0 - HINT_PENALTY * entry.response.hints_used as f64).max(MIN_HINT_CREDIT);
    entry.answered_at.score_weight() * hint_factor
}

fn summarize(session: &AssessmentSession, fast_latency_ms: u64) -> AssessmentResults {
    let total = session.history.len();
    let correct = session.history.iter().filter(|e| e.response.correct).count();
    let accuracy = if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    };
    let max_weight = DifficultyLevel::Hard.score_weight();
    let score = if total == 0 {
        0.0
    } else {
        let earned: f64 = session.history.iter().map(credit).sum();
        (100.0 * earned / (total as f64 * max_weight)).clamp(0.0, 100.0)
    };
    let mastery_level = MasteryLevel::from_score(score);
    let final_difficulty = session.current_difficulty;
    let peak_difficulty = session
        .history
        .iter()
        .flat_map(|e| [e.answered_at, e.state.to])
        .max()
        .unwrap_or(final_difficulty);

    let next_difficulty = if total == 0 {
        final_difficulty
    } else if accuracy >= 0.8 {
        final_difficulty.harder()
    } else if accuracy < 0.5 {
        final_difficulty.easier()
    } else {
        final_difficulty
    };

    let focus_areas = focus_areas(session, fast_latency_ms);
    let recommended_content_types = content_types_for(mastery_level);
    let summary = format!(
        "{correct} of {total} correct ({:.0}%), {} level; continue at {}",
        accuracy * 100.0,
        mastery_label(mastery_level),
        next_difficulty.as_str()
    );

    AssessmentResults {
        session_id: session.id.clone(),
        learner_id: session.learner_id.clone(),
        subject: session.subject.clone(),
        total_responses: total,
        correct_responses: correct,
        accuracy,
        score,
        mastery_level,
        final_difficulty,
        peak_difficulty,
        learning_path: LearningPathSuggestion {
            next_difficulty,
            focus_areas,
            recommended_content_types,
            summary,
        },
    }
}

fn focus_areas(session: &AssessmentSession, fast_latency_ms: u64) -> Vec<String> {
    let mut areas = Vec::new();
    if session.history.is_empty() {
        return areas;
    }

    let mut by_level: BTreeMap<DifficultyLevel, (usize, usize)> = BTreeMap::new();
    for entry in &session.history {
        let slot = by_level.entry(entry.answered_at).or_insert((0, 0));
        slot.0 += 1;
        if entry.response.correct {
            slot.1 += 1;
        }
    }
    for (level, (n, correct)) in by_level {
        if (correct as f64 / n as f64) < LEVEL_FOCUS_ACCURACY {
            areas.push(format!("accuracy on {} questions", level.as_str()));
        }
    }

    let n = session.history.len() as f64;
    let mean_latency =
        session.history.iter().map(|e| e.response.latency_ms as f64).sum::<f64>() / n;
    if mean_latency > fast_latency_ms as f64 {
        areas.push("response fluency".to_string());
    }
    let mean_hints =
        session.history.iter().map(|e| e.response.hints_used as f64).sum::<f64>() / n;
    if mean_hints > HEAVY_HINTS {
        areas.push("independent problem solving".to_string());
    }
    areas
}

fn content_types_for(level: MasteryLevel) -> Vec<ContentType> {
    match level {
        MasteryLevel::Novice => vec![ContentType::Video, ContentType::Interactive],
        MasteryLevel::Developing => vec![ContentType::Interactive, ContentType::Worksheet],
        MasteryLevel::Proficient => vec![ContentType::Quiz, ContentType::Game],
        MasteryLevel::Advanced => vec![ContentType::Quiz, ContentType::Reading],
    }
}

fn mastery_label(level: MasteryLevel) -> &'static str {
    match level {
        MasteryLevel::Novice => "novice",
        MasteryLevel::Developing => "developing",
        MasteryLevel::Proficient => "proficient",
        MasteryLevel::Advanced => "advanced",
    }
}
