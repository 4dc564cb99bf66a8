use std::time::Duration;

pub const NEED_PROFILE_TTL: Duration = Duration::from_secs(10 * 60);
pub const CANDIDATES_TTL: Duration = Duration::from_secs(5 * 60);

pub fn need_profile_key(learner_id: &str, signal_version: u64) -> String {
    format!("needs:{}:v{}", learner_id, signal_version)
}

pub fn candidates_key(
    learner_id: &str,
    subject: &str,
    constraints_fingerprint: &str,
    content_version: u64,
) -> String {
    format!(
        "candidates:{}:{}:cv{}:{}",
        learner_id,
        subject.to_lowercase(),
        content_version,
        constraints_fingerprint
    )
}
