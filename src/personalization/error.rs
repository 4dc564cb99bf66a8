use crate::stores::StoreError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("strategy {strategy} timed out after {timeout_ms}ms")]
    StrategyTimeout { strategy: String, timeout_ms: u64 },
    #[error("strategy {strategy} failed: {reason}")]
    StrategyFailure { strategy: String, reason: String },
    #[error("session {0} is busy, retry later")]
    ConcurrencyConflict(String),
    #[error("session {0} is already completed")]
    SessionClosed(String),
    #[error("session {0} not found")]
    SessionNotFound(String),
    #[error("data access failed: {0}")]
    DataAccess(String),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::StrategyTimeout { .. } => "STRATEGY_TIMEOUT",
            Self::StrategyFailure { .. } => "STRATEGY_FAILURE",
            Self::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            Self::SessionClosed(_) => "SESSION_CLOSED",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::DataAccess(_) => "DATA_ACCESS_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_) | Self::DataAccess(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        Self::DataAccess(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_become_data_access() {
        let err: EngineError = StoreError::Timeout {
            operation: "get_eligible_content",
            timeout_ms: 3000,
        }
        .into();
        assert_eq!(err.code(), "DATA_ACCESS_ERROR");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("get_eligible_content"));
    }

    #[test]
    fn closed_sessions_are_not_retryable() {
        assert!(!EngineError::SessionClosed("s1".into()).is_retryable());
        assert!(EngineError::ConcurrencyConflict("s1".into()).is_retryable());
    }
}
