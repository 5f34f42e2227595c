use thiserror::Error;

use accrue_backend::BackendError;
use accrue_store::StoreError;
use accrue_types::{TokenAmount, TypesError};

use crate::session::SessionPhase;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Transient I/O failure talking to the backend.
    #[error("network error: {0}")]
    Network(BackendError),

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance {
        needed: TokenAmount,
        available: TokenAmount,
    },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Backend session truth differs from local belief.
    #[error("session conflict: local {local}, backend {remote}")]
    SessionConflict { local: String, remote: String },

    #[error("initialization failed after {attempts} attempt(s): {last_error}")]
    TerminalInit { attempts: u32, last_error: String },

    #[error("invalid session transition {from:?} -> {to:?}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },

    /// Non-transient backend failure (rejection, bad response).
    #[error("backend error: {0}")]
    Backend(BackendError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Types(#[from] TypesError),
}

impl From<BackendError> for EngineError {
    fn from(e: BackendError) -> Self {
        if e.is_transient() {
            EngineError::Network(e)
        } else {
            EngineError::Backend(e)
        }
    }
}

impl EngineError {
    /// Whether the initialization retry loop should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_backend_errors_become_network() {
        let err: EngineError = BackendError::Network("reset".into()).into();
        assert!(matches!(err, EngineError::Network(_)));
        assert!(err.is_retryable());

        let err: EngineError = BackendError::Rejected("unauthorized".into()).into();
        assert!(matches!(err, EngineError::Backend(_)));
        assert!(!err.is_retryable());
    }
}
