use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    /// Connection refused, timeout, DNS failure. Retryable.
    #[error("network error: {0}")]
    Network(String),

    #[error("backend returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("backend rejected request: {0}")]
    Rejected(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
}

impl BackendError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(BackendError::Network("reset".into()).is_transient());
        assert!(BackendError::Http { status: 503, message: String::new() }.is_transient());
        assert!(BackendError::Http { status: 429, message: String::new() }.is_transient());
        assert!(!BackendError::Http { status: 404, message: String::new() }.is_transient());
        assert!(!BackendError::Rejected("no".into()).is_transient());
    }
}
