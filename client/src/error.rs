use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("rate limited, asked to wait {wait:?}")]
    RateLimited { wait: Duration },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("no challenges returned for {0}, invalid address?")]
    NoRecords(String),

    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<FetchError> },
}

impl FetchError {
    /// Network failures, 5xx responses and rate limiting are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Server { .. } | Self::RateLimited { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(FetchError::Transport("reset".into()).is_transient());
        assert!(FetchError::Server { status: 503, body: String::new() }.is_transient());
        assert!(FetchError::RateLimited { wait: Duration::from_secs(1) }.is_transient());
        assert!(!FetchError::Http { status: 404, body: String::new() }.is_transient());
        assert!(!FetchError::Decode("eof".into()).is_transient());
        assert!(!FetchError::NoRecords("a".into()).is_transient());
    }
}
