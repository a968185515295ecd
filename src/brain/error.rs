//! Oracle errors and the fatal-vs-retryable split the loop acts on.

use thiserror::Error;

const TOO_MANY_REQUESTS: u16 = 429;

#[derive(Debug, Error)]
pub enum OracleError {
    /// The service answered with a non-success status.
    #[error("oracle returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Connection failure, timeout, or a body that could not be read.
    #[error("request failed: {0}")]
    Network(String),

    /// The reply did not contain a usable decision.
    #[error("failed to parse oracle reply: {0}")]
    Parse(String),
}

impl OracleError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            OracleError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OracleError::Network(format!("timeout: {err}"))
        } else if err.is_connect() {
            OracleError::Network(format!("connection failed: {err}"))
        } else {
            OracleError::Network(err.to_string())
        }
    }
}

/// How the loop should treat an oracle failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Client error the oracle will keep rejecting; give up now.
    Fatal,
    /// Server error, rate limit, transport or parse trouble; try again.
    Retryable,
}

/// 4xx other than 429 is fatal, everything else is worth another try.
pub fn classify(err: &OracleError) -> ErrorClass {
    match err.status_code() {
        Some(status) if (400..500).contains(&status) && status != TOO_MANY_REQUESTS => {
            ErrorClass::Fatal
        }
        _ => ErrorClass::Retryable,
    }
}
