//! Typed failures for the diff-to-message pipeline
//!
//! Command handlers work with `anyhow`; these enums are what the pipeline
//! and the request queue hand back so callers can tell a rate limit from a
//! rejected request.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single outbound model request
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited by provider (HTTP 429)")]
    RateLimited { retry_after: Option<Duration> },

    #[error("provider server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    #[error("provider rejected the request (HTTP {status}): {body}")]
    Client { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("request queue is shut down")]
    Cancelled,
}

impl RequestError {
    /// Network errors, 429 and 5xx are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RequestError::Network(_)
                | RequestError::RateLimited { .. }
                | RequestError::Server { .. }
        )
    }

    /// Map an HTTP status and body to the matching error
    pub fn from_status(status: u16, body: String, retry_after: Option<Duration>) -> Self {
        match status {
            429 => RequestError::RateLimited { retry_after },
            500..=599 => RequestError::Server { status, body },
            _ => RequestError::Client { status, body },
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return RequestError::Malformed(err.to_string());
        }
        match err.status() {
            Some(status) => RequestError::from_status(status.as_u16(), err.to_string(), None),
            None => RequestError::Network(err.to_string()),
        }
    }
}

/// Failure of a whole generation run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("model request failed after {attempts} attempt(s): {source}")]
    Request {
        attempts: u32,
        #[source]
        source: RequestError,
    },

    #[error("all {count} chunk request(s) failed; last error: {last}")]
    AllChunksFailed { count: usize, last: RequestError },

    #[error("no relevant changes left after filtering {parsed_files} files")]
    NoRelevantChanges {
        parsed_files: usize,
        filtered_files: usize,
    },

    #[error("a line of {tokens} tokens cannot be split under a budget of {budget} tokens")]
    Unsplittable { tokens: usize, budget: usize },

    #[error("no model client is configured")]
    Offline,
}

impl PipelineError {
    /// Underlying request error, if this failure came from the transport
    pub fn request_error(&self) -> Option<&RequestError> {
        match self {
            PipelineError::Request { source, .. } => Some(source),
            PipelineError::AllChunksFailed { last, .. } => Some(last),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            RequestError::from_status(429, String::new(), None),
            RequestError::RateLimited { .. }
        ));
        assert!(RequestError::from_status(503, "busy".into(), None).is_retryable());
        assert!(!RequestError::from_status(400, "bad".into(), None).is_retryable());
        assert!(!RequestError::from_status(401, "auth".into(), None).is_retryable());
    }

    #[test]
    fn test_terminal_errors_are_not_retryable() {
        assert!(!RequestError::Malformed("x".into()).is_retryable());
        assert!(!RequestError::Cancelled.is_retryable());
        assert!(RequestError::Network("reset".into()).is_retryable());
    }
}
