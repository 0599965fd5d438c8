// src/core/error.rs

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Top-level failures of an analysis. Everything a single signal source can
/// get wrong is recovered locally as a `ProbeResult::Failed` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// Missing or unparsable URL. Raised before any network I/O.
    #[error("Invalid URL: {0}")]
    InvalidInput(String),

    /// The client exhausted its request window. Raised before any network I/O.
    #[error("Too many requests. Please retry in {retry_after_secs}s.")]
    RateLimited { retry_after_secs: u64 },

    /// Derivation or scoring blew up; this is a logic defect, not an outage.
    #[error("Could not analyze the website: {0}")]
    Aggregation(String),
}

impl AnalysisError {
    /// Stable machine-readable discriminator for the outer layer.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::InvalidInput(_) => "input_error",
            AnalysisError::RateLimited { .. } => "rate_limited",
            AnalysisError::Aggregation(_) => "aggregation_failure",
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

/// Serialisable `{kind, message}` shape of an `AnalysisError`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}

/// Errors raised inside a probe. They never cross the probe boundary as
/// errors: `ProbeResult::from` flattens them into a `Failed(reason)`.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("TCP connection error: {0}")]
    Connect(String),

    #[error("TLS handshake error: {0}")]
    Handshake(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("DNS error: {0}")]
    Dns(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WHOIS error: {0}")]
    Whois(String),

    #[error("probe task failed: {0}")]
    Task(String),
}

/// Raised when an environment override cannot be parsed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(AnalysisError::InvalidInput("x".into()).kind(), "input_error");
        assert_eq!(
            AnalysisError::RateLimited { retry_after_secs: 3 }.kind(),
            "rate_limited"
        );
        assert_eq!(AnalysisError::Aggregation("x".into()).kind(), "aggregation_failure");
    }

    #[test]
    fn test_rate_limited_payload_carries_retry_hint() {
        let payload = AnalysisError::RateLimited { retry_after_secs: 42 }.payload();
        assert_eq!(payload.kind, "rate_limited");
        assert!(payload.message.contains("42s"));
    }

    #[test]
    fn test_timeout_message() {
        let err = ProbeError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "timed out after 5s");
    }
}
