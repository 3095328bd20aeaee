//! Error type definitions for the listing image proxy
//!
//! The taxonomy mirrors the failure modes the service actually sees:
//! bad caller input, missing data, upstream trouble and bounded waits that
//! ran out. Everything else is an internal error.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed caller input (query parameter, URL, ...)
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// No strategy produced a result for the requested resource
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Upstream fetch failures
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Parsing errors for upstream payloads (XML feed, render-proxy JSON)
    #[error("Parse error: {source_kind} - {message}")]
    Parse {
        source_kind: String,
        message: String,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Outbound HTTP specific errors
#[derive(Error, Debug)]
pub enum FetchError {
    /// Bounded wait exceeded
    #[error("Timeout fetching {url}")]
    Timeout { url: String },

    /// Non-2xx status from upstream
    #[error("Upstream returned HTTP {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    /// Network-level failure (DNS, connect, body read, ...)
    #[error("Upstream unavailable: {url} - {message}")]
    UpstreamUnavailable { url: String, message: String },
}

impl AppError {
    /// Create an invalid input error with a custom message
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a not found error for a specific resource
    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse<K: Into<String>, M: Into<String>>(source_kind: K, message: M) -> Self {
        Self::Parse {
            source_kind: source_kind.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether retrying the failed operation could change the outcome
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(fetch) => fetch.is_retryable(),
            _ => false,
        }
    }
}

impl FetchError {
    /// Classify a `reqwest` error for a given URL
    ///
    /// Timeouts get their own variant so the web layer can answer 504
    /// instead of a generic upstream failure.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::UpstreamUnavailable {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Create an upstream status error
    pub fn upstream_status(url: &str, status: u16) -> Self {
        Self::UpstreamStatus {
            status,
            url: url.to_string(),
        }
    }

    /// Timeouts and transport failures are worth another attempt; a
    /// definitive 4xx answer is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::UpstreamUnavailable { .. } => true,
            Self::UpstreamStatus { status, .. } => *status >= 500,
        }
    }
}
