//! Error types shared by the token cache, the retry coordinator and the config layer.
//!
//! None of these cross the proxy boundary: every failure ends up as either a
//! synthesized response or the untouched upstream response.

use thiserror::Error;

/// Outbound call failure, for both the token endpoint and replayed requests.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("call timed out after {0} ms")]
    Timeout(u64),
    #[error("invalid request: {0}")]
    Request(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Token endpoint could not produce a usable credential.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("token endpoint answered http {0}")]
    Status(u16),
    #[error("token endpoint call failed: {0}")]
    Transport(#[from] TransportError),
    #[error("extract failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("token endpoint returned an empty token")]
    Empty,
}

impl FetchError {
    /// Label used by the `token_fetch_failures_total` counter.
    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::Status(_) => "status",
            FetchError::Transport(TransportError::Timeout(_)) => "timeout",
            FetchError::Transport(_) => "transport",
            FetchError::Extract(_) => "extract",
            FetchError::Empty => "empty",
        }
    }
}

/// Credential could not be located in the token endpoint response body.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("response body is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),
    #[error("response body is not a JSON object")]
    NotAnObject,
    #[error("path interrupted at '{0}'")]
    Interrupted(String),
    #[error("no non-empty string token at path '{0}'")]
    Missing(String),
}

/// Invalid-token condition could not produce a boolean verdict.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("condition does not compile: {0}")]
    Compile(String),
    #[error("{0}")]
    Runtime(String),
    #[error("condition returned {0}, expected a boolean")]
    NotBoolean(String),
}

/// Captured request lacks the routing information needed for a replay.
#[derive(Debug, Error)]
pub enum ReconstructionError {
    #[error("missing required headers - path: '{path}', authority: '{authority}'")]
    MissingRouting { path: String, authority: String },
    #[error("invalid method '{0}'")]
    InvalidMethod(String),
}

/// Service endpoint or token configuration problems detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("service '{service}' uses source '{source_kind}' but has no namespace")]
    MissingNamespace { service: String, source_kind: &'static str },
    #[error("service '{service}' uses source 'dns' but has no domain")]
    MissingDomain { service: String },
    #[error("service endpoint has an empty service_name")]
    EmptyServiceName,
    #[error("'{0}' must be configured while token_config is enabled")]
    MissingService(&'static str),
}
