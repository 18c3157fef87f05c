//! Error types for the provider gateway.

use std::time::Duration;
use thiserror::Error;

/// Additional context from provider errors for debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// HTTP status code from the provider.
    pub http_status: Option<u16>,
    /// Provider-specific error code (e.g. "rate_limit_exceeded").
    pub provider_code: Option<String>,
    /// Request ID from provider (x-request-id header).
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

/// Errors that can occur when calling the choice endpoint.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Missing or unusable configuration (credential, client settings).
    #[error("configuration error: {0}")]
    Config(String),

    /// The request could not complete: timeout, DNS, refused connection.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        timeout: Option<Duration>,
    },

    /// The endpoint answered, but with an error status or an unusable payload.
    #[error("upstream error: {message}")]
    Upstream {
        message: String,
        context: Option<ErrorContext>,
    },
}

impl ProviderError {
    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timeout: None,
        }
    }

    /// Create a transport error for a request that hit its deadline.
    pub fn timeout(after: Duration) -> Self {
        Self::Transport {
            message: format!("timed out after {after:?}"),
            timeout: Some(after),
        }
    }

    /// Create an upstream error.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            context: None,
        }
    }

    /// Create an upstream error with context.
    pub fn upstream_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Upstream {
            message: message.into(),
            context: Some(context),
        }
    }

    /// Whether this error should halt a whole study rather than one pair.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Get a short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Transport { .. } => "transport_error",
            Self::Upstream { .. } => "upstream_error",
        }
    }

    /// Get the error context if available.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Upstream { context, .. } => context.as_ref(),
            Self::Config(_) | Self::Transport { .. } => None,
        }
    }

    /// Get the request ID if available.
    pub fn request_id(&self) -> Option<&str> {
        self.context().and_then(|c| c.request_id.as_deref())
    }

    /// Classify a reqwest failure. Body decoding happens after the status
    /// line arrived, so it counts as upstream; everything else is transport.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::timeout(timeout)
        } else if err.is_decode() {
            Self::upstream(format!("failed to decode response body: {err}"))
        } else if err.is_builder() {
            Self::config(format!("invalid request: {err}"))
        } else {
            Self::transport(err.to_string())
        }
    }
}
