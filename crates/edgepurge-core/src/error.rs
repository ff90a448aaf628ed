//! Error types for the purge engine.

/// Purge engine errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PurgeError {
    /// A derived resource could not be located or checked for existence.
    #[error("expansion failed for rule {rule}: {message}")]
    Expansion { rule: String, message: String },

    /// Transport-level failure (connection refused, DNS, TLS, ...).
    #[error("network error: {message}")]
    Network { message: String },

    /// The purge request timed out.
    #[error("timeout: {message}")]
    Timeout { message: String },

    /// The edge cache answered with a non-success status.
    #[error("HTTP {status} from {target}")]
    Status { status: u16, target: String },

    /// The request could not be built (bad method, header or target).
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Invalidation expression is not a `scheme://target` URI.
    #[error("invalid expression {expression:?}: {reason}")]
    InvalidExpression { expression: String, reason: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A failure diagnostic could not be encoded.
    #[error("diagnostic encoding failed: {message}")]
    Diagnostic { message: String },
}

impl PurgeError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Per-item failures
            Self::Expansion { .. } => 1,
            Self::Network { .. } => 1,
            Self::Timeout { .. } => 1,
            Self::Status { .. } => 1,
            Self::InvalidRequest { .. } => 1,

            // Input / setup
            Self::InvalidExpression { .. } => 2,
            Self::Config { .. } => 2,

            Self::Diagnostic { .. } => 3,
        }
    }

    /// Short stable name used in failure diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Expansion { .. } => "expansion",
            Self::Network { .. } => "network",
            Self::Timeout { .. } => "timeout",
            Self::Status { .. } => "status",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidExpression { .. } => "invalid_expression",
            Self::Config { .. } => "config",
            Self::Diagnostic { .. } => "diagnostic",
        }
    }

    /// Whether the error came from dispatching a purge request.
    pub fn is_dispatch(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::Timeout { .. }
                | Self::Status { .. }
                | Self::InvalidRequest { .. }
        )
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for PurgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                message: err.to_string(),
            }
        } else if err.is_builder() {
            Self::InvalidRequest {
                message: err.to_string(),
            }
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }
}

/// Result type for purge operations.
pub type PurgeResult<T> = Result<T, PurgeError>;
