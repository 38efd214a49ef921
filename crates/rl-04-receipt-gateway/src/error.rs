//! Error types for the Receipt Gateway

use shared_crypto::CryptoError;
use shared_types::ValidationError;
use thiserror::Error;

/// Missing backend endpoint.
pub const CODE_ENDPOINT_MISSING: &str = "RL_ENDPOINT_MISSING";
/// Missing signing secret.
pub const CODE_SIGNING_SECRET_MISSING: &str = "RL_SIGNING_SECRET_MISSING";
/// Missing verifier key.
pub const CODE_VERIFIER_KEY_MISSING: &str = "RL_VERIFIER_KEY_MISSING";
/// A backend setting is present but unusable.
pub const CODE_CONFIG_INVALID: &str = "RL_CONFIG_INVALID";

/// Receipt Gateway errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// A required setting is absent; never defaulted
    #[error("Configuration error [{code}]: {message}")]
    Config { code: &'static str, message: String },

    /// Request rejected before any call was made
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Request could not be signed
    #[error("Signing error: {0}")]
    Signing(#[from] CryptoError),

    /// Backend answered with a non-success status
    #[error("Upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Connection-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// No answer within the configured bound
    #[error("Upstream call timed out after {0} ms")]
    Timeout(u64),

    /// Backend answered with an unexpected body
    #[error("Could not decode upstream response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { code, .. } => code,
            Self::Validation(e) => e.code(),
            Self::Signing(e) => e.code(),
            Self::Upstream { .. } => "RL_UPSTREAM_ERROR",
            Self::Transport(_) => "RL_NETWORK_ERROR",
            Self::Timeout(_) => "RL_UPSTREAM_TIMEOUT",
            Self::Decode(_) => "RL_UPSTREAM_DECODE",
        }
    }

    /// Failures of the remote collaborator, as opposed to local misuse.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Upstream { .. } | Self::Transport(_) | Self::Timeout(_) | Self::Decode(_)
        )
    }

    /// Failures where the backend was never reached.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }

    pub(crate) fn missing(code: &'static str, what: &str) -> Self {
        Self::Config {
            code,
            message: format!("{what} is not configured"),
        }
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
