//! Crypto error types.

use thiserror::Error;

/// Signing operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Signing secret was empty
    #[error("Signing secret must not be empty")]
    EmptySecret,

    /// MAC rejected the key
    #[error("Invalid key length")]
    InvalidKeyLength,

    /// Path is not a bare function path
    #[error("Invalid canonical path: {0}")]
    InvalidPath(String),

    /// HTTP method is not a plain uppercase token
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// Nonce is empty or contains a newline
    #[error("Invalid nonce")]
    InvalidNonce,

    /// Signature did not match the canonical string
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Signature is not valid base64url
    #[error("Invalid signature format")]
    InvalidSignatureFormat,
}

impl CryptoError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptySecret => "RL_SIGNING_SECRET_MISSING",
            Self::InvalidKeyLength => "RL_SIGNING_SECRET_INVALID",
            Self::InvalidPath(_) => "RL_SIGNING_PATH_INVALID",
            Self::InvalidMethod(_) => "RL_SIGNING_METHOD_INVALID",
            Self::InvalidNonce => "RL_SIGNING_NONCE_INVALID",
            Self::SignatureVerificationFailed => "RL_SIGNATURE_MISMATCH",
            Self::InvalidSignatureFormat => "RL_SIGNATURE_MALFORMED",
        }
    }
}
