//! Gateway configuration.
//!
//! Backend settings are optional at load time and checked by the operation
//! that needs them, so a terminal without a backend still runs and reports
//! a configuration error on the first issuance. A value that is set but
//! unusable fails the load.

use crate::error::{
    GatewayError, GatewayResult, CODE_CONFIG_INVALID, CODE_ENDPOINT_MISSING,
    CODE_SIGNING_SECRET_MISSING, CODE_VERIFIER_KEY_MISSING,
};
use std::time::Duration;
use zeroize::Zeroizing;

/// Default bound on a backend call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(4000);

/// Receipt backend connection settings.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Root of the backend functions, e.g. `https://x.example/functions/v1`.
    pub base_url: Option<String>,
    pub signing_secret: Option<Zeroizing<String>>,
    pub verifier_key: Option<Zeroizing<String>>,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            signing_secret: None,
            verifier_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("signing_secret", &self.signing_secret.as_ref().map(|_| "<redacted>"))
            .field("verifier_key", &self.verifier_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse `RL_ISSUANCE_TIMEOUT_MS`. Unset means the default; anything other
/// than a positive integer is an error.
fn parse_timeout(value: Option<String>) -> GatewayResult<Duration> {
    let Some(raw) = non_empty(value) else {
        return Ok(DEFAULT_TIMEOUT);
    };
    match raw.parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(GatewayError::Config {
            code: CODE_CONFIG_INVALID,
            message: format!("RL_ISSUANCE_TIMEOUT_MS must be a positive integer, got {raw:?}"),
        }),
    }
}

impl GatewayConfig {
    /// Read `RL_BACKEND_URL`, `RL_SIGNING_SECRET`, `RL_VERIFIER_KEY` and
    /// `RL_ISSUANCE_TIMEOUT_MS`.
    pub fn from_env() -> GatewayResult<Self> {
        Ok(Self {
            base_url: non_empty(std::env::var("RL_BACKEND_URL").ok()),
            signing_secret: non_empty(std::env::var("RL_SIGNING_SECRET").ok()).map(Zeroizing::new),
            verifier_key: non_empty(std::env::var("RL_VERIFIER_KEY").ok()).map(Zeroizing::new),
            timeout: parse_timeout(std::env::var("RL_ISSUANCE_TIMEOUT_MS").ok())?,
        })
    }

    /// Builder-style endpoint setter.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = non_empty(Some(url.into()));
        self
    }

    /// Builder-style secret setter.
    pub fn with_signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.signing_secret = non_empty(Some(secret.into())).map(Zeroizing::new);
        self
    }

    /// Builder-style verifier key setter.
    pub fn with_verifier_key(mut self, key: impl Into<String>) -> Self {
        self.verifier_key = non_empty(Some(key.into())).map(Zeroizing::new);
        self
    }

    /// Builder-style timeout setter.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Endpoint root without a trailing slash.
    pub fn endpoint(&self) -> GatewayResult<&str> {
        self.base_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .ok_or_else(|| GatewayError::missing(CODE_ENDPOINT_MISSING, "RL_BACKEND_URL"))
    }

    /// Shared signing secret.
    pub fn secret(&self) -> GatewayResult<&str> {
        self.signing_secret
            .as_deref()
            .map(String::as_str)
            .ok_or_else(|| GatewayError::missing(CODE_SIGNING_SECRET_MISSING, "RL_SIGNING_SECRET"))
    }

    /// Caller-held key for validate/consume.
    pub fn verifier(&self) -> GatewayResult<&str> {
        self.verifier_key
            .as_deref()
            .map(String::as_str)
            .ok_or_else(|| GatewayError::missing(CODE_VERIFIER_KEY_MISSING, "RL_VERIFIER_KEY"))
    }

    /// Everything issuance needs is present.
    pub fn validate_for_issuance(&self) -> GatewayResult<()> {
        self.endpoint()?;
        self.secret()?;
        Ok(())
    }
}
