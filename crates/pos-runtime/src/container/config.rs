//! # Runtime Configuration
//!
//! Environment-driven configuration of the POS host.
//!
//! ## Rules
//!
//! - Demo tuning constants (payment delays, channel capacity) have defaults.
//! - Receipt backend settings are never defaulted; a missing value surfaces
//!   as a configuration error on the operation that needs it.
//! - A set but unparsable variable is an error, not a silent default.
//! - The scripted receipt issuer is only used when `RL_SCRIPTED_ISSUER` asks
//!   for it; otherwise issuance always goes to the HTTP gateway.

use rl_01_session_state::PaymentTiming;
use rl_04_receipt_gateway::{
    GatewayConfig, GatewayError, HttpReceiptGateway, ReceiptIssuer, ScriptedIssuer,
};
use shared_types::{validate_identifier, TerminalIdentity, ValidationError};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Feature gate; when off no session can be created.
    pub enabled: bool,
    /// Root of the customer display links (`{root}/s/{code}`).
    pub customer_base_url: String,
    /// Default terminal identity for new sessions.
    pub terminal: TerminalIdentity,
    /// Cart currency.
    pub currency: String,
    /// Simulated payment latency.
    pub payment: PaymentTiming,
    /// Receipt backend.
    pub gateway: GatewayConfig,
    /// Issue receipts locally instead of calling the backend.
    pub scripted_issuer: bool,
    /// Per-session broadcast buffer.
    pub channel_capacity: usize,
    /// Durable storage.
    pub storage: StorageConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            customer_base_url: "http://localhost:3000".to_string(),
            terminal: TerminalIdentity {
                retailer_id: "demo-retailer".to_string(),
                store_id: "demo-store".to_string(),
                terminal_id: "T-001".to_string(),
            },
            currency: "EUR".to_string(),
            payment: PaymentTiming::default(),
            gateway: GatewayConfig::default(),
            scripted_issuer: false,
            channel_capacity: shared_bus::DEFAULT_CHANNEL_CAPACITY,
            storage: StorageConfig::default(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// RocksDB directory; in-memory storage when unset.
    pub data_dir: Option<PathBuf>,
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable was set to something unparsable.
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    /// The default terminal identity is unusable.
    #[error("Invalid terminal identity: {0}")]
    InvalidTerminal(#[from] ValidationError),

    /// A receipt backend setting is unusable.
    #[error("Invalid receipt backend setting: {0}")]
    Gateway(#[from] GatewayError),
}

impl ConfigError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidValue { .. } => "RL_CONFIG_INVALID",
            Self::InvalidTerminal(e) => e.code(),
            Self::Gateway(e) => e.code(),
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match var(name) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var: name, value }),
    }
}

fn parse_flag(name: &'static str) -> Result<Option<bool>, ConfigError> {
    match var(name) {
        None => Ok(None),
        Some(value) => match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue { var: name, value }),
        },
    }
}

impl RuntimeConfig {
    /// Load configuration from `RL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(enabled) = parse_flag("RL_ENABLED")? {
            config.enabled = enabled;
        }
        if let Some(url) = var("RL_CUSTOMER_BASE_URL") {
            config.customer_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(id) = var("RL_RETAILER_ID") {
            config.terminal.retailer_id = id;
        }
        if let Some(id) = var("RL_STORE_ID") {
            config.terminal.store_id = id;
        }
        if let Some(id) = var("RL_TERMINAL_ID") {
            config.terminal.terminal_id = id;
        }
        if let Some(currency) = var("RL_CURRENCY") {
            config.currency = currency.to_uppercase();
        }

        if let Some(ms) = parse_var::<u64>("RL_PAYMENT_BASE_DELAY_MS")? {
            config.payment.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>("RL_PAYMENT_TIMEOUT_DELAY_MS")? {
            config.payment.timeout_delay = Duration::from_millis(ms);
        }
        if let Some(factor) = parse_var::<f64>("RL_SLOW_NETWORK_FACTOR")? {
            if !factor.is_finite() || factor < 1.0 {
                return Err(ConfigError::InvalidValue {
                    var: "RL_SLOW_NETWORK_FACTOR",
                    value: factor.to_string(),
                });
            }
            config.payment.slow_factor = factor;
        }

        config.gateway = GatewayConfig::from_env()?;
        if let Some(scripted) = parse_flag("RL_SCRIPTED_ISSUER")? {
            config.scripted_issuer = scripted;
        }

        if let Some(capacity) = parse_var::<usize>("RL_CHANNEL_CAPACITY")? {
            config.channel_capacity = capacity.max(1);
        }
        config.storage.data_dir = var("RL_DATA_DIR").map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    /// Check the default terminal identity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_identifier("retailer_id", &self.terminal.retailer_id)?;
        validate_identifier("store_id", &self.terminal.store_id)?;
        validate_identifier("terminal_id", &self.terminal.terminal_id)?;
        Ok(())
    }

    /// The receipt issuer sessions call after an approved payment.
    ///
    /// The HTTP gateway is built even without backend settings; each call then
    /// fails with a configuration code and the sale takes the paper fallback.
    pub fn receipt_issuer(&self) -> Result<Arc<dyn ReceiptIssuer>, GatewayError> {
        if self.scripted_issuer {
            return Ok(Arc::new(ScriptedIssuer::succeeding(
                self.customer_base_url.clone(),
            )));
        }
        Ok(Arc::new(HttpReceiptGateway::new(self.gateway.clone())?))
    }

    /// Customer display link for a session code.
    pub fn customer_url(&self, session_code: &str) -> String {
        format!(
            "{}/s/{}",
            self.customer_base_url.trim_end_matches('/'),
            session_code
        )
    }
}
