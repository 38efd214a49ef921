//! # HTTP Receipt Gateway
//!
//! Signed JSON calls to the receipt backend functions.
//!
//! Each request body is serialized once; those exact bytes are hashed,
//! signed and sent. The timestamp, nonce, body-hash and signature travel as
//! `x-rl-*` headers. Validate and consume additionally carry the caller's
//! verifier key in `x-verifier-key`.

use crate::config::GatewayConfig;
use crate::domain::{
    ConsumptionResult, IssueReceiptRequest, IssueReceiptResponse, ValidateReceiptRequest,
    VerificationResult,
};
use crate::error::{GatewayError, GatewayResult};
use crate::ports::{ReceiptIssuer, ReceiptVerifier};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_crypto::RequestSigner;
use shared_types::Receipt;
use tracing::{debug, warn};

/// Issue function path.
pub const ISSUE_PATH: &str = "/issue-receipt";
/// Validate function path.
pub const VALIDATE_PATH: &str = "/validate-receipt";
/// Consume function path.
pub const CONSUME_PATH: &str = "/consume-receipt";

/// Header carrying the caller-held verifier key.
pub const HEADER_VERIFIER_KEY: &str = "x-verifier-key";

/// Upstream error bodies are cut to this many characters.
const MAX_ERROR_BODY: usize = 512;

/// reqwest-backed implementation of [`ReceiptIssuer`] and [`ReceiptVerifier`].
#[derive(Debug, Clone)]
pub struct HttpReceiptGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpReceiptGateway {
    /// Build a gateway. Missing backend settings are reported per call.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Active configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn call<B, R>(&self, path: &str, body: &B, verifier_key: Option<&str>) -> GatewayResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.endpoint()?, path);
        let signer = RequestSigner::new(self.config.secret()?.as_bytes())?;

        let bytes = serde_json::to_vec(body)
            .map_err(|e| GatewayError::Decode(format!("encode request: {e}")))?;
        let signed = signer.sign_request("POST", path, &bytes)?;

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in signed.pairs() {
            request = request.header(name, value);
        }
        if let Some(key) = verifier_key {
            request = request.header(HEADER_VERIFIER_KEY, key);
        }

        debug!(path, nonce = %signed.nonce, "Calling receipt backend");
        let response = request.body(bytes).send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout(self.config.timeout.as_millis() as u64)
            } else {
                GatewayError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: String = text.chars().take(MAX_ERROR_BODY).collect();
            warn!(path, status = status.as_u16(), "Receipt backend rejected call");
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let payload = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout(self.config.timeout.as_millis() as u64)
            } else {
                GatewayError::Transport(e.to_string())
            }
        })?;
        serde_json::from_slice(&payload).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ReceiptIssuer for HttpReceiptGateway {
    async fn issue(&self, request: &IssueReceiptRequest) -> GatewayResult<Receipt> {
        request.validate()?;
        let response: IssueReceiptResponse = self.call(ISSUE_PATH, request, None).await?;
        if response.token_id.trim().is_empty() {
            return Err(GatewayError::Decode("empty token_id".to_string()));
        }
        Ok(response.into())
    }
}

#[async_trait]
impl ReceiptVerifier for HttpReceiptGateway {
    async fn validate(&self, request: &ValidateReceiptRequest) -> GatewayResult<VerificationResult> {
        request.validate()?;
        let key = self.config.verifier()?;
        self.call(VALIDATE_PATH, request, Some(key)).await
    }

    async fn consume(&self, request: &ValidateReceiptRequest) -> GatewayResult<ConsumptionResult> {
        request.validate()?;
        let key = self.config.verifier()?;
        self.call(CONSUME_PATH, request, Some(key)).await
    }
}
