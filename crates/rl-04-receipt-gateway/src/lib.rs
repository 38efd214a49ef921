//! # Receipt Gateway
//!
//! Signed HTTP client for the receipt backend: issue a digital receipt for a
//! paid sale, validate and consume a receipt token at the desk.
//!
//! ## Calls
//!
//! | Path | Body | Answer | Extra header |
//! |------|------|--------|--------------|
//! | `/issue-receipt` | [`IssueReceiptRequest`] | [`IssueReceiptResponse`] | - |
//! | `/validate-receipt` | [`ValidateReceiptRequest`] | [`VerificationResult`] | `x-verifier-key` |
//! | `/consume-receipt` | [`ValidateReceiptRequest`] | [`ConsumptionResult`] | `x-verifier-key` |
//!
//! Every call carries the four RL1 signature headers computed over the exact
//! body bytes, and is bounded by the configured timeout. Any non-success,
//! timeout or transport failure is an upstream error; the host turns it
//! into an issuance failure and the desk into a paper-receipt instruction.
//!
//! ## Configuration
//!
//! | Variable | Meaning | Missing |
//! |----------|---------|---------|
//! | `RL_BACKEND_URL` | Function root | `RL_ENDPOINT_MISSING` |
//! | `RL_SIGNING_SECRET` | HMAC secret | `RL_SIGNING_SECRET_MISSING` |
//! | `RL_VERIFIER_KEY` | Desk key | `RL_VERIFIER_KEY_MISSING` |
//! | `RL_ISSUANCE_TIMEOUT_MS` | Call bound | 4000 |

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;

pub use adapters::{HttpReceiptGateway, ScriptedIssuer, CONSUME_PATH, ISSUE_PATH, VALIDATE_PATH};
pub use config::{GatewayConfig, DEFAULT_TIMEOUT};
pub use domain::{
    ConsumptionResult, DeskOutcome, FallbackInstruction, IssueReceiptItem, IssueReceiptRequest,
    IssueReceiptResponse, ValidateReceiptRequest, VerificationDesk, VerificationResult,
};
pub use error::{
    GatewayError, GatewayResult, CODE_CONFIG_INVALID, CODE_ENDPOINT_MISSING,
    CODE_SIGNING_SECRET_MISSING, CODE_VERIFIER_KEY_MISSING,
};
pub use ports::{ReceiptIssuer, ReceiptVerifier};
