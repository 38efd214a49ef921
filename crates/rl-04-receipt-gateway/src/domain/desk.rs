//! Receipt verification desk.
//!
//! Staff-side validation and consumption of customer receipt tokens. When
//! the backend cannot answer, the desk tells the operator to print a paper
//! receipt instead of surfacing the error.

use crate::domain::payloads::{ConsumptionResult, ValidateReceiptRequest, VerificationResult};
use crate::error::GatewayResult;
use crate::ports::ReceiptVerifier;
use serde::Serialize;
use tracing::{info, warn};

/// What the operator should do when the backend is unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "fallback", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackInstruction {
    /// Hand the customer a paper receipt.
    PrintReceipt { code: &'static str, message: String },
}

/// Result of a desk operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DeskOutcome<T> {
    Completed(T),
    Fallback(FallbackInstruction),
}

impl<T> DeskOutcome<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Fallback(_) => None,
        }
    }
}

/// Wraps a [`ReceiptVerifier`] with the paper-receipt fallback.
///
/// Local misuse (invalid request, missing configuration) still returns
/// `Err`; only upstream failures turn into a fallback.
pub struct VerificationDesk<V> {
    verifier: V,
}

impl<V: ReceiptVerifier> VerificationDesk<V> {
    pub fn new(verifier: V) -> Self {
        Self { verifier }
    }

    pub async fn verify_or_fallback(
        &self,
        request: &ValidateReceiptRequest,
    ) -> GatewayResult<DeskOutcome<VerificationResult>> {
        match self.verifier.validate(request).await {
            Ok(result) => {
                info!(token_id = %request.token_id, valid = result.valid, "Receipt verified");
                Ok(DeskOutcome::Completed(result))
            }
            Err(e) if e.is_upstream() => {
                warn!(token_id = %request.token_id, code = e.code(), error = %e, "Verification unavailable, printing receipt");
                Ok(DeskOutcome::Fallback(FallbackInstruction::PrintReceipt {
                    code: e.code(),
                    message: e.to_string(),
                }))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn consume_or_fallback(
        &self,
        request: &ValidateReceiptRequest,
    ) -> GatewayResult<DeskOutcome<ConsumptionResult>> {
        match self.verifier.consume(request).await {
            Ok(result) => {
                info!(
                    token_id = %request.token_id,
                    already_consumed = result.already_consumed,
                    "Receipt consumed"
                );
                Ok(DeskOutcome::Completed(result))
            }
            Err(e) if e.is_upstream() => {
                warn!(token_id = %request.token_id, code = e.code(), error = %e, "Consumption unavailable, printing receipt");
                Ok(DeskOutcome::Fallback(FallbackInstruction::PrintReceipt {
                    code: e.code(),
                    message: e.to_string(),
                }))
            }
            Err(e) => Err(e),
        }
    }
}
