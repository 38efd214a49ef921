//! Outbound ports: the receipt backend as seen by the host and the desk.

use crate::domain::{
    ConsumptionResult, IssueReceiptRequest, ValidateReceiptRequest, VerificationResult,
};
use crate::error::GatewayResult;
use async_trait::async_trait;
use shared_types::Receipt;
use std::sync::Arc;

/// Issues digital receipts for paid sales.
#[async_trait]
pub trait ReceiptIssuer: Send + Sync {
    /// Issue a receipt token. Any non-success is an issuance failure.
    async fn issue(&self, request: &IssueReceiptRequest) -> GatewayResult<Receipt>;
}

/// Validates and consumes previously issued receipt tokens.
#[async_trait]
pub trait ReceiptVerifier: Send + Sync {
    async fn validate(&self, request: &ValidateReceiptRequest) -> GatewayResult<VerificationResult>;

    async fn consume(&self, request: &ValidateReceiptRequest) -> GatewayResult<ConsumptionResult>;
}

#[async_trait]
impl<T: ReceiptIssuer + ?Sized> ReceiptIssuer for Arc<T> {
    async fn issue(&self, request: &IssueReceiptRequest) -> GatewayResult<Receipt> {
        (**self).issue(request).await
    }
}

#[async_trait]
impl<T: ReceiptVerifier + ?Sized> ReceiptVerifier for Arc<T> {
    async fn validate(&self, request: &ValidateReceiptRequest) -> GatewayResult<VerificationResult> {
        (**self).validate(request).await
    }

    async fn consume(&self, request: &ValidateReceiptRequest) -> GatewayResult<ConsumptionResult> {
        (**self).consume(request).await
    }
}
