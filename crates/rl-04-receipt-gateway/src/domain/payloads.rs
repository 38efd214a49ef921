//! Request and response bodies exchanged with the receipt backend.
//!
//! Amounts travel as two-place decimals, optional fields are omitted when
//! absent, never sent as `null`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{validate_identifier, CartItem, Money, Receipt, Snapshot, ValidationError};

/// One receipt line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueReceiptItem {
    pub line_no: u32,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
    pub vat_rate: f64,
    pub vat_amount: Money,
}

impl From<&CartItem> for IssueReceiptItem {
    fn from(item: &CartItem) -> Self {
        Self {
            line_no: item.line_no,
            sku: item.sku.clone(),
            name: item.name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            line_total: item.line_total,
            vat_rate: item.vat_rate,
            vat_amount: item.vat_amount,
        }
    }
}

/// Body of `POST /issue-receipt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueReceiptRequest {
    pub retailer_id: String,
    pub store_id: String,
    pub terminal_code: String,
    /// RFC 3339, millisecond precision.
    pub issued_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,
    pub currency: String,
    pub subtotal: Money,
    pub vat_total: Money,
    pub total: Money,
    pub items: Vec<IssueReceiptItem>,
}

impl IssueReceiptRequest {
    /// Build the request for the active sale of a snapshot.
    ///
    /// The sale id doubles as receipt number so a retried issuance refers
    /// to the same sale.
    pub fn from_snapshot(snapshot: &Snapshot, issued_at: DateTime<Utc>) -> Self {
        let cart = &snapshot.cart;
        Self {
            retailer_id: snapshot.terminal.retailer_id.clone(),
            store_id: snapshot.terminal.store_id.clone(),
            terminal_code: snapshot.terminal.terminal_id.clone(),
            issued_at: issued_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            receipt_number: Some(snapshot.active_sale_id.to_string()),
            currency: cart.currency.clone(),
            subtotal: cart.subtotal,
            vat_total: cart.vat_total,
            total: cart.total,
            items: cart.items.iter().map(IssueReceiptItem::from).collect(),
        }
    }

    /// Reject requests the backend would refuse anyway.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier("retailer_id", &self.retailer_id)?;
        validate_identifier("store_id", &self.store_id)?;
        validate_identifier("terminal_code", &self.terminal_code)?;
        if self.items.is_empty() {
            return Err(ValidationError::Empty { field: "items" });
        }
        Ok(())
    }
}

/// Successful issuance answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueReceiptResponse {
    pub token_id: String,
    pub public_url: String,
    pub qr_url: String,
    pub preview_url: String,
}

impl From<IssueReceiptResponse> for Receipt {
    fn from(r: IssueReceiptResponse) -> Self {
        Receipt {
            token_id: r.token_id,
            public_url: r.public_url,
            qr_url: r.qr_url,
            preview_url: r.preview_url,
        }
    }
}

/// Body of `POST /validate-receipt` and `POST /consume-receipt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateReceiptRequest {
    pub token_id: String,
    pub store_id: String,
    pub terminal_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidateReceiptRequest {
    pub fn new(
        token_id: impl Into<String>,
        store_id: impl Into<String>,
        terminal_code: impl Into<String>,
    ) -> Self {
        Self {
            token_id: token_id.into(),
            store_id: store_id.into(),
            terminal_code: terminal_code.into(),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.token_id.trim().is_empty() {
            return Err(ValidationError::Empty { field: "token_id" });
        }
        validate_identifier("store_id", &self.store_id)?;
        validate_identifier("terminal_code", &self.terminal_code)
    }
}

/// Answer of `validate-receipt`.
///
/// Only `valid` is required; the backend may add detail fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,
    #[serde(default)]
    pub consumed: bool,
}

/// Answer of `consume-receipt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionResult {
    pub already_consumed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumed_at: Option<String>,
}
