//! # Audit Events
//!
//! The fixed event vocabulary written to the per-session Event Log.
//!
//! ## Design Rules
//!
//! - Every event type has its own typed payload variant; there is no
//!   free-form map at the domain level.
//! - On the storage side a payload is a JSON object. Absent optional fields
//!   are never written, and any `null` that reaches the log is stripped by
//!   [`sanitize_payload`] rather than failing the write.
//! - Events are immutable once appended. The log assigns `id` and
//!   `created_at`.

use crate::entities::{
    FallbackReason, NetworkMode, PaymentOutcome, PaymentState, SaleId, ScanOutcome, SessionId,
    SessionMode, Stage,
};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Log-assigned event identifier, unique within a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The fixed event vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    SessionCreated,
    NewSaleStarted,
    ResetRequested,
    CartUpdated,
    CartCleared,
    CheckoutInitiated,
    StageChanged,
    PaymentProcessing,
    PaymentResult,
    ReceiptIssuanceStarted,
    ReceiptTokenReady,
    ReceiptIssuanceFailed,
    CustomerJoined,
    CustomerScanned,
    FallbackPrinted,
}

impl EventType {
    /// Every event type, in lifecycle order.
    pub const ALL: [EventType; 15] = [
        Self::SessionCreated,
        Self::NewSaleStarted,
        Self::ResetRequested,
        Self::CartUpdated,
        Self::CartCleared,
        Self::CheckoutInitiated,
        Self::StageChanged,
        Self::PaymentProcessing,
        Self::PaymentResult,
        Self::ReceiptIssuanceStarted,
        Self::ReceiptTokenReady,
        Self::ReceiptIssuanceFailed,
        Self::CustomerJoined,
        Self::CustomerScanned,
        Self::FallbackPrinted,
    ];

    /// Wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionCreated => "SESSION_CREATED",
            Self::NewSaleStarted => "NEW_SALE_STARTED",
            Self::ResetRequested => "RESET_REQUESTED",
            Self::CartUpdated => "CART_UPDATED",
            Self::CartCleared => "CART_CLEARED",
            Self::CheckoutInitiated => "CHECKOUT_INITIATED",
            Self::StageChanged => "STAGE_CHANGED",
            Self::PaymentProcessing => "PAYMENT_PROCESSING",
            Self::PaymentResult => "PAYMENT_RESULT",
            Self::ReceiptIssuanceStarted => "RECEIPT_ISSUANCE_STARTED",
            Self::ReceiptTokenReady => "RECEIPT_TOKEN_READY",
            Self::ReceiptIssuanceFailed => "RECEIPT_ISSUANCE_FAILED",
            Self::CustomerJoined => "CUSTOMER_JOINED",
            Self::CustomerScanned => "CUSTOMER_SCANNED",
            Self::FallbackPrinted => "FALLBACK_PRINTED",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed payload of each event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event_type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum EventPayload {
    SessionCreated {
        session_code: String,
        mode: SessionMode,
        sale_id: SaleId,
    },
    NewSaleStarted {
        sale_id: SaleId,
        previous_sale_id: SaleId,
    },
    ResetRequested {
        sale_id: SaleId,
        previous_sale_id: SaleId,
    },
    CartUpdated {
        sale_id: SaleId,
        sku: String,
        line_no: u32,
        /// Quantity after the change; zero when the line was removed.
        quantity: u32,
        total: Money,
    },
    CartCleared {
        sale_id: SaleId,
        removed_lines: usize,
    },
    CheckoutInitiated {
        sale_id: SaleId,
        total: Money,
        item_count: u32,
    },
    StageChanged {
        sale_id: SaleId,
        from: Stage,
        to: Stage,
    },
    PaymentProcessing {
        sale_id: SaleId,
        outcome: PaymentOutcome,
        network_mode: NetworkMode,
        delay_ms: u64,
    },
    PaymentResult {
        sale_id: SaleId,
        payment_state: PaymentState,
        total: Money,
    },
    ReceiptIssuanceStarted {
        sale_id: SaleId,
        total: Money,
    },
    ReceiptTokenReady {
        sale_id: SaleId,
        token_id: String,
        public_url: String,
    },
    ReceiptIssuanceFailed {
        sale_id: SaleId,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    CustomerJoined {
        viewer_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sale_id: Option<SaleId>,
    },
    CustomerScanned {
        outcome: ScanOutcome,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sale_id: Option<SaleId>,
    },
    FallbackPrinted {
        sale_id: SaleId,
        reason: FallbackReason,
    },
}

impl EventPayload {
    /// Event type this payload belongs to.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            Self::SessionCreated { .. } => EventType::SessionCreated,
            Self::NewSaleStarted { .. } => EventType::NewSaleStarted,
            Self::ResetRequested { .. } => EventType::ResetRequested,
            Self::CartUpdated { .. } => EventType::CartUpdated,
            Self::CartCleared { .. } => EventType::CartCleared,
            Self::CheckoutInitiated { .. } => EventType::CheckoutInitiated,
            Self::StageChanged { .. } => EventType::StageChanged,
            Self::PaymentProcessing { .. } => EventType::PaymentProcessing,
            Self::PaymentResult { .. } => EventType::PaymentResult,
            Self::ReceiptIssuanceStarted { .. } => EventType::ReceiptIssuanceStarted,
            Self::ReceiptTokenReady { .. } => EventType::ReceiptTokenReady,
            Self::ReceiptIssuanceFailed { .. } => EventType::ReceiptIssuanceFailed,
            Self::CustomerJoined { .. } => EventType::CustomerJoined,
            Self::CustomerScanned { .. } => EventType::CustomerScanned,
            Self::FallbackPrinted { .. } => EventType::FallbackPrinted,
        }
    }

    /// Storage form of the payload body (without the type tag), sanitized.
    pub fn to_body(&self) -> Result<Value, serde_json::Error> {
        let mut tagged = serde_json::to_value(self)?;
        let body = tagged
            .get_mut("payload")
            .map(Value::take)
            .unwrap_or_else(|| Value::Object(Default::default()));
        Ok(sanitize_payload(body))
    }

    /// Rebuild a typed payload from its storage form.
    pub fn from_body(event_type: EventType, body: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({
            "event_type": event_type.as_str(),
            "payload": body,
        }))
    }
}

/// An immutable audit record as stored in the Event Log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub session_id: SessionId,
    pub event_type: EventType,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Decode the typed payload.
    pub fn typed_payload(&self) -> Result<EventPayload, serde_json::Error> {
        EventPayload::from_body(self.event_type, self.payload.clone())
    }
}

/// Drop every `null` (the "missing/undefined" sentinel) from a payload,
/// recursively. Object keys holding `null` are removed; `null` array
/// elements are removed.
#[must_use]
pub fn sanitize_payload(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, sanitize_payload(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(sanitize_payload)
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vocabulary_round_trips_through_wire_names() {
        for event_type in EventType::ALL {
            let json = serde_json::to_value(event_type).unwrap();
            assert_eq!(json, json!(event_type.as_str()));
            assert_eq!(EventType::parse(event_type.as_str()), Some(event_type));
        }
        assert_eq!(EventType::parse("SOMETHING_ELSE"), None);
    }

    #[test]
    fn test_body_omits_absent_optionals() {
        let payload = EventPayload::ReceiptIssuanceFailed {
            sale_id: SaleId::new(),
            message: "backend unavailable".to_string(),
            code: None,
        };
        let body = payload.to_body().unwrap();
        assert!(body.get("code").is_none());
        assert_eq!(body["message"], "backend unavailable");
        assert!(body.get("event_type").is_none());
    }

    #[test]
    fn test_body_decodes_back_to_typed_payload() {
        let payload = EventPayload::FallbackPrinted {
            sale_id: SaleId::new(),
            reason: FallbackReason::ScanFail,
        };
        let body = payload.to_body().unwrap();
        assert_eq!(body["reason"], "SCAN_FAIL");
        let back = EventPayload::from_body(EventType::FallbackPrinted, body).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_sanitize_drops_nulls_recursively() {
        let raw = json!({
            "keep": 1,
            "drop": null,
            "nested": { "inner": null, "ok": "yes" },
            "list": [1, null, { "x": null }]
        });
        let clean = sanitize_payload(raw);
        assert_eq!(
            clean,
            json!({
                "keep": 1,
                "nested": { "ok": "yes" },
                "list": [1, {}]
            })
        );
    }
}
