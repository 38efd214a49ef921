//! Rejected intents.
//!
//! A rejection is a refused no-op: the snapshot is left untouched and the
//! `Display` text is shown to the operator as the status line.

use shared_types::{IssuanceState, Stage};
use thiserror::Error;

/// Why an intent was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Cart is empty")]
    CartEmpty,

    #[error("Cart is already empty")]
    CartAlreadyEmpty,

    #[error("Payment in progress")]
    PaymentInProgress,

    #[error("Sale closed, start a new sale")]
    SaleClosed,

    #[error("Cannot {action} while {}", .stage.as_str())]
    WrongStage { action: &'static str, stage: Stage },

    #[error("No cart line {0}")]
    UnknownLine(u32),

    #[error("Invalid quantity {0}")]
    InvalidQuantity(u32),

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Payment already approved")]
    PaymentAlreadyApproved,

    #[error("Payment not approved")]
    PaymentNotApproved,

    #[error("Stale payment result discarded")]
    StalePayment,

    #[error("Stale issuance result discarded")]
    StaleIssuance,

    #[error("Receipt issuance not possible while {0:?}")]
    IssuanceNotIdle(IssuanceState),

    #[error("Nothing to retry")]
    NothingToRetry,

    #[error("No scan pending")]
    ScanNotPending,

    #[error("Scanned token does not match this receipt")]
    ScanTokenMismatch,

    #[error("Paper receipt printing is disabled")]
    PrintingDisabled,

    #[error("Paper receipt already printed")]
    AlreadyPrinted,
}

impl Rejection {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CartEmpty => "CART_EMPTY",
            Self::CartAlreadyEmpty => "CART_ALREADY_EMPTY",
            Self::PaymentInProgress => "PAYMENT_IN_PROGRESS",
            Self::SaleClosed => "SALE_CLOSED",
            Self::WrongStage { .. } => "WRONG_STAGE",
            Self::UnknownLine(_) => "UNKNOWN_LINE",
            Self::InvalidQuantity(_) => "INVALID_QUANTITY",
            Self::InvalidItem(_) => "INVALID_ITEM",
            Self::PaymentAlreadyApproved => "PAYMENT_ALREADY_APPROVED",
            Self::PaymentNotApproved => "PAYMENT_NOT_APPROVED",
            Self::StalePayment => "STALE_PAYMENT",
            Self::StaleIssuance => "STALE_ISSUANCE",
            Self::IssuanceNotIdle(_) => "ISSUANCE_NOT_IDLE",
            Self::NothingToRetry => "NOTHING_TO_RETRY",
            Self::ScanNotPending => "SCAN_NOT_PENDING",
            Self::ScanTokenMismatch => "SCAN_TOKEN_MISMATCH",
            Self::PrintingDisabled => "PRINTING_DISABLED",
            Self::AlreadyPrinted => "ALREADY_PRINTED",
        }
    }

    /// True for results of background work that arrived too late.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StalePayment | Self::StaleIssuance)
    }
}
