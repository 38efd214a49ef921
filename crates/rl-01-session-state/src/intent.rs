//! Intents admitted by the session state machine.

use shared_types::{
    CatalogItem, FallbackReason, PaymentOutcome, Receipt, SaleId, ScanOutcome, Toggles,
};
use std::fmt;

/// One request to change the session.
///
/// Operator intents come from the terminal UI, viewer intents arrive over
/// the session channel, and the `*Resolved` / `Issuance*` variants are
/// produced by the host's own background work.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    // Cart
    AddItem { item: CatalogItem, quantity: u32 },
    IncrementItem { line_no: u32 },
    DecrementItem { line_no: u32 },
    RemoveItem { line_no: u32 },
    ClearCart,

    // Flow
    SetToggles(Toggles),
    Checkout,
    BackToCart,
    Pay,
    PaymentResolved { sale_id: SaleId, outcome: PaymentOutcome },

    // Issuance
    IssueReceipt,
    RetryIssuance,
    IssuanceSucceeded { sale_id: SaleId, receipt: Receipt },
    IssuanceFailed {
        sale_id: SaleId,
        message: String,
        code: Option<String>,
        /// Failure caused by the network being unavailable.
        network: bool,
    },

    // Customer side
    Scanned {
        outcome: ScanOutcome,
        token_id: Option<String>,
    },

    // Compensation and lifecycle
    PrintFallback(FallbackReason),
    NewSale,
    Reset,
}

impl Intent {
    /// Short name used in logs and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddItem { .. } => "add_item",
            Self::IncrementItem { .. } => "increment_item",
            Self::DecrementItem { .. } => "decrement_item",
            Self::RemoveItem { .. } => "remove_item",
            Self::ClearCart => "clear_cart",
            Self::SetToggles(_) => "set_toggles",
            Self::Checkout => "checkout",
            Self::BackToCart => "back_to_cart",
            Self::Pay => "pay",
            Self::PaymentResolved { .. } => "payment_resolved",
            Self::IssueReceipt => "issue_receipt",
            Self::RetryIssuance => "retry_issuance",
            Self::IssuanceSucceeded { .. } => "issuance_succeeded",
            Self::IssuanceFailed { .. } => "issuance_failed",
            Self::Scanned { .. } => "scanned",
            Self::PrintFallback(_) => "print_fallback",
            Self::NewSale => "new_sale",
            Self::Reset => "reset",
        }
    }

    /// True for intents that edit the cart.
    pub fn is_cart_mutation(&self) -> bool {
        matches!(
            self,
            Self::AddItem { .. }
                | Self::IncrementItem { .. }
                | Self::DecrementItem { .. }
                | Self::RemoveItem { .. }
                | Self::ClearCart
        )
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
