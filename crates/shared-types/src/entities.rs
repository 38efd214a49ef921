//! # Session Entities
//!
//! The canonical session document and everything it is built from.
//!
//! ## Clusters
//!
//! - **Identity**: `SessionId`, `SaleId`, `Session`, `TerminalIdentity`
//! - **Toggles**: demo switches that steer payment, network, issuance and scan
//! - **Cart**: `Cart`, `CartItem`, `CatalogItem`
//! - **Flow**: `Stage`, `PaymentState`, `IssuanceState`, `ScanState`
//! - **Outcome**: `Receipt`, `Scan`, `Fallback`
//!
//! The `Snapshot` is replaced wholesale on every mutation; nothing here is
//! patched in place once it has been published.

use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Opaque unique identifier of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a fresh session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from the hyphenated string form.
    pub fn parse(value: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(value).map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of the sale currently running inside a session.
///
/// Regenerated on every "new sale"; background work tagged with an older
/// sale id is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(pub Uuid);

impl SaleId {
    /// Generate a fresh sale id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from the hyphenated string form.
    pub fn parse(value: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(value).map(Self)
    }
}

impl Default for SaleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Host category of a demo session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionMode {
    Grocery,
    Fuel,
    Pharmacy,
    Fashion,
}

impl SessionMode {
    /// Wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grocery => "GROCERY",
            Self::Fuel => "FUEL",
            Self::Pharmacy => "PHARMACY",
            Self::Fashion => "FASHION",
        }
    }
}

/// Which physical terminal a session runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalIdentity {
    pub retailer_id: String,
    pub store_id: String,
    pub terminal_id: String,
}

/// Immutable identity of one demo run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    /// Short human-shareable code shown next to the customer QR link.
    pub session_code: String,
    pub mode: SessionMode,
    pub terminal: TerminalIdentity,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// CLUSTER B: TOGGLES
// =============================================================================

/// Simulated result of the card payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    #[default]
    Success,
    Fail,
    Timeout,
}

/// Simulated network quality between terminal and acquirer/backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    #[default]
    Normal,
    Slow,
    Down,
}

/// Whether issuance calls the backend or is forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssuanceMode {
    #[default]
    Live,
    Fail,
}

/// Whether a paper receipt may be printed as a compensating action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintFallbackMode {
    #[default]
    Enabled,
    Disabled,
}

/// How the customer display resolves a scan when asked to simulate one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanSimulation {
    /// Wait for a real scan report.
    #[default]
    Manual,
    Success,
    Fail,
}

/// The demo switch board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Toggles {
    pub payment_outcome: PaymentOutcome,
    pub network_mode: NetworkMode,
    pub issuance_mode: IssuanceMode,
    pub print_fallback: PrintFallbackMode,
    pub scan_simulation: ScanSimulation,
}

// =============================================================================
// CLUSTER C: CART
// =============================================================================

/// A sellable article as picked from the (external) demo catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    pub vat_rate: f64,
}

/// One cart line. All amounts are derived from `unit_price`, `quantity`
/// and `vat_rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub line_no: u32,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
    pub vat_rate: f64,
    pub vat_amount: Money,
}

impl CartItem {
    /// Build a line with derived amounts.
    #[must_use]
    pub fn new(line_no: u32, item: &CatalogItem, quantity: u32) -> Self {
        let mut line = Self {
            line_no,
            sku: item.sku.clone(),
            name: item.name.clone(),
            quantity,
            unit_price: item.unit_price,
            line_total: Money::ZERO,
            vat_rate: item.vat_rate,
            vat_amount: Money::ZERO,
        };
        line.recompute();
        line
    }

    /// Re-derive `line_total` and `vat_amount` from quantity and price.
    pub fn recompute(&mut self) {
        self.line_total = self.unit_price.times(self.quantity);
        self.vat_amount = self.line_total.apply_rate(self.vat_rate);
    }
}

/// Ordered cart lines plus totals derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub currency: String,
    pub items: Vec<CartItem>,
    pub subtotal: Money,
    pub vat_total: Money,
    pub total: Money,
}

impl Cart {
    /// Empty cart in the given currency.
    #[must_use]
    pub fn empty(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            items: Vec::new(),
            subtotal: Money::ZERO,
            vat_total: Money::ZERO,
            total: Money::ZERO,
        }
    }

    /// Recompute totals from the current lines; never accumulate.
    pub fn recompute_totals(&mut self) {
        self.subtotal = self.items.iter().map(|i| i.line_total).sum();
        self.vat_total = self.items.iter().map(|i| i.vat_amount).sum();
        self.total = self.subtotal + self.vat_total;
    }

    /// A cart that cannot be checked out or paid.
    #[must_use]
    pub fn is_empty_for_checkout(&self) -> bool {
        self.items.is_empty() || !self.total.is_positive()
    }

    /// Next free line number.
    #[must_use]
    pub fn next_line_no(&self) -> u32 {
        self.items.iter().map(|i| i.line_no).max().unwrap_or(0) + 1
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

// =============================================================================
// CLUSTER D: FLOW
// =============================================================================

/// Top-level phase of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Boot,
    Cart,
    Checkout,
    Processing,
    Result,
}

impl Stage {
    /// Wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boot => "BOOT",
            Self::Cart => "CART",
            Self::Checkout => "CHECKOUT",
            Self::Processing => "PROCESSING",
            Self::Result => "RESULT",
        }
    }
}

/// Payment sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Idle,
    Initiated,
    Processing,
    Approved,
    Declined,
    Timeout,
    NetworkError,
}

impl PaymentState {
    /// True once the payment has a final result.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Declined | Self::Timeout | Self::NetworkError
        )
    }
}

/// Receipt issuance sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuanceState {
    Idle,
    Ingesting,
    TokenReady,
    Failed,
    FallbackPrinted,
}

/// Customer scan sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanState {
    #[default]
    None,
    Pending,
    Success,
    Fail,
}

/// Result reported by the customer display after a scan attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanOutcome {
    Success,
    Fail,
}

/// The three nested state machines of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub stage: Stage,
    pub payment_state: PaymentState,
    pub issuance_state: IssuanceState,
}

impl Flow {
    /// Flow of a session that has not rung anything up yet.
    #[must_use]
    pub fn boot() -> Self {
        Self {
            stage: Stage::Boot,
            payment_state: PaymentState::Idle,
            issuance_state: IssuanceState::Idle,
        }
    }

    /// Flow at the start of a fresh sale.
    #[must_use]
    pub fn fresh_sale() -> Self {
        Self {
            stage: Stage::Cart,
            payment_state: PaymentState::Idle,
            issuance_state: IssuanceState::Idle,
        }
    }
}

// =============================================================================
// CLUSTER E: OUTCOME
// =============================================================================

/// Digital receipt handles returned by the issuing backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub token_id: String,
    pub public_url: String,
    pub qr_url: String,
    pub preview_url: String,
}

/// Scan progress as last reported by the customer display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scan {
    pub state: ScanState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Why a paper receipt was printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackReason {
    Network,
    IssuanceFail,
    ScanFail,
    CustomerRequest,
}

impl FallbackReason {
    /// Wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "NETWORK",
            Self::IssuanceFail => "ISSUANCE_FAIL",
            Self::ScanFail => "SCAN_FAIL",
            Self::CustomerRequest => "CUSTOMER_REQUEST",
        }
    }
}

/// Paper receipt record; at most one print per sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Fallback {
    pub printed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FallbackReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printed_at: Option<DateTime<Utc>>,
}

// =============================================================================
// THE SNAPSHOT
// =============================================================================

/// The single canonical state document of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub session_id: SessionId,
    pub terminal: TerminalIdentity,
    pub toggles: Toggles,
    pub active_sale_id: SaleId,
    pub cart: Cart,
    pub flow: Flow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
    pub scan: Scan,
    pub fallback: Fallback,
    /// Incremented by the host on every applied transition; viewers use it
    /// to discard out-of-order syncs.
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

impl Snapshot {
    /// Snapshot of a freshly created session.
    #[must_use]
    pub fn initial(
        session_id: SessionId,
        terminal: TerminalIdentity,
        currency: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            terminal,
            toggles: Toggles::default(),
            active_sale_id: SaleId::new(),
            cart: Cart::empty(currency),
            flow: Flow::boot(),
            receipt: None,
            scan: Scan::default(),
            fallback: Fallback::default(),
            revision: 0,
            updated_at: now,
        }
    }

    /// Short label for logs and the customer display.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.flow.stage
    }
}
