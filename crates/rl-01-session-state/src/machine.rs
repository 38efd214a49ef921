//! # Session State Machine
//!
//! `apply(current, intent) -> Transition | Rejection`.
//!
//! The machine is pure: it never sleeps, calls the network or touches
//! storage. Anything asynchronous is returned as an [`Effect`] for the host
//! to carry out, and comes back later as another intent tagged with the
//! `sale_id` it was started for.
//!
//! ## Stage
//!
//! ```text
//! BOOT ──cart edit──→ CART ⇄ CHECKOUT ──pay──→ PROCESSING ──resolve──→ RESULT
//!                       ↑                                                 │
//!                       └───────────────── new sale / reset ──────────────┘
//! ```
//!
//! ## Effects
//!
//! | Effect | Host action |
//! |--------|-------------|
//! | `SchedulePaymentResolution` | sleep, then feed `PaymentResolved` |
//! | `CancelPaymentTimer` | abort the pending timer |
//! | `CallIssuer` | call the receipt backend, feed `IssuanceSucceeded/Failed` |
//! | `FollowUp` | apply the carried intent right away |
//! | `ResetIssuanceGuard` | allow auto-issuance again |

use crate::domain::cart::{self, LineChange};
use crate::domain::policy::check_fallback_permitted;
use crate::domain::timing::PaymentTiming;
use crate::error::Rejection;
use crate::intent::Intent;
use chrono::{DateTime, Utc};
use shared_types::{
    Cart, CatalogItem, EventPayload, Fallback, FallbackReason, Flow, IssuanceMode,
    IssuanceState, NetworkMode, PaymentOutcome, PaymentState, Receipt, SaleId, Scan,
    ScanOutcome, ScanState, Snapshot, Stage, Toggles,
};
use std::time::Duration;
use tracing::trace;

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SchedulePaymentResolution {
        sale_id: SaleId,
        outcome: PaymentOutcome,
        delay: Duration,
    },
    CancelPaymentTimer,
    CallIssuer { sale_id: SaleId },
    FollowUp(Intent),
    ResetIssuanceGuard,
}

/// Result of an admitted intent.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub snapshot: Snapshot,
    pub event: Option<EventPayload>,
    pub effects: Vec<Effect>,
    pub status: String,
}

impl Transition {
    fn new(snapshot: Snapshot, event: Option<EventPayload>, status: impl Into<String>) -> Self {
        Self {
            snapshot,
            event,
            effects: Vec::new(),
            status: status.into(),
        }
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Result type of [`SessionMachine::apply`].
pub type TransitionResult = Result<Transition, Rejection>;

/// The session state machine.
#[derive(Debug, Clone, Default)]
pub struct SessionMachine {
    timing: PaymentTiming,
}

impl SessionMachine {
    /// Create a machine with the given payment timing.
    pub fn new(timing: PaymentTiming) -> Self {
        Self { timing }
    }

    /// Payment timing in use.
    pub fn timing(&self) -> &PaymentTiming {
        &self.timing
    }

    /// Compute the next snapshot for one intent.
    ///
    /// On success the returned snapshot has `revision + 1` and
    /// `updated_at = now`. On rejection `current` is the state to keep.
    pub fn apply(&self, current: &Snapshot, intent: Intent, now: DateTime<Utc>) -> TransitionResult {
        let name = intent.name();
        let mut next = current.clone();
        let mut transition = match intent {
            Intent::AddItem { item, quantity } => self.add_item(&mut next, &item, quantity),
            Intent::IncrementItem { line_no } => self.edit_cart(&mut next, |c| {
                cart::change_quantity(c, line_no, 1)
            }),
            Intent::DecrementItem { line_no } => self.edit_cart(&mut next, |c| {
                cart::change_quantity(c, line_no, -1)
            }),
            Intent::RemoveItem { line_no } => {
                self.edit_cart(&mut next, |c| cart::remove_line(c, line_no))
            }
            Intent::ClearCart => self.clear_cart(&mut next),
            Intent::SetToggles(toggles) => Ok(set_toggles(&mut next, toggles)),
            Intent::Checkout => checkout(&mut next),
            Intent::BackToCart => back_to_cart(&mut next),
            Intent::Pay => self.pay(&mut next),
            Intent::PaymentResolved { sale_id, outcome } => {
                resolve_payment(&mut next, sale_id, outcome)
            }
            Intent::IssueReceipt => issue(&mut next, false),
            Intent::RetryIssuance => issue(&mut next, true),
            Intent::IssuanceSucceeded { sale_id, receipt } => {
                issuance_succeeded(&mut next, sale_id, receipt, now)
            }
            Intent::IssuanceFailed {
                sale_id,
                message,
                code,
                network,
            } => issuance_failed(&mut next, sale_id, message, code, network),
            Intent::Scanned { outcome, token_id } => scanned(&mut next, outcome, token_id, now),
            Intent::PrintFallback(reason) => print_fallback(&mut next, reason, now),
            Intent::NewSale => Ok(new_sale(&mut next, false)),
            Intent::Reset => Ok(new_sale(&mut next, true)),
        }?;

        transition.snapshot.revision = current.revision + 1;
        transition.snapshot.updated_at = now;
        trace!(
            intent = name,
            revision = transition.snapshot.revision,
            stage = transition.snapshot.flow.stage.as_str(),
            "Transition applied"
        );
        Ok(transition)
    }

    fn add_item(&self, next: &mut Snapshot, item: &CatalogItem, quantity: u32) -> TransitionResult {
        self.edit_cart(next, |c| cart::add_item(c, item, quantity))
    }

    fn edit_cart(
        &self,
        next: &mut Snapshot,
        edit: impl FnOnce(&mut Cart) -> Result<LineChange, Rejection>,
    ) -> TransitionResult {
        admit_cart_edit(next)?;
        let change = edit(&mut next.cart)?;
        settle_stage_after_edit(next);
        let status = if change.quantity == 0 {
            "Item removed"
        } else {
            "Cart updated"
        };
        let event = EventPayload::CartUpdated {
            sale_id: next.active_sale_id,
            sku: change.sku,
            line_no: change.line_no,
            quantity: change.quantity,
            total: next.cart.total,
        };
        Ok(Transition::new(next.clone(), Some(event), status))
    }

    fn clear_cart(&self, next: &mut Snapshot) -> TransitionResult {
        admit_cart_edit(next)?;
        let removed_lines = cart::clear(&mut next.cart)?;
        settle_stage_after_edit(next);
        let event = EventPayload::CartCleared {
            sale_id: next.active_sale_id,
            removed_lines,
        };
        Ok(Transition::new(next.clone(), Some(event), "Cart cleared"))
    }

    fn pay(&self, next: &mut Snapshot) -> TransitionResult {
        match next.flow.stage {
            Stage::Cart | Stage::Checkout => {}
            Stage::Processing => return Err(Rejection::PaymentInProgress),
            stage => return Err(Rejection::WrongStage { action: "pay", stage }),
        }
        if next.cart.is_empty_for_checkout() {
            return Err(Rejection::CartEmpty);
        }

        let sale_id = next.active_sale_id;
        let network = next.toggles.network_mode;
        if network == NetworkMode::Down {
            next.flow.stage = Stage::Result;
            next.flow.payment_state = PaymentState::NetworkError;
            let event = EventPayload::PaymentResult {
                sale_id,
                payment_state: PaymentState::NetworkError,
                total: next.cart.total,
            };
            return Ok(Transition::new(
                next.clone(),
                Some(event),
                "Network error: payment not sent",
            ));
        }

        let outcome = next.toggles.payment_outcome;
        let delay = self.timing.delay_for(outcome, network);
        next.flow.stage = Stage::Processing;
        next.flow.payment_state = PaymentState::Processing;
        let event = EventPayload::PaymentProcessing {
            sale_id,
            outcome,
            network_mode: network,
            delay_ms: delay.as_millis() as u64,
        };
        Ok(
            Transition::new(next.clone(), Some(event), "Processing payment").with_effect(
                Effect::SchedulePaymentResolution {
                    sale_id,
                    outcome,
                    delay,
                },
            ),
        )
    }
}

fn admit_cart_edit(snapshot: &Snapshot) -> Result<(), Rejection> {
    match snapshot.flow.stage {
        Stage::Processing => Err(Rejection::PaymentInProgress),
        Stage::Result => Err(Rejection::SaleClosed),
        Stage::Boot | Stage::Cart | Stage::Checkout => Ok(()),
    }
}

/// The first edit leaves Boot. A checkout whose cart was emptied drops back
/// to Cart, since Checkout always holds something payable.
fn settle_stage_after_edit(next: &mut Snapshot) {
    match next.flow.stage {
        Stage::Boot => next.flow.stage = Stage::Cart,
        Stage::Checkout if next.cart.is_empty_for_checkout() => {
            next.flow.stage = Stage::Cart;
            next.flow.payment_state = PaymentState::Idle;
        }
        _ => {}
    }
}

fn set_toggles(next: &mut Snapshot, toggles: Toggles) -> Transition {
    next.toggles = toggles;
    Transition::new(next.clone(), None, "Toggles updated")
}

fn checkout(next: &mut Snapshot) -> TransitionResult {
    if next.flow.stage != Stage::Cart {
        return Err(Rejection::WrongStage {
            action: "checkout",
            stage: next.flow.stage,
        });
    }
    if next.cart.is_empty_for_checkout() {
        return Err(Rejection::CartEmpty);
    }
    next.flow.stage = Stage::Checkout;
    next.flow.payment_state = PaymentState::Initiated;
    let event = EventPayload::CheckoutInitiated {
        sale_id: next.active_sale_id,
        total: next.cart.total,
        item_count: next.cart.unit_count(),
    };
    Ok(Transition::new(next.clone(), Some(event), "Checkout started"))
}

fn back_to_cart(next: &mut Snapshot) -> TransitionResult {
    let from = next.flow.stage;
    match from {
        Stage::Checkout => {}
        Stage::Result if next.flow.payment_state == PaymentState::Approved => {
            return Err(Rejection::PaymentAlreadyApproved)
        }
        Stage::Result => {}
        Stage::Processing => return Err(Rejection::PaymentInProgress),
        Stage::Boot | Stage::Cart => {
            return Err(Rejection::WrongStage {
                action: "go back to cart",
                stage: from,
            })
        }
    }
    next.flow.stage = Stage::Cart;
    next.flow.payment_state = PaymentState::Idle;
    let event = EventPayload::StageChanged {
        sale_id: next.active_sale_id,
        from,
        to: Stage::Cart,
    };
    Ok(Transition::new(next.clone(), Some(event), "Back to cart"))
}

fn resolve_payment(next: &mut Snapshot, sale_id: SaleId, outcome: PaymentOutcome) -> TransitionResult {
    if next.active_sale_id != sale_id
        || next.flow.stage != Stage::Processing
        || next.flow.payment_state != PaymentState::Processing
    {
        return Err(Rejection::StalePayment);
    }
    let (payment_state, status) = match outcome {
        PaymentOutcome::Success => (PaymentState::Approved, "Payment approved"),
        PaymentOutcome::Fail => (PaymentState::Declined, "Payment declined"),
        PaymentOutcome::Timeout => (PaymentState::Timeout, "Payment timed out"),
    };
    next.flow.stage = Stage::Result;
    next.flow.payment_state = payment_state;
    let event = EventPayload::PaymentResult {
        sale_id,
        payment_state,
        total: next.cart.total,
    };
    Ok(Transition::new(next.clone(), Some(event), status))
}

/// Start (or retry) issuance for an approved sale.
///
/// With the network toggle down no backend call is made: the follow-up is an
/// immediate failure flagged as a network failure, so any permitted paper
/// fallback is printed with reason NETWORK rather than ISSUANCE_FAIL.
fn issue(next: &mut Snapshot, retry: bool) -> TransitionResult {
    if next.flow.payment_state != PaymentState::Approved {
        return Err(Rejection::PaymentNotApproved);
    }
    match (next.flow.issuance_state, retry) {
        (IssuanceState::Idle, false) | (IssuanceState::Failed, true) => {}
        (IssuanceState::Idle, true) => return Err(Rejection::NothingToRetry),
        (state, _) => return Err(Rejection::IssuanceNotIdle(state)),
    }

    let sale_id = next.active_sale_id;
    next.flow.issuance_state = IssuanceState::Ingesting;
    next.receipt = None;
    next.scan = Scan::default();
    let event = EventPayload::ReceiptIssuanceStarted {
        sale_id,
        total: next.cart.total,
    };
    let transition = Transition::new(next.clone(), Some(event), "Issuing receipt");

    let effect = if next.toggles.network_mode == NetworkMode::Down {
        Effect::FollowUp(Intent::IssuanceFailed {
            sale_id,
            message: "Network unavailable".to_string(),
            code: Some("NETWORK_DOWN".to_string()),
            network: true,
        })
    } else if next.toggles.issuance_mode == IssuanceMode::Fail {
        Effect::FollowUp(Intent::IssuanceFailed {
            sale_id,
            message: "Issuance failure simulated".to_string(),
            code: Some("ISSUANCE_SIMULATED_FAIL".to_string()),
            network: false,
        })
    } else {
        Effect::CallIssuer { sale_id }
    };
    Ok(transition.with_effect(effect))
}

fn admit_issuance_result(next: &Snapshot, sale_id: SaleId) -> Result<(), Rejection> {
    if next.active_sale_id != sale_id || next.flow.issuance_state != IssuanceState::Ingesting {
        return Err(Rejection::StaleIssuance);
    }
    Ok(())
}

fn issuance_succeeded(
    next: &mut Snapshot,
    sale_id: SaleId,
    receipt: Receipt,
    now: DateTime<Utc>,
) -> TransitionResult {
    admit_issuance_result(next, sale_id)?;
    let event = EventPayload::ReceiptTokenReady {
        sale_id,
        token_id: receipt.token_id.clone(),
        public_url: receipt.public_url.clone(),
    };
    next.flow.issuance_state = IssuanceState::TokenReady;
    next.receipt = Some(receipt);
    next.scan = Scan {
        state: ScanState::Pending,
        updated_at: Some(now),
    };
    Ok(Transition::new(next.clone(), Some(event), "Receipt ready"))
}

fn issuance_failed(
    next: &mut Snapshot,
    sale_id: SaleId,
    message: String,
    code: Option<String>,
    network: bool,
) -> TransitionResult {
    admit_issuance_result(next, sale_id)?;
    next.flow.issuance_state = IssuanceState::Failed;
    let status = format!("Issuance failed: {message}");
    let event = EventPayload::ReceiptIssuanceFailed {
        sale_id,
        message,
        code,
    };
    let mut transition = Transition::new(next.clone(), Some(event), status);
    if check_fallback_permitted(next).is_ok() {
        let reason = if network {
            FallbackReason::Network
        } else {
            FallbackReason::IssuanceFail
        };
        transition = transition.with_effect(Effect::FollowUp(Intent::PrintFallback(reason)));
    }
    Ok(transition)
}

fn scanned(
    next: &mut Snapshot,
    outcome: ScanOutcome,
    token_id: Option<String>,
    now: DateTime<Utc>,
) -> TransitionResult {
    if next.scan.state != ScanState::Pending {
        return Err(Rejection::ScanNotPending);
    }
    if let (Some(scanned), Some(receipt)) = (token_id.as_deref(), next.receipt.as_ref()) {
        if scanned != receipt.token_id {
            return Err(Rejection::ScanTokenMismatch);
        }
    }
    let (state, status) = match outcome {
        ScanOutcome::Success => (ScanState::Success, "Receipt scanned"),
        ScanOutcome::Fail => (ScanState::Fail, "Scan failed"),
    };
    next.scan = Scan {
        state,
        updated_at: Some(now),
    };
    let mut transition = Transition::new(next.clone(), None, status);
    if outcome == ScanOutcome::Fail && check_fallback_permitted(next).is_ok() {
        transition = transition.with_effect(Effect::FollowUp(Intent::PrintFallback(
            FallbackReason::ScanFail,
        )));
    }
    Ok(transition)
}

fn print_fallback(next: &mut Snapshot, reason: FallbackReason, now: DateTime<Utc>) -> TransitionResult {
    check_fallback_permitted(next)?;
    next.fallback = Fallback {
        printed: true,
        reason: Some(reason),
        printed_at: Some(now),
    };
    if matches!(
        next.flow.issuance_state,
        IssuanceState::Idle | IssuanceState::Failed
    ) {
        next.flow.issuance_state = IssuanceState::FallbackPrinted;
    }
    let event = EventPayload::FallbackPrinted {
        sale_id: next.active_sale_id,
        reason,
    };
    Ok(Transition::new(next.clone(), Some(event), "Paper receipt printed"))
}

fn new_sale(next: &mut Snapshot, reset: bool) -> Transition {
    let previous_sale_id = next.active_sale_id;
    let sale_id = SaleId::new();
    next.active_sale_id = sale_id;
    next.cart = Cart::empty(next.cart.currency.clone());
    next.flow = Flow::fresh_sale();
    next.receipt = None;
    next.scan = Scan::default();
    next.fallback = Fallback::default();
    let (event, status) = if reset {
        next.toggles = Toggles::default();
        (
            EventPayload::ResetRequested {
                sale_id,
                previous_sale_id,
            },
            "Terminal reset",
        )
    } else {
        (
            EventPayload::NewSaleStarted {
                sale_id,
                previous_sale_id,
            },
            "New sale started",
        )
    };
    Transition::new(next.clone(), Some(event), status)
        .with_effect(Effect::CancelPaymentTimer)
        .with_effect(Effect::ResetIssuanceGuard)
}

#[cfg(test)]
mod tests;
