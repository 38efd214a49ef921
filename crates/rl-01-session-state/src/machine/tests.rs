use super::*;
use crate::domain::policy::auto_issue_due;
use shared_types::{
    CatalogItem, EventType, Money, PrintFallbackMode, SessionId, TerminalIdentity,
};

fn machine() -> SessionMachine {
    SessionMachine::default()
}

fn boot() -> Snapshot {
    Snapshot::initial(
        SessionId::new(),
        TerminalIdentity {
            retailer_id: "acme".into(),
            store_id: "store-01".into(),
            terminal_id: "till-3".into(),
        },
        "EUR",
        Utc::now(),
    )
}

fn bread() -> CatalogItem {
    CatalogItem {
        sku: "BRD-001".into(),
        name: "Sourdough".into(),
        unit_price: Money::from_major(1.20),
        vat_rate: 0.23,
    }
}

fn step(snapshot: &Snapshot, intent: Intent) -> Transition {
    machine()
        .apply(snapshot, intent, Utc::now())
        .expect("intent admitted")
}

fn with_item() -> Snapshot {
    step(
        &boot(),
        Intent::AddItem {
            item: bread(),
            quantity: 1,
        },
    )
    .snapshot
}

fn processing() -> (Snapshot, PaymentOutcome) {
    let t = step(&with_item(), Intent::Pay);
    match t.effects.as_slice() {
        [Effect::SchedulePaymentResolution { outcome, .. }] => (t.snapshot, *outcome),
        other => panic!("unexpected effects {other:?}"),
    }
}

fn approved() -> Snapshot {
    let (s, outcome) = processing();
    step(
        &s,
        Intent::PaymentResolved {
            sale_id: s.active_sale_id,
            outcome,
        },
    )
    .snapshot
}

fn ingesting() -> Snapshot {
    step(&approved(), Intent::IssueReceipt).snapshot
}

fn receipt() -> Receipt {
    Receipt {
        token_id: "tok_123".into(),
        public_url: "https://r.example/r/tok_123".into(),
        qr_url: "https://r.example/qr/tok_123".into(),
        preview_url: "https://r.example/p/tok_123".into(),
    }
}

fn token_ready() -> Snapshot {
    let s = ingesting();
    step(
        &s,
        Intent::IssuanceSucceeded {
            sale_id: s.active_sale_id,
            receipt: receipt(),
        },
    )
    .snapshot
}

fn follow_ups(t: &Transition) -> Vec<Intent> {
    t.effects
        .iter()
        .filter_map(|e| match e {
            Effect::FollowUp(i) => Some(i.clone()),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Cart
// =============================================================================

#[test]
fn test_first_item_leaves_boot_with_exact_amounts() {
    let t = step(
        &boot(),
        Intent::AddItem {
            item: bread(),
            quantity: 1,
        },
    );
    let s = &t.snapshot;
    assert_eq!(s.flow.stage, Stage::Cart);
    assert_eq!(s.cart.items[0].line_total, Money::from_cents(120));
    assert_eq!(s.cart.items[0].vat_amount, Money::from_cents(28));
    assert_eq!(s.cart.subtotal, Money::from_cents(120));
    assert_eq!(s.cart.vat_total, Money::from_cents(28));
    assert_eq!(s.cart.total, Money::from_cents(148));
    assert_eq!(s.revision, 1);
    assert!(matches!(
        t.event,
        Some(EventPayload::CartUpdated { line_no: 1, quantity: 1, .. })
    ));
}

#[test]
fn test_cart_edits_rejected_while_processing_and_after_result() {
    let (s, _) = processing();
    for intent in [
        Intent::AddItem {
            item: bread(),
            quantity: 1,
        },
        Intent::IncrementItem { line_no: 1 },
        Intent::DecrementItem { line_no: 1 },
        Intent::ClearCart,
    ] {
        assert_eq!(
            machine().apply(&s, intent, Utc::now()).unwrap_err(),
            Rejection::PaymentInProgress
        );
    }
    let closed = approved();
    assert_eq!(
        machine()
            .apply(&closed, Intent::ClearCart, Utc::now())
            .unwrap_err(),
        Rejection::SaleClosed
    );
}

#[test]
fn test_clear_cart_keeps_stage_and_emits_cleared() {
    let t = step(&with_item(), Intent::ClearCart);
    assert_eq!(t.snapshot.flow.stage, Stage::Cart);
    assert!(t.snapshot.cart.items.is_empty());
    assert_eq!(t.snapshot.cart.total, Money::ZERO);
    assert!(matches!(
        t.event,
        Some(EventPayload::CartCleared { removed_lines: 1, .. })
    ));
}

// =============================================================================
// Checkout and payment
// =============================================================================

#[test]
fn test_checkout_rejected_for_empty_cart() {
    let mut s = boot();
    s.flow.stage = Stage::Cart;
    assert_eq!(
        machine().apply(&s, Intent::Checkout, Utc::now()).unwrap_err(),
        Rejection::CartEmpty
    );
    assert_eq!(
        machine().apply(&s, Intent::Pay, Utc::now()).unwrap_err(),
        Rejection::CartEmpty
    );
}

#[test]
fn test_checkout_then_back_to_cart() {
    let t = step(&with_item(), Intent::Checkout);
    assert_eq!(t.snapshot.flow.stage, Stage::Checkout);
    assert_eq!(t.snapshot.flow.payment_state, PaymentState::Initiated);
    assert_eq!(t.event.as_ref().map(EventPayload::event_type), Some(EventType::CheckoutInitiated));

    let back = step(&t.snapshot, Intent::BackToCart);
    assert_eq!(back.snapshot.flow.stage, Stage::Cart);
    assert_eq!(back.snapshot.flow.payment_state, PaymentState::Idle);
    assert!(matches!(
        back.event,
        Some(EventPayload::StageChanged {
            from: Stage::Checkout,
            to: Stage::Cart,
            ..
        })
    ));
}

#[test]
fn test_emptying_cart_during_checkout_returns_to_cart() {
    let checkout = step(&with_item(), Intent::Checkout).snapshot;
    for intent in [
        Intent::RemoveItem { line_no: 1 },
        Intent::DecrementItem { line_no: 1 },
        Intent::ClearCart,
    ] {
        let t = step(&checkout, intent.clone());
        assert!(t.snapshot.cart.items.is_empty(), "{intent:?}");
        assert_eq!(t.snapshot.flow.stage, Stage::Cart, "{intent:?}");
        assert_eq!(t.snapshot.flow.payment_state, PaymentState::Idle, "{intent:?}");
        assert_eq!(
            machine().apply(&t.snapshot, Intent::Pay, Utc::now()).unwrap_err(),
            Rejection::CartEmpty
        );
    }
}

#[test]
fn test_partial_edit_during_checkout_stays_in_checkout() {
    let two = step(
        &with_item(),
        Intent::AddItem {
            item: bread(),
            quantity: 1,
        },
    )
    .snapshot;
    let checkout = step(&two, Intent::Checkout).snapshot;
    let t = step(&checkout, Intent::DecrementItem { line_no: 1 });
    assert!(!t.snapshot.cart.items.is_empty());
    assert_eq!(t.snapshot.flow.stage, Stage::Checkout);
    assert_eq!(t.snapshot.flow.payment_state, PaymentState::Initiated);
}

#[test]
fn test_back_to_cart_rejected_while_processing() {
    let (s, _) = processing();
    assert_eq!(
        machine().apply(&s, Intent::BackToCart, Utc::now()).unwrap_err(),
        Rejection::PaymentInProgress
    );
}

#[test]
fn test_pay_schedules_resolution_with_toggle_delay() {
    let mut s = with_item();
    s.toggles.network_mode = NetworkMode::Slow;
    s.toggles.payment_outcome = PaymentOutcome::Timeout;
    let t = step(&s, Intent::Pay);
    assert_eq!(t.snapshot.flow.stage, Stage::Processing);
    assert_eq!(t.snapshot.flow.payment_state, PaymentState::Processing);
    assert_eq!(
        t.effects,
        vec![Effect::SchedulePaymentResolution {
            sale_id: s.active_sale_id,
            outcome: PaymentOutcome::Timeout,
            delay: Duration::from_millis(10_350),
        }]
    );
}

#[test]
fn test_pay_with_network_down_is_immediate_and_prints_nothing() {
    let mut s = with_item();
    s.toggles.network_mode = NetworkMode::Down;
    let t = step(&s, Intent::Pay);
    assert_eq!(t.snapshot.flow.stage, Stage::Result);
    assert_eq!(t.snapshot.flow.payment_state, PaymentState::NetworkError);
    assert!(t.effects.is_empty());
    assert!(!t.snapshot.fallback.printed);
    assert!(!auto_issue_due(&t.snapshot));
}

#[test]
fn test_payment_outcomes() {
    for (outcome, expected) in [
        (PaymentOutcome::Success, PaymentState::Approved),
        (PaymentOutcome::Fail, PaymentState::Declined),
        (PaymentOutcome::Timeout, PaymentState::Timeout),
    ] {
        let (s, _) = processing();
        let t = step(
            &s,
            Intent::PaymentResolved {
                sale_id: s.active_sale_id,
                outcome,
            },
        );
        assert_eq!(t.snapshot.flow.stage, Stage::Result);
        assert_eq!(t.snapshot.flow.payment_state, expected);
        assert_eq!(
            auto_issue_due(&t.snapshot),
            expected == PaymentState::Approved
        );
    }
}

#[test]
fn test_stale_payment_after_new_sale_is_discarded() {
    let (s, outcome) = processing();
    let old_sale = s.active_sale_id;
    let fresh = step(&s, Intent::NewSale);
    assert!(fresh.effects.contains(&Effect::CancelPaymentTimer));

    let err = machine()
        .apply(
            &fresh.snapshot,
            Intent::PaymentResolved {
                sale_id: old_sale,
                outcome,
            },
            Utc::now(),
        )
        .unwrap_err();
    assert!(err.is_stale());
}

#[test]
fn test_back_to_cart_from_declined_result_allows_retry() {
    let (s, _) = processing();
    let declined = step(
        &s,
        Intent::PaymentResolved {
            sale_id: s.active_sale_id,
            outcome: PaymentOutcome::Fail,
        },
    )
    .snapshot;
    let back = step(&declined, Intent::BackToCart).snapshot;
    assert_eq!(back.flow.stage, Stage::Cart);
    assert_eq!(back.flow.payment_state, PaymentState::Idle);
    assert_eq!(back.cart.items.len(), 1);

    assert_eq!(
        machine()
            .apply(&approved(), Intent::BackToCart, Utc::now())
            .unwrap_err(),
        Rejection::PaymentAlreadyApproved
    );
}

// =============================================================================
// Issuance
// =============================================================================

#[test]
fn test_issue_requires_approval() {
    assert_eq!(
        machine()
            .apply(&with_item(), Intent::IssueReceipt, Utc::now())
            .unwrap_err(),
        Rejection::PaymentNotApproved
    );
}

#[test]
fn test_issue_calls_backend_once() {
    let s = approved();
    let t = step(&s, Intent::IssueReceipt);
    assert_eq!(t.snapshot.flow.issuance_state, IssuanceState::Ingesting);
    assert_eq!(
        t.effects,
        vec![Effect::CallIssuer {
            sale_id: s.active_sale_id
        }]
    );
    assert_eq!(
        machine()
            .apply(&t.snapshot, Intent::IssueReceipt, Utc::now())
            .unwrap_err(),
        Rejection::IssuanceNotIdle(IssuanceState::Ingesting)
    );
}

#[test]
fn test_token_ready_sets_scan_pending() {
    let s = token_ready();
    assert_eq!(s.flow.issuance_state, IssuanceState::TokenReady);
    assert_eq!(s.scan.state, ScanState::Pending);
    assert_eq!(s.receipt, Some(receipt()));
    assert_eq!(
        machine()
            .apply(&s, Intent::IssueReceipt, Utc::now())
            .unwrap_err(),
        Rejection::IssuanceNotIdle(IssuanceState::TokenReady)
    );
}

#[test]
fn test_issuance_failure_triggers_fallback_when_permitted() {
    let s = ingesting();
    let t = step(
        &s,
        Intent::IssuanceFailed {
            sale_id: s.active_sale_id,
            message: "backend returned 502".into(),
            code: Some("UPSTREAM_502".into()),
            network: false,
        },
    );
    assert_eq!(t.snapshot.flow.issuance_state, IssuanceState::Failed);
    assert_eq!(t.status, "Issuance failed: backend returned 502");
    assert_eq!(
        follow_ups(&t),
        vec![Intent::PrintFallback(FallbackReason::IssuanceFail)]
    );

    let printed = step(&t.snapshot, Intent::PrintFallback(FallbackReason::IssuanceFail));
    assert_eq!(
        printed.snapshot.flow.issuance_state,
        IssuanceState::FallbackPrinted
    );
    assert!(printed.snapshot.fallback.printed);
    assert_eq!(
        printed.snapshot.fallback.reason,
        Some(FallbackReason::IssuanceFail)
    );
    assert_eq!(
        machine()
            .apply(&printed.snapshot, Intent::RetryIssuance, Utc::now())
            .unwrap_err(),
        Rejection::IssuanceNotIdle(IssuanceState::FallbackPrinted)
    );
}

#[test]
fn test_issuance_failure_without_fallback_allows_retry() {
    let mut s = approved();
    s.toggles.print_fallback = PrintFallbackMode::Disabled;
    s.toggles.issuance_mode = IssuanceMode::Fail;
    let started = step(&s, Intent::IssueReceipt);
    let failed_intent = follow_ups(&started).pop().expect("forced failure");
    let failed = step(&started.snapshot, failed_intent);
    assert!(follow_ups(&failed).is_empty());
    assert_eq!(failed.snapshot.flow.issuance_state, IssuanceState::Failed);

    let mut retry_from = failed.snapshot;
    retry_from.toggles.issuance_mode = IssuanceMode::Live;
    let retried = step(&retry_from, Intent::RetryIssuance);
    assert_eq!(retried.snapshot.flow.issuance_state, IssuanceState::Ingesting);
    assert!(matches!(retried.effects[..], [Effect::CallIssuer { .. }]));
}

#[test]
fn test_network_down_issuance_falls_back_with_network_reason() {
    let mut s = approved();
    s.toggles.network_mode = NetworkMode::Down;
    let started = step(&s, Intent::IssueReceipt);
    assert!(!started
        .effects
        .iter()
        .any(|e| matches!(e, Effect::CallIssuer { .. })));
    let failed = step(&started.snapshot, follow_ups(&started).remove(0));
    assert_eq!(
        follow_ups(&failed),
        vec![Intent::PrintFallback(FallbackReason::Network)]
    );

    let printed = step(&failed.snapshot, follow_ups(&failed).remove(0));
    assert!(printed.snapshot.fallback.printed);
    assert_eq!(printed.snapshot.fallback.reason, Some(FallbackReason::Network));
}

#[test]
fn test_late_issuance_result_after_new_sale_is_stale() {
    let s = ingesting();
    let sale = s.active_sale_id;
    let fresh = step(&s, Intent::NewSale).snapshot;
    let err = machine()
        .apply(
            &fresh,
            Intent::IssuanceSucceeded {
                sale_id: sale,
                receipt: receipt(),
            },
            Utc::now(),
        )
        .unwrap_err();
    assert_eq!(err, Rejection::StaleIssuance);
}

// =============================================================================
// Scan and fallback
// =============================================================================

#[test]
fn test_scan_success() {
    let t = step(
        &token_ready(),
        Intent::Scanned {
            outcome: ScanOutcome::Success,
            token_id: Some("tok_123".into()),
        },
    );
    assert_eq!(t.snapshot.scan.state, ScanState::Success);
    assert!(t.event.is_none());
    assert!(t.effects.is_empty());
}

#[test]
fn test_scan_fail_prints_and_keeps_token_ready() {
    let t = step(
        &token_ready(),
        Intent::Scanned {
            outcome: ScanOutcome::Fail,
            token_id: None,
        },
    );
    assert_eq!(t.snapshot.scan.state, ScanState::Fail);
    let print = follow_ups(&t).remove(0);
    assert_eq!(print, Intent::PrintFallback(FallbackReason::ScanFail));

    let printed = step(&t.snapshot, print).snapshot;
    assert!(printed.fallback.printed);
    assert_eq!(printed.flow.issuance_state, IssuanceState::TokenReady);
}

#[test]
fn test_scan_rejected_when_not_pending_or_wrong_token() {
    assert_eq!(
        machine()
            .apply(
                &approved(),
                Intent::Scanned {
                    outcome: ScanOutcome::Success,
                    token_id: None
                },
                Utc::now()
            )
            .unwrap_err(),
        Rejection::ScanNotPending
    );
    assert_eq!(
        machine()
            .apply(
                &token_ready(),
                Intent::Scanned {
                    outcome: ScanOutcome::Success,
                    token_id: Some("tok_other".into())
                },
                Utc::now()
            )
            .unwrap_err(),
        Rejection::ScanTokenMismatch
    );
}

#[test]
fn test_fallback_printed_at_most_once_per_sale() {
    let s = approved();
    let printed = step(&s, Intent::PrintFallback(FallbackReason::CustomerRequest)).snapshot;
    assert_eq!(printed.flow.issuance_state, IssuanceState::FallbackPrinted);
    let err = machine()
        .apply(
            &printed,
            Intent::PrintFallback(FallbackReason::CustomerRequest),
            Utc::now(),
        )
        .unwrap_err();
    assert_eq!(err, Rejection::AlreadyPrinted);
}

#[test]
fn test_fallback_requires_approved_payment() {
    assert_eq!(
        machine()
            .apply(
                &with_item(),
                Intent::PrintFallback(FallbackReason::CustomerRequest),
                Utc::now()
            )
            .unwrap_err(),
        Rejection::PaymentNotApproved
    );
}

// =============================================================================
// New sale, reset, toggles
// =============================================================================

#[test]
fn test_new_sale_resets_everything_but_toggles() {
    let mut s = token_ready();
    s.toggles.network_mode = NetworkMode::Slow;
    let previous = s.active_sale_id;
    let t = step(&s, Intent::NewSale);
    let n = &t.snapshot;
    assert_ne!(n.active_sale_id, previous);
    assert!(n.cart.items.is_empty());
    assert_eq!(n.cart.currency, "EUR");
    assert_eq!(n.flow, Flow::fresh_sale());
    assert!(n.receipt.is_none());
    assert_eq!(n.scan, Scan::default());
    assert_eq!(n.fallback, Fallback::default());
    assert_eq!(n.toggles.network_mode, NetworkMode::Slow);
    assert!(t.effects.contains(&Effect::ResetIssuanceGuard));
    assert!(matches!(
        t.event,
        Some(EventPayload::NewSaleStarted { previous_sale_id, .. }) if previous_sale_id == previous
    ));
}

#[test]
fn test_reset_restores_default_toggles() {
    let mut s = with_item();
    s.toggles.payment_outcome = PaymentOutcome::Fail;
    let t = step(&s, Intent::Reset);
    assert_eq!(t.snapshot.toggles, Toggles::default());
    assert_eq!(
        t.event.as_ref().map(EventPayload::event_type),
        Some(EventType::ResetRequested)
    );
}

#[test]
fn test_set_toggles_emits_no_event() {
    let toggles = Toggles {
        payment_outcome: PaymentOutcome::Fail,
        ..Toggles::default()
    };
    let t = step(&boot(), Intent::SetToggles(toggles));
    assert!(t.event.is_none());
    assert_eq!(t.snapshot.toggles, toggles);
    assert_eq!(t.snapshot.flow.stage, Stage::Boot);
}

#[test]
fn test_rejection_leaves_revision_untouched() {
    let s = boot();
    assert!(machine().apply(&s, Intent::Checkout, Utc::now()).is_err());
    assert_eq!(s.revision, 0);
    let t = step(&s, Intent::SetToggles(Toggles::default()));
    assert_eq!(t.snapshot.revision, 1);
}
