//! # Demo Flow
//!
//! Drives one sale end to end the way an operator and a customer display
//! would: add items → checkout → pay → wait for the result and the receipt
//! (or the paper fallback) → scan.

use crate::host::{HostResult, IntentReply, SessionHealth, SessionHost};
use crate::viewer::CustomerViewer;
use rl_01_session_state::Intent;
use shared_types::{
    CatalogItem, Event, IssuanceState, Money, PaymentState, PrintFallbackMode, ScanOutcome,
    ScanState, Session, SessionMode, Snapshot, Stage,
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Viewer id used by the demo customer display.
pub const DEMO_VIEWER_ID: &str = "customer-display";

/// What the demo run ended with.
#[derive(Debug, Clone)]
pub struct DemoReport {
    pub session: Session,
    pub customer_url: String,
    /// Status line of every operator intent, in order.
    pub statuses: Vec<String>,
    /// Final view of the customer display.
    pub final_view: Snapshot,
    pub health: SessionHealth,
    pub history: Vec<Event>,
    /// The deadline passed before the sale settled.
    pub timed_out: bool,
}

/// A tiny fixed basket.
pub fn demo_basket() -> Vec<(CatalogItem, u32)> {
    vec![
        (
            CatalogItem {
                sku: "MILK-1L".to_string(),
                name: "Milk 1L".to_string(),
                unit_price: Money::from_cents(120),
                vat_rate: 0.23,
            },
            1,
        ),
        (
            CatalogItem {
                sku: "BREAD-500".to_string(),
                name: "Sourdough 500g".to_string(),
                unit_price: Money::from_cents(289),
                vat_rate: 0.06,
            },
            2,
        ),
    ]
}

/// The sale reached a point where nothing more happens without the customer.
pub fn is_settled(view: &Snapshot) -> bool {
    if view.flow.stage != Stage::Result {
        return false;
    }
    if view.flow.payment_state != PaymentState::Approved {
        return true;
    }
    match view.flow.issuance_state {
        IssuanceState::TokenReady => view.scan.state != ScanState::Pending,
        // A failure is followed by the paper fallback when printing is on.
        IssuanceState::Failed => {
            view.fallback.printed || view.toggles.print_fallback == PrintFallbackMode::Disabled
        }
        IssuanceState::FallbackPrinted => true,
        IssuanceState::Idle | IssuanceState::Ingesting => view.fallback.printed,
    }
}

/// Run one sale on a fresh session and close it.
pub async fn run_demo(host: &SessionHost, deadline: Duration) -> HostResult<DemoReport> {
    let created = host.create_default_session(SessionMode::Grocery).await?;
    let session_id = created.session.session_id;
    info!(
        %session_id,
        code = %created.session.session_code,
        url = %created.customer_url,
        "Demo session started"
    );

    let mut viewer = CustomerViewer::connect(host.ports(), session_id, DEMO_VIEWER_ID).await?;
    let handle = created.handle.clone();
    let mut statuses = Vec::new();

    let mut record = |reply: IntentReply| {
        if !reply.applied {
            warn!(%session_id, status = %reply.status, "Demo intent refused");
        }
        statuses.push(reply.status);
    };
    for (item, quantity) in demo_basket() {
        record(handle.dispatch(Intent::AddItem { item, quantity }).await?);
    }
    record(handle.dispatch(Intent::Checkout).await?);
    record(handle.dispatch(Intent::Pay).await?);

    let until = Instant::now() + deadline;
    let mut scanned = false;
    let mut timed_out = false;
    loop {
        if viewer.view().scan.state == ScanState::Pending && !scanned {
            scanned = true;
            viewer.report_scan(ScanOutcome::Success).await?;
        }
        if is_settled(viewer.view()) {
            break;
        }
        match tokio::time::timeout_at(until, viewer.next_update()).await {
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(_) => {
                warn!(%session_id, "Demo deadline passed before the sale settled");
                timed_out = true;
                break;
            }
        }
    }

    let history = viewer.history(None).await?;
    let report = DemoReport {
        session: created.session,
        customer_url: created.customer_url,
        statuses,
        final_view: viewer.view().clone(),
        health: handle.health(),
        history,
        timed_out,
    };
    host.close_session(session_id).await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared_types::{Receipt, SessionId, TerminalIdentity};

    fn result_view(payment: PaymentState, issuance: IssuanceState) -> Snapshot {
        let mut s = Snapshot::initial(
            SessionId::new(),
            TerminalIdentity {
                retailer_id: "r".into(),
                store_id: "s".into(),
                terminal_id: "t".into(),
            },
            "EUR",
            Utc::now(),
        );
        s.flow.stage = Stage::Result;
        s.flow.payment_state = payment;
        s.flow.issuance_state = issuance;
        s
    }

    #[test]
    fn test_settled_rules() {
        assert!(is_settled(&result_view(PaymentState::Declined, IssuanceState::Idle)));
        assert!(!is_settled(&result_view(PaymentState::Approved, IssuanceState::Ingesting)));

        let mut failed = result_view(PaymentState::Approved, IssuanceState::Failed);
        assert!(!is_settled(&failed));
        failed.fallback.printed = true;
        assert!(is_settled(&failed));

        let mut ready = result_view(PaymentState::Approved, IssuanceState::TokenReady);
        ready.receipt = Some(Receipt {
            token_id: "tok_1".into(),
            public_url: "u".into(),
            qr_url: "q".into(),
            preview_url: "p".into(),
        });
        ready.scan.state = ScanState::Pending;
        assert!(!is_settled(&ready));
        ready.scan.state = ScanState::Success;
        assert!(is_settled(&ready));
    }

    #[test]
    fn test_basket_total() {
        let total: Money = demo_basket()
            .iter()
            .map(|(item, qty)| {
                let line = item.unit_price.times(*qty);
                line + line.apply_rate(item.vat_rate)
            })
            .sum();
        // 1.20 + 0.28 + 5.78 + 0.35
        assert_eq!(total, Money::from_cents(761));
    }
}
