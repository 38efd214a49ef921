//! Fallback-print and auto-issuance predicates.

use crate::error::Rejection;
use shared_types::{IssuanceState, PaymentState, PrintFallbackMode, Snapshot, Stage};

/// Printing is permitted iff the toggle is enabled, payment was approved
/// and nothing was printed for this sale yet.
pub fn check_fallback_permitted(snapshot: &Snapshot) -> Result<(), Rejection> {
    if snapshot.toggles.print_fallback == PrintFallbackMode::Disabled {
        return Err(Rejection::PrintingDisabled);
    }
    if snapshot.flow.payment_state != PaymentState::Approved {
        return Err(Rejection::PaymentNotApproved);
    }
    if snapshot.fallback.printed {
        return Err(Rejection::AlreadyPrinted);
    }
    Ok(())
}

/// The host fires issuance exactly when this first becomes true.
pub fn auto_issue_due(snapshot: &Snapshot) -> bool {
    snapshot.flow.stage == Stage::Result
        && snapshot.flow.payment_state == PaymentState::Approved
        && snapshot.flow.issuance_state == IssuanceState::Idle
        && snapshot.receipt.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared_types::{FallbackReason, SessionId, TerminalIdentity};

    fn approved() -> Snapshot {
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
        s.flow.payment_state = PaymentState::Approved;
        s
    }

    #[test]
    fn test_policy_requires_all_three() {
        let mut s = approved();
        assert!(check_fallback_permitted(&s).is_ok());

        s.toggles.print_fallback = PrintFallbackMode::Disabled;
        assert_eq!(check_fallback_permitted(&s), Err(Rejection::PrintingDisabled));

        let mut s = approved();
        s.flow.payment_state = PaymentState::Declined;
        assert_eq!(check_fallback_permitted(&s), Err(Rejection::PaymentNotApproved));

        let mut s = approved();
        s.fallback.printed = true;
        s.fallback.reason = Some(FallbackReason::ScanFail);
        assert_eq!(check_fallback_permitted(&s), Err(Rejection::AlreadyPrinted));
    }

    #[test]
    fn test_auto_issue_predicate() {
        let mut s = approved();
        assert!(auto_issue_due(&s));
        s.flow.issuance_state = IssuanceState::Ingesting;
        assert!(!auto_issue_due(&s));
        let mut s = approved();
        s.flow.stage = Stage::Processing;
        assert!(!auto_issue_due(&s));
    }
}
