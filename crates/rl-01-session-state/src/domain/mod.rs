//! Domain rules of the session state machine

pub mod cart;
pub mod policy;
pub mod timing;

pub use policy::{auto_issue_due, check_fallback_permitted};
pub use timing::PaymentTiming;
