//! # Session State Machine (rl-01)
//!
//! Computes the next `Snapshot` from the current one plus one admitted
//! intent, and decides which event (zero or one) to emit.
//!
//! ## Nested Machines
//!
//! | Machine | States |
//! |---------|--------|
//! | Stage | `BOOT → CART ⇄ CHECKOUT → PROCESSING → RESULT` |
//! | Payment | `IDLE → INITIATED → PROCESSING → {APPROVED, DECLINED, TIMEOUT, NETWORK_ERROR}` |
//! | Issuance | `IDLE → INGESTING → {TOKEN_READY, FAILED}`, marker `FALLBACK_PRINTED` |
//! | Scan | `NONE → PENDING → {SUCCESS, FAIL}` |
//!
//! ## Fallback Print Policy
//!
//! Permitted iff the print toggle is enabled, the payment was approved and
//! no paper receipt was printed for the sale yet.
//!
//! ## Crate Structure
//!
//! - `domain/` - Cart arithmetic, fallback policy, payment timing
//! - `intent.rs` - Operator, viewer and background intents
//! - `machine.rs` - `SessionMachine::apply` and the effects it requests

pub mod domain;
pub mod error;
pub mod intent;
pub mod machine;

pub use domain::{auto_issue_due, check_fallback_permitted, PaymentTiming};
pub use error::Rejection;
pub use intent::Intent;
pub use machine::{Effect, SessionMachine, Transition, TransitionResult};
