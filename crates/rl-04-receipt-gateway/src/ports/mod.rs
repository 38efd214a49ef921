//! Ports for the Receipt Gateway

pub mod outbound;

pub use outbound::{ReceiptIssuer, ReceiptVerifier};
