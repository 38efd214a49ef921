//! Domain layer for the Receipt Gateway

pub mod desk;
pub mod payloads;

pub use desk::{DeskOutcome, FallbackInstruction, VerificationDesk};
pub use payloads::{
    ConsumptionResult, IssueReceiptItem, IssueReceiptRequest, IssueReceiptResponse,
    ValidateReceiptRequest, VerificationResult,
};
