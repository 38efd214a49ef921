//! Adapters for the Receipt Gateway ports

pub mod http;
pub mod scripted;

pub use http::{HttpReceiptGateway, CONSUME_PATH, ISSUE_PATH, VALIDATE_PATH};
pub use scripted::ScriptedIssuer;
