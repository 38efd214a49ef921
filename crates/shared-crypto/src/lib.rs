//! # Shared Crypto - Request Signing
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-256 | Request body digest |
//! | `signer` | HMAC-SHA256 | Canonical request signatures |
//!
//! ## Security Properties
//!
//! - **Secret hygiene**: the shared secret is zeroized on drop and never
//!   printed by `Debug`
//! - **Constant-time verification** via `Mac::verify_slice`
//! - **Fresh nonce** per request from the thread-local CSPRNG

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod signer;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{sha256, sha256_hex};
pub use signer::{
    canonical_path, canonical_string, generate_nonce, RequestSigner, SignedHeaders,
    HEADER_BODY_HASH, HEADER_NONCE, HEADER_SIGNATURE, HEADER_TIMESTAMP, SIGNING_VERSION,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
