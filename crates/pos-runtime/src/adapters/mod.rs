//! # Adapters
//!
//! Production implementations of the store and log ports.

pub mod storage;
