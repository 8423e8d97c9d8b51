//! Common types and utilities for the freshness-validated Data-Centric
//! Networking (fvDN) implementation.
//!
//! This crate provides the packet model, wire encoding, identifiers and
//! metrics shared by the forwarding core and the host applications.

pub mod error;
pub mod metrics;
pub mod ndn;
pub mod tlv;
pub mod types;

/// Reexport of common types
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
