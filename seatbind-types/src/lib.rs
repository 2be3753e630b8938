//! Core type definitions for seatbind.
//!
//! This crate defines the identifiers and value types shared by the circuit
//! layer and the ledger:
//! - Owner, license and action identifiers
//! - Device slot indices (1..=4)
//! - Identity commitments (public, hash-derived device identities)
//!
//! Raw hardware identifiers never appear here; they live only in
//! `seatbind-device` and are consumed by the attestation circuit.

mod commitment;
mod ids;

pub use commitment::IdentityCommitment;
pub use ids::{ActionId, LicenseId, OwnerId, SlotIndex};

/// Fixed fan-in of one aggregation run (devices per bundle).
pub const FAN_IN: usize = 4;

/// Number of device slots each owner holds in the snapshot.
pub const DEVICE_SLOTS: usize = 4;

/// A 64-bit session key. Zero means "no session".
pub type SessionKey = u64;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("slot index {0} out of range (1..=4)")]
    InvalidSlot(u8),
}
