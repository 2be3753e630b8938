//! Raw hardware identifiers for seatbind device binding.
//!
//! This crate handles:
//! - The `RawIdentifierSet` a client builds for its own device
//! - Best-effort collection of those identifiers from the host
//! - Loading identifier sets from JSON files (provisioning, tests)
//!
//! # Design Principles
//!
//! - **Client-side only**: raw identifiers never leave the device in clear form
//! - **Consumed once**: the set is fed to the attestation circuit, then dropped
//! - **Zeroized**: buffers are wiped on drop and `Debug` output is redacted
//! - **No validation here**: well-formedness is the canonical encoder's job

mod device;
mod error;

pub use device::{IdentifierField, RawIdentifierSet};
pub use error::{DeviceError, DeviceResult};
