//! Identity commitments.
//!
//! A commitment is the canonical 32-byte little-endian encoding of a field
//! element produced by the identity attestation circuit. It is safe to
//! publish: it never reveals the raw identifiers it was derived from.

use crate::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Public hash of a device's validated hardware identifiers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityCommitment([u8; 32]);

impl IdentityCommitment {
    /// The reserved all-zero commitment. Never produced by attestation.
    pub const ZERO: Self = Self([0u8; 32]);

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parses a commitment from a 64-character hex string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let raw = hex::decode(s.trim())?;
        let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| Error::InvalidLength {
            expected: 32,
            actual: raw.len(),
        })?;
        Ok(Self(bytes))
    }

    /// Short prefix used in log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for IdentityCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for IdentityCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityCommitment({}…)", self.short())
    }
}

impl FromStr for IdentityCommitment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for IdentityCommitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for IdentityCommitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
