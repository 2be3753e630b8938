//! Field helpers over the Pallas base field.

use ff::{FromUniformBytes, PrimeField};
use seatbind_types::IdentityCommitment;
use sha2::{Digest, Sha512};

use crate::error::{CircuitError, CircuitResult};

/// Scalar field of every circuit in this crate.
pub use pasta_curves::Fp as Fr;

/// Canonical little-endian encoding.
#[must_use]
pub fn to_bytes(value: &Fr) -> [u8; 32] {
    value.to_repr()
}

/// Decodes a canonical little-endian encoding.
pub fn from_bytes(bytes: &[u8; 32]) -> Option<Fr> {
    Option::from(Fr::from_repr(*bytes))
}

/// Maps arbitrary data to a uniformly distributed field element.
#[must_use]
pub fn hash_to_field(domain: &[u8], data: &[u8]) -> Fr {
    let mut hasher = Sha512::new();
    hasher.update((domain.len() as u64).to_le_bytes());
    hasher.update(domain);
    hasher.update(data);
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hasher.finalize());
    Fr::from_uniform_bytes(&wide)
}

#[must_use]
pub fn commitment_from_field(value: &Fr) -> IdentityCommitment {
    IdentityCommitment::from_bytes(to_bytes(value))
}

pub fn field_from_commitment(commitment: &IdentityCommitment) -> CircuitResult<Fr> {
    from_bytes(commitment.as_bytes()).ok_or(CircuitError::InvalidCommitment)
}

/// Returns the low `n` bits of `value`, least significant first.
pub(crate) fn low_bits(value: &Fr, n: usize) -> Vec<bool> {
    let repr = value.to_repr();
    (0..n)
        .map(|i| i < 256 && (repr[i / 8] >> (i % 8)) & 1 == 1)
        .collect()
}
