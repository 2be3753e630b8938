//! Device-binding circuits for seatbind.
//!
//! This crate handles:
//! - Canonical encoding of raw hardware identifiers
//! - Identity attestation (identifiers -> public commitment)
//! - Session-key transitions bound to an identity and a license
//! - Recursive aggregation of up to four transitions into one bundle
//! - Parallel proof generation
//!
//! # Proving model
//!
//! Circuits are written against a small rank-1 constraint system with a
//! fixed, data-independent shape per circuit. A [`ProvingBackend`] turns a
//! satisfied constraint system into a portable [`Proof`]; a
//! [`ProofVerifier`] checks a proof against public inputs. Recursive steps
//! verify their child proofs through the same verifier before proving and
//! bind the children's digests into the new proof.

pub mod field;
pub mod gadgets;
pub mod mimc;
pub mod r1cs;

mod bundle;
mod encoder;
mod error;
mod identity;
mod pool;
mod proof;
mod session;

pub use bundle::{
    BundleBuilder, BundleCertificate, BundleSlot, EMPTY_TAG, PUBLIC_INPUTS as BUNDLE_PUBLIC_INPUTS,
    append, base,
};
pub use encoder::{EncodedIdentifiers, FREE_FORM_WIDTH, MAC_WIDTH, UUID_WIDTH, encode};
pub use error::{CircuitError, CircuitResult, EncodeError, FormatIssue};
pub use field::Fr;
pub use identity::{
    IDENTITY_TAG, attest, attest_raw, commitment_of, public_inputs as identity_public_inputs,
    verify_attestation,
};
pub use pool::ProverPool;
pub use proof::{
    AttestationVerifier, AttestingProver, CircuitKind, PROOF_VERSION, Proof, ProofVerifier,
    ProvingBackend,
};
pub use session::{SessionCertificate, SessionPublic, transition};
