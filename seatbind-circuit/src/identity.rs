//! Device identity attestation.
//!
//! Proves that a private set of encoded identifiers is well formed and
//! hashes to a public [`IdentityCommitment`]. The identifiers themselves
//! never leave the witness.

use seatbind_device::{IdentifierField, RawIdentifierSet};
use seatbind_types::IdentityCommitment;
use tracing::debug;

use crate::encoder::{self, EncodedIdentifiers};
use crate::error::CircuitResult;
use crate::field::{self, Fr};
use crate::gadgets;
use crate::mimc;
use crate::proof::{CircuitKind, Proof, ProofVerifier, ProvingBackend};
use crate::r1cs::{ConstraintSystem, Variable};

/// Domain tag of the identity commitment hash.
pub const IDENTITY_TAG: &[u8] = b"seatbind.identity.v1";

/// ASCII codes of `0-9A-F`.
const HEX_ALPHABET: [u64; 16] = [
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46,
];

fn hex_label(field: IdentifierField) -> &'static str {
    match field {
        IdentifierField::SystemUuid => "system_uuid_hex",
        IdentifierField::MacEthernet => "mac_ethernet_hex",
        _ => "mac_wifi_hex",
    }
}

/// Allocates `ids` as witnesses, enforces the per-field character
/// constraints and returns the commitment variable.
pub(crate) fn synthesize(cs: &mut ConstraintSystem, ids: &EncodedIdentifiers) -> Variable {
    let mut packed = Vec::new();
    for field in IdentifierField::ALL {
        let bytes = gadgets::alloc_bytes(cs, ids.field(field));
        if encoder::is_hex_field(field) {
            for b in &bytes {
                gadgets::assert_in_set(cs, hex_label(field), *b, &HEX_ALPHABET);
            }
        } else {
            for b in &bytes {
                gadgets::range_check(cs, "byte_range", *b, 8);
            }
        }
        match (field, bytes.first()) {
            (IdentifierField::SystemSerial, Some(first)) => {
                gadgets::assert_nonzero(cs, "system_serial_present", (*first).into());
            }
            (IdentifierField::BaseboardSerial, Some(first)) => {
                gadgets::assert_nonzero(cs, "baseboard_serial_present", (*first).into());
            }
            _ => {}
        }
        packed.extend(gadgets::pack_bytes(&bytes));
    }
    mimc::hash_gadget(cs, IDENTITY_TAG, &packed)
}

pub(crate) fn blank_circuit() -> ConstraintSystem {
    let mut cs = ConstraintSystem::new();
    let commitment = synthesize(&mut cs, &EncodedIdentifiers::blank());
    cs.expose(commitment);
    cs
}

/// Commitment as a field element, computed without a circuit.
#[must_use]
pub fn commitment_field(ids: &EncodedIdentifiers) -> Fr {
    let packed: Vec<Fr> = IdentifierField::ALL
        .iter()
        .flat_map(|f| gadgets::pack_bytes_native(ids.field(*f)))
        .collect();
    mimc::hash(IDENTITY_TAG, &packed)
}

/// Commitment computed without a circuit. Does not validate `ids`.
#[must_use]
pub fn commitment_of(ids: &EncodedIdentifiers) -> IdentityCommitment {
    field::commitment_from_field(&commitment_field(ids))
}

/// Proves that `ids` is a well-formed identity and returns its commitment.
pub fn attest<B: ProvingBackend + ?Sized>(
    backend: &B,
    ids: &EncodedIdentifiers,
) -> CircuitResult<(IdentityCommitment, Proof)> {
    let mut cs = ConstraintSystem::new();
    let commitment = synthesize(&mut cs, ids);
    cs.expose(commitment);
    let proof = backend.prove(CircuitKind::IdentityAttestation, &cs, &[])?;
    let commitment = field::commitment_from_field(&cs.value(commitment));
    debug!("Attested identity {}", commitment.short());
    Ok((commitment, proof))
}

/// Encodes `raw` and attests it.
pub fn attest_raw<B: ProvingBackend + ?Sized>(
    backend: &B,
    raw: &RawIdentifierSet,
) -> CircuitResult<(IdentityCommitment, Proof)> {
    let ids = encoder::encode(raw)?;
    attest(backend, &ids)
}

/// Public inputs of an identity attestation.
pub fn public_inputs(commitment: &IdentityCommitment) -> CircuitResult<Vec<Fr>> {
    Ok(vec![field::field_from_commitment(commitment)?])
}

/// Checks an attestation proof for `commitment`.
pub fn verify_attestation<V: ProofVerifier + ?Sized>(
    verifier: &V,
    commitment: &IdentityCommitment,
    proof: &Proof,
) -> bool {
    public_inputs(commitment).is_ok_and(|inputs| {
        verifier.verify_as(&[CircuitKind::IdentityAttestation], proof, &inputs)
    })
}
