//! Recursive bundle aggregation.
//!
//! A bundle folds up to [`FAN_IN`] session certificates into one
//! certificate. [`base`] produces the empty bundle for a license; each
//! [`append`] verifies the previous bundle proof and the incoming session
//! proof, then proves the next bundle state. Every slot is re-derived on
//! every step through a multiplexer on the previous count, so the circuit
//! shape does not depend on which slot is written.
//!
//! Identities are not deduplicated inside a bundle. A device appended
//! twice occupies two slots; the settlement reducer then rejects the
//! second rotation because its current key is stale.

use ff::Field;
use seatbind_types::{FAN_IN, IdentityCommitment, LicenseId, SessionKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CircuitError, CircuitResult};
use crate::field::{self, Fr};
use crate::gadgets;
use crate::mimc;
use crate::proof::{CircuitKind, Proof, ProofVerifier, ProvingBackend};
use crate::r1cs::{ConstraintSystem, LinearCombination, Variable};
use crate::session::SessionCertificate;

/// Domain tag of the empty-slot placeholder.
pub const EMPTY_TAG: &[u8] = b"seatbind.bundle.empty.v1";

/// `[license, count, (identity, current, new) * FAN_IN]`
pub const PUBLIC_INPUTS: usize = 2 + 3 * FAN_IN;

const BUNDLE_KINDS: [CircuitKind; 2] = [CircuitKind::BundleBase, CircuitKind::BundleAppend];

/// One `(identity, current key, new key)` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleSlot {
    pub identity: IdentityCommitment,
    pub current_key: SessionKey,
    pub new_key: SessionKey,
}

impl BundleSlot {
    /// The placeholder filling unused slots of a bundle for `license_id`.
    #[must_use]
    pub fn placeholder(license_id: LicenseId) -> Self {
        let identity = mimc::hash(EMPTY_TAG, &[Fr::from(license_id.value())]);
        Self {
            identity: field::commitment_from_field(&identity),
            current_key: 0,
            new_key: 0,
        }
    }
}

impl From<&SessionCertificate> for BundleSlot {
    fn from(cert: &SessionCertificate) -> Self {
        Self {
            identity: cert.identity,
            current_key: cert.current_session_key,
            new_key: cert.new_session_key,
        }
    }
}

/// Aggregate of up to [`FAN_IN`] session transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleCertificate {
    pub license_id: LicenseId,
    pub slots: [BundleSlot; FAN_IN],
    pub device_count: u8,
}

impl BundleCertificate {
    /// The slots holding real devices.
    #[must_use]
    pub fn occupied(&self) -> &[BundleSlot] {
        let count = usize::from(self.device_count).min(FAN_IN);
        &self.slots[..count]
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        usize::from(self.device_count) >= FAN_IN
    }

    /// `[license, count, (identity, current, new) * FAN_IN]`
    pub fn public_inputs(&self) -> CircuitResult<Vec<Fr>> {
        let mut inputs = Vec::with_capacity(PUBLIC_INPUTS);
        inputs.push(Fr::from(self.license_id.value()));
        inputs.push(Fr::from(u64::from(self.device_count)));
        for slot in &self.slots {
            inputs.push(field::field_from_commitment(&slot.identity)?);
            inputs.push(Fr::from(slot.current_key));
            inputs.push(Fr::from(slot.new_key));
        }
        Ok(inputs)
    }

    /// Checks a base or append proof against this certificate.
    pub fn verify<V: ProofVerifier + ?Sized>(&self, verifier: &V, proof: &Proof) -> bool {
        self.public_inputs()
            .is_ok_and(|inputs| verifier.verify_as(&BUNDLE_KINDS, proof, &inputs))
    }
}

/// Field-level view of a certificate, used as circuit witness.
struct SlotValues {
    identity: Fr,
    current: Fr,
    new: Fr,
}

struct BundleValues {
    license: Fr,
    count: Fr,
    slots: [SlotValues; FAN_IN],
}

impl BundleValues {
    fn of(cert: &BundleCertificate) -> CircuitResult<Self> {
        let mut values = Self::blank();
        values.license = Fr::from(cert.license_id.value());
        values.count = Fr::from(u64::from(cert.device_count));
        for (dst, slot) in values.slots.iter_mut().zip(&cert.slots) {
            dst.identity = field::field_from_commitment(&slot.identity)?;
            dst.current = Fr::from(slot.current_key);
            dst.new = Fr::from(slot.new_key);
        }
        Ok(values)
    }

    fn blank() -> Self {
        Self {
            license: Fr::ZERO,
            count: Fr::ZERO,
            slots: std::array::from_fn(|_| SlotValues {
                identity: Fr::ZERO,
                current: Fr::ZERO,
                new: Fr::ZERO,
            }),
        }
    }
}

fn synthesize_base(cs: &mut ConstraintSystem, license: Fr) {
    let license = cs.alloc(license);
    let count = cs.alloc(Fr::ZERO);
    cs.expose(license);
    cs.expose(count);
    cs.enforce_equal("count_starts_at_zero", count.into(), LinearCombination::zero());

    let placeholder = mimc::hash_gadget(cs, EMPTY_TAG, &[license.into()]);
    let placeholder_value = cs.value(placeholder);
    for _ in 0..FAN_IN {
        let identity = cs.alloc(placeholder_value);
        let current = cs.alloc(Fr::ZERO);
        let new = cs.alloc(Fr::ZERO);
        cs.enforce_equal("empty_slot", identity.into(), placeholder.into());
        cs.enforce_equal("empty_slot", current.into(), LinearCombination::zero());
        cs.enforce_equal("empty_slot", new.into(), LinearCombination::zero());
        for var in [identity, current, new] {
            cs.expose(var);
        }
    }
}

fn synthesize_append(
    cs: &mut ConstraintSystem,
    license: Fr,
    session: [Fr; 4],
    previous: &BundleValues,
) {
    let license = cs.alloc(license);
    let [s_license, s_current, s_new, s_identity] = session.map(|v| cs.alloc(v));
    let p_license = cs.alloc(previous.license);
    let p_count = cs.alloc(previous.count);
    let p_slots: Vec<[Variable; 3]> = previous
        .slots
        .iter()
        .map(|s| [cs.alloc(s.identity), cs.alloc(s.current), cs.alloc(s.new)])
        .collect();

    cs.enforce_equal("license_matches", p_license.into(), license.into());
    let open_slots: Vec<u64> = (0..FAN_IN as u64).collect();
    gadgets::assert_in_set(cs, "fan_in_not_exceeded", p_count, &open_slots);
    cs.enforce_equal("certificate_license_matches", s_license.into(), license.into());
    gadgets::range_check(cs, "current_key_range", s_current, 64);
    gadgets::range_check(cs, "new_key_range", s_new, 64);
    gadgets::assert_nonzero(cs, "identity_nonzero", s_identity.into());
    gadgets::assert_nonzero(cs, "current_key_nonzero", s_current.into());
    gadgets::assert_nonzero(cs, "new_key_nonzero", s_new.into());
    gadgets::assert_not_equal(cs, "keys_differ", s_current, s_new);

    let count = cs.alloc_lc(
        "count_increments",
        LinearCombination::from(p_count).add_constant(Fr::ONE),
    );
    cs.expose(license);
    cs.expose(count);

    for (i, [p_identity, p_current, p_new]) in p_slots.into_iter().enumerate() {
        let target = gadgets::is_equal_const(cs, "slot_select", p_count, i as u64);
        let identity = gadgets::select(cs, "slot_select", target, s_identity, p_identity);
        let current = gadgets::select(cs, "slot_select", target, s_current, p_current);
        let new = gadgets::select(cs, "slot_select", target, s_new, p_new);
        for var in [identity, current, new] {
            cs.expose(var);
        }
    }
}

pub(crate) fn blank_base_circuit() -> ConstraintSystem {
    let mut cs = ConstraintSystem::new();
    synthesize_base(&mut cs, Fr::ZERO);
    cs
}

pub(crate) fn blank_append_circuit() -> ConstraintSystem {
    let mut cs = ConstraintSystem::new();
    synthesize_append(&mut cs, Fr::ZERO, [Fr::ZERO; 4], &BundleValues::blank());
    cs
}

/// Produces the empty bundle for `license_id`.
pub fn base<B: ProvingBackend + ?Sized>(
    backend: &B,
    license_id: LicenseId,
) -> CircuitResult<(BundleCertificate, Proof)> {
    let mut cs = ConstraintSystem::new();
    synthesize_base(&mut cs, Fr::from(license_id.value()));
    let proof = backend.prove(CircuitKind::BundleBase, &cs, &[])?;
    let certificate = BundleCertificate {
        license_id,
        slots: [BundleSlot::placeholder(license_id); FAN_IN],
        device_count: 0,
    };
    debug!("Started bundle for {}", license_id);
    Ok((certificate, proof))
}

/// Folds one session certificate into `previous`.
///
/// Both child proofs are verified before anything is proven. Any error is
/// fatal to the bundle in progress: restart from [`base`].
pub fn append<B: ProvingBackend + ?Sized>(
    backend: &B,
    license_id: LicenseId,
    session: (&SessionCertificate, &Proof),
    previous: (&BundleCertificate, &Proof),
) -> CircuitResult<(BundleCertificate, Proof)> {
    let (cert, cert_proof) = session;
    let (prev, prev_proof) = previous;

    if !prev.verify(backend, prev_proof) {
        return Err(CircuitError::ChildProofInvalid("previous bundle"));
    }
    if !cert.verify(backend, cert_proof) {
        return Err(CircuitError::ChildProofInvalid("session certificate"));
    }

    let session_values = [
        Fr::from(cert.license_id.value()),
        Fr::from(cert.current_session_key),
        Fr::from(cert.new_session_key),
        field::field_from_commitment(&cert.identity)?,
    ];
    let mut cs = ConstraintSystem::new();
    synthesize_append(
        &mut cs,
        Fr::from(license_id.value()),
        session_values,
        &BundleValues::of(prev)?,
    );
    let proof = backend.prove(CircuitKind::BundleAppend, &cs, &[cert_proof, prev_proof])?;

    let mut next = prev.clone();
    if let Some(slot) = next.slots.get_mut(usize::from(prev.device_count)) {
        *slot = BundleSlot::from(cert);
    }
    next.device_count = prev.device_count.saturating_add(1);
    debug!(
        "Folded {} into bundle for {} ({} devices)",
        cert.identity.short(),
        license_id,
        next.device_count
    );
    Ok((next, proof))
}

/// Owns a bundle in progress.
///
/// Each [`BundleBuilder::push`] consumes the builder, so a failed append
/// discards the accumulated state.
pub struct BundleBuilder<'a, B: ProvingBackend + ?Sized> {
    backend: &'a B,
    certificate: BundleCertificate,
    proof: Proof,
}

impl<'a, B: ProvingBackend + ?Sized> BundleBuilder<'a, B> {
    pub fn new(backend: &'a B, license_id: LicenseId) -> CircuitResult<Self> {
        let (certificate, proof) = base(backend, license_id)?;
        Ok(Self { backend, certificate, proof })
    }

    pub fn push(self, certificate: &SessionCertificate, proof: &Proof) -> CircuitResult<Self> {
        let (next, next_proof) = append(
            self.backend,
            self.certificate.license_id,
            (certificate, proof),
            (&self.certificate, &self.proof),
        )?;
        Ok(Self {
            backend: self.backend,
            certificate: next,
            proof: next_proof,
        })
    }

    pub fn certificate(&self) -> &BundleCertificate {
        &self.certificate
    }

    pub fn len(&self) -> usize {
        usize::from(self.certificate.device_count)
    }

    pub fn is_empty(&self) -> bool {
        self.certificate.device_count == 0
    }

    pub fn finish(self) -> (BundleCertificate, Proof) {
        info!(
            "Finished bundle for {} with {} devices",
            self.certificate.license_id, self.certificate.device_count
        );
        (self.certificate, self.proof)
    }
}
