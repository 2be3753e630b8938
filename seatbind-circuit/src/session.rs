//! Session-key transition.
//!
//! Re-derives the identity commitment from private identifiers and binds it
//! to a public `(license, current key, new key)` triple. Whether the
//! transition is authorized is decided at settlement, not here.

use seatbind_types::{IdentityCommitment, LicenseId, SessionKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::encoder::EncodedIdentifiers;
use crate::error::CircuitResult;
use crate::field::{self, Fr};
use crate::gadgets;
use crate::identity;
use crate::proof::{CircuitKind, Proof, ProofVerifier, ProvingBackend};
use crate::r1cs::ConstraintSystem;

/// Public half of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPublic {
    pub license_id: LicenseId,
    pub current: SessionKey,
    pub new: SessionKey,
}

/// Certificate that `identity` moves from `current_session_key` to
/// `new_session_key` under `license_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCertificate {
    pub license_id: LicenseId,
    pub current_session_key: SessionKey,
    pub new_session_key: SessionKey,
    pub identity: IdentityCommitment,
}

impl SessionCertificate {
    /// `[license, current, new, identity]`
    pub fn public_inputs(&self) -> CircuitResult<Vec<Fr>> {
        Ok(vec![
            Fr::from(self.license_id.value()),
            Fr::from(self.current_session_key),
            Fr::from(self.new_session_key),
            field::field_from_commitment(&self.identity)?,
        ])
    }

    /// Checks `proof` against this certificate.
    pub fn verify<V: ProofVerifier + ?Sized>(&self, verifier: &V, proof: &Proof) -> bool {
        self.public_inputs().is_ok_and(|inputs| {
            verifier.verify_as(&[CircuitKind::SessionTransition], proof, &inputs)
        })
    }
}

pub(crate) fn synthesize(cs: &mut ConstraintSystem, public: &SessionPublic, ids: &EncodedIdentifiers) {
    let license = cs.alloc(Fr::from(public.license_id.value()));
    let current = cs.alloc(Fr::from(public.current));
    let new = cs.alloc(Fr::from(public.new));
    let identity = identity::synthesize(cs, ids);
    for var in [license, current, new, identity] {
        cs.expose(var);
    }

    gadgets::range_check(cs, "license_range", license, 64);
    gadgets::range_check(cs, "current_key_range", current, 64);
    gadgets::range_check(cs, "new_key_range", new, 64);
    gadgets::assert_nonzero(cs, "new_key_nonzero", new.into());
    gadgets::assert_not_equal(cs, "keys_differ", current, new);
}

pub(crate) fn blank_circuit() -> ConstraintSystem {
    let mut cs = ConstraintSystem::new();
    let public = SessionPublic { license_id: LicenseId::new(0), current: 0, new: 0 };
    synthesize(&mut cs, &public, &EncodedIdentifiers::blank());
    cs
}

/// Proves the transition `public.current -> public.new` for the identity
/// encoded in `ids`.
pub fn transition<B: ProvingBackend + ?Sized>(
    backend: &B,
    public: SessionPublic,
    ids: &EncodedIdentifiers,
) -> CircuitResult<(SessionCertificate, Proof)> {
    let mut cs = ConstraintSystem::new();
    synthesize(&mut cs, &public, ids);
    let proof = backend.prove(CircuitKind::SessionTransition, &cs, &[])?;
    let certificate = SessionCertificate {
        license_id: public.license_id,
        current_session_key: public.current,
        new_session_key: public.new,
        identity: identity::commitment_of(ids),
    };
    debug!(
        "Proved session transition for {} under {}",
        certificate.identity.short(),
        public.license_id
    );
    Ok((certificate, proof))
}
