//! Proofs and the proving backend.
//!
//! A [`Proof`] records which circuit produced it, the digest of that
//! circuit's constraint structure, a hiding commitment to the full witness
//! and the digests of any child proofs it consumed. The backend only issues
//! a proof after checking that the constraint system is satisfied and has
//! exactly the reference shape for its circuit kind; it then signs the
//! record together with the public inputs. Verification recomputes the
//! signed message from caller-supplied public inputs, so a proof does not
//! verify against any other outputs.

use std::fmt;
use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::Zeroize;

use crate::error::{CircuitError, CircuitResult};
use crate::field::{self, Fr};
use crate::r1cs::ConstraintSystem;

/// Current proof format version.
pub const PROOF_VERSION: u16 = 1;

/// The circuits a proof can attest to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitKind {
    IdentityAttestation,
    SessionTransition,
    BundleBase,
    BundleAppend,
}

impl CircuitKind {
    pub const ALL: [CircuitKind; 4] = [
        Self::IdentityAttestation,
        Self::SessionTransition,
        Self::BundleBase,
        Self::BundleAppend,
    ];

    /// Number of public inputs the circuit exposes.
    #[must_use]
    pub const fn public_input_count(&self) -> usize {
        match self {
            Self::IdentityAttestation => 1,
            Self::SessionTransition => 4,
            Self::BundleBase | Self::BundleAppend => crate::bundle::PUBLIC_INPUTS,
        }
    }

    /// Digest of the reference constraint structure, synthesized once from
    /// blank inputs.
    pub fn reference_structure(&self) -> [u8; 32] {
        static SHAPES: [OnceLock<[u8; 32]>; 4] =
            [OnceLock::new(), OnceLock::new(), OnceLock::new(), OnceLock::new()];
        let slot = match self {
            Self::IdentityAttestation => 0,
            Self::SessionTransition => 1,
            Self::BundleBase => 2,
            Self::BundleAppend => 3,
        };
        *SHAPES[slot].get_or_init(|| {
            let cs = match self {
                Self::IdentityAttestation => crate::identity::blank_circuit(),
                Self::SessionTransition => crate::session::blank_circuit(),
                Self::BundleBase => crate::bundle::blank_base_circuit(),
                Self::BundleAppend => crate::bundle::blank_append_circuit(),
            };
            debug!(
                "Synthesized {} reference shape: {} constraints, {} variables",
                self,
                cs.num_constraints(),
                cs.num_variables()
            );
            cs.structure_digest()
        })
    }
}

impl fmt::Display for CircuitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IdentityAttestation => "identity",
            Self::SessionTransition => "session",
            Self::BundleBase => "bundle-base",
            Self::BundleAppend => "bundle-append",
        };
        f.write_str(name)
    }
}

/// A portable proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub version: u16,
    pub circuit: CircuitKind,
    #[serde(with = "hex32")]
    pub structure_digest: [u8; 32],
    #[serde(with = "hex32")]
    pub witness_commitment: [u8; 32],
    /// Digests of the child proofs consumed by a recursive step.
    #[serde(with = "hex32_list")]
    pub children: Vec<[u8; 32]>,
    /// Verifying key of the issuing prover.
    #[serde(with = "hex32")]
    pub prover: [u8; 32],
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

impl Proof {
    /// Content digest, used when a proof is consumed as a child.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"seatbind.proof.digest.v1");
        hasher.update(self.version.to_le_bytes());
        hasher.update(self.circuit.to_string().as_bytes());
        hasher.update(self.structure_digest);
        hasher.update(self.witness_commitment);
        for child in &self.children {
            hasher.update(child);
        }
        hasher.update(self.prover);
        hasher.update(&self.signature);
        hasher.finalize().into()
    }

    /// Whether this proof was built from exactly `children`, in order.
    #[must_use]
    pub fn binds(&self, children: &[&Proof]) -> bool {
        self.children.len() == children.len()
            && self.children.iter().zip(children).all(|(d, p)| *d == p.digest())
    }

    /// URL-safe base64 of the JSON form.
    pub fn to_base64(&self) -> CircuitResult<String> {
        let json =
            serde_json::to_vec(self).map_err(|e| CircuitError::ProofEncoding(e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub fn from_base64(blob: &str) -> CircuitResult<Self> {
        let json = URL_SAFE_NO_PAD
            .decode(blob.trim())
            .map_err(|e| CircuitError::ProofEncoding(format!("base64: {e}")))?;
        serde_json::from_slice(&json).map_err(|e| CircuitError::ProofEncoding(e.to_string()))
    }

    fn message(&self, public_inputs: &[Fr]) -> [u8; 32] {
        signing_message(
            self.version,
            self.circuit,
            &self.structure_digest,
            &self.witness_commitment,
            &self.children,
            public_inputs,
        )
    }
}

fn signing_message(
    version: u16,
    circuit: CircuitKind,
    structure: &[u8; 32],
    witness: &[u8; 32],
    children: &[[u8; 32]],
    public_inputs: &[Fr],
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"seatbind.proof.v1");
    hasher.update(version.to_le_bytes());
    hasher.update(circuit.to_string().as_bytes());
    hasher.update(structure);
    hasher.update(witness);
    hasher.update((children.len() as u64).to_le_bytes());
    for child in children {
        hasher.update(child);
    }
    hasher.update((public_inputs.len() as u64).to_le_bytes());
    for input in public_inputs {
        hasher.update(field::to_bytes(input));
    }
    hasher.finalize().into()
}

/// Checks proofs against public inputs.
pub trait ProofVerifier: Send + Sync {
    /// Returns true iff `proof` is valid for `public_inputs`.
    fn verify(&self, proof: &Proof, public_inputs: &[Fr]) -> bool;

    /// Like [`ProofVerifier::verify`], additionally requiring one of `kinds`.
    fn verify_as(&self, kinds: &[CircuitKind], proof: &Proof, public_inputs: &[Fr]) -> bool {
        kinds.contains(&proof.circuit) && self.verify(proof, public_inputs)
    }
}

/// Produces proofs for synthesized circuits.
pub trait ProvingBackend: ProofVerifier {
    /// Proves `cs` as an instance of `kind`, binding the given child proofs.
    fn prove(&self, kind: CircuitKind, cs: &ConstraintSystem, children: &[&Proof])
    -> CircuitResult<Proof>;
}

/// Backend that checks satisfiability and shape, then signs the result.
pub struct AttestingProver {
    signing: SigningKey,
}

impl AttestingProver {
    /// Creates a prover with a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        Self { signing: SigningKey::generate(&mut OsRng) }
    }

    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self { signing: SigningKey::from_bytes(secret) }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    /// The verifier matching this prover.
    #[must_use]
    pub fn verifier(&self) -> AttestationVerifier {
        AttestationVerifier { key: self.signing.verifying_key() }
    }
}

impl fmt::Debug for AttestingProver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttestingProver")
            .field("prover", &hex::encode(self.signing.verifying_key().as_bytes()))
            .finish_non_exhaustive()
    }
}

impl ProofVerifier for AttestingProver {
    fn verify(&self, proof: &Proof, public_inputs: &[Fr]) -> bool {
        self.verifier().verify(proof, public_inputs)
    }
}

impl ProvingBackend for AttestingProver {
    fn prove(
        &self,
        kind: CircuitKind,
        cs: &ConstraintSystem,
        children: &[&Proof],
    ) -> CircuitResult<Proof> {
        if let Some(constraint) = cs.first_unsatisfied() {
            debug!("{} witness rejected at constraint {}", kind, constraint);
            return Err(CircuitError::Unsatisfied { circuit: kind, constraint });
        }
        let structure_digest = cs.structure_digest();
        if structure_digest != kind.reference_structure() {
            return Err(CircuitError::ShapeMismatch(kind));
        }

        let mut blinding = [0u8; 32];
        OsRng.fill_bytes(&mut blinding);
        let witness_commitment = cs.witness_commitment(&blinding);
        blinding.zeroize();

        let children: Vec<[u8; 32]> = children.iter().map(|p| p.digest()).collect();
        let message = signing_message(
            PROOF_VERSION,
            kind,
            &structure_digest,
            &witness_commitment,
            &children,
            &cs.public_inputs(),
        );
        let signature = self.signing.sign(&message);

        debug!("Issued {} proof over {} constraints", kind, cs.num_constraints());
        Ok(Proof {
            version: PROOF_VERSION,
            circuit: kind,
            structure_digest,
            witness_commitment,
            children,
            prover: self.signing.verifying_key().to_bytes(),
            signature: signature.to_bytes().to_vec(),
        })
    }
}

/// Verifier holding only the prover's public key.
#[derive(Clone, PartialEq, Eq)]
pub struct AttestationVerifier {
    key: VerifyingKey,
}

impl AttestationVerifier {
    pub fn from_bytes(key: &[u8; 32]) -> CircuitResult<Self> {
        VerifyingKey::from_bytes(key)
            .map(|key| Self { key })
            .map_err(|_| CircuitError::InvalidKey)
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.key.to_bytes()
    }
}

impl fmt::Debug for AttestationVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttestationVerifier({})", hex::encode(self.key.as_bytes()))
    }
}

impl ProofVerifier for AttestationVerifier {
    fn verify(&self, proof: &Proof, public_inputs: &[Fr]) -> bool {
        if proof.version != PROOF_VERSION
            || proof.prover != self.key.to_bytes()
            || public_inputs.len() != proof.circuit.public_input_count()
            || proof.structure_digest != proof.circuit.reference_structure()
        {
            return false;
        }
        let Ok(signature) = Signature::from_slice(&proof.signature) else {
            return false;
        };
        self.key.verify(&proof.message(public_inputs), &signature).is_ok()
    }
}

mod hex32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out).map_err(serde::de::Error::custom)?;
        Ok(out)
    }
}

mod hex32_list {
    use serde::{Deserialize, Deserializer, Serializer, ser::SerializeSeq};

    pub fn serialize<S: Serializer>(list: &[[u8; 32]], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(list.len()))?;
        for item in list {
            seq.serialize_element(&hex::encode(item))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<[u8; 32]>, D::Error> {
        Vec::<String>::deserialize(d)?
            .into_iter()
            .map(|s| {
                let mut out = [0u8; 32];
                hex::decode_to_slice(s, &mut out).map_err(serde::de::Error::custom)?;
                Ok(out)
            })
            .collect()
    }
}
