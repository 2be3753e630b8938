//! Settlement proofs.
//!
//! A [`Settler`] reduces the pending segment off-ledger and signs the
//! transition `old_root -> new_root` together with the exact segment it
//! consumed. The ledger only checks the signature and the bindings.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::action::LoggedAction;
use crate::error::SettlementResult;
use crate::log::segment_digest;
use crate::reducer::reduce;
use crate::snapshot::{Snapshot, StateRoot};

/// Attests that `old_root` plus the segment `first_seq..=last_seq` reduces
/// to `new_root`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementProof {
    pub old_root: StateRoot,
    pub new_root: StateRoot,
    pub first_seq: u64,
    pub last_seq: u64,
    pub action_count: u64,
    #[serde(with = "crate::hex32")]
    pub segment_digest: [u8; 32],
    #[serde(with = "crate::hex32")]
    pub prover: [u8; 32],
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

impl SettlementProof {
    fn message(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"seatbind.settlement.v1");
        hasher.update(self.old_root.as_bytes());
        hasher.update(self.new_root.as_bytes());
        hasher.update(self.first_seq.to_le_bytes());
        hasher.update(self.last_seq.to_le_bytes());
        hasher.update(self.action_count.to_le_bytes());
        hasher.update(self.segment_digest);
        hasher.finalize().into()
    }
}

/// Reduces segments and signs the result.
pub struct Settler {
    signing: SigningKey,
}

impl Settler {
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

    #[must_use]
    pub fn verifier(&self) -> SettlementVerifier {
        SettlementVerifier { key: self.signing.verifying_key() }
    }

    /// Reduces `segment` onto `snapshot` and signs the transition.
    pub fn settle(
        &self,
        snapshot: &Snapshot,
        segment: &[LoggedAction],
    ) -> SettlementResult<(Snapshot, SettlementProof)> {
        let next = reduce(snapshot, segment)?;
        let mut proof = SettlementProof {
            old_root: snapshot.state_root(),
            new_root: next.state_root(),
            first_seq: snapshot.applied_through + 1,
            last_seq: next.applied_through,
            action_count: segment.len() as u64,
            segment_digest: segment_digest(segment),
            prover: self.signing.verifying_key().to_bytes(),
            signature: Vec::new(),
        };
        proof.signature = self.signing.sign(&proof.message()).to_bytes().to_vec();
        info!(
            "Settled {} actions ({}..={}) into version {}",
            proof.action_count, proof.first_seq, proof.last_seq, next.version
        );
        Ok((next, proof))
    }
}

impl fmt::Debug for Settler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settler").finish_non_exhaustive()
    }
}

/// Checks settlement signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementVerifier {
    key: VerifyingKey,
}

impl SettlementVerifier {
    pub fn from_bytes(key: &[u8; 32]) -> Option<Self> {
        VerifyingKey::from_bytes(key).ok().map(|key| Self { key })
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.key.to_bytes()
    }

    #[must_use]
    pub fn verify(&self, proof: &SettlementProof) -> bool {
        if proof.prover != self.key.to_bytes() {
            return false;
        }
        let Ok(signature) = Signature::from_slice(&proof.signature) else {
            return false;
        };
        self.key.verify(&proof.message(), &signature).is_ok()
    }
}
