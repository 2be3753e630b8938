//! Ledger actions.

use chrono::{DateTime, Utc};
use seatbind_circuit::{BundleCertificate, Proof};
use seatbind_types::{ActionId, IdentityCommitment, LicenseId, OwnerId, SessionKey, SlotIndex};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A device identity placed into an owner's slot with its initial session key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBinding {
    pub identity: IdentityCommitment,
    pub slot: SlotIndex,
    pub session_key: SessionKey,
    /// Identity attestation for `identity`.
    pub attestation: Proof,
}

/// What an action does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPayload {
    /// Fills an empty slot.
    RegisterDevice(DeviceBinding),
    /// Replaces the device in a slot of an owner that already has devices.
    ChangeDevice(DeviceBinding),
    /// Applies the session rotations of an aggregated bundle.
    SubmitBundle {
        license_id: LicenseId,
        bundle: BundleCertificate,
        proof: Proof,
    },
}

impl ActionPayload {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RegisterDevice(_) => "register_device",
            Self::ChangeDevice(_) => "change_device",
            Self::SubmitBundle { .. } => "submit_bundle",
        }
    }
}

/// An owner's request to mutate ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub owner: OwnerId,
    pub payload: ActionPayload,
}

impl Action {
    /// Canonical digest of the action's content.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"seatbind.action.v1");
        hasher.update(self.owner.as_bytes());
        hasher.update(self.payload.kind().as_bytes());
        match &self.payload {
            ActionPayload::RegisterDevice(binding) | ActionPayload::ChangeDevice(binding) => {
                hasher.update(binding.identity.as_bytes());
                hasher.update([binding.slot.get()]);
                hasher.update(binding.session_key.to_le_bytes());
                hasher.update(binding.attestation.digest());
            }
            ActionPayload::SubmitBundle { license_id, bundle, proof } => {
                hasher.update(license_id.value().to_le_bytes());
                hasher.update(bundle.license_id.value().to_le_bytes());
                hasher.update([bundle.device_count]);
                for slot in &bundle.slots {
                    hasher.update(slot.identity.as_bytes());
                    hasher.update(slot.current_key.to_le_bytes());
                    hasher.update(slot.new_key.to_le_bytes());
                }
                hasher.update(proof.digest());
            }
        }
        hasher.finalize().into()
    }
}

/// An accepted action with its log position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedAction {
    pub seq: u64,
    pub id: ActionId,
    pub submitted_at: DateTime<Utc>,
    pub action: Action,
}

impl LoggedAction {
    /// Digest of the entry, covering its position and identifier.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"seatbind.entry.v1");
        hasher.update(self.seq.to_le_bytes());
        hasher.update(self.id.as_uuid().as_bytes());
        hasher.update(self.action.digest());
        hasher.finalize().into()
    }

    /// Extends the log hash chain with this entry.
    #[must_use]
    pub fn chain(&self, head: &[u8; 32]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"seatbind.log.v1");
        hasher.update(head);
        hasher.update(self.digest());
        hasher.finalize().into()
    }
}

/// Acknowledgement returned to a submitter.
///
/// `seq` is the log position at submission time. It moves down by one for
/// every earlier action that settlement quarantines; `id` never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReceipt {
    pub id: ActionId,
    pub seq: u64,
}
