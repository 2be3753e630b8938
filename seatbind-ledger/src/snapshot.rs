//! The authoritative device and session state.

use std::collections::BTreeMap;
use std::fmt;

use seatbind_types::{DEVICE_SLOTS, IdentityCommitment, OwnerId, SessionKey, SlotIndex};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Device slots of one owner; index 0 is slot 1.
pub type DeviceSlots = [Option<IdentityCommitment>; DEVICE_SLOTS];

/// Commitment to a [`Snapshot`]'s full content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateRoot(#[serde(with = "crate::hex32")] [u8; 32]);

impl StateRoot {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for StateRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for StateRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateRoot({})", &hex::encode(self.0)[..12])
    }
}

/// Versioned key-value state: owner -> device slots, identity -> session key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Incremented by every committed settlement.
    pub version: u64,
    /// Sequence number of the last action applied.
    pub applied_through: u64,
    /// Head of the hash chain over every applied action.
    #[serde(with = "crate::hex32")]
    pub log_head: [u8; 32],
    pub devices_by_owner: BTreeMap<OwnerId, DeviceSlots>,
    pub session_by_identity: BTreeMap<IdentityCommitment, SessionKey>,
}

impl Snapshot {
    /// The empty state before any settlement.
    #[must_use]
    pub fn genesis() -> Self {
        Self::default()
    }

    /// Device slots of `owner` (all empty if unknown).
    #[must_use]
    pub fn devices(&self, owner: &OwnerId) -> DeviceSlots {
        self.devices_by_owner.get(owner).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn device_at(&self, owner: &OwnerId, slot: SlotIndex) -> Option<IdentityCommitment> {
        self.devices(owner)[slot.offset()]
    }

    #[must_use]
    pub fn session(&self, identity: &IdentityCommitment) -> Option<SessionKey> {
        self.session_by_identity.get(identity).copied()
    }

    /// Owner currently holding `identity`.
    #[must_use]
    pub fn owner_of(&self, identity: &IdentityCommitment) -> Option<OwnerId> {
        self.devices_by_owner
            .iter()
            .find(|(_, slots)| slots.contains(&Some(*identity)))
            .map(|(owner, _)| *owner)
    }

    /// Canonical SHA-256 over every field.
    #[must_use]
    pub fn state_root(&self) -> StateRoot {
        let mut hasher = Sha256::new();
        hasher.update(b"seatbind.snapshot.v1");
        hasher.update(self.version.to_le_bytes());
        hasher.update(self.applied_through.to_le_bytes());
        hasher.update(self.log_head);
        hasher.update((self.devices_by_owner.len() as u64).to_le_bytes());
        for (owner, slots) in &self.devices_by_owner {
            hasher.update(owner.as_bytes());
            for slot in slots {
                match slot {
                    Some(identity) => {
                        hasher.update([1]);
                        hasher.update(identity.as_bytes());
                    }
                    None => hasher.update([0]),
                }
            }
        }
        hasher.update((self.session_by_identity.len() as u64).to_le_bytes());
        for (identity, key) in &self.session_by_identity {
            hasher.update(identity.as_bytes());
            hasher.update(key.to_le_bytes());
        }
        StateRoot(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_tracks_content() {
        let mut snap = Snapshot::genesis();
        let empty = snap.state_root();
        let owner = OwnerId::from_bytes([1; 32]);
        let identity = IdentityCommitment::from_bytes([2; 32]);
        snap.devices_by_owner.insert(owner, [Some(identity), None, None, None]);
        assert_ne!(snap.state_root(), empty);

        let with_device = snap.state_root();
        snap.session_by_identity.insert(identity, 1);
        assert_ne!(snap.state_root(), with_device);
        assert_eq!(snap.owner_of(&identity), Some(owner));
        assert_eq!(snap.session(&identity), Some(1));
    }

    #[test]
    fn json_roundtrip_keeps_root() {
        let mut snap = Snapshot::genesis();
        snap.version = 3;
        snap.log_head = [9; 32];
        snap.devices_by_owner
            .insert(OwnerId::from_bytes([4; 32]), [None, Some(IdentityCommitment::from_bytes([5; 32])), None, None]);
        let json = serde_json::to_string(&snap).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.state_root(), snap.state_root());
    }

    #[test]
    fn unknown_owner_has_empty_slots() {
        let snap = Snapshot::genesis();
        assert_eq!(snap.devices(&OwnerId::from_bytes([7; 32])), [None; DEVICE_SLOTS]);
    }
}
