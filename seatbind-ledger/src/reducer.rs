//! Settlement reducer.
//!
//! Folds a contiguous log segment into a snapshot, one action at a time in
//! `seq` order. Owners only touch their own slots and their own devices'
//! session keys, so non-conflicting owners commute and the result does not
//! depend on how their actions were interleaved. Contested identities go
//! to the earliest claim in the log, wherever the batch boundaries fall.
//! Any failed precondition rejects the whole segment.

use std::collections::{BTreeMap, BTreeSet};

use seatbind_types::{IdentityCommitment, OwnerId};
use tracing::debug;

use crate::action::{ActionPayload, DeviceBinding, LoggedAction};
use crate::error::{SettlementError, SettlementResult, Violation};
use crate::snapshot::Snapshot;

/// Reduces `segment` onto `snapshot`, producing the next snapshot.
pub fn reduce(snapshot: &Snapshot, segment: &[LoggedAction]) -> SettlementResult<Snapshot> {
    let mut head = snapshot.log_head;
    for (offset, entry) in segment.iter().enumerate() {
        let expected = snapshot.applied_through + 1 + offset as u64;
        if entry.seq != expected {
            return Err(SettlementError::OutOfOrder { expected, found: entry.seq });
        }
        head = entry.chain(&head);
    }

    let mut state = State::from_snapshot(snapshot);
    let mut owners = BTreeSet::new();
    for entry in segment {
        let owner = &entry.action.owner;
        state
            .apply(owner, &entry.action.payload)
            .map_err(|violation| SettlementError::Precondition {
                seq: entry.seq,
                owner: *owner,
                violation,
            })?;
        owners.insert(*owner);
    }

    let mut next = state.snapshot;
    if let Some(last) = segment.last() {
        next.version += 1;
        next.applied_through = last.seq;
        next.log_head = head;
    }
    debug!(
        "Reduced {} actions from {} owners to version {}",
        segment.len(),
        owners.len(),
        next.version
    );
    Ok(next)
}

/// Working copy with an identity -> owner index.
struct State {
    snapshot: Snapshot,
    owners: BTreeMap<IdentityCommitment, OwnerId>,
}

impl State {
    fn from_snapshot(snapshot: &Snapshot) -> Self {
        let owners = snapshot
            .devices_by_owner
            .iter()
            .flat_map(|(owner, slots)| slots.iter().flatten().map(move |id| (*id, *owner)))
            .collect();
        Self { snapshot: snapshot.clone(), owners }
    }

    fn apply(&mut self, owner: &OwnerId, payload: &ActionPayload) -> Result<(), Violation> {
        match payload {
            ActionPayload::RegisterDevice(binding) => self.register(owner, binding),
            ActionPayload::ChangeDevice(binding) => self.change(owner, binding),
            ActionPayload::SubmitBundle { license_id, bundle, .. } => {
                if bundle.license_id != *license_id {
                    return Err(Violation::LicenseMismatch {
                        action: *license_id,
                        bundle: bundle.license_id,
                    });
                }
                // validate every slot before mutating anything
                for slot in bundle.occupied() {
                    if self.owners.get(&slot.identity) != Some(owner) {
                        return Err(Violation::UnknownDevice { identity: slot.identity });
                    }
                }
                for slot in bundle.occupied() {
                    let current = self.snapshot.session(&slot.identity);
                    if current != Some(slot.current_key) {
                        return Err(Violation::StaleSessionKey {
                            identity: slot.identity,
                            expected: current,
                            claimed: slot.current_key,
                        });
                    }
                    if slot.new_key == 0 {
                        return Err(Violation::ZeroSessionKey);
                    }
                    self.snapshot
                        .session_by_identity
                        .insert(slot.identity, slot.new_key);
                }
                Ok(())
            }
        }
    }

    fn register(&mut self, owner: &OwnerId, binding: &DeviceBinding) -> Result<(), Violation> {
        if binding.session_key == 0 {
            return Err(Violation::ZeroSessionKey);
        }
        if self.snapshot.device_at(owner, binding.slot).is_some() {
            return Err(Violation::SlotOccupied { slot: binding.slot });
        }
        if self.owners.contains_key(&binding.identity) {
            return Err(Violation::IdentityBound { identity: binding.identity });
        }
        self.bind(owner, binding);
        Ok(())
    }

    fn change(&mut self, owner: &OwnerId, binding: &DeviceBinding) -> Result<(), Violation> {
        if binding.session_key == 0 {
            return Err(Violation::ZeroSessionKey);
        }
        let slots = self.snapshot.devices(owner);
        if slots.iter().all(Option::is_none) {
            return Err(Violation::NoDevices);
        }
        let replaced = slots[binding.slot.offset()];
        if self.owners.contains_key(&binding.identity) && replaced != Some(binding.identity) {
            return Err(Violation::IdentityBound { identity: binding.identity });
        }
        if let Some(old) = replaced {
            self.owners.remove(&old);
            self.snapshot.session_by_identity.remove(&old);
        }
        self.bind(owner, binding);
        Ok(())
    }

    fn bind(&mut self, owner: &OwnerId, binding: &DeviceBinding) {
        let slots = self.snapshot.devices_by_owner.entry(*owner).or_default();
        slots[binding.slot.offset()] = Some(binding.identity);
        self.owners.insert(binding.identity, *owner);
        self.snapshot
            .session_by_identity
            .insert(binding.identity, binding.session_key);
    }
}
