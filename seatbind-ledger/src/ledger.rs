//! The ledger facade: cheap submission, serialized settlement, reads.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use seatbind_circuit::{CircuitKind, ProofVerifier, verify_attestation};
use seatbind_types::{IdentityCommitment, OwnerId, SessionKey};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::action::{Action, ActionPayload, ActionReceipt, LoggedAction};
use crate::config::LedgerConfig;
use crate::error::{
    LedgerResult, SettleError, SettlementError, StoreError, StoreResult, SubmitError,
    Violation,
};
use crate::gate::LicenseGate;
use crate::log::{ActionLog, segment_digest};
use crate::settlement::{SettlementProof, SettlementVerifier, Settler};
use crate::snapshot::{DeviceSlots, Snapshot, StateRoot};
use crate::store::LedgerStore;

/// An action dropped by settlement, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedAction {
    pub entry: LoggedAction,
    pub violation: Violation,
    pub rejected_at: DateTime<Utc>,
}

/// Result of one settlement cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Nothing was pending.
    Idle,
    /// A new snapshot was committed.
    Settled { root: StateRoot, applied: usize },
    /// The cycle was rejected; the offending action was quarantined and the
    /// rest stay pending.
    Rejected(Box<RejectedAction>),
}

/// Collaborators a ledger is built from.
pub struct LedgerParts {
    pub config: LedgerConfig,
    pub store: Arc<dyn LedgerStore>,
    pub verifier: Arc<dyn ProofVerifier>,
    pub settlement_verifier: SettlementVerifier,
    pub gate: Arc<dyn LicenseGate>,
}

/// Single versioned snapshot plus the pending action log.
///
/// Submissions only append to the log. Settlement cycles are serialized and
/// swap the snapshot atomically; readers see either the old or the new
/// snapshot, never a partial one.
pub struct Ledger {
    config: LedgerConfig,
    store: Arc<dyn LedgerStore>,
    verifier: Arc<dyn ProofVerifier>,
    settlement_verifier: SettlementVerifier,
    gate: Arc<dyn LicenseGate>,
    snapshot: RwLock<Arc<Snapshot>>,
    log: Mutex<ActionLog>,
    rejected: Mutex<Vec<RejectedAction>>,
    settling: Mutex<()>,
}

impl Ledger {
    /// Opens a ledger, recovering the snapshot and pending log from the store.
    pub fn open(parts: LedgerParts) -> StoreResult<Self> {
        let snapshot = parts.store.load_snapshot()?.unwrap_or_default();
        let log = ActionLog::recover(snapshot.applied_through, parts.store.load_log()?)?;
        info!(
            "Opened ledger at version {} with {} pending actions",
            snapshot.version,
            log.len()
        );
        Ok(Self {
            config: parts.config,
            store: parts.store,
            verifier: parts.verifier,
            settlement_verifier: parts.settlement_verifier,
            gate: parts.gate,
            snapshot: RwLock::new(Arc::new(snapshot)),
            log: Mutex::new(log),
            rejected: Mutex::new(Vec::new()),
            settling: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Validates proofs and licensing, then appends the action to the log.
    /// State preconditions are only checked at settlement.
    pub async fn submit_action(
        &self,
        owner: OwnerId,
        payload: ActionPayload,
    ) -> Result<ActionReceipt, SubmitError> {
        self.check(&owner, &payload).await?;

        let kind = payload.kind();
        let mut log = self.log.lock().await;
        let entry = log.append(Action { owner, payload });
        if let Err(e) = self.store.append_action(&entry) {
            log.remove(entry.seq);
            return Err(e.into());
        }
        debug!("Accepted {} #{} from {}", kind, entry.seq, owner);
        Ok(ActionReceipt { id: entry.id, seq: entry.seq })
    }

    async fn check(&self, owner: &OwnerId, payload: &ActionPayload) -> Result<(), SubmitError> {
        match payload {
            ActionPayload::RegisterDevice(binding) | ActionPayload::ChangeDevice(binding) => {
                if binding.session_key == 0 {
                    return Err(SubmitError::ZeroSessionKey);
                }
                if binding.identity.is_zero() {
                    return Err(SubmitError::ZeroIdentity);
                }
                if !verify_attestation(self.verifier.as_ref(), &binding.identity, &binding.attestation) {
                    return Err(SubmitError::InvalidProof(CircuitKind::IdentityAttestation));
                }
                if !self.gate.holds_any_license(owner).await {
                    return Err(SubmitError::Unlicensed(*owner));
                }
            }
            ActionPayload::SubmitBundle { license_id, bundle, proof } => {
                if bundle.license_id != *license_id {
                    return Err(SubmitError::LicenseMismatch {
                        action: *license_id,
                        bundle: bundle.license_id,
                    });
                }
                if bundle.device_count == 0 {
                    return Err(SubmitError::EmptyBundle);
                }
                if !bundle.verify(self.verifier.as_ref(), proof) {
                    return Err(SubmitError::InvalidProof(proof.circuit));
                }
                if !self.gate.holds_license(owner, *license_id).await {
                    return Err(SubmitError::NotLicensed { owner: *owner, license: *license_id });
                }
            }
        }
        Ok(())
    }

    /// The current snapshot and the oldest pending actions (up to
    /// `max_batch`), taken together.
    pub async fn pending_segment(&self) -> (Arc<Snapshot>, Vec<LoggedAction>) {
        let snapshot = self.snapshot.read().await;
        let log = self.log.lock().await;
        (Arc::clone(&snapshot), log.segment(self.config.max_batch))
    }

    /// Commits a settled snapshot if `proof` binds it to the current state
    /// and to a prefix of the pending log.
    pub async fn settle(
        &self,
        next: Snapshot,
        proof: SettlementProof,
    ) -> Result<StateRoot, SettleError> {
        if !self.settlement_verifier.verify(&proof) {
            return Err(SettleError::InvalidSignature);
        }

        let mut snapshot = self.snapshot.write().await;
        let mut log = self.log.lock().await;

        if snapshot.state_root() != proof.old_root {
            return Err(SettleError::StaleRoot);
        }
        if next.version != snapshot.version + 1 {
            return Err(SettleError::VersionConflict {
                current: snapshot.version,
                proposed: next.version,
            });
        }
        let segment = log.range(proof.first_seq, proof.last_seq);
        if proof.first_seq != snapshot.applied_through + 1
            || proof.last_seq != next.applied_through
            || segment.len() as u64 != proof.action_count
            || segment_digest(segment) != proof.segment_digest
        {
            return Err(SettleError::SegmentMismatch);
        }
        let root = next.state_root();
        if root != proof.new_root {
            return Err(SettleError::RootMismatch);
        }

        self.store.save_snapshot(&next)?;
        log.truncate_through(proof.last_seq);
        if let Err(e) = self.store.replace_log(log.entries()) {
            // the snapshot is already durable; recovery skips settled entries
            warn!("Failed to compact stored log: {}", e);
        }
        *snapshot = Arc::new(next);
        info!(
            "Committed settlement {}..={} at root {}",
            proof.first_seq, proof.last_seq, root
        );
        Ok(root)
    }

    /// Runs one settlement cycle with `settler`.
    ///
    /// On a failed precondition the whole cycle is rejected, the offending
    /// action is moved to the rejected list and the rest stay pending.
    pub async fn run_settlement(&self, settler: &Settler) -> LedgerResult<SettlementOutcome> {
        let _cycle = self.settling.lock().await;
        let (snapshot, segment) = self.pending_segment().await;
        if segment.is_empty() {
            return Ok(SettlementOutcome::Idle);
        }

        match settler.settle(&snapshot, &segment) {
            Ok((next, proof)) => {
                let root = self.settle(next, proof).await?;
                Ok(SettlementOutcome::Settled { root, applied: segment.len() })
            }
            Err(SettlementError::Precondition { seq, owner, violation }) => {
                warn!("Settlement rejected: action #{} from {}: {}", seq, owner, violation);
                let rejected = self.quarantine(seq, violation).await?;
                Ok(SettlementOutcome::Rejected(Box::new(rejected)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn quarantine(&self, seq: u64, violation: Violation) -> LedgerResult<RejectedAction> {
        let mut log = self.log.lock().await;
        let entry = log
            .remove(seq)
            .ok_or_else(|| StoreError::Corrupt(format!("action #{seq} is no longer pending")))?;
        self.store.replace_log(log.entries())?;
        let rejected = RejectedAction { entry, violation, rejected_at: Utc::now() };
        self.rejected.lock().await.push(rejected.clone());
        Ok(rejected)
    }

    /// Settles until the log is empty. Returns every rejected action.
    pub async fn settle_all(&self, settler: &Settler) -> LedgerResult<Vec<RejectedAction>> {
        let mut rejected = Vec::new();
        loop {
            match self.run_settlement(settler).await? {
                SettlementOutcome::Idle => return Ok(rejected),
                SettlementOutcome::Settled { .. } => {}
                SettlementOutcome::Rejected(r) => rejected.push(*r),
            }
        }
    }

    pub async fn get_devices(&self, owner: &OwnerId) -> DeviceSlots {
        self.snapshot.read().await.devices(owner)
    }

    pub async fn get_session(&self, identity: &IdentityCommitment) -> Option<SessionKey> {
        self.snapshot.read().await.session(identity)
    }

    pub async fn state_root(&self) -> StateRoot {
        self.snapshot.read().await.state_root()
    }

    pub async fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    pub async fn pending_len(&self) -> usize {
        self.log.lock().await.len()
    }

    pub async fn rejected(&self) -> Vec<RejectedAction> {
        self.rejected.lock().await.clone()
    }
}
