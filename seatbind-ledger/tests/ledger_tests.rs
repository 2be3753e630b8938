mod common;

use common::{
    LICENSE, binding, bundle, bundle_action, identity, ledger, ledger_with, owner, settler,
};
use pretty_assertions::assert_eq;
use seatbind_circuit::{BundleBuilder, CircuitKind};
use seatbind_ledger::{
    ActionPayload, LedgerConfig, MemoryStore, SettleError, SettlementOutcome, Settler,
    SubmitError, Violation,
};
use seatbind_types::{LicenseId, SlotIndex};
use std::sync::Arc;

fn slot(n: u8) -> SlotIndex {
    SlotIndex::new(n).unwrap()
}

// ── End-to-end ──────────────────────────────────────────────────

#[tokio::test]
async fn register_rotate_and_replay() {
    let ledger = ledger();
    let settler = settler();
    let alice = owner(1);

    let receipt = ledger
        .submit_action(alice, ActionPayload::RegisterDevice(binding(1, 1, 1)))
        .await
        .unwrap();
    assert_eq!(receipt.seq, 1);
    // pending actions are invisible to reads
    assert_eq!(ledger.get_session(&identity(1)).await, None);

    let outcome = ledger.run_settlement(&settler).await.unwrap();
    assert!(matches!(outcome, SettlementOutcome::Settled { applied: 1, .. }));
    assert_eq!(ledger.get_session(&identity(1)).await, Some(1));
    assert_eq!(ledger.get_devices(&alice).await, [Some(identity(1)), None, None, None]);

    ledger.submit_action(alice, bundle_action(&[(1, 1, 2)])).await.unwrap();
    ledger.run_settlement(&settler).await.unwrap();
    assert_eq!(ledger.get_session(&identity(1)).await, Some(2));

    // the same rotation again no longer matches the current key
    ledger.submit_action(alice, bundle_action(&[(1, 1, 2)])).await.unwrap();
    let root = ledger.state_root().await;
    let outcome = ledger.run_settlement(&settler).await.unwrap();
    let SettlementOutcome::Rejected(rejected) = outcome else {
        panic!("expected rejection, got {outcome:?}");
    };
    assert_eq!(
        rejected.violation,
        Violation::StaleSessionKey { identity: identity(1), expected: Some(2), claimed: 1 }
    );
    assert_eq!(ledger.state_root().await, root);
    assert_eq!(ledger.pending_len().await, 0);
    assert_eq!(ledger.rejected().await.len(), 1);
    assert_eq!(ledger.snapshot().await.version, 2);
}

#[tokio::test]
async fn bundle_rotates_all_devices_at_once() {
    let ledger = ledger();
    let settler = settler();
    let alice = owner(1);
    for (n, key) in [(1u8, 10u64), (2, 20), (3, 30)] {
        ledger
            .submit_action(alice, ActionPayload::RegisterDevice(binding(n, n, key)))
            .await
            .unwrap();
    }
    ledger.run_settlement(&settler).await.unwrap();

    ledger
        .submit_action(alice, bundle_action(&[(3, 30, 31), (1, 10, 11), (2, 20, 21)]))
        .await
        .unwrap();
    ledger.run_settlement(&settler).await.unwrap();

    assert_eq!(ledger.get_session(&identity(1)).await, Some(11));
    assert_eq!(ledger.get_session(&identity(2)).await, Some(21));
    assert_eq!(ledger.get_session(&identity(3)).await, Some(31));
}

#[tokio::test]
async fn one_stale_slot_rejects_the_whole_bundle() {
    let ledger = ledger();
    let settler = settler();
    let alice = owner(1);
    ledger.submit_action(alice, ActionPayload::RegisterDevice(binding(1, 1, 10))).await.unwrap();
    ledger.submit_action(alice, ActionPayload::RegisterDevice(binding(2, 2, 20))).await.unwrap();
    ledger.run_settlement(&settler).await.unwrap();

    ledger
        .submit_action(alice, bundle_action(&[(1, 10, 11), (2, 19, 21)]))
        .await
        .unwrap();
    let outcome = ledger.run_settlement(&settler).await.unwrap();
    assert!(matches!(outcome, SettlementOutcome::Rejected(_)));
    assert_eq!(ledger.get_session(&identity(1)).await, Some(10));
    assert_eq!(ledger.get_session(&identity(2)).await, Some(20));
}

#[tokio::test]
async fn bundle_for_another_owners_device_is_rejected() {
    let ledger = ledger();
    let settler = settler();
    ledger
        .submit_action(owner(1), ActionPayload::RegisterDevice(binding(1, 1, 5)))
        .await
        .unwrap();
    ledger.run_settlement(&settler).await.unwrap();

    ledger.submit_action(owner(2), bundle_action(&[(1, 5, 6)])).await.unwrap();
    let rejected = ledger.settle_all(&settler).await.unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].violation, Violation::UnknownDevice { identity: identity(1) });
    assert_eq!(ledger.get_session(&identity(1)).await, Some(5));
}

// ── Quarantine ──────────────────────────────────────────────────

#[tokio::test]
async fn conflicting_registration_is_quarantined_and_rest_settles() {
    let ledger = ledger();
    let settler = settler();

    // the earliest claim wins the device, whatever the owner keys
    let kept = ledger
        .submit_action(owner(2), ActionPayload::RegisterDevice(binding(1, 1, 3)))
        .await
        .unwrap();
    ledger.submit_action(owner(1), ActionPayload::RegisterDevice(binding(1, 2, 4))).await.unwrap();
    ledger.submit_action(owner(3), ActionPayload::RegisterDevice(binding(3, 1, 9))).await.unwrap();

    let rejected = ledger.settle_all(&settler).await.unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].entry.action.owner, owner(1));
    assert_eq!(rejected[0].violation, Violation::IdentityBound { identity: identity(1) });

    let snapshot = ledger.snapshot().await;
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.applied_through, 2);
    assert_eq!(snapshot.device_at(&owner(2), slot(1)), Some(identity(1)));
    assert_eq!(snapshot.device_at(&owner(3), slot(1)), Some(identity(3)));
    assert_eq!(ledger.get_devices(&owner(1)).await, [None; 4]);
    assert_eq!(ledger.get_session(&identity(1)).await, Some(3));
    assert_eq!(kept.seq, 1);
}

#[tokio::test]
async fn contested_identity_does_not_depend_on_batch_size() {
    let mut finals = Vec::new();
    for max_batch in [1, 2, 64] {
        let config = LedgerConfig { max_batch, ..LedgerConfig::default() };
        let ledger = ledger_with(Arc::new(MemoryStore::new()), config);
        ledger.submit_action(owner(2), ActionPayload::RegisterDevice(binding(1, 1, 3))).await.unwrap();
        ledger.submit_action(owner(1), ActionPayload::RegisterDevice(binding(1, 1, 4))).await.unwrap();
        ledger.submit_action(owner(1), ActionPayload::RegisterDevice(binding(2, 2, 5))).await.unwrap();

        let rejected = ledger.settle_all(&settler()).await.unwrap();
        assert_eq!(rejected.len(), 1, "max_batch {max_batch}");
        assert_eq!(rejected[0].entry.action.owner, owner(1));

        let snapshot = ledger.snapshot().await;
        finals.push((snapshot.devices_by_owner.clone(), snapshot.session_by_identity.clone()));
    }
    assert!(finals.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(finals[0].0[&owner(2)][0], Some(identity(1)));
}

#[tokio::test]
async fn duplicate_device_in_bundle_fails_as_stale() {
    let ledger = ledger();
    let settler = settler();
    ledger.submit_action(owner(1), ActionPayload::RegisterDevice(binding(1, 1, 1))).await.unwrap();
    ledger.run_settlement(&settler).await.unwrap();

    ledger
        .submit_action(owner(1), bundle_action(&[(1, 1, 2), (1, 1, 2)]))
        .await
        .unwrap();
    let rejected = ledger.settle_all(&settler).await.unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(
        rejected[0].violation,
        Violation::StaleSessionKey { identity: identity(1), expected: Some(2), claimed: 1 }
    );
    assert_eq!(ledger.get_session(&identity(1)).await, Some(1));
    assert_eq!(ledger.snapshot().await.version, 1);
}

#[tokio::test]
async fn occupied_slot_is_rejected() {
    let ledger = ledger();
    let settler = settler();
    let alice = owner(1);
    ledger.submit_action(alice, ActionPayload::RegisterDevice(binding(1, 1, 1))).await.unwrap();
    ledger.submit_action(alice, ActionPayload::RegisterDevice(binding(2, 1, 1))).await.unwrap();

    let rejected = ledger.settle_all(&settler).await.unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].violation, Violation::SlotOccupied { slot: slot(1) });
    assert_eq!(ledger.get_devices(&alice).await[0], Some(identity(1)));
}

// ── ChangeDevice ────────────────────────────────────────────────

#[tokio::test]
async fn change_device_requires_existing_devices() {
    let ledger = ledger();
    ledger
        .submit_action(owner(1), ActionPayload::ChangeDevice(binding(1, 1, 1)))
        .await
        .unwrap();
    let rejected = ledger.settle_all(&settler()).await.unwrap();
    assert_eq!(rejected[0].violation, Violation::NoDevices);
}

#[tokio::test]
async fn change_device_replaces_slot_and_drops_old_session() {
    let ledger = ledger();
    let settler = settler();
    let alice = owner(1);
    ledger.submit_action(alice, ActionPayload::RegisterDevice(binding(1, 1, 1))).await.unwrap();
    ledger.run_settlement(&settler).await.unwrap();

    ledger.submit_action(alice, ActionPayload::ChangeDevice(binding(2, 1, 50))).await.unwrap();
    ledger.submit_action(alice, ActionPayload::ChangeDevice(binding(3, 4, 60))).await.unwrap();
    assert!(ledger.settle_all(&settler).await.unwrap().is_empty());

    assert_eq!(
        ledger.get_devices(&alice).await,
        [Some(identity(2)), None, None, Some(identity(3))]
    );
    assert_eq!(ledger.get_session(&identity(1)).await, None);
    assert_eq!(ledger.get_session(&identity(2)).await, Some(50));
    assert_eq!(ledger.get_session(&identity(3)).await, Some(60));
}

#[tokio::test]
async fn change_device_cannot_take_anothers_identity() {
    let ledger = ledger();
    let settler = settler();
    ledger.submit_action(owner(1), ActionPayload::RegisterDevice(binding(1, 1, 1))).await.unwrap();
    ledger.submit_action(owner(2), ActionPayload::RegisterDevice(binding(2, 1, 1))).await.unwrap();
    ledger.run_settlement(&settler).await.unwrap();

    ledger.submit_action(owner(2), ActionPayload::ChangeDevice(binding(1, 2, 7))).await.unwrap();
    let rejected = ledger.settle_all(&settler).await.unwrap();
    assert_eq!(rejected[0].violation, Violation::IdentityBound { identity: identity(1) });
}

// ── Submission checks ───────────────────────────────────────────

#[tokio::test]
async fn submit_rejects_zero_session_key() {
    let err = ledger()
        .submit_action(owner(1), ActionPayload::RegisterDevice(binding(1, 1, 0)))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::ZeroSessionKey));
}

#[tokio::test]
async fn submit_rejects_attestation_for_other_identity() {
    let mut forged = binding(1, 1, 1);
    forged.identity = identity(2);
    let err = ledger()
        .submit_action(owner(1), ActionPayload::RegisterDevice(forged))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::InvalidProof(CircuitKind::IdentityAttestation)));
}

#[tokio::test]
async fn submit_rejects_tampered_bundle() {
    let (mut bundle, proof) = bundle(&[(1, 1, 2)]);
    bundle.slots[0].new_key = 3;
    let err = ledger()
        .submit_action(
            owner(1),
            ActionPayload::SubmitBundle { license_id: LICENSE, bundle, proof },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::InvalidProof(CircuitKind::BundleAppend)));
}

#[tokio::test]
async fn submit_rejects_empty_and_mismatched_bundles() {
    let ledger = ledger();
    let prover = common::prover();
    let (empty, proof) = BundleBuilder::new(&prover, LICENSE).unwrap().finish();
    let err = ledger
        .submit_action(
            owner(1),
            ActionPayload::SubmitBundle { license_id: LICENSE, bundle: empty, proof },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::EmptyBundle));

    let (bundle, proof) = bundle(&[(1, 1, 2)]);
    let err = ledger
        .submit_action(
            owner(1),
            ActionPayload::SubmitBundle { license_id: LicenseId::new(1), bundle, proof },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::LicenseMismatch { .. }));
    assert_eq!(ledger.pending_len().await, 0);
}

#[tokio::test]
async fn submit_rejects_unlicensed_owner() {
    let err = ledger()
        .submit_action(owner(9), bundle_action(&[(1, 1, 2)]))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::NotLicensed { .. }));
}

#[tokio::test]
async fn submit_rejects_unlicensed_registration() {
    let ledger = ledger();
    for payload in [
        ActionPayload::RegisterDevice(binding(1, 1, 1)),
        ActionPayload::ChangeDevice(binding(1, 1, 1)),
    ] {
        let err = ledger.submit_action(owner(9), payload).await.unwrap_err();
        assert!(matches!(err, SubmitError::Unlicensed(o) if o == owner(9)));
    }
    assert_eq!(ledger.pending_len().await, 0);
}

// ── Settlement commit checks ────────────────────────────────────

#[tokio::test]
async fn settle_rejects_foreign_signer() {
    let ledger = ledger();
    ledger.submit_action(owner(1), ActionPayload::RegisterDevice(binding(1, 1, 1))).await.unwrap();
    let (snapshot, segment) = ledger.pending_segment().await;
    let (next, proof) = Settler::generate().settle(&snapshot, &segment).unwrap();
    assert!(matches!(ledger.settle(next, proof).await, Err(SettleError::InvalidSignature)));
}

#[tokio::test]
async fn settle_rejects_stale_root_and_version_conflict() {
    let ledger = ledger();
    let settler = settler();
    ledger.submit_action(owner(1), ActionPayload::RegisterDevice(binding(1, 1, 1))).await.unwrap();
    let (snapshot, segment) = ledger.pending_segment().await;
    let (next, proof) = settler.settle(&snapshot, &segment).unwrap();

    let mut skipped = next.clone();
    skipped.version += 1;
    assert!(matches!(
        ledger.settle(skipped, proof.clone()).await,
        Err(SettleError::VersionConflict { current: 0, proposed: 2 })
    ));

    ledger.settle(next.clone(), proof.clone()).await.unwrap();
    assert!(matches!(ledger.settle(next, proof).await, Err(SettleError::StaleRoot)));
}

#[tokio::test]
async fn settle_rejects_segment_not_in_log() {
    let ledger = ledger();
    let settler = settler();
    ledger.submit_action(owner(1), ActionPayload::RegisterDevice(binding(1, 1, 1))).await.unwrap();
    let (snapshot, mut segment) = ledger.pending_segment().await;
    segment[0].action.owner = owner(2);
    let (next, proof) = settler.settle(&snapshot, &segment).unwrap();
    assert!(matches!(ledger.settle(next, proof).await, Err(SettleError::SegmentMismatch)));
}

#[tokio::test]
async fn settle_rejects_snapshot_not_matching_root() {
    let ledger = ledger();
    let settler = settler();
    ledger.submit_action(owner(1), ActionPayload::RegisterDevice(binding(1, 1, 1))).await.unwrap();
    let (snapshot, segment) = ledger.pending_segment().await;
    let (mut next, proof) = settler.settle(&snapshot, &segment).unwrap();
    next.session_by_identity.insert(identity(1), 99);
    assert!(matches!(ledger.settle(next, proof).await, Err(SettleError::RootMismatch)));
    assert_eq!(ledger.snapshot().await.version, 0);
}

#[tokio::test]
async fn batches_are_capped_by_config() {
    let config = LedgerConfig { max_batch: 2, ..LedgerConfig::default() };
    let ledger = ledger_with(Arc::new(MemoryStore::new()), config);
    let settler = settler();
    for n in 1..=3 {
        ledger
            .submit_action(owner(1), ActionPayload::RegisterDevice(binding(n, n, 1)))
            .await
            .unwrap();
    }

    let first = ledger.run_settlement(&settler).await.unwrap();
    assert!(matches!(first, SettlementOutcome::Settled { applied: 2, .. }));
    let second = ledger.run_settlement(&settler).await.unwrap();
    assert!(matches!(second, SettlementOutcome::Settled { applied: 1, .. }));
    assert_eq!(ledger.run_settlement(&settler).await.unwrap(), SettlementOutcome::Idle);
    assert_eq!(ledger.snapshot().await.version, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_get_distinct_seqs() {
    let ledger = Arc::new(ledger());
    let bindings: Vec<_> = (1..=4).map(|n| (owner(n), binding(n, 1, 1))).collect();

    let handles: Vec<_> = bindings
        .into_iter()
        .map(|(who, b)| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                ledger.submit_action(who, ActionPayload::RegisterDevice(b)).await
            })
        })
        .collect();

    let mut seqs = Vec::new();
    for handle in handles {
        seqs.push(handle.await.unwrap().unwrap().seq);
    }
    seqs.sort_unstable();
    assert_eq!(seqs, vec![1, 2, 3, 4]);

    assert!(ledger.settle_all(&settler()).await.unwrap().is_empty());
    for n in 1..=4 {
        assert_eq!(ledger.get_session(&identity(n)).await, Some(1));
    }
}
