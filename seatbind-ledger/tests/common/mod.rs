//! Shared fixtures for ledger tests.

#![allow(dead_code)]

use std::sync::Arc;

use seatbind_circuit::{
    AttestingProver, BundleBuilder, BundleCertificate, EncodedIdentifiers, Proof, SessionPublic,
    attest, encode, transition,
};
use seatbind_device::RawIdentifierSet;
use seatbind_ledger::{
    ActionPayload, DeviceBinding, Ledger, LedgerConfig, LedgerParts, LedgerStore, MemoryStore,
    Settler, StaticLicenseGate,
};
use seatbind_types::{IdentityCommitment, LicenseId, OwnerId, SessionKey, SlotIndex};

pub const LICENSE: LicenseId = LicenseId::new(42);

pub fn prover() -> AttestingProver {
    AttestingProver::from_bytes(&[11; 32])
}

pub fn settler() -> Settler {
    Settler::from_bytes(&[23; 32])
}

pub fn owner(n: u8) -> OwnerId {
    OwnerId::from_bytes([n; 32])
}

pub fn device(n: u8) -> EncodedIdentifiers {
    encode(&RawIdentifierSet {
        cpu_id: format!("AuthenticAMD Family 25 Model {n}"),
        system_serial: format!("PF3{n:05}"),
        system_uuid: format!("e3b0c442-98fc-1c14-9afb-f4c8996fb9{n:02x}"),
        baseboard_serial: format!("L1HF{n:04}"),
        mac_ethernet: format!("00:1a:2b:3c:4d:{n:02x}"),
        mac_wifi: format!("70:1a:b8:00:11:{n:02x}"),
        disk_serial: String::new(),
    })
    .unwrap()
}

/// Attested registration of device `n` into `slot` with `session_key`.
pub fn binding(n: u8, slot: u8, session_key: SessionKey) -> DeviceBinding {
    let (identity, attestation) = attest(&prover(), &device(n)).unwrap();
    DeviceBinding {
        identity,
        slot: SlotIndex::new(slot).unwrap(),
        session_key,
        attestation,
    }
}

pub fn identity(n: u8) -> IdentityCommitment {
    seatbind_circuit::commitment_of(&device(n))
}

/// Bundle rotating each `(device, current, new)` in order.
pub fn bundle(rotations: &[(u8, SessionKey, SessionKey)]) -> (BundleCertificate, Proof) {
    let prover = prover();
    let mut builder = BundleBuilder::new(&prover, LICENSE).unwrap();
    for &(n, current, new) in rotations {
        let public = SessionPublic { license_id: LICENSE, current, new };
        let (cert, proof) = transition(&prover, public, &device(n)).unwrap();
        builder = builder.push(&cert, &proof).unwrap();
    }
    builder.finish()
}

pub fn bundle_action(rotations: &[(u8, SessionKey, SessionKey)]) -> ActionPayload {
    let (bundle, proof) = bundle(rotations);
    ActionPayload::SubmitBundle { license_id: LICENSE, bundle, proof }
}

/// Ledger over `store` where owners 1..=4 hold [`LICENSE`].
pub fn ledger_with(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Ledger {
    let gate = StaticLicenseGate::new();
    for n in 1..=4 {
        gate.grant(owner(n), LICENSE);
    }
    Ledger::open(LedgerParts {
        config,
        store,
        verifier: Arc::new(prover().verifier()),
        settlement_verifier: settler().verifier(),
        gate: Arc::new(gate),
    })
    .unwrap()
}

pub fn ledger() -> Ledger {
    ledger_with(Arc::new(MemoryStore::new()), LedgerConfig::default())
}
