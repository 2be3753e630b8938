//! Library half of the `seatbind` binary: key files, attestation helpers
//! and the end-to-end ledger simulation.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use seatbind_circuit::{
    AttestingProver, BundleBuilder, EncodedIdentifiers, Proof, ProverPool, SessionPublic,
    attest_raw, encode, verify_attestation,
};
use seatbind_device::RawIdentifierSet;
use seatbind_ledger::{
    ActionPayload, DeviceBinding, JsonFileStore, Ledger, LedgerConfig, LedgerParts, LedgerStore,
    MemoryStore, SettlementOutcome, Settler, StaticLicenseGate,
};
use seatbind_types::{FAN_IN, IdentityCommitment, LicenseId, OwnerId, SessionKey, SlotIndex};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Prover and settlement signing keys, stored as JSON.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFile {
    #[serde(with = "hex::serde")]
    pub prover: [u8; 32],
    #[serde(with = "hex::serde")]
    pub settler: [u8; 32],
}

impl std::fmt::Debug for KeyFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyFile").finish_non_exhaustive()
    }
}

impl KeyFile {
    #[must_use]
    pub fn generate() -> Self {
        Self {
            prover: AttestingProver::generate().to_bytes(),
            settler: Settler::generate().to_bytes(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read key file {}", path.display()))?;
        serde_json::from_str(&json).context("Failed to decode key file")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write key file {}", path.display()))
    }

    /// Loads `path`, or generates and writes a fresh key file there.
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading keys from {:?}", path);
            Self::load(path)
        } else {
            info!("Generating new keys at {:?}", path);
            let keys = Self::generate();
            keys.save(path)?;
            Ok(keys)
        }
    }

    #[must_use]
    pub fn prover(&self) -> AttestingProver {
        AttestingProver::from_bytes(&self.prover)
    }

    #[must_use]
    pub fn settler(&self) -> Settler {
        Settler::from_bytes(&self.settler)
    }
}

/// Output of `seatbind attest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attestation {
    pub commitment: IdentityCommitment,
    /// Portable proof blob.
    pub proof: String,
}

/// Attests `raw` with the prover in `keys`.
pub fn attest_identifiers(keys: &KeyFile, raw: &RawIdentifierSet) -> Result<Attestation> {
    let (commitment, proof) = attest_raw(&keys.prover(), raw)?;
    Ok(Attestation { commitment, proof: proof.to_base64()? })
}

/// Checks an attestation blob against `commitment`.
pub fn verify_identifiers(keys: &KeyFile, commitment: &str, proof: &str) -> Result<bool> {
    let commitment = IdentityCommitment::parse(commitment)?;
    let proof = Proof::from_base64(proof)?;
    Ok(verify_attestation(&keys.prover().verifier(), &commitment, &proof))
}

/// Deterministic identifiers of the `n`-th simulated device.
#[must_use]
pub fn synthetic_device(n: u8) -> RawIdentifierSet {
    RawIdentifierSet {
        cpu_id: format!("SimCPU Family 6 Model {n}"),
        system_serial: format!("SIM-{n:04}"),
        system_uuid: format!("0badc0de-5eed-4000-8000-0000000000{n:02x}"),
        baseboard_serial: format!("SIMBB{n:03}"),
        mac_ethernet: format!("02:00:5e:00:00:{n:02x}"),
        mac_wifi: format!("02:00:5e:10:00:{n:02x}"),
        disk_serial: format!("SIMDISK{n:05}"),
    }
}

/// Summary printed by `seatbind simulate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub owner: OwnerId,
    pub license: LicenseId,
    pub devices: Vec<IdentityCommitment>,
    pub sessions: Vec<Option<SessionKey>>,
    pub version: u64,
    pub state_root: String,
    /// Violations of every action settlement refused.
    pub rejected: Vec<String>,
}

const SIM_OWNER: OwnerId = OwnerId::from_bytes([0x5e; 32]);
const SIM_LICENSE: LicenseId = LicenseId::new(1);

/// Opens the ledger described by `config`.
pub fn open_ledger(config: LedgerConfig, keys: &KeyFile, gate: StaticLicenseGate) -> Result<Ledger> {
    let store: Arc<dyn LedgerStore> = match &config.data_dir {
        Some(dir) => Arc::new(JsonFileStore::open(dir)?),
        None => Arc::new(MemoryStore::new()),
    };
    let ledger = Ledger::open(LedgerParts {
        config,
        store,
        verifier: Arc::new(keys.prover().verifier()),
        settlement_verifier: keys.settler().verifier(),
        gate: Arc::new(gate),
    })?;
    Ok(ledger)
}

/// Registers `devices` simulated devices for one owner, rotates all their
/// session keys in one bundle, then replays that bundle, which settlement
/// must reject as stale.
pub async fn simulate(
    config: LedgerConfig,
    keys: &KeyFile,
    devices: u8,
    workers: usize,
) -> Result<SimulationReport> {
    if devices == 0 || usize::from(devices) > FAN_IN {
        bail!("device count must be between 1 and {FAN_IN}");
    }

    let gate = StaticLicenseGate::new();
    gate.grant(SIM_OWNER, SIM_LICENSE);
    let ledger = open_ledger(config, keys, gate)?;
    let settler = keys.settler();
    let pool = ProverPool::new(Arc::new(keys.prover()), workers);

    let encoded = (1..=devices)
        .map(|n| encode(&synthetic_device(n)))
        .collect::<Result<Vec<EncodedIdentifiers>, _>>()?;

    info!("Attesting {} devices", devices);
    let mut identities = Vec::with_capacity(encoded.len());
    for (n, result) in (1..=devices).zip(pool.attest_many(encoded.clone()).await) {
        let (identity, attestation) = result?;
        let binding = DeviceBinding {
            identity,
            slot: SlotIndex::new(n)?,
            session_key: initial_key(n),
            attestation,
        };
        ledger.submit_action(SIM_OWNER, ActionPayload::RegisterDevice(binding)).await?;
        identities.push(identity);
    }
    let mut rejected = settle(&ledger, &settler).await?;

    info!("Rotating session keys");
    let jobs = (1..=devices)
        .zip(encoded)
        .map(|(n, ids)| {
            let public = SessionPublic {
                license_id: SIM_LICENSE,
                current: initial_key(n),
                new: initial_key(n) + 1,
            };
            (public, ids)
        })
        .collect();
    let mut builder = BundleBuilder::new(pool.backend().as_ref(), SIM_LICENSE)?;
    for result in pool.transition_many(jobs).await {
        let (certificate, proof) = result?;
        builder = builder.push(&certificate, &proof)?;
    }
    let (bundle, proof) = builder.finish();
    let rotation = ActionPayload::SubmitBundle { license_id: SIM_LICENSE, bundle, proof };
    ledger.submit_action(SIM_OWNER, rotation.clone()).await?;
    rejected.extend(settle(&ledger, &settler).await?);

    info!("Replaying the rotation bundle");
    ledger.submit_action(SIM_OWNER, rotation).await?;
    rejected.extend(settle(&ledger, &settler).await?);

    let snapshot = ledger.snapshot().await;
    Ok(SimulationReport {
        owner: SIM_OWNER,
        license: SIM_LICENSE,
        sessions: identities.iter().map(|id| snapshot.session(id)).collect(),
        devices: identities,
        version: snapshot.version,
        state_root: snapshot.state_root().to_string(),
        rejected,
    })
}

fn initial_key(n: u8) -> SessionKey {
    u64::from(n) * 1_000
}

async fn settle(ledger: &Ledger, settler: &Settler) -> Result<Vec<String>> {
    let mut rejected = Vec::new();
    loop {
        match ledger.run_settlement(settler).await? {
            SettlementOutcome::Idle => return Ok(rejected),
            SettlementOutcome::Settled { root, applied } => {
                info!("Settled {} actions, root {}", applied, root);
            }
            SettlementOutcome::Rejected(r) => {
                warn!("Action #{} rejected: {}", r.entry.seq, r.violation);
                rejected.push(r.violation.to_string());
            }
        }
    }
}
