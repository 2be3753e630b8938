use pretty_assertions::assert_eq;
use seatbind_cli::{
    KeyFile, attest_identifiers, simulate, synthetic_device, verify_identifiers,
};
use seatbind_ledger::LedgerConfig;
use tempfile::TempDir;

fn keys() -> KeyFile {
    KeyFile { prover: [3; 32], settler: [4; 32] }
}

#[test]
fn key_file_roundtrips_and_is_reused() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keys.json");

    let first = KeyFile::load_or_generate(&path).unwrap();
    let second = KeyFile::load_or_generate(&path).unwrap();
    assert_eq!(first, second);

    let json = std::fs::read_to_string(&path).unwrap();
    assert!(json.contains(&hex_of(&first.prover)));
    assert!(!format!("{first:?}").contains(&hex_of(&first.prover)));
}

fn hex_of(bytes: &[u8; 32]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[test]
fn attestation_blob_verifies_only_for_its_commitment() {
    let keys = keys();
    let attestation = attest_identifiers(&keys, &synthetic_device(1)).unwrap();
    let commitment = attestation.commitment.to_string();
    assert!(verify_identifiers(&keys, &commitment, &attestation.proof).unwrap());

    let other = attest_identifiers(&keys, &synthetic_device(2)).unwrap();
    assert!(!verify_identifiers(&keys, &other.commitment.to_string(), &attestation.proof).unwrap());

    let stranger = KeyFile { prover: [9; 32], ..keys };
    assert!(!verify_identifiers(&stranger, &commitment, &attestation.proof).unwrap());
}

#[test]
fn malformed_inputs_are_errors() {
    let keys = keys();
    assert!(verify_identifiers(&keys, "zz", "AAAA").is_err());

    let mut raw = synthetic_device(1);
    raw.system_serial.clear();
    assert!(attest_identifiers(&keys, &raw).is_err());
}

#[tokio::test]
async fn simulation_rotates_and_rejects_replay() {
    let report = simulate(LedgerConfig::default(), &keys(), 3, 2).await.unwrap();
    assert_eq!(report.devices.len(), 3);
    assert_eq!(report.sessions, vec![Some(1_001), Some(2_001), Some(3_001)]);
    assert_eq!(report.version, 2);
    assert_eq!(report.rejected.len(), 1);
    assert!(report.rejected[0].contains("stale session key"));
}

#[tokio::test]
async fn simulation_persists_to_data_dir() {
    let dir = TempDir::new().unwrap();
    let config = LedgerConfig {
        data_dir: Some(dir.path().to_path_buf()),
        ..LedgerConfig::default()
    };
    let report = simulate(config, &keys(), 1, 1).await.unwrap();
    assert!(dir.path().join("snapshot.json").exists());
    assert_eq!(report.version, 2);
}

#[tokio::test]
async fn simulation_rejects_device_count_above_fan_in() {
    assert!(simulate(LedgerConfig::default(), &keys(), 5, 1).await.is_err());
    assert!(simulate(LedgerConfig::default(), &keys(), 0, 1).await.is_err());
}
