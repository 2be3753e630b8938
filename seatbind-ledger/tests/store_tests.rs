mod common;

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;

use common::{binding, identity, ledger_with, owner, settler};
use seatbind_ledger::{
    ActionPayload, JsonFileStore, LedgerConfig, LedgerStore, Snapshot, StoreError,
};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> Arc<JsonFileStore> {
    Arc::new(JsonFileStore::open(dir.path()).unwrap())
}

#[tokio::test]
async fn ledger_recovers_snapshot_and_pending_log() {
    let dir = TempDir::new().unwrap();
    let root = {
        let ledger = ledger_with(open_store(&dir), LedgerConfig::default());
        ledger
            .submit_action(owner(1), ActionPayload::RegisterDevice(binding(1, 1, 4)))
            .await
            .unwrap();
        ledger.run_settlement(&settler()).await.unwrap();
        ledger
            .submit_action(owner(1), ActionPayload::RegisterDevice(binding(2, 2, 6)))
            .await
            .unwrap();
        ledger.state_root().await
    };

    let reopened = ledger_with(open_store(&dir), LedgerConfig::default());
    assert_eq!(reopened.state_root().await, root);
    assert_eq!(reopened.get_session(&identity(1)).await, Some(4));
    assert_eq!(reopened.pending_len().await, 1);

    reopened.run_settlement(&settler()).await.unwrap();
    assert_eq!(reopened.get_session(&identity(2)).await, Some(6));
    assert_eq!(reopened.snapshot().await.applied_through, 2);
}

#[tokio::test]
async fn quarantine_is_persisted() {
    let dir = TempDir::new().unwrap();
    {
        let ledger = ledger_with(open_store(&dir), LedgerConfig::default());
        ledger
            .submit_action(owner(1), ActionPayload::ChangeDevice(binding(1, 1, 1)))
            .await
            .unwrap();
        ledger
            .submit_action(owner(2), ActionPayload::RegisterDevice(binding(2, 1, 1)))
            .await
            .unwrap();
        // owner 1 has no devices, so its change is rejected first
        let rejected = ledger.settle_all(&settler()).await.unwrap();
        assert_eq!(rejected.len(), 1);
    }

    let store = open_store(&dir);
    assert!(store.load_log().unwrap().is_empty());
    let snapshot = store.load_snapshot().unwrap().unwrap();
    assert_eq!(snapshot.applied_through, 1);
    assert_eq!(snapshot.device_at(&owner(2), seatbind_types::SlotIndex::new(1).unwrap()), Some(identity(2)));
}

#[test]
fn torn_trailing_line_is_dropped() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::open(dir.path()).unwrap();
    store.save_snapshot(&Snapshot::genesis()).unwrap();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.path().join("actions.jsonl"))
        .unwrap();
    file.write_all(b"{\"seq\":1,\"id\":").unwrap();

    assert!(store.load_log().unwrap().is_empty());
    assert!(std::fs::read(dir.path().join("actions.jsonl")).unwrap().is_empty());
}

async fn submit_register(dir: &TempDir, n: u8) -> u64 {
    let ledger = ledger_with(open_store(dir), LedgerConfig::default());
    ledger
        .submit_action(owner(1), ActionPayload::RegisterDevice(binding(n, n, u64::from(n))))
        .await
        .unwrap()
        .seq
}

#[tokio::test]
async fn append_after_torn_line_survives_restart() {
    let dir = TempDir::new().unwrap();
    assert_eq!(submit_register(&dir, 1).await, 1);
    let mut file = OpenOptions::new()
        .append(true)
        .open(dir.path().join("actions.jsonl"))
        .unwrap();
    file.write_all(b"{\"seq\":2,\"id\":").unwrap();
    drop(file);

    assert_eq!(submit_register(&dir, 2).await, 2);

    let reopened = ledger_with(open_store(&dir), LedgerConfig::default());
    assert_eq!(reopened.pending_len().await, 2);
    assert!(reopened.settle_all(&settler()).await.unwrap().is_empty());
    assert_eq!(reopened.get_session(&identity(2)).await, Some(2));
}

#[tokio::test]
async fn complete_line_without_newline_is_kept() {
    let dir = TempDir::new().unwrap();
    submit_register(&dir, 1).await;
    let path = dir.path().join("actions.jsonl");
    let mut bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.pop(), Some(b'\n'));
    std::fs::write(&path, bytes).unwrap();

    assert_eq!(submit_register(&dir, 2).await, 2);

    let reopened = ledger_with(open_store(&dir), LedgerConfig::default());
    assert_eq!(reopened.pending_len().await, 2);
}

#[test]
fn corrupt_line_before_the_end_is_an_error() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::open(dir.path()).unwrap();
    std::fs::write(dir.path().join("actions.jsonl"), b"not json\n{}\n").unwrap();

    assert!(matches!(store.load_log(), Err(StoreError::Corrupt(_))));
}

#[test]
fn missing_files_load_as_empty() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::open(dir.path().join("nested")).unwrap();
    assert!(store.load_snapshot().unwrap().is_none());
    assert!(store.load_log().unwrap().is_empty());
    assert!(store.dir().ends_with("nested"));
}

#[test]
fn config_from_json_uses_defaults_for_missing_keys() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.json");
    std::fs::write(&path, br#"{ "max_batch": 8 }"#).unwrap();

    let config = LedgerConfig::from_json_file(&path).unwrap();
    assert_eq!(config.max_batch, 8);
    assert_eq!(config.data_dir, None);
}
