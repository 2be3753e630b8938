//! Snapshot and pending-log persistence.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::action::LoggedAction;
use crate::error::{StoreError, StoreResult};
use crate::snapshot::Snapshot;

const SNAPSHOT_FILE: &str = "snapshot.json";
const LOG_FILE: &str = "actions.jsonl";

/// Durable home of the snapshot and the pending log.
pub trait LedgerStore: Send + Sync {
    fn load_snapshot(&self) -> StoreResult<Option<Snapshot>>;
    fn save_snapshot(&self, snapshot: &Snapshot) -> StoreResult<()>;
    fn load_log(&self) -> StoreResult<Vec<LoggedAction>>;
    fn append_action(&self, entry: &LoggedAction) -> StoreResult<()>;
    /// Replaces the stored log with `entries`.
    fn replace_log(&self, entries: &[LoggedAction]) -> StoreResult<()>;
}

/// Volatile store for tests and simulations.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<(Option<Snapshot>, Vec<LoggedAction>)>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn load_snapshot(&self) -> StoreResult<Option<Snapshot>> {
        Ok(self.inner.lock().map_err(|_| StoreError::Poisoned)?.0.clone())
    }

    fn save_snapshot(&self, snapshot: &Snapshot) -> StoreResult<()> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)?.0 = Some(snapshot.clone());
        Ok(())
    }

    fn load_log(&self) -> StoreResult<Vec<LoggedAction>> {
        Ok(self.inner.lock().map_err(|_| StoreError::Poisoned)?.1.clone())
    }

    fn append_action(&self, entry: &LoggedAction) -> StoreResult<()> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)?.1.push(entry.clone());
        Ok(())
    }

    fn replace_log(&self, entries: &[LoggedAction]) -> StoreResult<()> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)?.1 = entries.to_vec();
        Ok(())
    }
}

/// JSON files in a directory: `snapshot.json` plus one log entry per line
/// in `actions.jsonl`. Whole-file writes go through a temp file and rename.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    log_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Opens (and creates if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!("Opened ledger store at {}", dir.display());
        Ok(Self { dir, log_lock: Mutex::new(()) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> StoreResult<()> {
        let target = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &target)?;
        Ok(())
    }
}

impl LedgerStore for JsonFileStore {
    fn load_snapshot(&self) -> StoreResult<Option<Snapshot>> {
        let path = self.dir.join(SNAPSHOT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn save_snapshot(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        self.write_atomic(SNAPSHOT_FILE, &json)
    }

    /// Reads the log, cutting off a torn final line so later appends start
    /// on a fresh line.
    fn load_log(&self) -> StoreResult<Vec<LoggedAction>> {
        let path = self.dir.join(LOG_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let _guard = self.log_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let bytes = fs::read(&path)?;
        let mut entries = Vec::new();
        let mut torn_at = None;
        let mut offset = 0;
        for (n, line) in bytes.split_inclusive(|b| *b == b'\n').enumerate() {
            let start = offset;
            offset += line.len();
            if line.trim_ascii().is_empty() {
                continue;
            }
            match serde_json::from_slice(line) {
                Ok(entry) => entries.push(entry),
                // only the final line can lack its newline
                Err(e) if !line.ends_with(b"\n") => {
                    warn!("Dropping torn trailing log line: {}", e);
                    torn_at = Some(start);
                }
                Err(e) => return Err(StoreError::Corrupt(format!("line {}: {e}", n + 1))),
            }
        }

        if let Some(len) = torn_at {
            let file = OpenOptions::new().write(true).open(&path)?;
            file.set_len(len as u64)?;
            file.sync_data()?;
        } else if bytes.last().is_some_and(|b| *b != b'\n') {
            let mut file = OpenOptions::new().append(true).open(&path)?;
            file.write_all(b"\n")?;
            file.sync_data()?;
        }
        Ok(entries)
    }

    fn append_action(&self, entry: &LoggedAction) -> StoreResult<()> {
        let _guard = self.log_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(LOG_FILE))?;
        file.write_all(&line)?;
        file.sync_data()?;
        Ok(())
    }

    fn replace_log(&self, entries: &[LoggedAction]) -> StoreResult<()> {
        let _guard = self.log_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut bytes = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut bytes, entry)?;
            bytes.push(b'\n');
        }
        self.write_atomic(LOG_FILE, &bytes)
    }
}
