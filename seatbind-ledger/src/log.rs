//! The pending action log.

use chrono::Utc;
use seatbind_types::ActionId;
use sha2::{Digest, Sha256};

use crate::action::{Action, LoggedAction};
use crate::error::{StoreError, StoreResult};

/// Append-only queue of actions not yet settled.
///
/// Sequence numbers are contiguous and continue from the snapshot's
/// `applied_through`.
#[derive(Debug, Clone, Default)]
pub struct ActionLog {
    entries: Vec<LoggedAction>,
    next_seq: u64,
}

impl ActionLog {
    /// An empty log continuing after `applied_through`.
    #[must_use]
    pub fn new(applied_through: u64) -> Self {
        Self {
            entries: Vec::new(),
            next_seq: applied_through + 1,
        }
    }

    /// Rebuilds a log from stored entries, skipping those already settled.
    pub fn recover(applied_through: u64, stored: Vec<LoggedAction>) -> StoreResult<Self> {
        let mut log = Self::new(applied_through);
        for entry in stored.into_iter().filter(|e| e.seq > applied_through) {
            if entry.seq != log.next_seq {
                return Err(StoreError::Corrupt(format!(
                    "expected seq {}, found {}",
                    log.next_seq, entry.seq
                )));
            }
            log.next_seq += 1;
            log.entries.push(entry);
        }
        Ok(log)
    }

    /// Appends `action` at the next sequence number.
    pub fn append(&mut self, action: Action) -> LoggedAction {
        let entry = LoggedAction {
            seq: self.next_seq,
            id: ActionId::new(),
            submitted_at: Utc::now(),
            action,
        };
        self.next_seq += 1;
        self.entries.push(entry.clone());
        entry
    }

    /// The oldest `max` pending entries.
    #[must_use]
    pub fn segment(&self, max: usize) -> Vec<LoggedAction> {
        self.entries.iter().take(max).cloned().collect()
    }

    /// Entries with `first <= seq <= last`.
    #[must_use]
    pub fn range(&self, first: u64, last: u64) -> &[LoggedAction] {
        let start = self.entries.partition_point(|e| e.seq < first);
        let end = self.entries.partition_point(|e| e.seq <= last);
        &self.entries[start..end.max(start)]
    }

    /// Drops every entry up to and including `seq`.
    pub fn truncate_through(&mut self, seq: u64) {
        self.entries.retain(|e| e.seq > seq);
    }

    /// Removes the entry at `seq` and renumbers the later entries so the
    /// log stays contiguous.
    pub fn remove(&mut self, seq: u64) -> Option<LoggedAction> {
        let index = self.entries.iter().position(|e| e.seq == seq)?;
        let removed = self.entries.remove(index);
        for entry in &mut self.entries[index..] {
            entry.seq -= 1;
        }
        self.next_seq -= 1;
        Some(removed)
    }

    #[must_use]
    pub fn entries(&self) -> &[LoggedAction] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Digest binding an ordered segment of entries.
#[must_use]
pub fn segment_digest(segment: &[LoggedAction]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"seatbind.segment.v1");
    hasher.update((segment.len() as u64).to_le_bytes());
    for entry in segment {
        hasher.update(entry.digest());
    }
    hasher.finalize().into()
}
