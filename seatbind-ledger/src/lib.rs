//! Device ledger for seatbind.
//!
//! This crate handles:
//! - Validating and queueing owner actions (register, change, bundle)
//! - Reducing queued actions into a new versioned snapshot
//! - Signed settlement proofs binding old root, segment and new root
//! - Quarantining actions whose preconditions fail at settlement
//! - Persisting the snapshot and the pending log
//!
//! # Consistency Model
//!
//! Submission is cheap: it checks proofs and licensing and appends to the
//! log. State preconditions (empty slot, fresh session key, ownership) are
//! checked only when a segment is reduced. A segment is applied entirely or
//! not at all, and the snapshot swap is compare-and-swap on the version.
//!
//! ```ignore
//! let ledger = Ledger::open(parts)?;
//! ledger.submit_action(owner, ActionPayload::RegisterDevice(binding)).await?;
//! ledger.run_settlement(&settler).await?;
//! assert_eq!(ledger.get_session(&identity).await, Some(1));
//! ```

mod action;
mod config;
mod error;
mod gate;
mod hex32;
mod ledger;
mod log;
mod reducer;
mod settlement;
mod snapshot;
mod store;

pub use action::{Action, ActionPayload, ActionReceipt, DeviceBinding, LoggedAction};
pub use config::LedgerConfig;
pub use error::{
    LedgerError, LedgerResult, SettleError, SettlementError, SettlementResult, StoreError,
    StoreResult, SubmitError, Violation,
};
pub use gate::{LicenseGate, StaticLicenseGate};
pub use ledger::{Ledger, LedgerParts, RejectedAction, SettlementOutcome};
pub use log::{ActionLog, segment_digest};
pub use reducer::reduce;
pub use settlement::{SettlementProof, SettlementVerifier, Settler};
pub use snapshot::{DeviceSlots, Snapshot, StateRoot};
pub use store::{JsonFileStore, LedgerStore, MemoryStore};
