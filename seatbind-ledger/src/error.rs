//! Error types for the ledger.

use seatbind_circuit::CircuitKind;
use seatbind_types::{IdentityCommitment, LicenseId, OwnerId, SessionKey, SlotIndex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A state precondition that an action failed at settlement time.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    #[error("{slot} is already occupied")]
    SlotOccupied { slot: SlotIndex },

    #[error("identity {} is already bound", .identity.short())]
    IdentityBound { identity: IdentityCommitment },

    #[error("owner holds no devices yet")]
    NoDevices,

    #[error("session key must be non-zero")]
    ZeroSessionKey,

    #[error("identity {} is not one of the owner's devices", .identity.short())]
    UnknownDevice { identity: IdentityCommitment },

    #[error("stale session key for {}: expected {expected:?}, bundle claims {claimed}", .identity.short())]
    StaleSessionKey {
        identity: IdentityCommitment,
        expected: Option<SessionKey>,
        claimed: SessionKey,
    },

    #[error("bundle is for {bundle}, action names {action}")]
    LicenseMismatch { action: LicenseId, bundle: LicenseId },
}

/// Errors raised while reducing a log segment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    /// An action's state precondition does not hold.
    #[error("action #{seq} from {owner} rejected: {violation}")]
    Precondition {
        seq: u64,
        owner: OwnerId,
        violation: Violation,
    },

    /// The segment does not continue the snapshot's log.
    #[error("segment out of order: expected seq {expected}, found {found}")]
    OutOfOrder { expected: u64, found: u64 },
}

/// Result type for settlement operations.
pub type SettlementResult<T> = Result<T, SettlementError>;

/// Reasons an action is refused at submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{0} proof does not verify")]
    InvalidProof(CircuitKind),

    #[error("session key must be non-zero")]
    ZeroSessionKey,

    #[error("identity commitment must be non-zero")]
    ZeroIdentity,

    #[error("bundle is for {bundle}, action names {action}")]
    LicenseMismatch { action: LicenseId, bundle: LicenseId },

    #[error("bundle holds no devices")]
    EmptyBundle,

    #[error("{owner} does not hold {license}")]
    NotLicensed { owner: OwnerId, license: LicenseId },

    #[error("{0} holds no license")]
    Unlicensed(OwnerId),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Reasons a settlement is refused at commit.
#[derive(Debug, Error)]
pub enum SettleError {
    #[error("settlement signature invalid")]
    InvalidSignature,

    #[error("settlement starts from a stale state root")]
    StaleRoot,

    #[error("snapshot version conflict: current {current}, proposed {proposed}")]
    VersionConflict { current: u64, proposed: u64 },

    #[error("settled segment does not match the pending log")]
    SegmentMismatch,

    #[error("new snapshot does not match the settled root")]
    RootMismatch,

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored log is corrupt: {0}")]
    Corrupt(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from a full settlement cycle.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error(transparent)]
    Settle(#[from] SettleError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
