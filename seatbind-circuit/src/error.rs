//! Error types for encoding, synthesis and proving.

use std::fmt;

use seatbind_device::IdentifierField;
use thiserror::Error;

use crate::proof::CircuitKind;

/// Why an identifier field was rejected. Never carries the field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatIssue {
    /// Required field is empty after trimming.
    Empty,
    /// Free-form field exceeds its fixed width.
    TooLong { max: usize, actual: usize },
    /// Hex field has the wrong number of digits after separator removal.
    WrongLength { expected: usize, actual: usize },
    /// Hex field contains a non-hex character.
    NotHex,
    /// Field contains a NUL byte, which is reserved for padding.
    NulByte,
}

impl fmt::Display for FormatIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("required value is empty"),
            Self::TooLong { max, actual } => write!(f, "{actual} bytes exceeds width {max}"),
            Self::WrongLength { expected, actual } => {
                write!(f, "expected {expected} hex digits, got {actual}")
            }
            Self::NotHex => f.write_str("contains a non-hex character"),
            Self::NulByte => f.write_str("contains a NUL byte"),
        }
    }
}

/// Malformed raw identifiers, rejected before any proof is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("invalid {field}: {reason}")]
    InvalidFormat {
        field: IdentifierField,
        reason: FormatIssue,
    },
}

impl EncodeError {
    pub(crate) fn new(field: IdentifierField, reason: FormatIssue) -> Self {
        Self::InvalidFormat { field, reason }
    }

    /// The field that failed validation.
    pub fn field(&self) -> IdentifierField {
        match self {
            Self::InvalidFormat { field, .. } => *field,
        }
    }
}

/// Circuit-level errors.
#[derive(Debug, Error)]
pub enum CircuitError {
    /// Input was rejected by the canonical encoder.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The witness does not satisfy a constraint.
    #[error("{circuit} circuit unsatisfied at constraint `{constraint}`")]
    Unsatisfied {
        circuit: CircuitKind,
        constraint: &'static str,
    },

    /// A proof consumed by a recursive step failed verification.
    #[error("child proof invalid: {0}")]
    ChildProofInvalid(&'static str),

    /// Bytes do not encode a field element.
    #[error("identity commitment is not a canonical field element")]
    InvalidCommitment,

    /// The synthesized circuit does not have the reference shape.
    #[error("{0} circuit shape does not match the reference shape")]
    ShapeMismatch(CircuitKind),

    /// Key bytes do not encode a valid verifying key.
    #[error("invalid prover key")]
    InvalidKey,

    /// Portable proof blob could not be decoded.
    #[error("proof encoding error: {0}")]
    ProofEncoding(String),

    /// A prover worker panicked or was cancelled.
    #[error("prover worker failed: {0}")]
    Worker(String),
}

/// Result type for circuit operations.
pub type CircuitResult<T> = Result<T, CircuitError>;
