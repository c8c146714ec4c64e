use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::party::PartyKey;
use crate::record::{ProductColor, ProductStatus};

/// A single broken business rule.
///
/// Verification collects every violation on a transaction, so a rejection can
/// carry several of these at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Violation {
    /// Create consumed records.
    InputsOnCreate { found: usize },
    InputCount { expected: usize, found: usize },
    OutputCount { expected: usize, found: usize },
    ProductName { found: String },
    ProductColor { found: ProductColor },
    InitialStatus { found: ProductStatus },
    /// Update did not change the status.
    StatusUnchanged { status: ProductStatus },
    /// Update did not land on the terminal status.
    TerminalStatus { found: ProductStatus },
    ImmutableFieldChanged {
        field: String,
        from: String,
        to: String,
    },
    RecordIdChanged,
    DuplicateParticipant,
    Signers {
        expected: BTreeSet<PartyKey>,
        found: BTreeSet<PartyKey>,
    },
    /// Raised by the accepting party, independent of contract verification.
    UnexpectedProposalStatus {
        expected: ProductStatus,
        found: ProductStatus,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::InputsOnCreate { found } => write!(
                f,
                "no inputs should be consumed when creating a product (found {})",
                found
            ),
            Violation::InputCount { expected, found } => write!(
                f,
                "a product update must consume exactly {} input (found {})",
                expected, found
            ),
            Violation::OutputCount { expected, found } => write!(
                f,
                "exactly {} product output must be produced (found {})",
                expected, found
            ),
            Violation::ProductName { found } => {
                write!(f, "product name must be Gadgets (found '{}')", found)
            }
            Violation::ProductColor { found } => write!(
                f,
                "a newly issued product must be Red or Green (found {})",
                found
            ),
            Violation::InitialStatus { found } => write!(
                f,
                "a newly issued product must be Pending (found {})",
                found
            ),
            Violation::StatusUnchanged { status } => {
                write!(f, "status must change on update (stayed {})", status)
            }
            Violation::TerminalStatus { found } => write!(
                f,
                "status must change to Received on update (found {})",
                found
            ),
            Violation::ImmutableFieldChanged { field, from, to } => write!(
                f,
                "immutable field changed: {} '{}' -> '{}'",
                field, from, to
            ),
            Violation::RecordIdChanged => {
                write!(f, "updated record must keep the consumed record's id")
            }
            Violation::DuplicateParticipant => {
                write!(f, "a product must have two distinct participants")
            }
            Violation::Signers { expected, found } => write!(
                f,
                "both participants must sign: expected [{}], got [{}]",
                fingerprints(expected),
                fingerprints(found)
            ),
            Violation::UnexpectedProposalStatus { expected, found } => write!(
                f,
                "proposed product status must be {} (found {})",
                expected, found
            ),
        }
    }
}

fn fingerprints(keys: &BTreeSet<PartyKey>) -> String {
    keys.iter()
        .map(|k| k.fingerprint())
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while decoding, signing or verifying transactions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    /// One or more business rules failed.
    #[error("{command} verification failed: {}", join_violations(.violations))]
    Validation {
        command: Command,
        violations: Vec<Violation>,
    },

    /// The command tag is outside the contract's vocabulary.
    #[error("unrecognised command '{kind}'")]
    UnrecognizedCommand { kind: String },

    #[error("expected exactly one product command, found {found}")]
    CommandCount { found: usize },

    #[error("invalid signature by {signer}: {message}")]
    InvalidSignature { signer: String, message: String },

    #[error("missing signatures from [{}]", .missing.join(", "))]
    MissingSignatures { missing: Vec<String> },

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl ContractError {
    /// Violations carried by a validation failure; empty for other errors.
    pub fn violations(&self) -> &[Violation] {
        match self {
            ContractError::Validation { violations, .. } => violations,
            _ => &[],
        }
    }
}
