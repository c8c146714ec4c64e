use cosign_contract::{Command, ContractError, StateRef, TxId, Violation};
use cosign_ledger::LedgerError;

use crate::checkpoint::{AttemptId, ProtocolState};

/// Errors surfaced to callers of the protocol. None of them is retried
/// internally; a caller that wants to try again must start a new attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FlowError {
    /// No unconsumed record matched the query.
    #[error("no unconsumed product record matches {criteria}")]
    NotFound { criteria: String },

    /// More than one unconsumed record matched; the caller must narrow the
    /// query (for example by record id).
    #[error("{count} unconsumed product records match {criteria}, expected exactly one")]
    AmbiguousMatch { criteria: String, count: usize },

    /// The locally built transaction failed contract verification. Nothing
    /// was signed or sent.
    #[error("{command} proposal failed verification: {}", join(.violations))]
    Validation {
        command: Command,
        violations: Vec<Violation>,
    },

    /// The counterparty refused to co-sign.
    #[error("counterparty rejected the proposal: {reason}{}", violation_suffix(.violations))]
    Rejected {
        reason: String,
        violations: Vec<Violation>,
    },

    /// The notary refused the transaction because an input was already
    /// consumed. Re-query before retrying.
    #[error("input {state_ref} already consumed by transaction {consumed_by}")]
    Conflict {
        state_ref: StateRef,
        consumed_by: TxId,
    },

    #[error("unrecognised command '{kind}'")]
    UnrecognizedCommand { kind: String },

    #[error("timed out after {elapsed_ms}ms while {step}")]
    Timeout { step: ProtocolState, elapsed_ms: u64 },

    #[error("signature error: {0}")]
    Signature(String),

    #[error("messaging error: {0}")]
    Messaging(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// A resumed attempt could not be completed safely and was abandoned.
    #[error("attempt {attempt} aborted: {reason}")]
    Aborted { attempt: AttemptId, reason: String },

    #[error(transparent)]
    Ledger(LedgerError),
}

impl FlowError {
    pub fn violations(&self) -> &[Violation] {
        match self {
            FlowError::Validation { violations, .. } | FlowError::Rejected { violations, .. } => {
                violations
            }
            _ => &[],
        }
    }
}

impl From<ContractError> for FlowError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::Validation {
                command,
                violations,
            } => FlowError::Validation {
                command,
                violations,
            },
            ContractError::UnrecognizedCommand { kind } => FlowError::UnrecognizedCommand { kind },
            ContractError::InvalidSignature { .. }
            | ContractError::MissingSignatures { .. }
            | ContractError::InvalidKey(_) => FlowError::Signature(err.to_string()),
            ContractError::CommandCount { .. } | ContractError::Decode(_) => {
                FlowError::Messaging(err.to_string())
            }
        }
    }
}

impl From<LedgerError> for FlowError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Conflict {
                state_ref,
                consumed_by,
            } => FlowError::Conflict {
                state_ref,
                consumed_by,
            },
            LedgerError::Contract(inner) => inner.into(),
            other => FlowError::Ledger(other),
        }
    }
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn violation_suffix(violations: &[Violation]) -> String {
    if violations.is_empty() {
        String::new()
    } else {
        format!(" ({})", join(violations))
    }
}
