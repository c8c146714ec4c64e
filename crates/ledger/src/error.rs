use cosign_contract::{ContractError, StateRef, TxId};

/// All errors that can be returned by a ledger or notary backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    /// The input was already consumed by a different transaction.
    #[error("input {state_ref} already consumed by transaction {consumed_by}")]
    Conflict {
        state_ref: StateRef,
        consumed_by: TxId,
    },

    /// The transaction names a different notary.
    #[error("transaction {tx_id} is assigned to notary {expected}, not {actual}")]
    WrongNotary {
        tx_id: TxId,
        expected: String,
        actual: String,
    },

    /// The notary's signature on a committed transaction is missing or invalid.
    #[error("transaction {tx_id} carries no valid notary signature: {message}")]
    NotNotarised { tx_id: TxId, message: String },

    /// Signature or decoding failure from the contract layer.
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// A backend-specific failure (connection, serialization, ...).
    #[error("ledger backend error: {0}")]
    Backend(String),
}
