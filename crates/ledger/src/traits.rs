use async_trait::async_trait;
use cosign_contract::{PartyKey, SignedTransaction, StateAndRef, TxId};

use crate::error::LedgerError;
use crate::record::{NotarisedTransaction, QueryCriteria, RecordOutcome};

/// Read access to a party's view of unconsumed records.
#[async_trait]
pub trait LedgerQueryService: Send + Sync {
    /// All unconsumed records matching `criteria`, in insertion order.
    async fn query(&self, criteria: &QueryCriteria) -> Result<Vec<StateAndRef>, LedgerError>;
}

/// Write access to a party's local view of the ledger.
///
/// `record` must be idempotent per transaction id: recording the same
/// committed transaction twice returns [`RecordOutcome::AlreadyRecorded`]
/// and changes nothing.
#[async_trait]
pub trait LedgerRecorder: Send + Sync {
    /// Apply a committed transaction: mark its inputs consumed, append its
    /// outputs as unconsumed versions.
    async fn record(&self, tx: &NotarisedTransaction) -> Result<RecordOutcome, LedgerError>;

    /// A previously recorded transaction, if present.
    async fn transaction(&self, tx_id: &TxId) -> Result<Option<NotarisedTransaction>, LedgerError>;
}

/// A party's local ledger: query plus record.
pub trait Ledger: LedgerQueryService + LedgerRecorder {}

impl<T: LedgerQueryService + LedgerRecorder> Ledger for T {}

/// The uniqueness service.
///
/// The notary is the single source of truth for "already consumed". It
/// accepts a fully signed transaction only if none of its inputs has been
/// consumed by a different transaction, and marks all inputs consumed
/// atomically with that decision.
///
/// ## Idempotency
///
/// Submitting a transaction the notary has already committed returns the
/// original [`NotarisedTransaction`], so a coordinator that crashed after
/// submission can safely resubmit.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` so that concurrent protocol
/// attempts can share one notary handle.
#[async_trait]
pub trait NotaryFinalityService: Send + Sync {
    /// The key the notary signs with; transactions must name it.
    fn identity(&self) -> PartyKey;

    /// Notarise a fully signed transaction.
    ///
    /// Returns `Err(LedgerError::Conflict)` if any input was consumed by
    /// another transaction.
    async fn submit(&self, tx: &SignedTransaction) -> Result<NotarisedTransaction, LedgerError>;
}
