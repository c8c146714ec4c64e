use std::fmt;

use cosign_contract::{
    PartyKey, ProductColor, ProductRecord, ProductStatus, RecordId, SignedTransaction,
    StateAndRef, TransactionSignature, TxId,
};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// A fully signed transaction plus the notary's signature over its id.
///
/// This is the committed form: once a notary has produced it, every input
/// is consumed on the global ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarisedTransaction {
    pub signed: SignedTransaction,
    pub notary_signature: TransactionSignature,
}

impl NotarisedTransaction {
    pub fn id(&self) -> TxId {
        self.signed.id()
    }

    /// Check the notary signature and that it was made by `notary`.
    pub fn verify_notary(&self, notary: &PartyKey) -> Result<(), LedgerError> {
        let tx_id = self.id();
        if self.notary_signature.by != *notary || self.signed.tx.notary != *notary {
            return Err(LedgerError::NotNotarised {
                tx_id,
                message: format!("expected notary {}", notary.fingerprint()),
            });
        }
        self.notary_signature
            .verify(&tx_id)
            .map_err(|e| LedgerError::NotNotarised {
                tx_id,
                message: e.to_string(),
            })
    }

    pub fn output_states(&self) -> Vec<StateAndRef> {
        self.signed.tx.output_states()
    }
}

/// One slot in a vault's append-only arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEntry {
    pub state: StateAndRef,
    /// Transaction that consumed this version. `None` while it is current.
    pub consumed_by: Option<TxId>,
    /// Arena position, assigned at insertion.
    pub sequence: u64,
}

impl VaultEntry {
    pub fn is_consumed(&self) -> bool {
        self.consumed_by.is_some()
    }
}

/// Filter over unconsumed records. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryCriteria {
    pub status: Option<ProductStatus>,
    pub color: Option<ProductColor>,
    pub record_id: Option<RecordId>,
    pub participant: Option<PartyKey>,
}

impl QueryCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: ProductStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn color(mut self, color: ProductColor) -> Self {
        self.color = Some(color);
        self
    }

    pub fn record_id(mut self, record_id: RecordId) -> Self {
        self.record_id = Some(record_id);
        self
    }

    pub fn participant(mut self, key: PartyKey) -> Self {
        self.participant = Some(key);
        self
    }

    pub fn matches(&self, record: &ProductRecord) -> bool {
        self.status.map_or(true, |s| record.status == s)
            && self.color.map_or(true, |c| record.product_color == c)
            && self.record_id.map_or(true, |id| record.record_id == id)
            && self
                .participant
                .map_or(true, |k| record.participant_keys().contains(&k))
    }
}

impl fmt::Display for QueryCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(status) = self.status {
            parts.push(format!("status={}", status));
        }
        if let Some(color) = self.color {
            parts.push(format!("color={}", color));
        }
        if let Some(id) = self.record_id {
            parts.push(format!("record_id={}", id));
        }
        if let Some(key) = self.participant {
            parts.push(format!("participant={}", key.fingerprint()));
        }
        if parts.is_empty() {
            write!(f, "(any)")
        } else {
            write!(f, "{}", parts.join(" AND "))
        }
    }
}

/// What recording a committed transaction did to a local view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// The transaction id was already in the vault; nothing changed.
    AlreadyRecorded,
}
