use std::collections::HashMap;

use async_trait::async_trait;
use cosign_contract::{RecordId, StateAndRef, StateRef, TxId};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::LedgerError;
use crate::record::{NotarisedTransaction, QueryCriteria, RecordOutcome, VaultEntry};
use crate::traits::{LedgerQueryService, LedgerRecorder};

#[derive(Default)]
struct VaultInner {
    /// Append-only arena. Entries are never removed; consumption only sets
    /// `consumed_by`.
    entries: Vec<VaultEntry>,
    by_ref: HashMap<StateRef, usize>,
    by_record: HashMap<RecordId, Vec<usize>>,
    transactions: HashMap<TxId, NotarisedTransaction>,
}

/// A party's local ledger view, held in memory.
///
/// Every record version ever seen lives in one arena, indexed by ledger
/// address and by record id.
#[derive(Default)]
pub struct InMemoryVault {
    inner: RwLock<VaultInner>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every version of `record_id` this vault has seen, consumed or not,
    /// oldest first.
    pub async fn history(&self, record_id: &RecordId) -> Vec<VaultEntry> {
        let inner = self.inner.read().await;
        inner
            .by_record
            .get(record_id)
            .map(|slots| slots.iter().map(|&i| inner.entries[i].clone()).collect())
            .unwrap_or_default()
    }

    pub async fn entry(&self, state_ref: &StateRef) -> Option<VaultEntry> {
        let inner = self.inner.read().await;
        inner.by_ref.get(state_ref).map(|&i| inner.entries[i].clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl LedgerQueryService for InMemoryVault {
    async fn query(&self, criteria: &QueryCriteria) -> Result<Vec<StateAndRef>, LedgerError> {
        let inner = self.inner.read().await;
        let slots: Vec<usize> = match criteria.record_id {
            Some(id) => inner.by_record.get(&id).cloned().unwrap_or_default(),
            None => (0..inner.entries.len()).collect(),
        };
        Ok(slots
            .into_iter()
            .map(|i| &inner.entries[i])
            .filter(|e| !e.is_consumed() && criteria.matches(&e.state.record))
            .map(|e| e.state.clone())
            .collect())
    }
}

#[async_trait]
impl LedgerRecorder for InMemoryVault {
    async fn record(&self, tx: &NotarisedTransaction) -> Result<RecordOutcome, LedgerError> {
        let tx_id = tx.id();
        let mut inner = self.inner.write().await;
        if inner.transactions.contains_key(&tx_id) {
            debug!(tx = %tx_id.short(), "transaction already recorded");
            return Ok(RecordOutcome::AlreadyRecorded);
        }

        // Validate before touching anything so a conflicting transaction
        // leaves the vault unchanged.
        for input in &tx.signed.tx.inputs {
            if let Some(&slot) = inner.by_ref.get(&input.state_ref) {
                if let Some(other) = &inner.entries[slot].consumed_by {
                    return Err(LedgerError::Conflict {
                        state_ref: input.state_ref.clone(),
                        consumed_by: other.clone(),
                    });
                }
            }
        }

        // Inputs this party never saw are inserted already consumed, so the
        // record's history stays complete.
        for input in &tx.signed.tx.inputs {
            match inner.by_ref.get(&input.state_ref).copied() {
                Some(slot) => inner.entries[slot].consumed_by = Some(tx_id.clone()),
                None => inner.append(input.clone(), Some(tx_id.clone())),
            }
        }
        for output in tx.output_states() {
            inner.append(output, None);
        }
        inner.transactions.insert(tx_id.clone(), tx.clone());

        debug!(
            tx = %tx_id.short(),
            inputs = tx.signed.tx.inputs.len(),
            outputs = tx.signed.tx.outputs.len(),
            "recorded transaction"
        );
        Ok(RecordOutcome::Recorded)
    }

    async fn transaction(&self, tx_id: &TxId) -> Result<Option<NotarisedTransaction>, LedgerError> {
        Ok(self.inner.read().await.transactions.get(tx_id).cloned())
    }
}

impl VaultInner {
    fn append(&mut self, state: StateAndRef, consumed_by: Option<TxId>) {
        let slot = self.entries.len();
        self.by_ref.insert(state.state_ref.clone(), slot);
        self.by_record
            .entry(state.record.record_id)
            .or_default()
            .push(slot);
        self.entries.push(VaultEntry {
            state,
            consumed_by,
            sequence: slot as u64,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notary::InMemoryNotary;
    use crate::traits::NotaryFinalityService;
    use cosign_contract::{
        Command, LocalIdentity, ProductColor, ProductRecord, ProductStatus, SignedTransaction,
        TransactionBuilder,
    };

    async fn issue(
        notary: &InMemoryNotary,
        a: &LocalIdentity,
        b: &LocalIdentity,
    ) -> NotarisedTransaction {
        let record = ProductRecord::issue(a.party().clone(), b.party().clone(), ProductColor::Red);
        let keys = record.participant_keys();
        let tx = TransactionBuilder::new(notary.identity())
            .add_output(record)
            .add_command(Command::Create, keys)
            .build();
        let id = tx.id();
        let stx = SignedTransaction::new(tx, a.sign(&id)).with_signature(b.sign(&id));
        notary.submit(&stx).await.unwrap()
    }

    async fn receive(
        notary: &InMemoryNotary,
        input: StateAndRef,
        a: &LocalIdentity,
        b: &LocalIdentity,
    ) -> NotarisedTransaction {
        let output = input.record.next_version(
            a.party().clone(),
            b.party().clone(),
            ProductStatus::Received,
        );
        let keys = output.participant_keys();
        let tx = TransactionBuilder::new(notary.identity())
            .add_input(input)
            .add_output(output)
            .add_command(Command::UpdateStatus, keys)
            .build();
        let id = tx.id();
        let stx = SignedTransaction::new(tx, a.sign(&id)).with_signature(b.sign(&id));
        notary.submit(&stx).await.unwrap()
    }

    #[tokio::test]
    async fn history_keeps_consumed_versions_in_order() {
        let notary = InMemoryNotary::new("Notary");
        let (a, b) = (LocalIdentity::generate("A"), LocalIdentity::generate("B"));
        let vault = InMemoryVault::new();

        let issued = issue(&notary, &a, &b).await;
        vault.record(&issued).await.unwrap();
        let input = issued.output_states().remove(0);
        let update = receive(&notary, input.clone(), &a, &b).await;
        vault.record(&update).await.unwrap();

        let history = vault.history(&input.record.record_id).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].consumed_by, Some(update.id()));
        assert_eq!(history[1].state.record.status, ProductStatus::Received);
        assert!(!history[1].is_consumed());
        assert!(history[0].sequence < history[1].sequence);
    }

    #[tokio::test]
    async fn unseen_input_is_inserted_consumed() {
        let notary = InMemoryNotary::new("Notary");
        let (a, b) = (LocalIdentity::generate("A"), LocalIdentity::generate("B"));
        let vault = InMemoryVault::new();

        let issued = issue(&notary, &a, &b).await;
        let input = issued.output_states().remove(0);
        let update = receive(&notary, input.clone(), &a, &b).await;
        vault.record(&update).await.unwrap();

        let entry = vault.entry(&input.state_ref).await.unwrap();
        assert_eq!(entry.consumed_by, Some(update.id()));
        assert_eq!(vault.len().await, 2);
    }

    #[tokio::test]
    async fn conflicting_record_leaves_vault_unchanged() {
        let notary = InMemoryNotary::new("Notary");
        let other_notary = InMemoryNotary::new("Other");
        let (a, b) = (LocalIdentity::generate("A"), LocalIdentity::generate("B"));
        let vault = InMemoryVault::new();

        let issued = issue(&notary, &a, &b).await;
        vault.record(&issued).await.unwrap();
        let input = issued.output_states().remove(0);
        vault
            .record(&receive(&notary, input.clone(), &a, &b).await)
            .await
            .unwrap();

        // A second spend that only a misbehaving notary would sign.
        let rogue = receive(&other_notary, input.clone(), &b, &a).await;
        let before = vault.len().await;
        let err = vault.record(&rogue).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict { .. }), "{err}");
        assert_eq!(vault.len().await, before);
    }
}
