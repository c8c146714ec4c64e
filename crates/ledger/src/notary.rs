use std::collections::HashMap;

use async_trait::async_trait;
use cosign_contract::{LocalIdentity, PartyKey, SignedTransaction, StateRef, TxId};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::record::NotarisedTransaction;
use crate::traits::NotaryFinalityService;

#[derive(Default)]
struct NotaryInner {
    /// Input address → the one transaction allowed to consume it.
    consumed: HashMap<StateRef, TxId>,
    committed: HashMap<TxId, NotarisedTransaction>,
}

/// A single-node, non-validating notary held in memory.
///
/// It checks signatures and input uniqueness only; contract rules are the
/// participants' concern. The consumed-input map and the committed set are
/// updated under one lock, so the check and the commit are atomic.
pub struct InMemoryNotary {
    identity: LocalIdentity,
    inner: Mutex<NotaryInner>,
}

impl InMemoryNotary {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_identity(LocalIdentity::generate(name))
    }

    pub fn with_identity(identity: LocalIdentity) -> Self {
        Self {
            identity,
            inner: Mutex::new(NotaryInner::default()),
        }
    }

    /// The transaction that consumed `state_ref`, if any.
    pub async fn consumed_by(&self, state_ref: &StateRef) -> Option<TxId> {
        self.inner.lock().await.consumed.get(state_ref).cloned()
    }

    pub async fn committed_count(&self) -> usize {
        self.inner.lock().await.committed.len()
    }
}

#[async_trait]
impl NotaryFinalityService for InMemoryNotary {
    fn identity(&self) -> PartyKey {
        self.identity.party().owning_key
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<NotarisedTransaction, LedgerError> {
        let tx_id = tx.id();
        let notary_key = self.identity();
        if tx.tx.notary != notary_key {
            return Err(LedgerError::WrongNotary {
                tx_id,
                expected: tx.tx.notary.fingerprint(),
                actual: notary_key.fingerprint(),
            });
        }
        tx.verify_required_signatures()?;

        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.committed.get(&tx_id) {
            debug!(tx = %tx_id.short(), "resubmission of committed transaction");
            return Ok(existing.clone());
        }

        for input in &tx.tx.inputs {
            if let Some(other) = inner.consumed.get(&input.state_ref) {
                warn!(
                    tx = %tx_id.short(),
                    input = %input.state_ref,
                    consumed_by = %other.short(),
                    "double spend rejected"
                );
                return Err(LedgerError::Conflict {
                    state_ref: input.state_ref.clone(),
                    consumed_by: other.clone(),
                });
            }
        }

        for input in &tx.tx.inputs {
            inner
                .consumed
                .insert(input.state_ref.clone(), tx_id.clone());
        }
        let notarised = NotarisedTransaction {
            signed: tx.clone(),
            notary_signature: self.identity.sign(&tx_id),
        };
        inner.committed.insert(tx_id.clone(), notarised.clone());

        info!(
            tx = %tx_id.short(),
            inputs = tx.tx.inputs.len(),
            "transaction notarised"
        );
        Ok(notarised)
    }
}
