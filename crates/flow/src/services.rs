//! Collaborators the protocol talks to besides the ledger and notary.

use std::collections::HashMap;

use async_trait::async_trait;
use cosign_contract::{LocalIdentity, Party, PartyKey, SignedTransaction, TransactionSignature, TxId};
use cosign_ledger::NotarisedTransaction;

use crate::error::FlowError;

/// Produces signatures over transaction ids with keys the node controls.
#[async_trait]
pub trait TransactionSigningService: Send + Sync {
    async fn sign(&self, tx_id: &TxId, key: &PartyKey) -> Result<TransactionSignature, FlowError>;
}

/// Point-to-point delivery between the two parties of an attempt.
#[async_trait]
pub trait PeerMessagingChannel: Send + Sync {
    /// Send a proposal signed by the initiator and wait for the peer's
    /// signature. A refusal comes back as [`FlowError::Rejected`].
    async fn request_co_signature(
        &self,
        proposal: &SignedTransaction,
        peer: &Party,
    ) -> Result<TransactionSignature, FlowError>;

    /// Deliver a notarised transaction so the peer can record it.
    async fn send_finality(
        &self,
        tx: &NotarisedTransaction,
        peer: &Party,
    ) -> Result<(), FlowError>;
}

/// Keystore of in-process Ed25519 identities.
#[derive(Default)]
pub struct LocalSigner {
    identities: HashMap<PartyKey, LocalIdentity>,
}

impl LocalSigner {
    pub fn new(identity: LocalIdentity) -> Self {
        Self::default().with_identity(identity)
    }

    pub fn with_identity(mut self, identity: LocalIdentity) -> Self {
        self.identities.insert(identity.party().owning_key, identity);
        self
    }

    pub fn holds(&self, key: &PartyKey) -> bool {
        self.identities.contains_key(key)
    }
}

#[async_trait]
impl TransactionSigningService for LocalSigner {
    async fn sign(&self, tx_id: &TxId, key: &PartyKey) -> Result<TransactionSignature, FlowError> {
        let identity = self.identities.get(key).ok_or_else(|| {
            FlowError::Signature(format!("no signing key held for {}", key.fingerprint()))
        })?;
        Ok(identity.sign(tx_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signs_only_with_held_keys() {
        let alice = LocalIdentity::generate("Alice");
        let bob = LocalIdentity::generate("Bob");
        let bob_key = bob.party().owning_key;
        let alice_key = alice.party().owning_key;
        let signer = LocalSigner::new(alice);
        let tx_id: TxId = serde_json::from_str("\"abcdef\"").unwrap();

        let signature = signer.sign(&tx_id, &alice_key).await.unwrap();
        assert_eq!(signature.by, alice_key);
        assert!(signature.verify(&tx_id).is_ok());

        assert!(!signer.holds(&bob_key));
        let err = signer.sign(&tx_id, &bob_key).await.unwrap_err();
        assert!(matches!(err, FlowError::Signature(_)));
    }
}
