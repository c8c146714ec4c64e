use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use cosign_contract::{
    Command, Party, PartyKey, ProductStatus, SignedTransaction, StateRef, TransactionSignature,
    TxId, Violation,
};
use cosign_ledger::{Ledger, NotarisedTransaction, RecordOutcome};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::FlowError;
use crate::node::NodeServices;
use crate::services::TransactionSigningService;

/// Acceptor side of the protocol.
///
/// Co-signs a proposal only after checking the initiator's signature, running
/// the contract and confirming the proposed status is what this party
/// expects. Either every check passes and a signature is returned, or the
/// proposal is rejected with the full list of violations.
pub struct UpdateResponder {
    party: Party,
    ledger: Arc<dyn Ledger>,
    signer: Arc<dyn TransactionSigningService>,
    notary: PartyKey,
    /// Co-signed transactions not yet seen committed, with the record
    /// versions each one consumes.
    awaiting: Mutex<HashMap<TxId, BTreeSet<StateRef>>>,
}

impl UpdateResponder {
    pub fn new(services: &NodeServices) -> Self {
        Self {
            party: services.party.clone(),
            ledger: services.ledger.clone(),
            signer: services.signer.clone(),
            notary: services.notary.identity(),
            awaiting: Mutex::new(HashMap::new()),
        }
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    /// Decode a proposal received off the wire and handle it.
    pub async fn on_wire_proposal(&self, payload: &[u8]) -> Result<TransactionSignature, FlowError> {
        let proposal = SignedTransaction::from_json(payload)?;
        self.on_proposal(&proposal).await
    }

    pub async fn on_proposal(
        &self,
        proposal: &SignedTransaction,
    ) -> Result<TransactionSignature, FlowError> {
        let tx_id = proposal.id();
        let own_key = self.party.owning_key;

        if !proposal.tx.required_signers().contains(&own_key) {
            return Err(self.reject(&tx_id, "this party is not a required signer", Vec::new()));
        }
        if proposal.tx.notary != self.notary {
            return Err(self.reject(
                &tx_id,
                &format!(
                    "proposal names notary {}, expected {}",
                    proposal.tx.notary.fingerprint(),
                    self.notary.fingerprint()
                ),
                Vec::new(),
            ));
        }
        proposal.verify_signatures_except(&BTreeSet::from([own_key]))?;

        let command = match cosign_contract::verify(&proposal.tx) {
            Ok(()) => proposal.tx.single_command()?.command,
            Err(err) if !err.violations().is_empty() => {
                return Err(self.reject(
                    &tx_id,
                    "proposal failed contract verification",
                    err.violations().to_vec(),
                ));
            }
            Err(err) => return Err(err.into()),
        };

        let expected = match command {
            Command::Create => ProductStatus::Pending,
            Command::UpdateStatus => ProductStatus::Received,
        };
        let found = proposal.tx.outputs[0].status;
        if found != expected {
            return Err(self.reject(
                &tx_id,
                "unexpected proposed status",
                vec![Violation::UnexpectedProposalStatus { expected, found }],
            ));
        }

        let signature = self.signer.sign(&tx_id, &own_key).await?;
        let inputs: BTreeSet<StateRef> = proposal
            .tx
            .inputs
            .iter()
            .map(|input| input.state_ref.clone())
            .collect();
        self.awaiting.lock().await.insert(tx_id.clone(), inputs);
        info!(party = %self.party, tx_id = %tx_id.short(), %command, "co-signed proposal");
        Ok(signature)
    }

    /// Record a transaction this party co-signed once it is notarised.
    /// Delivering the same transaction again is a no-op.
    ///
    /// Other co-signed proposals spending any of the same inputs can no
    /// longer commit and stop being tracked.
    pub async fn on_finality(&self, tx: &NotarisedTransaction) -> Result<RecordOutcome, FlowError> {
        let tx_id = tx.id();
        if self.ledger.transaction(&tx_id).await?.is_some() {
            debug!(party = %self.party, tx_id = %tx_id.short(), "finality already recorded");
            return Ok(RecordOutcome::AlreadyRecorded);
        }

        let mut awaiting = self.awaiting.lock().await;
        if !awaiting.contains_key(&tx_id) || !tx.signed.signers().contains(&self.party.owning_key) {
            warn!(party = %self.party, tx_id = %tx_id.short(), "finality for a transaction this party did not co-sign");
            return Err(FlowError::Messaging(format!(
                "transaction {} was not co-signed by {}",
                tx_id.short(),
                self.party
            )));
        }
        tx.verify_notary(&self.notary)?;
        tx.signed.verify_required_signatures()?;

        let outcome = self.ledger.record(tx).await?;
        awaiting.remove(&tx_id);
        let consumed: BTreeSet<StateRef> = tx
            .signed
            .tx
            .inputs
            .iter()
            .map(|input| input.state_ref.clone())
            .collect();
        awaiting.retain(|other, inputs| {
            let live = inputs.is_disjoint(&consumed);
            if !live {
                debug!(party = %self.party, tx_id = %other.short(), "dropped superseded proposal");
            }
            live
        });
        info!(party = %self.party, tx_id = %tx_id.short(), "recorded committed transaction");
        Ok(outcome)
    }

    /// Ids of co-signed transactions still waiting for finality.
    pub async fn awaiting_finality(&self) -> Vec<TxId> {
        self.awaiting.lock().await.keys().cloned().collect()
    }

    fn reject(&self, tx_id: &TxId, reason: &str, violations: Vec<Violation>) -> FlowError {
        warn!(
            party = %self.party,
            tx_id = %tx_id.short(),
            %reason,
            violations = violations.len(),
            "rejected proposal"
        );
        FlowError::Rejected {
            reason: reason.to_string(),
            violations,
        }
    }
}
