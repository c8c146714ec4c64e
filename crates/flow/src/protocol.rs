//! The initiator's side of one protocol attempt.
//!
//! Both the create and the update flow share the tail of the protocol:
//! verify locally, self-sign, collect the counterparty's signature, notarise,
//! then record locally and deliver to the counterparty. [`Attempt`] drives
//! that tail and checkpoints every transition.

use std::future::Future;
use std::time::Duration;

use cosign_contract::{Party, SignedTransaction, StateAndRef, TxId, WireTransaction};
use cosign_ledger::{LedgerError, NotarisedTransaction};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::checkpoint::{AttemptId, Checkpoint, ProtocolState};
use crate::error::FlowError;
use crate::node::NodeServices;

/// Outcome of a successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedTransaction {
    pub attempt_id: AttemptId,
    pub transaction: NotarisedTransaction,
    /// The record version the transaction produced.
    pub output: StateAndRef,
}

impl CommittedTransaction {
    pub fn tx_id(&self) -> TxId {
        self.transaction.id()
    }
}

pub(crate) struct Attempt<'a> {
    services: &'a NodeServices,
    checkpoint: Checkpoint,
}

impl<'a> Attempt<'a> {
    pub(crate) async fn begin(
        services: &'a NodeServices,
        state: ProtocolState,
        initiator: &Party,
        counterparty: &Party,
    ) -> Result<Attempt<'a>, FlowError> {
        let checkpoint = Checkpoint::new(
            AttemptId::new(),
            state,
            initiator.clone(),
            counterparty.clone(),
        );
        services.checkpoints.save(&checkpoint).await?;
        info!(
            attempt = %checkpoint.attempt_id,
            initiator = %initiator,
            counterparty = %counterparty,
            state = %state,
            "protocol attempt started"
        );
        Ok(Attempt {
            services,
            checkpoint,
        })
    }

    pub(crate) fn id(&self) -> AttemptId {
        self.checkpoint.attempt_id
    }

    pub(crate) async fn advance(&mut self, state: ProtocolState) -> Result<(), FlowError> {
        self.checkpoint.state = state;
        self.services.checkpoints.save(&self.checkpoint).await?;
        info!(attempt = %self.id(), state = %state, "protocol step");
        Ok(())
    }

    /// Verify, sign, collect the co-signature and finalise `tx`.
    pub(crate) async fn propose(
        &mut self,
        tx: WireTransaction,
    ) -> Result<CommittedTransaction, FlowError> {
        cosign_contract::verify(&tx)?;

        let tx_id = tx.id();
        let initiator = self.checkpoint.initiator.clone();
        let counterparty = self.checkpoint.counterparty.clone();
        let own = self
            .services
            .signer
            .sign(&tx_id, &initiator.owning_key)
            .await?;
        let proposal = SignedTransaction::new(tx, own);

        self.checkpoint.transaction = Some(proposal.clone());
        self.advance(ProtocolState::AwaitingCounterpartySignature)
            .await?;
        debug!(attempt = %self.id(), tx_id = %tx_id.short(), peer = %counterparty, "requesting co-signature");

        let co_signature = bounded(
            ProtocolState::AwaitingCounterpartySignature,
            self.services.config.co_signature_timeout(),
            self.services
                .channel
                .request_co_signature(&proposal, &counterparty),
        )
        .await?;
        if co_signature.by != counterparty.owning_key {
            return Err(FlowError::Signature(format!(
                "co-signature made by {}, expected {}",
                co_signature.by.fingerprint(),
                counterparty.owning_key.fingerprint()
            )));
        }
        co_signature.verify(&tx_id)?;

        let signed = proposal.with_signature(co_signature);
        signed.verify_required_signatures()?;
        self.checkpoint.transaction = Some(signed.clone());
        self.advance(ProtocolState::AwaitingFinality).await?;

        self.finalise(signed).await
    }

    /// Submit a fully signed transaction to the notary and distribute the
    /// result. Safe to repeat: the notary returns the original notarisation
    /// for a transaction it already committed.
    pub(crate) async fn finalise(
        &mut self,
        signed: SignedTransaction,
    ) -> Result<CommittedTransaction, FlowError> {
        let notary = self.services.notary.clone();
        let notarised = bounded(
            ProtocolState::AwaitingFinality,
            self.services.config.finality_timeout(),
            async { notary.submit(&signed).await.map_err(FlowError::from) },
        )
        .await?;
        notarised.verify_notary(&notary.identity())?;

        self.checkpoint.committed = Some(notarised.id());
        self.checkpoint.failure = None;
        self.advance(ProtocolState::Committed).await?;
        info!(attempt = %self.id(), tx_id = %notarised.id().short(), "transaction notarised");

        self.distribute(notarised).await
    }

    /// Record a committed transaction locally and hand it to the counterparty.
    ///
    /// A failed delivery is only logged: the transaction is already final.
    /// The checkpoint stays undelivered, so the attempt is listed as in
    /// flight until a resume gets the transaction to the counterparty.
    pub(crate) async fn distribute(
        &mut self,
        notarised: NotarisedTransaction,
    ) -> Result<CommittedTransaction, FlowError> {
        let outcome = self.services.ledger.record(&notarised).await?;
        debug!(attempt = %self.id(), ?outcome, "recorded in local ledger");

        let counterparty = self.checkpoint.counterparty.clone();
        match self
            .services
            .channel
            .send_finality(&notarised, &counterparty)
            .await
        {
            Ok(()) => {
                self.checkpoint.delivered = true;
                self.services.checkpoints.save(&self.checkpoint).await?;
            }
            Err(err) => warn!(
                attempt = %self.id(),
                peer = %counterparty,
                error = %err,
                "could not deliver finality to counterparty, resume to retry"
            ),
        }

        let output = notarised.output_states().into_iter().next().ok_or_else(|| {
            FlowError::Ledger(LedgerError::Backend(format!(
                "committed transaction {} has no output",
                notarised.id()
            )))
        })?;
        Ok(CommittedTransaction {
            attempt_id: self.id(),
            transaction: notarised,
            output,
        })
    }

    /// Persist the result of a run.
    ///
    /// Errors leave the attempt `Failed`, except when the transaction may
    /// already be committed: a notary timeout or backend failure keeps it in
    /// `AwaitingFinality`, and a post-commit error keeps it `Committed`, so
    /// that [`resume`] can finish the job.
    pub(crate) async fn conclude(
        mut self,
        result: Result<CommittedTransaction, FlowError>,
    ) -> Result<CommittedTransaction, FlowError> {
        let err = match result {
            Ok(committed) => return Ok(committed),
            Err(err) => err,
        };

        self.checkpoint.failure = Some(err.to_string());
        let resumable = match self.checkpoint.state {
            ProtocolState::Committed => true,
            ProtocolState::AwaitingFinality => outcome_unknown(&err),
            _ => false,
        };
        if resumable {
            warn!(
                attempt = %self.id(),
                state = %self.checkpoint.state,
                error = %err,
                "protocol attempt interrupted, resume to finish"
            );
        } else {
            self.checkpoint.state = ProtocolState::Failed;
            warn!(attempt = %self.id(), error = %err, "protocol attempt failed");
        }
        if let Err(save_err) = self.services.checkpoints.save(&self.checkpoint).await {
            warn!(attempt = %self.id(), error = %save_err, "could not checkpoint attempt outcome");
        }
        Err(err)
    }

    async fn abort(mut self, reason: String) -> Result<CommittedTransaction, FlowError> {
        self.checkpoint.state = ProtocolState::Failed;
        self.checkpoint.failure = Some(reason.clone());
        self.services.checkpoints.save(&self.checkpoint).await?;
        warn!(attempt = %self.id(), %reason, "protocol attempt aborted");
        Err(FlowError::Aborted {
            attempt: self.id(),
            reason,
        })
    }
}

/// Pick up an attempt from its last checkpoint.
///
/// An attempt that stopped before the notary saw anything is aborted. One
/// that was waiting on the notary is resubmitted. A committed attempt is
/// delivered to the counterparty again, and a failed one reports its
/// recorded failure.
pub(crate) async fn resume(
    services: &NodeServices,
    attempt_id: AttemptId,
) -> Result<CommittedTransaction, FlowError> {
    let checkpoint = services
        .checkpoints
        .load(&attempt_id)
        .await?
        .ok_or_else(|| FlowError::Checkpoint(format!("no checkpoint for attempt {}", attempt_id)))?;
    info!(attempt = %attempt_id, state = %checkpoint.state, "resuming protocol attempt");

    let state = checkpoint.state;
    let transaction = checkpoint.transaction.clone();
    let committed = checkpoint.committed.clone();
    let failure = checkpoint.failure.clone();
    let mut attempt = Attempt {
        services,
        checkpoint,
    };

    match state {
        ProtocolState::Failed => Err(FlowError::Aborted {
            attempt: attempt_id,
            reason: failure.unwrap_or_else(|| "attempt failed".to_string()),
        }),
        ProtocolState::Committed => {
            let tx_id = committed.ok_or_else(|| {
                FlowError::Checkpoint(format!(
                    "attempt {} is committed but names no transaction",
                    attempt_id
                ))
            })?;
            let notarised = match services.ledger.transaction(&tx_id).await? {
                Some(notarised) => Ok(notarised),
                None => {
                    let signed = transaction.ok_or_else(|| {
                        FlowError::Checkpoint(format!(
                            "attempt {} is committed but holds no transaction",
                            attempt_id
                        ))
                    })?;
                    bounded(
                        ProtocolState::AwaitingFinality,
                        services.config.finality_timeout(),
                        async { services.notary.submit(&signed).await.map_err(FlowError::from) },
                    )
                    .await
                }
            };
            let result = match notarised {
                Ok(notarised) => attempt.distribute(notarised).await,
                Err(err) => Err(err),
            };
            attempt.conclude(result).await
        }
        ProtocolState::AwaitingFinality => match transaction {
            Some(signed) if signed.verify_required_signatures().is_ok() => {
                let result = attempt.finalise(signed).await;
                attempt.conclude(result).await
            }
            _ => {
                attempt
                    .abort("checkpoint holds no fully signed transaction".to_string())
                    .await
            }
        },
        earlier => {
            attempt
                .abort(format!(
                    "interrupted while {}, nothing was submitted to the notary",
                    earlier
                ))
                .await
        }
    }
}

async fn bounded<T, F>(step: ProtocolState, limit: Duration, fut: F) -> Result<T, FlowError>
where
    F: Future<Output = Result<T, FlowError>>,
{
    let started = Instant::now();
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            warn!(step = %step, elapsed_ms, "protocol step timed out");
            Err(FlowError::Timeout { step, elapsed_ms })
        }
    }
}

fn outcome_unknown(err: &FlowError) -> bool {
    matches!(
        err,
        FlowError::Timeout { .. } | FlowError::Ledger(LedgerError::Backend(_))
    )
}
