use cosign_contract::{
    Command, Party, ProductColor, ProductStatus, RecordId, StateAndRef, TransactionBuilder,
};
use cosign_ledger::QueryCriteria;
use tracing::debug;

use crate::checkpoint::{AttemptId, Checkpoint, ProtocolState};
use crate::error::FlowError;
use crate::node::NodeServices;
use crate::protocol::{self, Attempt, CommittedTransaction};

/// Initiator of a status update on an existing product record.
///
/// Finds the single unconsumed record to update, proposes the next version
/// to the counterparty, and drives the co-signed transaction through the
/// notary. Attempts are independent; two attempts on the same record race at
/// the notary and the loser fails with [`FlowError::Conflict`].
pub struct UpdateCoordinator {
    services: NodeServices,
}

impl UpdateCoordinator {
    pub fn new(services: NodeServices) -> Self {
        Self { services }
    }

    /// Update the one pending record of `color` shared with `counterparty`.
    pub async fn initiate_update(
        &self,
        from: &Party,
        counterparty: &Party,
        desired_status: ProductStatus,
        color: ProductColor,
    ) -> Result<CommittedTransaction, FlowError> {
        let criteria = QueryCriteria::new()
            .status(ProductStatus::Pending)
            .color(color)
            .participant(from.owning_key);
        self.run(from, counterparty, desired_status, criteria).await
    }

    /// Update the current version of a record identified by id.
    pub async fn initiate_update_by_id(
        &self,
        from: &Party,
        counterparty: &Party,
        desired_status: ProductStatus,
        record_id: RecordId,
    ) -> Result<CommittedTransaction, FlowError> {
        let criteria = QueryCriteria::new()
            .record_id(record_id)
            .participant(from.owning_key);
        self.run(from, counterparty, desired_status, criteria).await
    }

    /// Continue an attempt from its last checkpoint.
    pub async fn resume(&self, attempt_id: AttemptId) -> Result<CommittedTransaction, FlowError> {
        protocol::resume(&self.services, attempt_id).await
    }

    /// Attempts that stopped before reaching a terminal state.
    pub async fn in_flight(&self) -> Result<Vec<Checkpoint>, FlowError> {
        self.services.checkpoints.in_flight().await
    }

    async fn run(
        &self,
        from: &Party,
        counterparty: &Party,
        desired_status: ProductStatus,
        criteria: QueryCriteria,
    ) -> Result<CommittedTransaction, FlowError> {
        let mut attempt = Attempt::begin(
            &self.services,
            ProtocolState::QueryingLedger,
            from,
            counterparty,
        )
        .await?;
        let result = self
            .update(&mut attempt, from, counterparty, desired_status, &criteria)
            .await;
        attempt.conclude(result).await
    }

    async fn update(
        &self,
        attempt: &mut Attempt<'_>,
        from: &Party,
        counterparty: &Party,
        desired_status: ProductStatus,
        criteria: &QueryCriteria,
    ) -> Result<CommittedTransaction, FlowError> {
        let matches = self.services.ledger.query(criteria).await?;
        let input = single_match(matches, criteria)?;
        debug!(attempt = %attempt.id(), input = %input.state_ref, record = %input.record.record_id, "matched record");

        attempt.advance(ProtocolState::BuildingProposal).await?;
        let output = input
            .record
            .next_version(from.clone(), counterparty.clone(), desired_status);
        let signers = output.participant_keys();
        let tx = TransactionBuilder::new(self.services.notary.identity())
            .add_input(input)
            .add_output(output)
            .add_command(Command::UpdateStatus, signers)
            .build();

        attempt.propose(tx).await
    }
}

fn single_match(
    mut matches: Vec<StateAndRef>,
    criteria: &QueryCriteria,
) -> Result<StateAndRef, FlowError> {
    match matches.len() {
        0 => Err(FlowError::NotFound {
            criteria: criteria.to_string(),
        }),
        1 => Ok(matches.remove(0)),
        count => Err(FlowError::AmbiguousMatch {
            criteria: criteria.to_string(),
            count,
        }),
    }
}
