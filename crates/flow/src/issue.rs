use cosign_contract::{Command, Party, ProductColor, ProductRecord, TransactionBuilder};

use crate::checkpoint::ProtocolState;
use crate::error::FlowError;
use crate::node::NodeServices;
use crate::protocol::{Attempt, CommittedTransaction};

/// Initiator of a new product record shared with a counterparty.
///
/// A create consumes nothing, so it can never conflict at the notary.
pub struct IssueCoordinator {
    services: NodeServices,
}

impl IssueCoordinator {
    pub fn new(services: NodeServices) -> Self {
        Self { services }
    }

    pub async fn initiate_create(
        &self,
        from: &Party,
        counterparty: &Party,
        color: ProductColor,
    ) -> Result<CommittedTransaction, FlowError> {
        let mut attempt = Attempt::begin(
            &self.services,
            ProtocolState::BuildingProposal,
            from,
            counterparty,
        )
        .await?;

        let record = ProductRecord::issue(from.clone(), counterparty.clone(), color);
        let signers = record.participant_keys();
        let tx = TransactionBuilder::new(self.services.notary.identity())
            .add_output(record)
            .add_command(Command::Create, signers)
            .build();

        let result = attempt.propose(tx).await;
        attempt.conclude(result).await
    }
}
