use std::sync::Arc;

use cosign_contract::Party;
use cosign_ledger::{Ledger, NotaryFinalityService};

use crate::checkpoint::CheckpointStore;
use crate::config::FlowConfig;
use crate::services::{PeerMessagingChannel, TransactionSigningService};

/// Everything one party needs to run either side of the protocol.
#[derive(Clone)]
pub struct NodeServices {
    pub party: Party,
    pub ledger: Arc<dyn Ledger>,
    pub notary: Arc<dyn NotaryFinalityService>,
    pub signer: Arc<dyn TransactionSigningService>,
    pub channel: Arc<dyn PeerMessagingChannel>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub config: FlowConfig,
}
