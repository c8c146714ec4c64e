use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cosign_contract::{Party, PartyKey, SignedTransaction, TransactionSignature};
use cosign_ledger::NotarisedTransaction;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::FlowError;
use crate::responder::UpdateResponder;
use crate::services::PeerMessagingChannel;

/// Routes messages between responders living in the same process.
///
/// Messages cross the network in their JSON wire form, so the receiving
/// side decodes them exactly as it would from a socket. An unresponsive peer
/// never answers a co-signature request, and finality sent to it fails.
#[derive(Default)]
pub struct InMemoryNetwork {
    peers: RwLock<HashMap<PartyKey, Arc<UpdateResponder>>>,
    unresponsive: RwLock<HashSet<PartyKey>>,
    latency: Duration,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every delivery by `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub async fn register(&self, responder: Arc<UpdateResponder>) {
        let key = responder.party().owning_key;
        self.peers.write().await.insert(key, responder);
    }

    pub async fn set_unresponsive(&self, peer: &Party, unresponsive: bool) {
        let mut set = self.unresponsive.write().await;
        if unresponsive {
            set.insert(peer.owning_key);
        } else {
            set.remove(&peer.owning_key);
        }
    }

    async fn route(&self, peer: &Party) -> Result<Option<Arc<UpdateResponder>>, FlowError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.unresponsive.read().await.contains(&peer.owning_key) {
            return Ok(None);
        }
        self.peers
            .read()
            .await
            .get(&peer.owning_key)
            .cloned()
            .map(Some)
            .ok_or_else(|| FlowError::Messaging(format!("no route to {}", peer)))
    }
}

#[async_trait]
impl PeerMessagingChannel for InMemoryNetwork {
    async fn request_co_signature(
        &self,
        proposal: &SignedTransaction,
        peer: &Party,
    ) -> Result<TransactionSignature, FlowError> {
        let payload = proposal.to_json()?;
        let Some(responder) = self.route(peer).await? else {
            debug!(peer = %peer, "peer unresponsive, holding proposal");
            return std::future::pending().await;
        };
        responder.on_wire_proposal(&payload).await
    }

    async fn send_finality(
        &self,
        tx: &NotarisedTransaction,
        peer: &Party,
    ) -> Result<(), FlowError> {
        let responder = self
            .route(peer)
            .await?
            .ok_or_else(|| FlowError::Messaging(format!("{} is unreachable", peer)))?;
        let payload = serde_json::to_vec(tx).map_err(|e| FlowError::Messaging(e.to_string()))?;
        let delivered: NotarisedTransaction =
            serde_json::from_slice(&payload).map_err(|e| FlowError::Messaging(e.to_string()))?;
        responder.on_finality(&delivered).await?;
        Ok(())
    }
}
