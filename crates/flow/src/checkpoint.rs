//! Persisted protocol progress.
//!
//! Every state transition of an attempt is written to a [`CheckpointStore`]
//! before the attempt moves on, so a restarted node can tell whether a
//! transaction may already have reached the notary.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use cosign_contract::{Party, SignedTransaction, TxId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::FlowError;

// ──────────────────────────────────────────────
// AttemptId
// ──────────────────────────────────────────────

/// Identifies one run of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(Uuid);

impl AttemptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AttemptId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ──────────────────────────────────────────────
// ProtocolState
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolState {
    QueryingLedger,
    BuildingProposal,
    AwaitingCounterpartySignature,
    AwaitingFinality,
    Committed,
    Failed,
}

impl ProtocolState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProtocolState::Committed | ProtocolState::Failed)
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolState::QueryingLedger => "querying ledger",
            ProtocolState::BuildingProposal => "building proposal",
            ProtocolState::AwaitingCounterpartySignature => "awaiting counterparty signature",
            ProtocolState::AwaitingFinality => "awaiting finality",
            ProtocolState::Committed => "committed",
            ProtocolState::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ──────────────────────────────────────────────
// Checkpoint
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub attempt_id: AttemptId,
    pub state: ProtocolState,
    pub initiator: Party,
    pub counterparty: Party,
    /// The proposal once built. Carries only the initiator's signature until
    /// the attempt reaches `AwaitingFinality`.
    pub transaction: Option<SignedTransaction>,
    /// Set once the notary has accepted the transaction.
    pub committed: Option<TxId>,
    /// Set once the counterparty has accepted the committed transaction.
    #[serde(default)]
    pub delivered: bool,
    /// Last error seen by this attempt.
    pub failure: Option<String>,
}

impl Checkpoint {
    pub fn new(
        attempt_id: AttemptId,
        state: ProtocolState,
        initiator: Party,
        counterparty: Party,
    ) -> Self {
        Self {
            attempt_id,
            state,
            initiator,
            counterparty,
            transaction: None,
            committed: None,
            delivered: false,
            failure: None,
        }
    }

    /// Whether the attempt still has work left: it has not finished, or it
    /// committed without the counterparty receiving the transaction.
    pub fn is_in_flight(&self) -> bool {
        match self.state {
            ProtocolState::Committed => !self.delivered,
            state => !state.is_terminal(),
        }
    }
}

// ──────────────────────────────────────────────
// CheckpointStore
// ──────────────────────────────────────────────

/// Durable storage for attempt checkpoints.
///
/// `save` replaces any previous checkpoint for the same attempt.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), FlowError>;

    async fn load(&self, attempt_id: &AttemptId) -> Result<Option<Checkpoint>, FlowError>;

    async fn remove(&self, attempt_id: &AttemptId) -> Result<(), FlowError>;

    /// Every stored checkpoint for which [`Checkpoint::is_in_flight`] holds.
    async fn in_flight(&self) -> Result<Vec<Checkpoint>, FlowError>;
}

/// Checkpoints held in process memory. Lost on restart, so only useful for
/// tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<HashMap<AttemptId, Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored checkpoint, terminal ones included.
    pub async fn all(&self) -> Vec<Checkpoint> {
        self.checkpoints.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), FlowError> {
        self.checkpoints
            .write()
            .await
            .insert(checkpoint.attempt_id, checkpoint.clone());
        Ok(())
    }

    async fn load(&self, attempt_id: &AttemptId) -> Result<Option<Checkpoint>, FlowError> {
        Ok(self.checkpoints.read().await.get(attempt_id).cloned())
    }

    async fn remove(&self, attempt_id: &AttemptId) -> Result<(), FlowError> {
        self.checkpoints.write().await.remove(attempt_id);
        Ok(())
    }

    async fn in_flight(&self) -> Result<Vec<Checkpoint>, FlowError> {
        Ok(self
            .checkpoints
            .read()
            .await
            .values()
            .filter(|c| c.is_in_flight())
            .cloned()
            .collect())
    }
}
