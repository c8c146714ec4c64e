#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cosign_contract::{LocalIdentity, Party, PartyKey, SignedTransaction};
use cosign_flow::{
    FlowConfig, InMemoryCheckpointStore, InMemoryNetwork, IssueCoordinator, LocalSigner,
    NodeServices, UpdateCoordinator, UpdateResponder,
};
use cosign_ledger::{
    InMemoryNotary, InMemoryVault, LedgerError, NotarisedTransaction, NotaryFinalityService,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

pub struct Node {
    pub party: Party,
    pub vault: Arc<InMemoryVault>,
    pub checkpoints: Arc<InMemoryCheckpointStore>,
    pub services: NodeServices,
    pub responder: Arc<UpdateResponder>,
}

impl Node {
    pub fn updates(&self) -> UpdateCoordinator {
        UpdateCoordinator::new(self.services.clone())
    }

    pub fn issues(&self) -> IssueCoordinator {
        IssueCoordinator::new(self.services.clone())
    }
}

pub async fn node(
    name: &str,
    notary: Arc<dyn NotaryFinalityService>,
    network: Arc<InMemoryNetwork>,
    config: FlowConfig,
) -> Node {
    let identity = LocalIdentity::generate(name);
    let party = identity.party().clone();
    let vault = Arc::new(InMemoryVault::new());
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());
    let services = NodeServices {
        party: party.clone(),
        ledger: vault.clone(),
        notary,
        signer: Arc::new(LocalSigner::new(identity)),
        channel: network.clone(),
        checkpoints: checkpoints.clone(),
        config,
    };
    let responder = Arc::new(UpdateResponder::new(&services));
    network.register(responder.clone()).await;
    Node {
        party,
        vault,
        checkpoints,
        services,
        responder,
    }
}

/// Two parties, A and B, sharing one notary and one network.
pub struct Harness {
    pub notary: Arc<InMemoryNotary>,
    pub network: Arc<InMemoryNetwork>,
    pub a: Node,
    pub b: Node,
}

pub async fn harness() -> Harness {
    harness_with(InMemoryNetwork::new(), FlowConfig::default()).await
}

pub async fn harness_with(network: InMemoryNetwork, config: FlowConfig) -> Harness {
    init_tracing();
    let notary = Arc::new(InMemoryNotary::new("Notary"));
    let network = Arc::new(network);
    let a = node("PartyA", notary.clone(), network.clone(), config.clone()).await;
    let b = node("PartyB", notary.clone(), network.clone(), config).await;
    Harness {
        notary,
        network,
        a,
        b,
    }
}

/// Commits every submission, then answers only after `delay_ms`.
///
/// Models a notary whose reply is lost or late: the transaction is final
/// even though the caller gave up waiting.
pub struct SlowNotary {
    pub inner: InMemoryNotary,
    pub delay_ms: AtomicU64,
}

impl SlowNotary {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryNotary::new("SlowNotary"),
            delay_ms: AtomicU64::new(delay.as_millis() as u64),
        }
    }

    pub fn respond_immediately(&self) {
        self.delay_ms.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotaryFinalityService for SlowNotary {
    fn identity(&self) -> PartyKey {
        self.inner.identity()
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<NotarisedTransaction, LedgerError> {
        let notarised = self.inner.submit(tx).await?;
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(notarised)
    }
}
