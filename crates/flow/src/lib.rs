//! Two-party co-signing protocol for product record updates.
//!
//! The initiator ([`UpdateCoordinator`] or [`IssueCoordinator`]) builds a
//! transaction, signs it and asks the counterparty's [`UpdateResponder`] to
//! co-sign. The fully signed transaction goes to the notary, then both
//! parties record the notarised result in their own ledgers.

pub mod checkpoint;
pub mod config;
mod coordinator;
mod error;
mod issue;
mod network;
mod node;
mod protocol;
mod responder;
mod services;

pub use checkpoint::{AttemptId, Checkpoint, CheckpointStore, InMemoryCheckpointStore, ProtocolState};
pub use config::{ConfigError, FlowConfig};
pub use coordinator::UpdateCoordinator;
pub use error::FlowError;
pub use issue::IssueCoordinator;
pub use network::InMemoryNetwork;
pub use node::NodeServices;
pub use protocol::CommittedTransaction;
pub use responder::UpdateResponder;
pub use services::{LocalSigner, PeerMessagingChannel, TransactionSigningService};
