pub mod conformance;
mod error;
mod notary;
mod record;
mod traits;
mod vault;

pub use error::LedgerError;
pub use notary::InMemoryNotary;
pub use record::{NotarisedTransaction, QueryCriteria, RecordOutcome, VaultEntry};
pub use traits::{Ledger, LedgerQueryService, LedgerRecorder, NotaryFinalityService};
pub use vault::InMemoryVault;
