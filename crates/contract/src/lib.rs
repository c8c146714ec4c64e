//! Product record contract for two-party cosigned updates.
//!
//! A [`ProductRecord`] is jointly owned by two parties. Every change to it is
//! a [`WireTransaction`] that consumes the previous version and produces a new
//! one, tagged with a single [`Command`]. [`validator::verify`] decides whether
//! such a transaction is legal and reports every rule it breaks.

mod command;
mod error;
mod party;
mod record;
pub mod signing;
mod transaction;
pub mod validator;

pub use command::{Command, CommandWithSigners};
pub use error::{ContractError, Violation};
pub use party::{Party, PartyKey};
pub use record::{ProductColor, ProductRecord, ProductStatus, RecordId, PRODUCT_NAME};
pub use signing::{LocalIdentity, TransactionSignature};
pub use transaction::{
    SignedTransaction, StateAndRef, StateRef, TransactionBuilder, TxId, WireTransaction,
};
pub use validator::verify;
