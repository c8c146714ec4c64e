use std::collections::BTreeSet;
use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::command::{Command, CommandWithSigners};
use crate::error::ContractError;
use crate::party::PartyKey;
use crate::record::ProductRecord;
use crate::signing::TransactionSignature;

/// SHA-256 of a transaction's compact JSON form, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of one record version: the transaction that produced it and its
/// output index within that transaction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateRef {
    pub tx_id: TxId,
    pub index: u32,
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id.short(), self.index)
    }
}

/// A record version together with its ledger address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndRef {
    pub record: ProductRecord,
    pub state_ref: StateRef,
}

/// The unsigned body of a ledger transaction.
///
/// Inputs travel resolved (record plus address) so the counterparty can run
/// the contract without a ledger round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTransaction {
    pub inputs: Vec<StateAndRef>,
    pub outputs: Vec<ProductRecord>,
    pub commands: Vec<CommandWithSigners>,
    pub notary: PartyKey,
    /// Random per-transaction bytes, base64. Two proposals with identical
    /// contents still get distinct ids.
    pub salt: String,
}

impl WireTransaction {
    pub fn id(&self) -> TxId {
        let canonical = serde_json::to_string(self)
            .unwrap_or_else(|e| panic!("serialization error computing transaction id: {}", e));
        let hash = Sha256::digest(canonical.as_bytes());
        TxId(format!("{:x}", hash))
    }

    pub fn output_ref(&self, index: u32) -> StateRef {
        StateRef {
            tx_id: self.id(),
            index,
        }
    }

    /// The output records paired with the addresses they will have once
    /// this transaction commits.
    pub fn output_states(&self) -> Vec<StateAndRef> {
        let tx_id = self.id();
        self.outputs
            .iter()
            .enumerate()
            .map(|(i, record)| StateAndRef {
                record: record.clone(),
                state_ref: StateRef {
                    tx_id: tx_id.clone(),
                    index: i as u32,
                },
            })
            .collect()
    }

    /// The transaction's one command. Product transactions carry exactly one.
    pub fn single_command(&self) -> Result<&CommandWithSigners, ContractError> {
        match self.commands.as_slice() {
            [only] => Ok(only),
            other => Err(ContractError::CommandCount { found: other.len() }),
        }
    }

    pub fn required_signers(&self) -> BTreeSet<PartyKey> {
        self.commands
            .iter()
            .flat_map(|c| c.signers.iter().copied())
            .collect()
    }
}

/// Incrementally assembles a [`WireTransaction`].
pub struct TransactionBuilder {
    notary: PartyKey,
    salt: String,
    inputs: Vec<StateAndRef>,
    outputs: Vec<ProductRecord>,
    commands: Vec<CommandWithSigners>,
}

impl TransactionBuilder {
    pub fn new(notary: PartyKey) -> Self {
        let salt: [u8; 16] = rand::random();
        Self {
            notary,
            salt: BASE64.encode(salt),
            inputs: Vec::new(),
            outputs: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn add_input(mut self, input: StateAndRef) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn add_output(mut self, output: ProductRecord) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn add_command(
        mut self,
        command: Command,
        signers: impl IntoIterator<Item = PartyKey>,
    ) -> Self {
        self.commands.push(CommandWithSigners::new(command, signers));
        self
    }

    pub fn build(self) -> WireTransaction {
        WireTransaction {
            inputs: self.inputs,
            outputs: self.outputs,
            commands: self.commands,
            notary: self.notary,
            salt: self.salt,
        }
    }
}

/// A transaction body with the signatures collected so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: WireTransaction,
    pub signatures: Vec<TransactionSignature>,
}

impl SignedTransaction {
    pub fn new(tx: WireTransaction, signature: TransactionSignature) -> Self {
        Self {
            tx,
            signatures: vec![signature],
        }
    }

    pub fn id(&self) -> TxId {
        self.tx.id()
    }

    /// Add a signature. A second signature by the same key replaces the first.
    pub fn with_signature(mut self, signature: TransactionSignature) -> Self {
        self.signatures.retain(|s| s.by != signature.by);
        self.signatures.push(signature);
        self
    }

    pub fn signers(&self) -> BTreeSet<PartyKey> {
        self.signatures.iter().map(|s| s.by).collect()
    }

    pub fn missing_signatures(&self) -> BTreeSet<PartyKey> {
        let signed = self.signers();
        self.tx
            .required_signers()
            .into_iter()
            .filter(|k| !signed.contains(k))
            .collect()
    }

    /// Check every attached signature against the transaction id, then check
    /// that all required signers other than `allowed_missing` have signed.
    pub fn verify_signatures_except(
        &self,
        allowed_missing: &BTreeSet<PartyKey>,
    ) -> Result<(), ContractError> {
        let tx_id = self.id();
        for signature in &self.signatures {
            signature.verify(&tx_id)?;
        }
        let missing: Vec<String> = self
            .missing_signatures()
            .iter()
            .filter(|k| !allowed_missing.contains(k))
            .map(|k| k.fingerprint())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ContractError::MissingSignatures { missing })
        }
    }

    pub fn verify_required_signatures(&self) -> Result<(), ContractError> {
        self.verify_signatures_except(&BTreeSet::new())
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ContractError> {
        serde_json::to_vec(self).map_err(|e| ContractError::Decode(e.to_string()))
    }

    /// Decode a transaction received from a peer.
    ///
    /// Command tags are checked before the typed decode so that an unknown
    /// tag surfaces as [`ContractError::UnrecognizedCommand`] rather than a
    /// generic decode failure.
    pub fn from_json(payload: &[u8]) -> Result<Self, ContractError> {
        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|e| ContractError::Decode(e.to_string()))?;
        if let Some(commands) = value.pointer("/tx/commands").and_then(|c| c.as_array()) {
            for entry in commands {
                if let Some(kind) = entry.get("command").and_then(|k| k.as_str()) {
                    kind.parse::<Command>()?;
                }
            }
        }
        serde_json::from_value(value).map_err(|e| ContractError::Decode(e.to_string()))
    }
}
