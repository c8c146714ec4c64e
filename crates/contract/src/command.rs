use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ContractError;
use crate::party::PartyKey;

/// The rule set a transaction asks to be verified under.
///
/// Closed vocabulary: a tag outside it is an
/// [`ContractError::UnrecognizedCommand`], never a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Create,
    UpdateStatus,
}

impl Command {
    pub fn tag(&self) -> &'static str {
        match self {
            Command::Create => "Create",
            Command::UpdateStatus => "UpdateStatus",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Command {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Create" => Ok(Command::Create),
            "UpdateStatus" => Ok(Command::UpdateStatus),
            other => Err(ContractError::UnrecognizedCommand {
                kind: other.to_string(),
            }),
        }
    }
}

/// A command plus the keys that must sign for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandWithSigners {
    pub command: Command,
    pub signers: BTreeSet<PartyKey>,
}

impl CommandWithSigners {
    pub fn new(command: Command, signers: impl IntoIterator<Item = PartyKey>) -> Self {
        Self {
            command,
            signers: signers.into_iter().collect(),
        }
    }
}
