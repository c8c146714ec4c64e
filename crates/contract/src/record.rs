use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ContractError;
use crate::party::{Party, PartyKey};

/// The only product name currently issued.
pub const PRODUCT_NAME: &str = "Gadgets";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductColor {
    Red,
    Green,
}

impl ProductColor {
    /// Colors a newly issued record may carry.
    pub const ISSUABLE: [ProductColor; 2] = [ProductColor::Red, ProductColor::Green];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductColor::Red => "Red",
            ProductColor::Green => "Green",
        }
    }
}

impl fmt::Display for ProductColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductColor {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Red" => Ok(ProductColor::Red),
            "Green" => Ok(ProductColor::Green),
            other => Err(ContractError::Decode(format!(
                "unknown product color '{}'",
                other
            ))),
        }
    }
}

/// Delivery status. Moves once, Pending → Received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductStatus {
    Pending,
    Received,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Pending => "Pending",
            ProductStatus::Received => "Received",
        }
    }

    /// No transition is defined out of a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProductStatus::Received)
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductStatus {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ProductStatus::Pending),
            "Received" => Ok(ProductStatus::Received),
            other => Err(ContractError::Decode(format!(
                "unknown product status '{}'",
                other
            ))),
        }
    }
}

/// Identifier shared by every version of one logical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        RecordId(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(RecordId)
            .map_err(|e| ContractError::Decode(format!("invalid record id '{}': {}", s, e)))
    }
}

/// One version of a product record as it sits on the ledger.
///
/// Records are never mutated in place. An update builds a new value with
/// [`ProductRecord::next_version`] and the ledger marks the old one consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub from: Party,
    pub to: Party,
    pub product_name: String,
    pub product_color: ProductColor,
    pub status: ProductStatus,
    pub record_id: RecordId,
}

impl ProductRecord {
    /// A freshly issued record: Gadgets, Pending, new record id.
    pub fn issue(from: Party, to: Party, color: ProductColor) -> Self {
        Self {
            from,
            to,
            product_name: PRODUCT_NAME.to_string(),
            product_color: color,
            status: ProductStatus::Pending,
            record_id: RecordId::new(),
        }
    }

    /// The successor version. Name, color and record id carry over.
    pub fn next_version(&self, from: Party, to: Party, status: ProductStatus) -> Self {
        Self {
            from,
            to,
            product_name: self.product_name.clone(),
            product_color: self.product_color,
            status,
            record_id: self.record_id,
        }
    }

    pub fn participants(&self) -> [&Party; 2] {
        [&self.from, &self.to]
    }

    pub fn participant_keys(&self) -> BTreeSet<PartyKey> {
        self.participants()
            .iter()
            .map(|p| p.owning_key)
            .collect()
    }
}
