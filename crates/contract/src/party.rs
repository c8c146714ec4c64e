use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ContractError;

/// An Ed25519 owning key, kept as raw bytes so it can be ordered and hashed.
///
/// Serialized as base64, the same encoding used for `.pub` key files.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartyKey([u8; 32]);

impl PartyKey {
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        PartyKey(key.to_bytes())
    }

    /// Parse the key back into curve form. Fails on bytes that are not a
    /// valid Ed25519 point.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey, ContractError> {
        VerifyingKey::from_bytes(&self.0)
            .map_err(|e| ContractError::InvalidKey(format!("{}: {}", self.fingerprint(), e)))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_base64(encoded: &str) -> Result<Self, ContractError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| ContractError::InvalidKey(format!("error decoding key: {}", e)))?;
        let key_bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            ContractError::InvalidKey("invalid key length: expected 32 bytes".to_string())
        })?;
        Ok(PartyKey(key_bytes))
    }

    /// Short hex fingerprint (first 8 bytes of the key).
    pub fn fingerprint(&self) -> String {
        self.0[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for PartyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BASE64.encode(self.0))
    }
}

impl fmt::Debug for PartyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartyKey({})", self.fingerprint())
    }
}

impl Serialize for PartyKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(self.0))
    }
}

impl<'de> Deserialize<'de> for PartyKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        PartyKey::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// A ledger participant: a display name plus the key it signs with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub owning_key: PartyKey,
}

impl Party {
    pub fn new(name: impl Into<String>, owning_key: PartyKey) -> Self {
        Self {
            name: name.into(),
            owning_key,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.owning_key.fingerprint())
    }
}
