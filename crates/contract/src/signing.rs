//! Ed25519 transaction signatures.
//!
//! A signature covers the transaction id (the SHA-256 hex digest of the
//! transaction body), so any change to inputs, outputs or commands
//! invalidates every signature already collected.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use serde::{Deserialize, Serialize};

use crate::error::ContractError;
use crate::party::{Party, PartyKey};
use crate::transaction::TxId;

/// A detached signature over a transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub by: PartyKey,
    /// Base64-encoded 64-byte Ed25519 signature.
    pub signature: String,
}

impl TransactionSignature {
    pub fn verify(&self, tx_id: &TxId) -> Result<(), ContractError> {
        let invalid = |message: String| ContractError::InvalidSignature {
            signer: self.by.fingerprint(),
            message,
        };
        let key = self.by.to_verifying_key()?;
        let bytes = BASE64
            .decode(&self.signature)
            .map_err(|e| invalid(format!("error decoding signature: {}", e)))?;
        let sig_bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|_| invalid("invalid signature length: expected 64 bytes".to_string()))?;
        let signature = Signature::from_bytes(&sig_bytes);
        key.verify(tx_id.as_str().as_bytes(), &signature)
            .map_err(|e| invalid(e.to_string()))
    }
}

/// A party together with the secret key it signs with.
pub struct LocalIdentity {
    party: Party,
    signing_key: SigningKey,
}

impl LocalIdentity {
    pub fn generate(name: impl Into<String>) -> Self {
        let mut rng = rand::rngs::OsRng;
        Self::from_signing_key(name, SigningKey::generate(&mut rng))
    }

    pub fn from_signing_key(name: impl Into<String>, signing_key: SigningKey) -> Self {
        let owning_key = PartyKey::from_verifying_key(&signing_key.verifying_key());
        Self {
            party: Party::new(name, owning_key),
            signing_key,
        }
    }

    /// Restore an identity from a base64-encoded 32-byte seed.
    pub fn from_secret_base64(name: impl Into<String>, encoded: &str) -> Result<Self, ContractError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| ContractError::InvalidKey(format!("error decoding secret key: {}", e)))?;
        let seed: [u8; 32] = bytes.try_into().map_err(|_| {
            ContractError::InvalidKey("invalid secret key length: expected 32 bytes".to_string())
        })?;
        Ok(Self::from_signing_key(name, SigningKey::from_bytes(&seed)))
    }

    pub fn secret_base64(&self) -> String {
        BASE64.encode(self.signing_key.to_bytes())
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    pub fn sign(&self, tx_id: &TxId) -> TransactionSignature {
        let signature = self.signing_key.sign(tx_id.as_str().as_bytes());
        TransactionSignature {
            by: self.party.owning_key,
            signature: BASE64.encode(signature.to_bytes()),
        }
    }
}

impl std::fmt::Debug for LocalIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalIdentity")
            .field("party", &self.party)
            .finish_non_exhaustive()
    }
}
