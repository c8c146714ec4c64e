//! Protocol configuration.
//!
//! Timeouts for the two suspension points of a protocol attempt, loaded from
//! a TOML file. Every key is optional.
//!
//! # Example
//!
//! ```toml
//! [flow]
//! co_signature_timeout_ms = 30000
//! finality_timeout_ms = 60000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CO_SIGNATURE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_FINALITY_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse flow config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid flow config: {0}")]
    Invalid(String),
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default)]
    pub flow: FlowSettings,
}

/// `[flow]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowSettings {
    /// How long the initiator waits for the counterparty's co-signature.
    pub co_signature_timeout_ms: u64,
    /// How long the initiator waits for the notary.
    pub finality_timeout_ms: u64,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            co_signature_timeout_ms: DEFAULT_CO_SIGNATURE_TIMEOUT_MS,
            finality_timeout_ms: DEFAULT_FINALITY_TIMEOUT_MS,
        }
    }
}

impl FlowConfig {
    /// Read and parse a config file from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FlowConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Config with both timeouts set, mostly for tests.
    pub fn with_timeouts(co_signature: Duration, finality: Duration) -> Self {
        Self {
            flow: FlowSettings {
                co_signature_timeout_ms: co_signature.as_millis() as u64,
                finality_timeout_ms: finality.as_millis() as u64,
            },
        }
    }

    pub fn co_signature_timeout(&self) -> Duration {
        Duration::from_millis(self.flow.co_signature_timeout_ms)
    }

    pub fn finality_timeout(&self) -> Duration {
        Duration::from_millis(self.flow.finality_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        if self.flow.co_signature_timeout_ms == 0 {
            errors.push("co_signature_timeout_ms must be greater than zero");
        }
        if self.flow.finality_timeout_ms == 0 {
            errors.push("finality_timeout_ms must be greater than zero");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = FlowConfig::from_toml_str("").unwrap();
        assert_eq!(config, FlowConfig::default());
        assert_eq!(config.co_signature_timeout(), Duration::from_secs(30));
        assert_eq!(config.finality_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn partial_section_keeps_other_default() {
        let config = FlowConfig::from_toml_str("[flow]\nfinality_timeout_ms = 500\n").unwrap();
        assert_eq!(config.flow.finality_timeout_ms, 500);
        assert_eq!(
            config.flow.co_signature_timeout_ms,
            DEFAULT_CO_SIGNATURE_TIMEOUT_MS
        );
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let err = FlowConfig::from_toml_str("[flow]\nco_signature_timeout_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = FlowConfig::from_toml_str("[flow\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[flow]").unwrap();
        writeln!(file, "co_signature_timeout_ms = 250").unwrap();
        let config = FlowConfig::load(file.path()).unwrap();
        assert_eq!(config.co_signature_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn load_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = FlowConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
