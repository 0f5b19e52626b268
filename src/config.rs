//! Miner configuration
//!
//! Loaded from a JSON file; every field is optional and falls back to the
//! defaults below. Command-line flags override file values.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::algorithm::{MAX_SIEVE_SIZE, MinerOptions, Network};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File I/O error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Invalid setting {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// main, test or regtest
    pub network: String,
    /// Worker threads (default: number of CPU cores)
    pub threads: Option<usize>,
    pub sieve_size: usize,
    pub sieve_round_limit_ms: u64,
    pub sieve_weave_initial: usize,
    pub primorial_multiplier: u32,
    pub candidate_slice_ms: u64,
    /// Seconds between progress reports
    pub report_interval_secs: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        let options = MinerOptions::default();
        Self {
            network: Network::Main.name().to_string(),
            threads: None,
            sieve_size: options.sieve_size,
            sieve_round_limit_ms: options.sieve_round_limit.as_millis() as u64,
            sieve_weave_initial: options.sieve_weave_initial,
            primorial_multiplier: options.primorial_multiplier,
            candidate_slice_ms: options.candidate_slice.as_millis() as u64,
            report_interval_secs: 5,
        }
    }
}

impl MinerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load `path` if given, else the default location if a file exists there
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => {
                log::debug!("loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn network(&self) -> Result<Network, ConfigError> {
        Network::parse(&self.network)
            .ok_or_else(|| ConfigError::UnknownNetwork(self.network.clone()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network()?;
        if self.sieve_size == 0 || self.sieve_size > MAX_SIEVE_SIZE {
            return Err(ConfigError::Invalid {
                field: "sieve_size",
                reason: format!("must be in 1..={}", MAX_SIEVE_SIZE),
            });
        }
        let hash_factor = MinerOptions::default().primorial_hash_factor;
        if self.primorial_multiplier < hash_factor {
            return Err(ConfigError::Invalid {
                field: "primorial_multiplier",
                reason: format!("must be at least {}", hash_factor),
            });
        }
        if self.threads == Some(0) {
            return Err(ConfigError::Invalid {
                field: "threads",
                reason: "must be positive".to_string(),
            });
        }
        if self.candidate_slice_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "candidate_slice_ms",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn miner_options(&self) -> MinerOptions {
        MinerOptions {
            sieve_size: self.sieve_size,
            sieve_round_limit: Duration::from_millis(self.sieve_round_limit_ms),
            sieve_weave_initial: self.sieve_weave_initial,
            primorial_multiplier: self.primorial_multiplier,
            candidate_slice: Duration::from_millis(self.candidate_slice_ms),
            ..MinerOptions::default()
        }
    }
}

/// `<config dir>/primechain/miner.json`
#[cfg(feature = "cli")]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("primechain").join("miner.json"))
}

#[cfg(not(feature = "cli"))]
pub fn default_config_path() -> Option<PathBuf> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("primechain-config-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = MinerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.network().unwrap(), Network::Main);
        assert_eq!(config.miner_options(), MinerOptions::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: MinerConfig =
            serde_json::from_str(r#"{"network": "testnet", "sieve_size": 50000}"#).unwrap();
        assert_eq!(config.network().unwrap(), Network::Test);
        assert_eq!(config.sieve_size, 50000);
        assert_eq!(config.primorial_multiplier, 61);
        assert_eq!(config.miner_options().sieve_size, 50000);
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("miner.json");
        let config = MinerConfig {
            network: "regtest".to_string(),
            threads: Some(2),
            ..MinerConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = MinerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_explicit_missing_path_fails() {
        let path = temp_path("does-not-exist.json");
        assert!(matches!(
            MinerConfig::load_or_default(Some(&path)),
            Err(ConfigError::FileError(_))
        ));
    }

    #[test]
    fn test_invalid_settings() {
        let config = MinerConfig {
            network: "moonnet".to_string(),
            ..MinerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::UnknownNetwork(_))));

        let config = MinerConfig {
            sieve_size: MAX_SIEVE_SIZE + 1,
            ..MinerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "sieve_size", .. })
        ));

        let config = MinerConfig {
            primorial_multiplier: 5,
            ..MinerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "primorial_multiplier", .. })
        ));

        let config = MinerConfig {
            threads: Some(0),
            ..MinerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
