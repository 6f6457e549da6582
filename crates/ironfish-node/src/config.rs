use std::path::{Path, PathBuf};

use ironfish_protocol::consensus::ConsensusParameters;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mempool::{FeeEstimatorConfig, MempoolConfig};
use crate::syncer::SyncerConfig;

// CONFIG ERROR
// ================================================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// NODE CONFIG
// ================================================================================================

/// Configuration of the node core.
///
/// Everything has a default, so an empty file is a valid configuration. The node writes nothing
/// outside the two database paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Where the blockchain database lives.
    pub chain_database_path: PathBuf,
    /// Where the wallet database lives. The core never opens it; the path is handed to the
    /// wallet collaborator.
    pub wallet_database_path: PathBuf,
    /// Blocks below the head considered final by callers that ask.
    pub confirmations: u32,
    /// Consensus parameters of the network this node joins.
    pub consensus: ConsensusParameters,
    /// Mempool sizing.
    pub mempool: MempoolConfig,
    /// Fee estimator window.
    pub fee_estimator: FeeEstimatorConfig,
    /// Block sync behavior.
    pub syncer: SyncerConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain_database_path: PathBuf::from("chain.redb"),
            wallet_database_path: PathBuf::from("wallet.redb"),
            confirmations: 2,
            consensus: ConsensusParameters::default(),
            mempool: MempoolConfig::default(),
            fee_estimator: FeeEstimatorConfig::default(),
            syncer: SyncerConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Loads a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use ironfish_protocol::consensus::ActivationSequence;

    use super::NodeConfig;

    #[test]
    fn empty_config_is_all_defaults() {
        let config: NodeConfig = toml::from_str("").unwrap();
        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn partial_config_overrides_defaults() {
        let config: NodeConfig = toml::from_str(
            r#"
            confirmations = 6

            [consensus]
            min_fee = 10
            enable_asset_ownership = 100

            [fee_estimator]
            num_blocks = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.confirmations, 6);
        assert_eq!(config.consensus.min_fee, 10);
        assert_eq!(config.consensus.enable_asset_ownership, ActivationSequence::at(100));
        assert_eq!(config.fee_estimator.num_blocks, 20);
        // Untouched sections keep their defaults.
        assert_eq!(config.mempool, super::MempoolConfig::default());
    }

    #[test]
    fn load_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(&path, "confirmations = 12\n").unwrap();

        let config = NodeConfig::load(&path).unwrap();
        assert_eq!(config.confirmations, 12);
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = NodeConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("not/here.toml"));
    }
}
