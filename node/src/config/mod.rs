use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const PARACHAIN_ROOT_DIR: &str = ".parachain";
const PARACHAIN_CONFIG_FILE: &str = "config.toml";

//node settings
pub const DEFAULT_EXECUTOR_FILTER: &str = "ticket";

//main chain settings
pub const DEFAULT_MAIN_CHAIN_URL: &str = "http://localhost:8801";
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 11 * 1024 * 1024;
pub const DEFAULT_REQUEST_TIMEOUT_SEC: u64 = 10;

//sequence settings
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_SEQUENCE_STEP: i64 = 1;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;
pub const DEFAULT_DRAIN_TIMEOUT_SEC: u64 = 600;
pub const DEFAULT_DRAIN_POLL_MS: u64 = 1000;

//cache settings
pub const DEFAULT_CACHE_CAPACITY: usize = 10240;
pub const DEFAULT_SEQ_RANGE: i64 = 5;

//block settings
pub const DEFAULT_BLOCK_INTERVAL_SEC: u64 = 10;
pub const DEFAULT_EMPTY_BLOCK_INTERVAL_SEC: u64 = 2 * 60;
pub const DEFAULT_EMPTY_BLOCK_SEQ_THRESHOLD: i64 = 100;

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("ConfigDoesNotExist: '{0}'")]
    DoesNotExist(String),
    #[error("ParsingFailed: {0}")]
    ParsingFailed(#[from] config::ConfigError),
    #[error("TomlError: {0}")]
    TomlError(#[from] toml::ser::Error),
    #[error("IoError: {0}")]
    IoError(#[from] std::io::Error),
    #[error("InvalidValue: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Configuration {
    pub node: NodeConfiguration,
    pub main_chain: MainChainConfiguration,
    pub sequence: SequenceConfiguration,
    pub cache: CacheConfiguration,
    pub block: BlockConfiguration,
    pub database: DatabaseConfiguration,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct NodeConfiguration {
    /// Only main chain transactions addressed to this executor are taken into parachain blocks.
    pub executor_filter: String,
    /// When false the node follows the main chain but doesn't produce blocks.
    pub mine: bool,
}

impl Default for NodeConfiguration {
    fn default() -> Self {
        Self {
            executor_filter: DEFAULT_EXECUTOR_FILTER.to_string(),
            mine: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MainChainConfiguration {
    /// JSON-RPC endpoint of a main chain node.
    pub url: String,
    /// Responses larger than this are rejected.
    pub max_payload_bytes: usize,
    pub request_timeout_sec: u64,
}

impl Default for MainChainConfiguration {
    fn default() -> Self {
        Self {
            url: DEFAULT_MAIN_CHAIN_URL.to_string(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            request_timeout_sec: DEFAULT_REQUEST_TIMEOUT_SEC,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SequenceConfiguration {
    pub poll_interval_ms: u64,
    /// How many sequence entries are requested per cycle.
    pub step: i64,
    /// Upper bound of the retry delay while the main chain is unreachable.
    pub max_backoff_ms: u64,
    /// How long a revert waits for in-flight transactions to be blocked.
    pub drain_timeout_sec: u64,
    pub drain_poll_ms: u64,
}

impl SequenceConfiguration {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_sec)
    }

    pub fn drain_poll(&self) -> Duration {
        Duration::from_millis(self.drain_poll_ms.max(1))
    }

    pub fn step(&self) -> i64 {
        self.step.max(1)
    }
}

impl Default for SequenceConfiguration {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            step: DEFAULT_SEQUENCE_STEP,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            drain_timeout_sec: DEFAULT_DRAIN_TIMEOUT_SEC,
            drain_poll_ms: DEFAULT_DRAIN_POLL_MS,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CacheConfiguration {
    pub capacity: usize,
    /// Blocks take transactions only from this many most recent sequences.
    pub seq_range: i64,
}

impl Default for CacheConfiguration {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            seq_range: DEFAULT_SEQ_RANGE,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BlockConfiguration {
    pub interval_sec: u64,
    /// Idle time after which an empty block is produced.
    pub empty_block_interval_sec: u64,
    /// Empty blocks are produced only when the node lags more sequences than this.
    pub empty_block_seq_threshold: i64,
}

impl BlockConfiguration {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_sec)
    }

    /// Number of idle block intervals which make up the empty block interval.
    pub fn empty_block_ticks(&self) -> u64 {
        self.empty_block_interval_sec / self.interval_sec.max(1)
    }
}

impl Default for BlockConfiguration {
    fn default() -> Self {
        Self {
            interval_sec: DEFAULT_BLOCK_INTERVAL_SEC,
            empty_block_interval_sec: DEFAULT_EMPTY_BLOCK_INTERVAL_SEC,
            empty_block_seq_threshold: DEFAULT_EMPTY_BLOCK_SEQ_THRESHOLD,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DatabaseConfiguration {
    pub rocksdb_path: String,
    pub create_if_not_exists: bool,
}

impl Default for DatabaseConfiguration {
    fn default() -> Self {
        let rocksdb_path = Configuration::parachain_root_dir()
            .map(|root| root.join("db").join("rocksdb"))
            .unwrap_or_else(|_| PathBuf::from("db").join("rocksdb"));
        Self {
            rocksdb_path: rocksdb_path.to_string_lossy().into_owned(),
            create_if_not_exists: true,
        }
    }
}

impl Configuration {
    pub fn try_load<I: Into<PathBuf>>(path: I) -> Result<Configuration> {
        let path = path.into();
        if !path.exists() {
            return Err(ConfigurationError::DoesNotExist(
                path.to_string_lossy().into_owned(),
            ));
        }
        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?;

        let config: Configuration = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Loops are driven by these intervals, zero would make them spin.
    pub fn validate(&self) -> Result<()> {
        if self.block.interval_sec == 0 {
            return Err(ConfigurationError::Invalid(
                "block.interval_sec must be greater than 0".to_string(),
            ));
        }
        if self.sequence.poll_interval_ms == 0 {
            return Err(ConfigurationError::Invalid(
                "sequence.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn try_load_from_home_dir(node_name: &str) -> Result<Configuration> {
        let path = Self::parachain_config_file(node_name)?;
        Self::try_load(path)
    }

    pub fn try_write<I: Into<PathBuf>>(&self, path: I) -> Result<()> {
        let path = path.into();
        let config = toml::to_string(&self)?;

        let config = format!(
            "#This file is generated by cli and automatically overwritten every time when cli is run\n{config}",
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(path)?;
        file.write_all(config.as_bytes())?;

        Ok(())
    }

    pub fn parachain_root_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(PARACHAIN_ROOT_DIR))
            .ok_or_else(|| ConfigurationError::DoesNotExist("home directory".to_string()))
    }

    pub fn parachain_node_dir(node_name: &str) -> Result<PathBuf> {
        Ok(Self::parachain_root_dir()?.join(node_name))
    }

    pub fn parachain_config_file(node_name: &str) -> Result<PathBuf> {
        Ok(Self::parachain_node_dir(node_name)?.join(PARACHAIN_CONFIG_FILE))
    }
}
