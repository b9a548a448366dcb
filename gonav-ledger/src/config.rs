//! Configuration for the savings-group store

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// RocksDB configuration
    #[serde(default)]
    pub rocksdb: RocksDBConfig,

    /// Writer actor configuration
    #[serde(default)]
    pub actor: ActorConfig,

    /// Sync status configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Demo dataset configuration
    #[serde(default)]
    pub demo: DemoConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/gonav"),
            service_name: "gonav-ledger".to_string(),
            rocksdb: RocksDBConfig::default(),
            actor: ActorConfig::default(),
            sync: SyncConfig::default(),
            demo: DemoConfig::default(),
        }
    }
}

/// RocksDB configuration
///
/// Defaults are sized for a phone, not a server: one community's worth of
/// groups fits in a few megabytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 4,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Writer actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Bounded mailbox size (backpressure)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
        }
    }
}

/// Sync status configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Connectivity reported until the platform listener says otherwise
    pub assume_online: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            assume_online: false,
        }
    }
}

/// Demo dataset configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Seed the illustrative dataset on startup when the store is empty
    pub seed_on_start: bool,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("GONAV_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(online) = std::env::var("GONAV_ASSUME_ONLINE") {
            config.sync.assume_online = parse_flag("GONAV_ASSUME_ONLINE", &online)?;
        }

        if let Ok(seed) = std::env::var("GONAV_SEED_DEMO") {
            config.demo.seed_on_start = parse_flag("GONAV_SEED_DEMO", &seed)?;
        }

        Ok(config)
    }
}

fn parse_flag(name: &str, value: &str) -> crate::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(crate::Error::Config(format!(
            "{} must be a boolean, got {:?}",
            name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "gonav-ledger");
        assert_eq!(config.actor.mailbox_capacity, 256);
        assert!(!config.sync.assume_online);
        assert!(!config.demo.seed_on_start);
    }

    #[test]
    fn test_from_file_with_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gonav.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "/tmp/gonav-test"
service_name = "gonav-ledger"

[sync]
assume_online = true
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/gonav-test"));
        assert!(config.sync.assume_online);
        assert_eq!(config.rocksdb.max_background_jobs, 2);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("X", "yes").unwrap());
        assert!(!parse_flag("X", "0").unwrap());
        assert!(matches!(parse_flag("X", "maybe"), Err(crate::Error::Config(_))));
    }
}
