use crate::error::NodeError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.toml";
pub const DATA_DIR: &str = "data";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3030";

/// Node settings, one TOML file per home directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub chain_id: String,
    pub moniker: String,
    pub home: PathBuf,
    pub genesis_path: Option<PathBuf>,
    pub whitelist_path: PathBuf,
    /// Prefix for pagination `next` links.
    pub api_base_url: String,
    pub mempool_max_size: usize,
    /// Heights of state to keep; 0 keeps all.
    pub snapshot_retention: u64,
    /// Devnet clock step per block.
    pub block_interval_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            chain_id: "ndau-devnet".to_string(),
            moniker: "devnet-0".to_string(),
            home: PathBuf::from(".ndau"),
            genesis_path: None,
            whitelist_path: PathBuf::from(".ndau/scp.whitelist"),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            mempool_max_size: 10_000,
            snapshot_retention: 0,
            block_interval_secs: 60,
        }
    }
}

impl NodeConfig {
    /// Defaults rooted at `home`.
    pub fn for_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        NodeConfig {
            whitelist_path: home.join("scp.whitelist"),
            home,
            ..Self::default()
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self, NodeError> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| NodeError::Config(format!("{}: {}", path.display(), e)))
    }

    /// `config.toml` in `home` if present, otherwise defaults for `home`.
    pub fn load_home(home: &Path) -> Result<Self, NodeError> {
        let path = home.join(CONFIG_FILE);
        if path.exists() {
            let mut config = Self::load_from_file(&path)?;
            config.home = home.to_path_buf();
            Ok(config)
        } else {
            Ok(Self::for_home(home))
        }
    }

    /// Build from `NDAU_*` variables, falling back to defaults.
    pub fn load_from_env() -> Result<Self, NodeError> {
        let home = std::env::var("NDAU_HOME").unwrap_or_else(|_| ".ndau".to_string());
        let mut config = Self::for_home(&home);
        if let Ok(id) = std::env::var("NDAU_CHAIN_ID") {
            config.chain_id = id;
        }
        if let Ok(g) = std::env::var("NDAU_GENESIS") {
            config.genesis_path = Some(PathBuf::from(g));
        }
        if let Ok(w) = std::env::var("NDAU_WHITELIST") {
            config.whitelist_path = PathBuf::from(w);
        }
        if let Ok(url) = std::env::var("NDAU_API_BASE_URL") {
            config.api_base_url = url;
        }
        config.validate().map_err(NodeError::Config)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), NodeError> {
        let content = toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.chain_id.is_empty() {
            return Err("chain_id cannot be empty".to_string());
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(format!("api_base_url {:?} is not an http(s) URL", self.api_base_url));
        }
        if self.api_base_url.ends_with('/') {
            return Err("api_base_url must not end with '/'".to_string());
        }
        if self.mempool_max_size == 0 {
            return Err("mempool_max_size must be positive".to_string());
        }
        if self.block_interval_secs == 0 {
            return Err("block_interval_secs must be positive".to_string());
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.home.join(DATA_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.join(CONFIG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NodeConfig::for_home(dir.path());
        config.snapshot_retention = 16;
        config.save_to_file(&config.config_path()).unwrap();

        let loaded = NodeConfig::load_home(dir.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "moniker = \"node-7\"\n").unwrap();
        let loaded = NodeConfig::load_home(dir.path()).unwrap();
        assert_eq!(loaded.moniker, "node-7");
        assert_eq!(loaded.block_interval_secs, 60);
        assert_eq!(loaded.home, dir.path());
    }

    #[test]
    fn test_validate() {
        let mut c = NodeConfig::default();
        assert!(c.validate().is_ok());
        c.api_base_url = "localhost:3030".into();
        assert!(c.validate().is_err());
        c.api_base_url = "http://x/".into();
        assert!(c.validate().is_err());
        c = NodeConfig::default();
        c.mempool_max_size = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "moniker = [").unwrap();
        assert!(matches!(NodeConfig::load_from_file(&path), Err(NodeError::Config(_))));
    }
}
