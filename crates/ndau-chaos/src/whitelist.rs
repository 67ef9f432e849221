//! Node-local allow-list of `{key, value}` pairs that an SCP must match.
//!
//! Managed out of band by the `ndau whitelist` command, never through
//! transactions. The file is bincode and replaced atomically on every change.

use crate::error::ChaosError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Whitelist {
    path: PathBuf,
    entries: BTreeSet<WhitelistEntry>,
}

impl Whitelist {
    /// Load the whitelist at `path`; a missing file is an empty whitelist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ChaosError> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeSet::new(),
            Ok(bytes) => bincode::deserialize(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Whitelist { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn check(&self, key: &[u8], value: &[u8]) -> bool {
        self.entries.contains(&WhitelistEntry {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// Returns false if the pair was already present.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<bool, ChaosError> {
        let added = self.entries.insert(WhitelistEntry {
            key: key.to_vec(),
            value: value.to_vec(),
        });
        if added {
            self.save()?;
            log::info!(
                "whitelisted {:?} = {:?}",
                String::from_utf8_lossy(key),
                String::from_utf8_lossy(value)
            );
        }
        Ok(added)
    }

    /// Returns false if the pair was not present.
    pub fn remove(&mut self, key: &[u8], value: &[u8]) -> Result<bool, ChaosError> {
        let removed = self.entries.remove(&WhitelistEntry {
            key: key.to_vec(),
            value: value.to_vec(),
        });
        if removed {
            self.save()?;
            log::info!("removed {:?} from whitelist", String::from_utf8_lossy(key));
        }
        Ok(removed)
    }

    pub fn list(&self) -> Vec<WhitelistEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn save(&self) -> Result<(), ChaosError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let bytes = bincode::serialize(&self.entries)?;
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}
