// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CHAOS APPLICATION
//
// check_tx gates admission (signature, nonce, whitelist), deliver_tx writes
// into the store at the height of the block being built, commit seals it.
// deliver_tx repeats the nonce check so a replayed write never lands.
// The whitelist is read from disk at check time so out-of-band edits take
// effect immediately. It is node-local, so deliver_tx does not consult it.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::error::ChaosError;
use crate::store::{ChaosStore, SYSVAR_NAMESPACE};
use crate::tx::{ChaosTx, SignedChaosTx};
use crate::whitelist::Whitelist;
use sha3::{Digest, Sha3_256};
use std::path::PathBuf;

#[derive(Debug)]
pub struct ChaosApp {
    store: ChaosStore,
    /// Height of the block being built, or the last committed between blocks.
    height: u64,
    whitelist_path: PathBuf,
}

impl ChaosApp {
    pub fn new(whitelist_path: impl Into<PathBuf>) -> Self {
        ChaosApp {
            store: ChaosStore::new(),
            height: 0,
            whitelist_path: whitelist_path.into(),
        }
    }

    /// Resume from a persisted store.
    pub fn with_store(store: ChaosStore, height: u64, whitelist_path: impl Into<PathBuf>) -> Self {
        ChaosApp {
            store,
            height,
            whitelist_path: whitelist_path.into(),
        }
    }

    pub fn store(&self) -> &ChaosStore {
        &self.store
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Mempool admission. Returns the transaction hash.
    pub fn check_tx(&self, bytes: &[u8]) -> Result<String, ChaosError> {
        let stx = SignedChaosTx::from_bytes(bytes)?;
        stx.verify()?;
        match &stx.tx {
            ChaosTx::Set { namespace_key, .. } => {
                let ns = ndau_crypto::namespace_for(namespace_key);
                self.store.check_nonce(&ns, stx.nonce)?;
            }
            ChaosTx::Scp { key, value } => {
                let wl = Whitelist::open(&self.whitelist_path)?;
                if !wl.check(key, value) {
                    log::debug!("rejecting non-whitelisted SCP {:?}", String::from_utf8_lossy(key));
                    return Err(ChaosError::not_whitelisted(key, value));
                }
            }
        }
        stx.hash()
    }

    pub fn begin_block(&mut self) {
        self.height += 1;
    }

    pub fn deliver_tx(&mut self, bytes: &[u8]) -> Result<String, ChaosError> {
        let stx = SignedChaosTx::from_bytes(bytes)?;
        stx.verify()?;
        match &stx.tx {
            ChaosTx::Set {
                namespace_key,
                key,
                value,
            } => {
                let ns = ndau_crypto::namespace_for(namespace_key);
                self.store.check_nonce(&ns, stx.nonce)?;
                self.store.set(&ns, key, value, self.height)?;
                self.store.record_nonce(&ns, stx.nonce);
            }
            ChaosTx::Scp { key, value } => {
                self.store.set(SYSVAR_NAMESPACE, key, value, self.height)?;
                log::info!(
                    "SCP {:?} applied at height {}",
                    String::from_utf8_lossy(key),
                    self.height
                );
            }
        }
        stx.hash()
    }

    /// SHA3-256 of the store.
    pub fn commit(&self) -> Result<[u8; 32], ChaosError> {
        let bytes = bincode::serialize(&self.store)?;
        log::info!("chaos block {} committed", self.height);
        Ok(Sha3_256::digest(&bytes).into())
    }

    // ─────────────────────────────────────────────────────────────
    // QUERIES
    // ─────────────────────────────────────────────────────────────

    pub fn get(&self, namespace: &str, key: &[u8]) -> Vec<u8> {
        self.store.get(namespace, key)
    }

    pub fn get_sys(&self, key: &[u8]) -> Vec<u8> {
        self.store.get_sys(key)
    }

    pub fn history(&self, namespace: &str, key: &[u8]) -> Vec<ndau_core::HistoryEntry> {
        self.store.history(namespace, key).to_vec()
    }

    pub fn dump(&self, namespace: &str) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.store.dump(namespace)
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.store.namespaces()
    }
}
