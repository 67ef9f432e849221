// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NAMESPACED KEY-VALUE STORE
//
// namespace → key → append-only history of {height, value}. The current
// value is the last entry; an empty value is a deletion and stays in the
// history. A key takes at most one write per block. Namespaces are base64
// public keys plus the reserved "sysvar" namespace written by SCPs. Each
// identity namespace also remembers the last nonce applied to it, so old
// signed writes cannot be replayed.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::error::ChaosError;
use ndau_core::HistoryEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Namespace that SCP writes land in.
pub const SYSVAR_NAMESPACE: &str = "sysvar";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaosStore {
    namespaces: BTreeMap<String, BTreeMap<Vec<u8>, Vec<HistoryEntry>>>,
    #[serde(default)]
    nonces: BTreeMap<String, u64>,
}

impl ChaosStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_height(&self, namespace: &str, key: &[u8]) -> Option<u64> {
        self.history(namespace, key).last().map(|e| e.height)
    }

    /// Check that `set(namespace, key, _, height)` would be accepted.
    pub fn check_set(&self, namespace: &str, key: &[u8], height: u64) -> Result<(), ChaosError> {
        match self.last_height(namespace, key) {
            Some(h) if h >= height => Err(ChaosError::TooSoon {
                namespace: namespace.to_string(),
                key: String::from_utf8_lossy(key).into_owned(),
                height: h,
            }),
            _ => Ok(()),
        }
    }

    /// Append `value` for `key` at `height`.
    pub fn set(&mut self, namespace: &str, key: &[u8], value: &[u8], height: u64) -> Result<(), ChaosError> {
        self.check_set(namespace, key, height)?;
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .entry(key.to_vec())
            .or_default()
            .push(HistoryEntry {
                height,
                value: value.to_vec(),
            });
        Ok(())
    }

    pub fn last_nonce(&self, namespace: &str) -> Option<u64> {
        self.nonces.get(namespace).copied()
    }

    /// A signed write must carry a nonce above every nonce already applied
    /// to its namespace.
    pub fn check_nonce(&self, namespace: &str, nonce: u64) -> Result<(), ChaosError> {
        match self.last_nonce(namespace) {
            Some(last) if nonce <= last => Err(ChaosError::StaleNonce {
                namespace: namespace.to_string(),
                nonce,
                last,
            }),
            _ => Ok(()),
        }
    }

    pub fn record_nonce(&mut self, namespace: &str, nonce: u64) {
        self.nonces.insert(namespace.to_string(), nonce);
    }

    /// Current value, empty when unset or deleted.
    pub fn get(&self, namespace: &str, key: &[u8]) -> Vec<u8> {
        self.namespaces
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .and_then(|h| h.last())
            .map(|e| e.value.clone())
            .unwrap_or_default()
    }

    pub fn get_sys(&self, key: &[u8]) -> Vec<u8> {
        self.get(SYSVAR_NAMESPACE, key)
    }

    pub fn history(&self, namespace: &str, key: &[u8]) -> &[HistoryEntry] {
        self.namespaces
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every live key-value pair in `namespace`, in key order.
    pub fn dump(&self, namespace: &str) -> Vec<(Vec<u8>, Vec<u8>)> {
        let Some(ns) = self.namespaces.get(namespace) else {
            return Vec::new();
        };
        ns.iter()
            .filter_map(|(k, h)| {
                let v = &h.last()?.value;
                (!v.is_empty()).then(|| (k.clone(), v.clone()))
            })
            .collect()
    }

    /// Namespaces that have ever been written.
    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces.keys().cloned().collect()
    }
}
