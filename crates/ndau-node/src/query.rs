// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NDAU NODE - QUERY SERVICE
//
// Read-only lookups for the API layer and the CLI. Every call reads one
// committed snapshot (or the sled records behind it); nothing here can see
// a half-applied block. `QueryService` is cheap to clone and safe to use
// from other threads while blocks are being applied.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::db::{BlockRecord, TxRecord};
use crate::error::NodeError;
use crate::snapshot::SnapshotReader;
use ndau_core::eai::{eai_rates, EaiRateRequest, EaiRateResponse};
use ndau_core::{AccountData, HistoryEntry, Node, NnrWinner, Summary, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Most blocks one range query may return.
pub const MAX_BLOCK_RANGE: u64 = 100;
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub address: String,
    pub height: u64,
    /// `None` for an address the chain has never seen.
    pub data: Option<AccountData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountHistoryItem {
    pub height: u64,
    pub timestamp: String,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountHistory {
    pub items: Vec<AccountHistoryItem>,
    /// Fully qualified URL of the next page, empty on the last page.
    pub next: String,
}

#[derive(Clone)]
pub struct QueryService {
    reader: SnapshotReader,
    api_base_url: String,
}

impl QueryService {
    pub fn new(reader: SnapshotReader, api_base_url: &str) -> Self {
        QueryService {
            reader,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn height(&self) -> u64 {
        self.reader.height()
    }

    // ─────────────────────────────────────────────────────────────────
    // ACCOUNTS
    // ─────────────────────────────────────────────────────────────────

    pub fn account(&self, address: &str) -> Result<AccountResponse, NodeError> {
        check_address(address)?;
        let state = self.reader.latest();
        Ok(AccountResponse {
            address: address.to_string(),
            height: state.height,
            data: state.account(address).cloned(),
        })
    }

    /// Account as committed at `height`; fails once that snapshot is pruned.
    pub fn account_at(&self, address: &str, height: u64) -> Result<AccountResponse, NodeError> {
        check_address(address)?;
        let state = self
            .reader
            .at(height)?
            .ok_or_else(|| NodeError::Query(format!("no snapshot retained for height {}", height)))?;
        Ok(AccountResponse {
            address: address.to_string(),
            height,
            data: state.account(address).cloned(),
        })
    }

    /// Transactions touching `address` above height `after`, oldest first.
    /// A page never splits one height.
    pub fn account_history(
        &self,
        address: &str,
        after: u64,
        limit: Option<usize>,
    ) -> Result<AccountHistory, NodeError> {
        check_address(address)?;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        if limit == 0 {
            return Err(NodeError::Query("limit must be positive".to_string()));
        }

        let entries: Vec<(u64, String)> = self
            .reader
            .db()
            .account_txs(address)?
            .into_iter()
            .filter(|(h, _)| *h > after)
            .collect();

        let mut end = limit.min(entries.len());
        while end < entries.len() && end > 0 && entries[end].0 == entries[end - 1].0 {
            end += 1;
        }

        let mut items = Vec::with_capacity(end);
        let mut times: BTreeMap<u64, String> = BTreeMap::new();
        for (height, tx_hash) in &entries[..end] {
            if !times.contains_key(height) {
                let ts = self
                    .reader
                    .db()
                    .block(*height)?
                    .map(|b| b.time_rfc3339())
                    .unwrap_or_default();
                times.insert(*height, ts);
            }
            items.push(AccountHistoryItem {
                height: *height,
                timestamp: times.get(height).cloned().unwrap_or_default(),
                tx_hash: tx_hash.clone(),
            });
        }

        let next = match items.last() {
            Some(last) if end < entries.len() => format!(
                "{}/account/history/{}?after={}&limit={}",
                self.api_base_url, address, last.height, limit
            ),
            _ => String::new(),
        };
        Ok(AccountHistory { items, next })
    }

    // ─────────────────────────────────────────────────────────────────
    // SYSVARS
    // ─────────────────────────────────────────────────────────────────

    /// Current value; empty when never set.
    pub fn sysvar(&self, name: &str) -> Vec<u8> {
        self.reader.latest().sysvars.get(name)
    }

    /// Several sysvars at once; `names` empty means all that are set.
    pub fn sysvars(&self, names: &[String]) -> BTreeMap<String, Vec<u8>> {
        let state = self.reader.latest();
        if names.is_empty() {
            return state
                .sysvars
                .names()
                .map(|n| (n.to_string(), state.sysvars.get(n)))
                .collect();
        }
        names
            .iter()
            .map(|n| (n.clone(), state.sysvars.get(n)))
            .collect()
    }

    pub fn sysvar_history(&self, name: &str) -> Vec<HistoryEntry> {
        self.reader.latest().sysvars.history(name).to_vec()
    }

    // ─────────────────────────────────────────────────────────────────
    // BLOCKS & TRANSACTIONS
    // ─────────────────────────────────────────────────────────────────

    pub fn block_current(&self) -> Result<Option<BlockRecord>, NodeError> {
        self.reader.db().block(self.height())
    }

    pub fn block_at(&self, height: u64) -> Result<Option<BlockRecord>, NodeError> {
        if height > self.height() {
            return Ok(None);
        }
        self.reader.db().block(height)
    }

    pub fn block_by_hash(&self, hash: &str) -> Result<Option<BlockRecord>, NodeError> {
        self.reader.db().block_by_hash(hash)
    }

    /// Blocks `start..=end`; requires `1 ≤ start ≤ end ≤ current` and at
    /// most `MAX_BLOCK_RANGE` blocks.
    pub fn block_range(&self, start: u64, end: u64) -> Result<Vec<BlockRecord>, NodeError> {
        let current = self.height();
        if start < 1 {
            return Err(NodeError::Query("start must be at least 1".to_string()));
        }
        if start > end {
            return Err(NodeError::Query(format!("start {} is after end {}", start, end)));
        }
        if end > current {
            return Err(NodeError::Query(format!(
                "end {} is beyond current height {}",
                end, current
            )));
        }
        if end - start + 1 > MAX_BLOCK_RANGE {
            return Err(NodeError::Query(format!(
                "range of {} blocks exceeds {}",
                end - start + 1,
                MAX_BLOCK_RANGE
            )));
        }
        self.reader.db().blocks(start, end)
    }

    /// Blocks with `after ≤ time < before`, oldest first, at most `limit`.
    pub fn block_date_range(
        &self,
        after: Timestamp,
        before: Timestamp,
        limit: usize,
    ) -> Result<Vec<BlockRecord>, NodeError> {
        if after >= before {
            return Err(NodeError::Query("empty date range".to_string()));
        }
        let limit = limit.clamp(1, MAX_BLOCK_RANGE as usize);
        let current = self.height();
        let mut out = Vec::new();
        let mut start = 1;
        // block times are non-decreasing, so stop at the first block past `before`
        while start <= current && out.len() < limit {
            let end = (start + MAX_BLOCK_RANGE - 1).min(current);
            for block in self.reader.db().blocks(start, end)? {
                if block.time >= before {
                    return Ok(out);
                }
                if block.time >= after {
                    out.push(block);
                    if out.len() == limit {
                        break;
                    }
                }
            }
            start = end + 1;
        }
        Ok(out)
    }

    /// `None` for a hash the chain has not seen.
    pub fn tx(&self, hash: &str) -> Result<Option<TxRecord>, NodeError> {
        self.reader.db().tx(hash)
    }

    // ─────────────────────────────────────────────────────────────────
    // LEDGER SUMMARIES
    // ─────────────────────────────────────────────────────────────────

    pub fn summary(&self) -> Summary {
        self.reader.latest().summary()
    }

    pub fn eai_rate(&self, requests: &[EaiRateRequest]) -> Result<Vec<EaiRateResponse>, NodeError> {
        let tables = self.reader.latest().sysvars.rate_tables()?;
        Ok(eai_rates(&tables, requests))
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.reader.latest().nodes.values().cloned().collect()
    }

    pub fn nnr_winner(&self) -> Option<NnrWinner> {
        self.reader.latest().nnr_winner.clone()
    }
}

fn check_address(address: &str) -> Result<(), NodeError> {
    if ndau_crypto::validate_address(address) {
        Ok(())
    } else {
        Err(NodeError::Query(format!("invalid address {}", address)))
    }
}
