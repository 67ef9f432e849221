// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NDAU NODE - DATABASE MODULE
//
// sled storage for committed heights: full state snapshots, block records,
// transaction records and a per-account transaction index. One commit is
// one cross-tree sled transaction.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::error::NodeError;
use ndau_core::{SignedTx, State, Timestamp, TxReceipt};
use serde::{Deserialize, Serialize};
use sled::{Db, Transactional, Tree};
use std::path::Path;

const TREE_SNAPSHOTS: &str = "snapshots";
const TREE_BLOCKS: &str = "blocks";
const TREE_BLOCK_HASHES: &str = "block_hashes";
const TREE_TXS: &str = "txs";
const TREE_ACCOUNT_TXS: &str = "account_txs";
const TREE_META: &str = "meta";

const META_LATEST_HEIGHT: &[u8] = b"latest_height";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub height: u64,
    /// Hex SHA3-256 over the header fields.
    pub hash: String,
    pub prev_hash: String,
    pub time: Timestamp,
    pub app_hash: String,
    pub tx_hashes: Vec<String>,
}

impl BlockRecord {
    /// RFC 3339 rendering of the block time.
    pub fn time_rfc3339(&self) -> String {
        chrono::DateTime::from_timestamp(self.time as i64, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRecord {
    pub hash: String,
    pub height: u64,
    pub index: u32,
    pub tx: SignedTx,
    pub receipt: TxReceipt,
}

pub struct NodeDb {
    db: Db,
    snapshots: Tree,
    blocks: Tree,
    block_hashes: Tree,
    txs: Tree,
    account_txs: Tree,
    meta: Tree,
}

fn height_key(h: u64) -> [u8; 8] {
    h.to_be_bytes()
}

fn account_prefix(address: &str) -> Vec<u8> {
    let mut k = address.as_bytes().to_vec();
    k.push(b'/');
    k
}

fn account_key(address: &str, height: u64, index: u32) -> Vec<u8> {
    let mut k = account_prefix(address);
    k.extend_from_slice(&height.to_be_bytes());
    k.extend_from_slice(&index.to_be_bytes());
    k
}

fn decode_height(bytes: &[u8]) -> Option<u64> {
    Some(u64::from_be_bytes(bytes.try_into().ok()?))
}

impl NodeDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, NodeError> {
        let db = sled::open(path.as_ref())?;
        Ok(NodeDb {
            snapshots: db.open_tree(TREE_SNAPSHOTS)?,
            blocks: db.open_tree(TREE_BLOCKS)?,
            block_hashes: db.open_tree(TREE_BLOCK_HASHES)?,
            txs: db.open_tree(TREE_TXS)?,
            account_txs: db.open_tree(TREE_ACCOUNT_TXS)?,
            meta: db.open_tree(TREE_META)?,
            db,
        })
    }

    pub fn flush(&self) -> Result<(), NodeError> {
        self.db.flush()?;
        Ok(())
    }

    /// Write a committed height: snapshot, block, its transactions and the
    /// account index, all or nothing.
    pub fn put_block(&self, block: &BlockRecord, state: &State, txs: &[TxRecord]) -> Result<(), NodeError> {
        // serialize outside the transaction
        let snapshot = bincode::serialize(state)?;
        let block_bytes = bincode::serialize(block)?;
        let mut tx_entries = Vec::with_capacity(txs.len());
        let mut index_entries = Vec::new();
        for rec in txs {
            tx_entries.push((rec.hash.clone(), bincode::serialize(rec)?));
            for addr in &rec.receipt.touched {
                index_entries.push((account_key(addr, rec.height, rec.index), rec.hash.clone()));
            }
        }
        let hk = height_key(block.height);

        (
            &self.snapshots,
            &self.blocks,
            &self.block_hashes,
            &self.txs,
            &self.account_txs,
            &self.meta,
        )
            .transaction(|(t_snap, t_blocks, t_hashes, t_txs, t_acct, t_meta)| {
                t_snap.insert(&hk[..], snapshot.as_slice())?;
                t_blocks.insert(&hk[..], block_bytes.as_slice())?;
                t_hashes.insert(block.hash.as_bytes(), &hk[..])?;
                for (hash, bytes) in &tx_entries {
                    t_txs.insert(hash.as_bytes(), bytes.as_slice())?;
                }
                for (key, hash) in &index_entries {
                    t_acct.insert(key.as_slice(), hash.as_bytes())?;
                }
                t_meta.insert(META_LATEST_HEIGHT, &hk[..])?;
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError<()>| match e {
                sled::transaction::TransactionError::Storage(s) => NodeError::Db(s),
                sled::transaction::TransactionError::Abort(()) => {
                    NodeError::Config("block write aborted".to_string())
                }
            })?;
        self.db.flush()?;
        Ok(())
    }

    pub fn latest_height(&self) -> Result<Option<u64>, NodeError> {
        Ok(self
            .meta
            .get(META_LATEST_HEIGHT)?
            .and_then(|v| decode_height(&v)))
    }

    pub fn snapshot(&self, height: u64) -> Result<Option<State>, NodeError> {
        match self.snapshots.get(height_key(height))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Drop snapshots below `keep_from`. Blocks and transactions stay.
    pub fn prune_snapshots(&self, keep_from: u64) -> Result<usize, NodeError> {
        let mut removed = 0;
        for item in self.snapshots.range(..height_key(keep_from)) {
            let (k, _) = item?;
            self.snapshots.remove(k)?;
            removed += 1;
        }
        Ok(removed)
    }

    pub fn block(&self, height: u64) -> Result<Option<BlockRecord>, NodeError> {
        match self.blocks.get(height_key(height))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn block_by_hash(&self, hash: &str) -> Result<Option<BlockRecord>, NodeError> {
        match self.block_hashes.get(hash.as_bytes())? {
            Some(h) => match decode_height(&h) {
                Some(height) => self.block(height),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// Blocks `start..=end` in height order.
    pub fn blocks(&self, start: u64, end: u64) -> Result<Vec<BlockRecord>, NodeError> {
        let mut out = Vec::new();
        for item in self.blocks.range(height_key(start)..=height_key(end)) {
            let (_, v) = item?;
            out.push(bincode::deserialize(&v)?);
        }
        Ok(out)
    }

    pub fn tx(&self, hash: &str) -> Result<Option<TxRecord>, NodeError> {
        match self.txs.get(hash.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// `(height, tx hash)` for every transaction touching `address`, oldest
    /// first.
    pub fn account_txs(&self, address: &str) -> Result<Vec<(u64, String)>, NodeError> {
        let prefix = account_prefix(address);
        let mut out = Vec::new();
        for item in self.account_txs.scan_prefix(&prefix) {
            let (k, v) = item?;
            let height = k
                .get(prefix.len()..prefix.len() + 8)
                .and_then(decode_height)
                .ok_or_else(|| NodeError::Query("corrupt account index key".to_string()))?;
            let hash = String::from_utf8(v.to_vec())
                .map_err(|_| NodeError::Query("corrupt account index value".to_string()))?;
            out.push((height, hash));
        }
        Ok(out)
    }
}
