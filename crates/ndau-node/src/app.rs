// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NDAU NODE - APPLICATION
//
// The ABCI-shaped block application path. One `NdauApp` owns the working
// state exclusively; consensus calls, in order:
//
//   init_chain (once) → [ begin_block → deliver_tx* → end_block → commit ]*
//
// check_tx never touches committed state: it runs against a private check
// state, a copy of the last committed state positioned at the start of the
// next block and advanced through every admitted transaction, so one
// account can queue several sequences for the same block. Each commit
// persists the height to sled, publishes a new snapshot to readers, then
// rechecks whatever is still in the mempool against the new height.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::config::NodeConfig;
use crate::db::{BlockRecord, NodeDb, TxRecord};
use crate::error::NodeError;
use crate::genesis::GenesisConfig;
use crate::mempool::{Mempool, MempoolStats, PendingTx};
use crate::query::QueryService;
use crate::snapshot::SnapshotReader;
use ndau_core::{SignedTx, State, Timestamp, TxReceipt, ValidatorUpdate};
use sha3::{Digest, Sha3_256};
use std::sync::Arc;

pub struct NdauApp {
    config: NodeConfig,
    db: Arc<NodeDb>,
    reader: SnapshotReader,
    /// Between blocks this equals the last committed state.
    working: State,
    block_txs: Vec<TxRecord>,
    in_block: bool,
    mempool: Mempool,
    /// Committed state plus admitted mempool txs; rebuilt lazily after commit.
    check_state: Option<State>,
    last_block_hash: String,
}

/// SHA3-256 over the block header fields, hex.
pub fn block_hash(height: u64, prev_hash: &str, time: Timestamp, app_hash: &str, tx_hashes: &[String]) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(height.to_be_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(time.to_be_bytes());
    hasher.update(app_hash.as_bytes());
    for h in tx_hashes {
        hasher.update(h.as_bytes());
    }
    hex::encode(hasher.finalize())
}

impl NdauApp {
    /// Open the node home, resuming from the latest committed height.
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate().map_err(NodeError::Config)?;
        let db = Arc::new(NodeDb::open(config.db_path())?);

        let (state, last_block_hash) = match db.latest_height()? {
            Some(h) => {
                let state = db
                    .snapshot(h)?
                    .ok_or_else(|| NodeError::Config(format!("no snapshot for latest height {}", h)))?;
                let hash = db.block(h)?.map(|b| b.hash).unwrap_or_default();
                log::info!("📂 {} resuming at height {}", config.moniker, h);
                (state, hash)
            }
            None => (State::new(), String::new()),
        };

        Ok(NdauApp {
            mempool: Mempool::new(config.mempool_max_size),
            reader: SnapshotReader::new(state.clone(), db.clone()),
            working: state,
            block_txs: Vec::new(),
            in_block: false,
            check_state: None,
            last_block_hash,
            config,
            db,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> Result<bool, NodeError> {
        Ok(self.db.latest_height()?.is_some())
    }

    /// Seed and commit height 0. Fails on an already initialized home.
    pub fn init_chain(&mut self, genesis: &GenesisConfig) -> Result<BlockRecord, NodeError> {
        if self.is_initialized()? {
            return Err(NodeError::Genesis("chain is already initialized".to_string()));
        }
        if genesis.chain_id != self.config.chain_id {
            return Err(NodeError::Genesis(format!(
                "genesis is for chain {}, node is configured for {}",
                genesis.chain_id, self.config.chain_id
            )));
        }
        self.working = genesis.build_state()?;
        log::info!(
            "🌱 init_chain {}: {} accounts, {} sysvars",
            genesis.chain_id,
            self.working.accounts.len(),
            genesis.sysvars.len()
        );
        self.persist()
    }

    // ─────────────────────────────────────────────────────────────────
    // MEMPOOL ADMISSION
    // ─────────────────────────────────────────────────────────────────

    /// Validate encoded `bytes` against committed state plus the mempool
    /// and admit them.
    pub fn check_tx(&mut self, bytes: &[u8]) -> Result<TxReceipt, NodeError> {
        let stx = SignedTx::from_bytes(bytes)?;
        let hash = stx.hash()?;
        if self.mempool.contains(&hash) {
            return Err(NodeError::Duplicate(hash));
        }

        let reader = &self.reader;
        let state = self
            .check_state
            .get_or_insert_with(|| next_block_state(reader));
        let receipt = state.check(&stx)?;
        self.mempool.add(hash, bytes.to_vec())?;
        state.apply(&stx)?;
        Ok(receipt)
    }

    /// Drop mempool txs the new committed state no longer accepts and
    /// rebuild the check state from the survivors.
    fn recheck(&mut self) {
        let mut state = next_block_state(&self.reader);
        let dropped = self.mempool.retain(|pending| {
            SignedTx::from_bytes(&pending.bytes)
                .map_or(false, |stx| state.apply(&stx).is_ok())
        });
        if dropped > 0 {
            log::debug!("recheck dropped {} mempool txs", dropped);
        }
        self.check_state = Some(state);
    }

    pub(crate) fn take_pending(&mut self) -> Vec<PendingTx> {
        self.mempool.take(self.mempool.len())
    }

    pub fn mempool_stats(&self) -> MempoolStats {
        self.mempool.stats()
    }

    // ─────────────────────────────────────────────────────────────────
    // BLOCK APPLICATION
    // ─────────────────────────────────────────────────────────────────

    pub fn begin_block(&mut self, time: Timestamp) -> Result<(), NodeError> {
        if self.in_block {
            return Err(NodeError::Lifecycle("begin_block inside an open block".to_string()));
        }
        if !self.is_initialized()? {
            return Err(NodeError::Lifecycle("begin_block before init_chain".to_string()));
        }
        self.working.begin_block(time);
        self.in_block = true;
        self.block_txs.clear();
        Ok(())
    }

    /// Apply one transaction to the open block. A rejected transaction
    /// leaves the working state unchanged.
    pub fn deliver_tx(&mut self, bytes: &[u8]) -> Result<TxReceipt, NodeError> {
        if !self.in_block {
            return Err(NodeError::Lifecycle("deliver_tx outside a block".to_string()));
        }
        let stx = SignedTx::from_bytes(bytes)?;
        let receipt = self.working.apply(&stx)?;
        self.block_txs.push(TxRecord {
            hash: receipt.hash.clone(),
            height: self.working.height,
            index: self.block_txs.len() as u32,
            tx: stx,
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }

    pub fn end_block(&mut self) -> Result<Vec<ValidatorUpdate>, NodeError> {
        if !self.in_block {
            return Err(NodeError::Lifecycle("end_block outside a block".to_string()));
        }
        let updates = self.working.end_block();
        for u in &updates {
            log::info!("validator {} power → {}", hex::encode(&u.public_key), u.power);
        }
        Ok(updates)
    }

    /// Persist the working state as the next committed height and publish
    /// it to readers.
    pub fn commit(&mut self) -> Result<BlockRecord, NodeError> {
        if !self.in_block {
            return Err(NodeError::Lifecycle("commit outside a block".to_string()));
        }
        self.persist()
    }

    fn persist(&mut self) -> Result<BlockRecord, NodeError> {
        if let Err(e) = self.working.audit_supply() {
            log::error!("height {}: {}", self.working.height, e);
        }

        let app_hash = hex::encode(self.working.app_hash()?);
        let txs = std::mem::take(&mut self.block_txs);
        let tx_hashes: Vec<String> = txs.iter().map(|t| t.hash.clone()).collect();
        let height = self.working.height;
        let time = self.working.block_time;

        let block = BlockRecord {
            height,
            hash: block_hash(height, &self.last_block_hash, time, &app_hash, &tx_hashes),
            prev_hash: self.last_block_hash.clone(),
            time,
            app_hash,
            tx_hashes,
        };
        self.db.put_block(&block, &self.working, &txs)?;

        let retention = self.config.snapshot_retention;
        if retention > 0 && height >= retention {
            let pruned = self.db.prune_snapshots(height + 1 - retention)?;
            if pruned > 0 {
                log::debug!("pruned {} snapshots below height {}", pruned, height + 1 - retention);
            }
        }

        self.reader.publish(self.working.clone());
        self.last_block_hash = block.hash.clone();
        self.in_block = false;
        self.check_state = None;
        if !self.mempool.is_empty() {
            self.recheck();
        }
        log::info!(
            "✅ committed height {} ({} txs) app_hash {}",
            height,
            block.tx_hashes.len(),
            &block.app_hash[..16]
        );
        Ok(block)
    }

    // ─────────────────────────────────────────────────────────────────
    // READ SIDE
    // ─────────────────────────────────────────────────────────────────

    pub fn latest(&self) -> Arc<State> {
        self.reader.latest()
    }

    pub fn reader(&self) -> SnapshotReader {
        self.reader.clone()
    }

    pub fn query(&self) -> QueryService {
        QueryService::new(self.reader.clone(), &self.config.api_base_url)
    }

    pub fn flush(&self) -> Result<(), NodeError> {
        self.db.flush()
    }
}

fn next_block_state(reader: &SnapshotReader) -> State {
    let committed = reader.latest();
    let mut next = (*committed).clone();
    next.begin_block(committed.block_time);
    next
}
