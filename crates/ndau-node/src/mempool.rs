// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NDAU NODE - TRANSACTION MEMPOOL
//
// Transactions that passed check_tx, waiting for a block.
// - Arrival order is block order
// - Duplicate hashes rejected
// - Bounded size
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::error::NodeError;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone)]
pub struct PendingTx {
    pub hash: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Mempool {
    queue: VecDeque<PendingTx>,
    hashes: HashSet<String>,
    max_size: usize,

    pub total_received: u64,
    pub total_accepted: u64,
    pub total_rejected: u64,
}

impl Mempool {
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            hashes: HashSet::new(),
            max_size,
            total_received: 0,
            total_accepted: 0,
            total_rejected: 0,
        }
    }

    pub fn add(&mut self, hash: String, bytes: Vec<u8>) -> Result<(), NodeError> {
        self.total_received += 1;
        if self.hashes.contains(&hash) {
            self.total_rejected += 1;
            return Err(NodeError::Duplicate(hash));
        }
        if self.queue.len() >= self.max_size {
            self.total_rejected += 1;
            return Err(NodeError::MempoolFull(self.queue.len()));
        }
        self.hashes.insert(hash.clone());
        self.queue.push_back(PendingTx { hash, bytes });
        self.total_accepted += 1;
        Ok(())
    }

    /// Up to `max` transactions in arrival order, removed from the pool.
    pub fn take(&mut self, max: usize) -> Vec<PendingTx> {
        let n = max.min(self.queue.len());
        let out: Vec<PendingTx> = self.queue.drain(..n).collect();
        for tx in &out {
            self.hashes.remove(&tx.hash);
        }
        out
    }

    /// Keep only the transactions `keep` accepts, in arrival order.
    /// Returns how many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&PendingTx) -> bool) -> usize {
        let before = self.queue.len();
        let hashes = &mut self.hashes;
        self.queue.retain(|tx| {
            let kept = keep(tx);
            if !kept {
                hashes.remove(&tx.hash);
            }
            kept
        });
        before - self.queue.len()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn stats(&self) -> MempoolStats {
        MempoolStats {
            size: self.queue.len(),
            total_received: self.total_received,
            total_accepted: self.total_accepted,
            total_rejected: self.total_rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolStats {
    pub size: usize,
    pub total_received: u64,
    pub total_accepted: u64,
    pub total_rejected: u64,
}
