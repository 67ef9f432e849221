// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NDAU NODE - LOCAL DEVNET CHAIN
//
// Single-validator chain driving `NdauApp` directly: every submitted
// transaction goes through check_tx and lands in its own block. Block time
// comes from a deterministic clock that steps `block_interval_secs` per
// block, so replaying the same submissions reproduces the same app hashes.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::app::NdauApp;
use crate::config::NodeConfig;
use crate::db::BlockRecord;
use crate::error::NodeError;
use crate::genesis::GenesisConfig;
use ndau_core::tx::Signer;
use ndau_core::{SignedTx, State, Timestamp, Transaction, TxReceipt, ValidatorUpdate};
use ndau_crypto::KeyPair;

/// Outcome of one produced block.
#[derive(Debug)]
pub struct ProducedBlock {
    pub block: BlockRecord,
    /// Per delivered transaction: its hash and what happened to it.
    pub results: Vec<(String, Result<TxReceipt, NodeError>)>,
    pub validator_updates: Vec<ValidatorUpdate>,
}

pub struct LocalChain {
    app: NdauApp,
    clock: Timestamp,
}

/// Address that signs `tx` under `state`.
pub fn signer_address(state: &State, tx: &Transaction) -> Result<String, NodeError> {
    match tx.signer() {
        Signer::Account(a) => Ok(a),
        Signer::Ownership { target, .. } => Ok(target),
        Signer::System(name) => state
            .sysvars
            .address(name)?
            .ok_or_else(|| NodeError::Query(format!("{} is not set", name))),
    }
}

impl LocalChain {
    /// Resume an initialized home.
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        let app = NdauApp::open(config)?;
        if !app.is_initialized()? {
            return Err(NodeError::Config(format!(
                "{} has no chain; run init first",
                app.config().home.display()
            )));
        }
        let clock = app.latest().block_time;
        Ok(LocalChain { app, clock })
    }

    /// Open `config.home`, running init_chain with `genesis` if the home is
    /// empty.
    pub fn init(config: NodeConfig, genesis: &GenesisConfig) -> Result<Self, NodeError> {
        let mut app = NdauApp::open(config)?;
        if !app.is_initialized()? {
            app.init_chain(genesis)?;
        }
        let clock = app.latest().block_time;
        Ok(LocalChain { app, clock })
    }

    pub fn app(&self) -> &NdauApp {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut NdauApp {
        &mut self.app
    }

    /// Time the next block will carry, minus one interval.
    pub fn now(&self) -> Timestamp {
        self.clock
    }

    /// Let `secs` pass before the next block (notice periods, NNR gaps).
    pub fn advance_clock(&mut self, secs: u64) {
        self.clock = self.clock.saturating_add(secs);
    }

    /// Build a block from everything in the mempool.
    pub fn produce_block(&mut self) -> Result<ProducedBlock, NodeError> {
        self.clock = self
            .clock
            .saturating_add(self.app.config().block_interval_secs);
        self.app.begin_block(self.clock)?;

        let mut results = Vec::new();
        for pending in self.app.take_pending() {
            let outcome = self.app.deliver_tx(&pending.bytes);
            if let Err(e) = &outcome {
                log::warn!("tx {} failed in block: {}", pending.hash, e);
            }
            results.push((pending.hash, outcome));
        }

        let validator_updates = self.app.end_block()?;
        let block = self.app.commit()?;
        Ok(ProducedBlock {
            block,
            results,
            validator_updates,
        })
    }

    /// check_tx then a block of its own. Returns the delivery receipt.
    pub fn submit(&mut self, stx: &SignedTx) -> Result<TxReceipt, NodeError> {
        let bytes = stx.to_bytes()?;
        let checked = self.app.check_tx(&bytes)?;
        let produced = self.produce_block()?;
        produced
            .results
            .into_iter()
            .find(|(hash, _)| *hash == checked.hash)
            .map(|(_, outcome)| outcome)
            .unwrap_or_else(|| {
                Err(NodeError::Lifecycle(format!(
                    "tx {} missing from block {}",
                    checked.hash, produced.block.height
                )))
            })
    }

    /// Sign `tx` at the signer's next sequence and submit it.
    pub fn submit_tx(&mut self, tx: Transaction, keys: &[&KeyPair]) -> Result<TxReceipt, NodeError> {
        let state = self.app.latest();
        let signer = signer_address(&state, &tx)?;
        let sequence = state.account(&signer).map_or(0, |a| a.sequence) + 1;
        let stx = SignedTx::sign(tx, sequence, keys)?;
        self.submit(&stx)
    }
}
