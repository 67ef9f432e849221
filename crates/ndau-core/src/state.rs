// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LEDGER STATE & TRANSACTION PIPELINE
//
// `State` is the whole replicated state at one height. It is only mutated
// through `apply`, which runs a transaction against a staging overlay and
// writes the overlay back only if every step succeeded. `check` runs the
// same pipeline and throws the overlay away.
//
// Pipeline:
//   1. encode signable bytes, hash
//   2. resolve signer (account, authority sysvar, or ownership key)
//   3. sequence == current + 1
//   4. signatures (validation keys, optionally judged by a validation script)
//   5. fee from TransactionFeeScript
//   6. affordability: available ≥ outgoing qty + fee
//   7. fee debit + sequence bump, then the transaction's own effects
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::account::AccountData;
use crate::duration::Timestamp;
use crate::eai::RateTables;
use crate::error::{validation, TxError};
use crate::handlers;
use crate::nnr::{Node, NnrWinner};
use crate::sysvar::SysvarStore;
use crate::tx::{SignedTx, Signer};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::collections::BTreeMap;

/// Most validation keys an account may hold (signature bitmap width).
pub const MAX_VALIDATION_KEYS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorUpdate {
    #[serde(with = "hex_key")]
    pub public_key: Vec<u8>,
    pub power: i64,
}

/// Result of a delivered (or checked) transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub hash: String,
    pub tx_type: String,
    pub signer: String,
    pub fee: u64,
    /// Every account whose record changed, signer first.
    pub touched: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub height: u64,
    pub block_time: Timestamp,
    pub num_accounts: usize,
    pub total_ndau: u64,
    pub total_rfe: u64,
    pub total_eai: u64,
    pub total_fees: u64,
    pub market_price: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub accounts: BTreeMap<String, AccountData>,
    pub nodes: BTreeMap<String, Node>,
    pub sysvars: SysvarStore,
    pub last_nnr: Option<Timestamp>,
    pub nnr_winner: Option<NnrWinner>,
    pub market_price: Option<u64>,
    pub total_rfe: u64,
    pub total_eai: u64,
    /// Fees are burned.
    pub total_fees: u64,
    /// Height of the block being built (or last committed, between blocks).
    pub height: u64,
    pub block_time: Timestamp,
    pub pending_validator_updates: Vec<ValidatorUpdate>,
}

// ─────────────────────────────────────────────────────────────────
// STAGING OVERLAY
// ─────────────────────────────────────────────────────────────────

/// Copy-on-write view of `State` for one transaction. Accounts are cloned
/// and brought up to date (`touch`) the first time they are read.
pub(crate) struct Staged<'a> {
    pub base: &'a State,
    pub now: Timestamp,
    pub tables: RateTables,
    pub hash: String,
    pub accounts: BTreeMap<String, AccountData>,
    touched: Vec<String>,
    pub nodes: BTreeMap<String, Node>,
    pub sysvar: Option<(String, Vec<u8>)>,
    pub nnr_winner: Option<NnrWinner>,
    pub market_price: Option<u64>,
    pub rfe: u64,
    pub eai: u64,
    pub validator_updates: Vec<ValidatorUpdate>,
}

/// Owned output of a successful run, ready to be written to `State`.
pub(crate) struct Changes {
    receipt: TxReceipt,
    accounts: BTreeMap<String, AccountData>,
    nodes: BTreeMap<String, Node>,
    sysvar: Option<(String, Vec<u8>)>,
    nnr_winner: Option<NnrWinner>,
    market_price: Option<u64>,
    rfe: u64,
    eai: u64,
    validator_updates: Vec<ValidatorUpdate>,
}

impl<'a> Staged<'a> {
    fn new(base: &'a State, tables: RateTables, hash: String) -> Self {
        Staged {
            base,
            now: base.block_time,
            tables,
            hash,
            accounts: BTreeMap::new(),
            touched: Vec::new(),
            nodes: BTreeMap::new(),
            sysvar: None,
            nnr_winner: None,
            market_price: None,
            rfe: 0,
            eai: 0,
            validator_updates: Vec::new(),
        }
    }

    /// Mutable account, created empty if it has never been seen.
    pub fn account(&mut self, address: &str) -> &mut AccountData {
        if !self.accounts.contains_key(address) {
            let mut acct = self
                .base
                .accounts
                .get(address)
                .cloned()
                .unwrap_or_else(|| AccountData::new(self.now));
            acct.touch(self.now, &self.tables);
            self.accounts.insert(address.to_string(), acct);
            self.touched.push(address.to_string());
        }
        self.accounts.entry(address.to_string()).or_default()
    }

    /// Read-only view without staging the account.
    pub fn peek(&self, address: &str) -> Option<&AccountData> {
        self.accounts
            .get(address)
            .or_else(|| self.base.accounts.get(address))
    }

    /// True if the account exists with anything in it.
    pub fn exists(&self, address: &str) -> bool {
        self.peek(address).map_or(false, |a| !a.is_empty())
    }

    pub fn node(&self, address: &str) -> Option<&Node> {
        self.nodes
            .get(address)
            .or_else(|| self.base.nodes.get(address))
    }

    pub fn node_mut(&mut self, address: &str) -> Option<&mut Node> {
        if !self.nodes.contains_key(address) {
            let node = self.base.nodes.get(address)?.clone();
            self.nodes.insert(address.to_string(), node);
        }
        self.nodes.get_mut(address)
    }

    pub fn insert_node(&mut self, node: Node) {
        self.nodes.insert(node.address.clone(), node);
    }

    pub fn is_active_node(&self, address: &str) -> bool {
        self.node(address).map_or(false, |n| n.active)
    }

    pub fn current_winner(&self) -> Option<&NnrWinner> {
        self.nnr_winner.as_ref().or(self.base.nnr_winner.as_ref())
    }

    /// Addresses delegated to `node`, staged view winning over base.
    pub fn delegates_of(&self, node: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .base
            .accounts
            .iter()
            .filter(|(a, _)| !self.accounts.contains_key(*a))
            .filter(|(_, d)| d.delegation_node.as_deref() == Some(node))
            .map(|(a, _)| a.clone())
            .collect();
        out.extend(
            self.accounts
                .iter()
                .filter(|(_, d)| d.delegation_node.as_deref() == Some(node))
                .map(|(a, _)| a.clone()),
        );
        out.sort();
        out
    }

    fn finish(self, signer: String, tx_type: &str, fee: u64) -> Changes {
        let mut touched = self.touched;
        if let Some(pos) = touched.iter().position(|a| *a == signer) {
            let s = touched.remove(pos);
            touched.insert(0, s);
        }
        Changes {
            receipt: TxReceipt {
                hash: self.hash,
                tx_type: tx_type.to_string(),
                signer,
                fee,
                touched,
            },
            accounts: self.accounts,
            nodes: self.nodes,
            sysvar: self.sysvar,
            nnr_winner: self.nnr_winner,
            market_price: self.market_price,
            rfe: self.rfe,
            eai: self.eai,
            validator_updates: self.validator_updates,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// STATE
// ─────────────────────────────────────────────────────────────────

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, address: &str) -> Option<&AccountData> {
        self.accounts.get(address)
    }

    /// Start building block `height + 1` at consensus time `time`.
    /// Block time never moves backwards.
    pub fn begin_block(&mut self, time: Timestamp) {
        self.height += 1;
        self.block_time = self.block_time.max(time);
    }

    /// Validator power changes queued during the block.
    pub fn end_block(&mut self) -> Vec<ValidatorUpdate> {
        std::mem::take(&mut self.pending_validator_updates)
    }

    /// SHA3-256 over the canonical bincode encoding.
    pub fn app_hash(&self) -> Result<[u8; 32], TxError> {
        let bytes = bincode::serialize(self)?;
        Ok(Sha3_256::digest(&bytes).into())
    }

    /// Validate `stx` against this state without changing it.
    pub fn check(&self, stx: &SignedTx) -> Result<TxReceipt, TxError> {
        self.process(stx).map(|c| c.receipt)
    }

    /// Validate and apply `stx`. On error the state is untouched.
    pub fn apply(&mut self, stx: &SignedTx) -> Result<TxReceipt, TxError> {
        let changes = match self.process(stx) {
            Ok(c) => c,
            Err(e) => {
                log::debug!("rejected {} at height {}: {}", stx.tx.name(), self.height, e);
                return Err(e);
            }
        };
        self.commit_changes(changes)
    }

    fn commit_changes(&mut self, changes: Changes) -> Result<TxReceipt, TxError> {
        // the only fallible write goes first
        if let Some((name, value)) = changes.sysvar {
            self.sysvars.set(&name, value, self.height)?;
            log::info!("sysvar {} set at height {}", name, self.height);
        }
        self.accounts.extend(changes.accounts);
        self.nodes.extend(changes.nodes);
        if let Some(w) = changes.nnr_winner {
            if !w.claimed {
                self.last_nnr = Some(w.nominated_at);
            }
            self.nnr_winner = Some(w);
        }
        if changes.market_price.is_some() {
            self.market_price = changes.market_price;
        }
        self.total_rfe = self.total_rfe.saturating_add(changes.rfe);
        self.total_eai = self.total_eai.saturating_add(changes.eai);
        self.total_fees = self.total_fees.saturating_add(changes.receipt.fee);
        self.pending_validator_updates
            .extend(changes.validator_updates);
        Ok(changes.receipt)
    }

    fn process(&self, stx: &SignedTx) -> Result<Changes, TxError> {
        // 1. SIGNABLE BYTES & HASH
        let bytes = stx.signable_bytes()?;
        let hash = ndau_crypto::tx_hash(&bytes);
        let tables = self.sysvars.rate_tables()?;
        let mut staged = Staged::new(self, tables, hash);

        // 2. SIGNER
        let signer = stx.tx.signer();
        let signer_addr = match &signer {
            Signer::Account(a) => a.clone(),
            Signer::System(name) => self
                .sysvars
                .address(name)?
                .ok_or_else(|| validation(format!("{} is not set", name)))?,
            Signer::Ownership { target, key } => {
                let kind = ndau_crypto::parse_address(target)
                    .map_err(|e| validation(e.to_string()))?;
                if ndau_crypto::public_key_to_address(key, kind) != *target {
                    return Err(validation(format!(
                        "ownership key does not derive to {}",
                        target
                    )));
                }
                target.clone()
            }
        };
        if !ndau_crypto::validate_address(&signer_addr) {
            return Err(validation(format!("invalid address {}", signer_addr)));
        }

        // 3. SEQUENCE
        let acct = staged.account(&signer_addr);
        let expected = acct.sequence + 1;
        if stx.sequence != expected {
            return Err(validation(format!(
                "sequence {} is invalid: expected {}",
                stx.sequence, expected
            )));
        }

        // 4. SIGNATURES
        match &signer {
            Signer::Ownership { key, .. } => {
                if !stx
                    .signatures
                    .iter()
                    .any(|s| ndau_crypto::verify_signature(&bytes, s, key))
                {
                    return Err(validation("no valid ownership signature"));
                }
            }
            _ => check_signatures(acct, &bytes, &stx.signatures)?,
        }

        // 5. FEE
        let fee = if stx.tx.is_fee_exempt() {
            0
        } else {
            self.compute_fee(stx.tx.type_id(), bytes.len())?
        };

        // 6. AFFORDABILITY
        let need = stx
            .tx
            .outgoing_qty()
            .checked_add(fee)
            .ok_or_else(|| validation("quantity overflow"))?;
        let now = staged.now;
        let acct = staged.account(&signer_addr);
        let have = acct.available(now);
        if have < need {
            return Err(TxError::InsufficientFunds { need, have });
        }

        // 7. FEE DEBIT, SEQUENCE, EFFECTS
        acct.debit(fee, now)?;
        acct.sequence = stx.sequence;
        handlers::apply(&mut staged, &signer_addr, &stx.tx)?;

        Ok(staged.finish(signer_addr, stx.tx.name(), fee))
    }

    /// Fee in napu for a transaction of `type_id` with `len` signable bytes.
    /// No fee script means no fee.
    pub fn compute_fee(&self, type_id: u8, len: usize) -> Result<u64, TxError> {
        let script = match self.sysvars.fee_script() {
            Some(s) if !s.is_empty() => s,
            _ => return Ok(0),
        };
        let fee = ndau_vm::execute(&script, type_id, &[len as i64])?;
        u64::try_from(fee).map_err(|_| validation(format!("fee script returned {}", fee)))
    }

    pub fn summary(&self) -> Summary {
        Summary {
            height: self.height,
            block_time: self.block_time,
            num_accounts: self.accounts.len(),
            total_ndau: self
                .accounts
                .values()
                .fold(0u64, |acc, a| acc.saturating_add(a.balance)),
            total_rfe: self.total_rfe,
            total_eai: self.total_eai,
            total_fees: self.total_fees,
            market_price: self.market_price,
        }
    }

    /// Every napu ever issued is in a balance, burned as a fee, or waiting
    /// as a node's unclaimed reward.
    pub fn audit_supply(&self) -> Result<(), String> {
        let balances: u128 = self.accounts.values().map(|a| a.balance as u128).sum();
        let pending: u128 = self.nodes.values().map(|n| n.pending_reward as u128).sum();
        let accounted = balances + pending + self.total_fees as u128;
        let issued = self.total_rfe as u128 + self.total_eai as u128;
        if accounted != issued {
            return Err(format!(
                "Supply mismatch: issued {} napu but {} accounted (balances {} + pending rewards {} + fees {})",
                issued, accounted, balances, pending, self.total_fees
            ));
        }
        Ok(())
    }

    /// Create a claimed system account outside of a transaction. Genesis only.
    pub fn insert_genesis_account(&mut self, address: &str, keys: &[Vec<u8>]) -> Result<(), TxError> {
        if !ndau_crypto::validate_address(address) {
            return Err(validation(format!("invalid address {}", address)));
        }
        if self.height != 0 {
            return Err(validation("genesis accounts can only be created at height 0"));
        }
        let acct = self
            .accounts
            .entry(address.to_string())
            .or_insert_with(|| AccountData::new(self.block_time));
        acct.validation_keys = Some(keys.iter().map(hex::encode).collect());
        Ok(())
    }
}

/// All signatures must come from validation keys; a validation script, when
/// present, then decides from the bitmap of keys that signed.
fn check_signatures(acct: &AccountData, bytes: &[u8], signatures: &[Vec<u8>]) -> Result<(), TxError> {
    let keys = match &acct.validation_keys {
        Some(k) if !k.is_empty() => k,
        _ => return Err(validation("account has no validation keys")),
    };
    if signatures.is_empty() {
        return Err(validation("transaction is not signed"));
    }
    let decoded: Vec<Vec<u8>> = keys
        .iter()
        .map(|k| hex::decode(k).map_err(|_| TxError::Encoding("stored key is not hex".into())))
        .collect::<Result<_, _>>()?;

    let mut bitmap: i64 = 0;
    for sig in signatures {
        let idx = decoded
            .iter()
            .position(|k| ndau_crypto::verify_signature(bytes, sig, k))
            .ok_or_else(|| validation("invalid signature"))?;
        bitmap |= 1 << idx;
    }

    if let Some(script) = &acct.validation_script {
        let verdict = ndau_vm::execute(script, 0, &[decoded.len() as i64, bitmap])?;
        if verdict == 0 {
            return Err(validation("validation script rejected signatures"));
        }
    }
    Ok(())
}

mod hex_key {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.serialize_str(&hex::encode(v))
        } else {
            s.serialize_bytes(v)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        if d.is_human_readable() {
            hex::decode(String::deserialize(d)?).map_err(serde::de::Error::custom)
        } else {
            Vec::<u8>::deserialize(d)
        }
    }
}
