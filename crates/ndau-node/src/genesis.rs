// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NDAU NODE - GENESIS MODULE
//
// Two phases:
// 1. `GenesisConfig::build_state` seeds height 0 from genesis JSON: claimed
//    system accounts and sysvars, with the fee script pinned to zero.
// 2. `perform_genesis` funds the endowment and governance accounts and the
//    purchasers through ordinary transactions, then switches the fee script
//    to its post-genesis value. It runs once; a second call sees the funded
//    sentinel accounts and reports `AlreadyDone`.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::chain::LocalChain;
use crate::error::NodeError;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use ndau_core::sysvar::{self, encode};
use ndau_core::{State, Timestamp, Transaction};
use ndau_crypto::KeyPair;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisAccount {
    pub address: String,
    /// Hex ed25519 public keys installed as validation keys.
    pub public_keys: Vec<String>,
}

/// Initial allocation released from the endowment during genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisPurchaser {
    pub address: String,
    /// napu
    pub qty: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisConfig {
    pub chain_id: String,
    pub genesis_time: Timestamp,
    pub accounts: Vec<GenesisAccount>,
    /// Sysvar name → base64 value.
    #[serde(default)]
    pub sysvars: BTreeMap<String, String>,
    #[serde(default)]
    pub purchasers: Vec<GenesisPurchaser>,
    /// napu released to each of the endowment and governance accounts.
    pub system_funding: u64,
    /// Base64 fee script installed once genesis is performed.
    pub post_genesis_fee_script: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenesisOutcome {
    /// Funding already happened on this chain; nothing was submitted.
    AlreadyDone,
    Performed,
}

impl GenesisConfig {
    pub fn new(chain_id: &str, genesis_time: Timestamp) -> Self {
        GenesisConfig {
            chain_id: chain_id.to_string(),
            genesis_time,
            accounts: Vec::new(),
            sysvars: BTreeMap::new(),
            purchasers: Vec::new(),
            system_funding: 0,
            post_genesis_fee_script: B64.encode(ndau_vm::constant_script(0)),
        }
    }

    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let data = fs::read_to_string(path)?;
        let cfg: GenesisConfig = serde_json::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<(), NodeError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn add_account(&mut self, address: &str, public_key: &[u8]) {
        self.accounts.push(GenesisAccount {
            address: address.to_string(),
            public_keys: vec![hex::encode(public_key)],
        });
    }

    pub fn set_sysvar(&mut self, name: &str, value: &[u8]) {
        self.sysvars.insert(name.to_string(), B64.encode(value));
    }

    /// Point an authority sysvar at `address`.
    pub fn set_address(&mut self, name: &str, address: &str) -> Result<(), NodeError> {
        let value = encode(&address.to_string())?;
        self.set_sysvar(name, &value);
        Ok(())
    }

    pub fn post_genesis_fee_script_bytes(&self) -> Result<Vec<u8>, NodeError> {
        B64.decode(&self.post_genesis_fee_script)
            .map_err(|e| NodeError::Genesis(format!("postGenesisFeeScript: {}", e)))
    }

    /// Height-0 state described by this config.
    pub fn build_state(&self) -> Result<State, NodeError> {
        if self.system_funding == 0 {
            return Err(NodeError::Genesis("systemFunding must be positive".to_string()));
        }
        ndau_vm::Chaincode::parse(&self.post_genesis_fee_script_bytes()?)
            .map_err(|e| NodeError::Genesis(format!("postGenesisFeeScript: {}", e)))?;

        let mut state = State::new();
        state.block_time = self.genesis_time;

        for acct in &self.accounts {
            let keys = acct
                .public_keys
                .iter()
                .map(|k| hex::decode(k).map_err(|e| NodeError::Genesis(format!("{}: {}", acct.address, e))))
                .collect::<Result<Vec<_>, _>>()?;
            state.insert_genesis_account(&acct.address, &keys)?;
        }

        for (name, encoded) in &self.sysvars {
            let value = B64
                .decode(encoded)
                .map_err(|e| NodeError::Genesis(format!("sysvar {}: {}", name, e)))?;
            sysvar::validate_value(name, &value)?;
            state.sysvars.set(name, value, 0)?;
        }
        // pre-genesis transactions are free
        if !state.sysvars.is_set(sysvar::TRANSACTION_FEE_SCRIPT) {
            state
                .sysvars
                .set(sysvar::TRANSACTION_FEE_SCRIPT, ndau_vm::constant_script(0), 0)?;
        }

        for name in [sysvar::RELEASE_FROM_ENDOWMENT_ADDRESS, sysvar::SET_SYSVAR_ADDRESS] {
            let addr = state
                .sysvars
                .address(name)?
                .ok_or_else(|| NodeError::Genesis(format!("{} is not set", name)))?;
            if !state.account(&addr).map_or(false, |a| a.is_claimed()) {
                return Err(NodeError::Genesis(format!(
                    "{} names {}, which is not a genesis account",
                    name, addr
                )));
            }
        }
        Ok(state)
    }
}

fn system_address(state: &State, name: &str) -> Result<String, NodeError> {
    state
        .sysvars
        .address(name)?
        .ok_or_else(|| NodeError::Genesis(format!("{} is not set", name)))
}

/// Fund the system accounts and purchasers, then install the post-genesis
/// fee script. Safe to call again.
pub fn perform_genesis(
    chain: &mut LocalChain,
    cfg: &GenesisConfig,
    rfe_key: &KeyPair,
    bpc_key: &KeyPair,
) -> Result<GenesisOutcome, NodeError> {
    let state = chain.app().latest();
    let rfe_addr = system_address(&state, sysvar::RELEASE_FROM_ENDOWMENT_ADDRESS)?;
    let bpc_addr = system_address(&state, sysvar::SET_SYSVAR_ADDRESS)?;

    let funded = [&rfe_addr, &bpc_addr]
        .iter()
        .any(|a| state.account(a).map_or(false, |acct| acct.balance > 0));
    if funded {
        log::info!("genesis already performed at or before height {}", state.height);
        return Ok(GenesisOutcome::AlreadyDone);
    }
    if cfg.system_funding == 0 {
        return Err(NodeError::Genesis("systemFunding must be positive".to_string()));
    }
    drop(state);

    log::info!("performing genesis: funding {} and {}", rfe_addr, bpc_addr);
    for dest in [&rfe_addr, &bpc_addr] {
        chain.submit_tx(
            Transaction::ReleaseFromEndowment {
                destination: dest.clone(),
                qty: cfg.system_funding,
            },
            &[rfe_key],
        )?;
    }
    for p in &cfg.purchasers {
        chain.submit_tx(
            Transaction::ReleaseFromEndowment {
                destination: p.address.clone(),
                qty: p.qty,
            },
            &[rfe_key],
        )?;
    }
    chain.submit_tx(
        Transaction::SetSysvar {
            name: sysvar::TRANSACTION_FEE_SCRIPT.to_string(),
            value: cfg.post_genesis_fee_script_bytes()?,
        },
        &[bpc_key],
    )?;
    log::info!(
        "genesis performed: {} purchasers, fee script {}",
        cfg.purchasers.len(),
        cfg.post_genesis_fee_script
    );
    Ok(GenesisOutcome::Performed)
}
