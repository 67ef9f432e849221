// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SYSTEM VARIABLES
//
// Governance key-value store. Values are opaque byte blobs; each `set`
// appends `{height, value}` to that name's history, which is never
// rewritten. The current value is the last history entry. Typed accessors
// decode the well-known names with bincode and fall back to protocol
// defaults while a name has never been set.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::account::AccountAttributes;
use crate::duration::Duration;
use crate::eai::{EaiFeeTable, RateTable, RateTables};
use crate::error::TxError;
use crate::NAPU_PER_NDAU;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─────────────────────────────────────────────────────────────────
// WELL-KNOWN NAMES
// ─────────────────────────────────────────────────────────────────

pub const TRANSACTION_FEE_SCRIPT: &str = "TransactionFeeScript";
pub const EAI_FEE_TABLE: &str = "EAIFeeTable";
pub const ACCOUNT_ATTRIBUTES: &str = "AccountAttributes";
pub const NODE_RULES_ACCOUNT_ADDRESS: &str = "NodeRulesAccountAddress";
pub const UNLOCKED_RATE_TABLE: &str = "UnlockedRateTable";
pub const LOCKED_RATE_TABLE: &str = "LockedRateTable";
pub const MIN_DURATION_BETWEEN_NNRS: &str = "MinDurationBetweenNNRs";
pub const MIN_NODE_REGISTRATION_STAKE: &str = "MinNodeRegistrationStake";
pub const DEFAULT_SETTLEMENT_DURATION: &str = "DefaultSettlementDuration";
pub const RELEASE_FROM_ENDOWMENT_ADDRESS: &str = "ReleaseFromEndowmentAddress";
pub const NOMINATE_NODE_REWARD_ADDRESS: &str = "NominateNodeRewardAddress";
pub const COMMAND_VALIDATOR_CHANGE_ADDRESS: &str = "CommandValidatorChangeAddress";
pub const SET_SYSVAR_ADDRESS: &str = "SetSysvarAddress";
pub const RECORD_PRICE_ADDRESS: &str = "RecordPriceAddress";

pub const DEFAULT_MIN_DURATION_BETWEEN_NNRS: Duration = Duration::days(1);
pub const DEFAULT_MIN_NODE_REGISTRATION_STAKE: u64 = 1_000 * NAPU_PER_NDAU;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub height: u64,
    #[serde(with = "b64")]
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysvarStore {
    vars: BTreeMap<String, Vec<HistoryEntry>>,
}

impl SysvarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, empty when never set.
    pub fn get(&self, name: &str) -> Vec<u8> {
        self.vars
            .get(name)
            .and_then(|h| h.last())
            .map(|e| e.value.clone())
            .unwrap_or_default()
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.vars.get(name).map_or(false, |h| !h.is_empty())
    }

    /// Full history, oldest first. Empty for an unknown name.
    pub fn history(&self, name: &str) -> &[HistoryEntry] {
        self.vars.get(name).map_or(&[], |h| h.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(|k| k.as_str())
    }

    pub fn last_height(&self, name: &str) -> Option<u64> {
        self.vars.get(name).and_then(|h| h.last()).map(|e| e.height)
    }

    /// Check that `set(name, _, height)` would be accepted.
    pub fn check_set(&self, name: &str, height: u64) -> Result<(), TxError> {
        if name.is_empty() {
            return Err(TxError::Validation("empty sysvar name".into()));
        }
        match self.last_height(name) {
            Some(h) if h >= height => Err(TxError::TooSoon(format!(
                "sysvar {} already set at height {}",
                name, h
            ))),
            _ => Ok(()),
        }
    }

    /// Append a new value at `height`.
    pub fn set(&mut self, name: &str, value: Vec<u8>, height: u64) -> Result<(), TxError> {
        self.check_set(name, height)?;
        self.vars
            .entry(name.to_string())
            .or_default()
            .push(HistoryEntry { height, value });
        Ok(())
    }

    /// Decode a typed value; `Ok(None)` when unset.
    pub fn get_typed<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, TxError> {
        if !self.is_set(name) {
            return Ok(None);
        }
        let raw = self.get(name);
        bincode::deserialize(&raw)
            .map(Some)
            .map_err(|e| TxError::Encoding(format!("sysvar {}: {}", name, e)))
    }

    // ─────────────────────────────────────────────────────────────
    // Typed accessors
    // ─────────────────────────────────────────────────────────────

    pub fn fee_script(&self) -> Option<Vec<u8>> {
        self.is_set(TRANSACTION_FEE_SCRIPT)
            .then(|| self.get(TRANSACTION_FEE_SCRIPT))
    }

    pub fn eai_fee_table(&self) -> Result<EaiFeeTable, TxError> {
        Ok(self.get_typed(EAI_FEE_TABLE)?.unwrap_or_default())
    }

    pub fn account_attributes(&self) -> Result<BTreeMap<String, AccountAttributes>, TxError> {
        Ok(self.get_typed(ACCOUNT_ATTRIBUTES)?.unwrap_or_default())
    }

    pub fn rate_tables(&self) -> Result<RateTables, TxError> {
        let defaults = RateTables::default();
        Ok(RateTables {
            unlocked: self
                .get_typed::<RateTable>(UNLOCKED_RATE_TABLE)?
                .unwrap_or(defaults.unlocked),
            lock_bonus: self
                .get_typed::<RateTable>(LOCKED_RATE_TABLE)?
                .unwrap_or(defaults.lock_bonus),
        })
    }

    pub fn min_duration_between_nnrs(&self) -> Result<Duration, TxError> {
        Ok(self
            .get_typed(MIN_DURATION_BETWEEN_NNRS)?
            .unwrap_or(DEFAULT_MIN_DURATION_BETWEEN_NNRS))
    }

    pub fn min_node_registration_stake(&self) -> Result<u64, TxError> {
        Ok(self
            .get_typed(MIN_NODE_REGISTRATION_STAKE)?
            .unwrap_or(DEFAULT_MIN_NODE_REGISTRATION_STAKE))
    }

    pub fn default_settlement_duration(&self) -> Result<Duration, TxError> {
        Ok(self
            .get_typed(DEFAULT_SETTLEMENT_DURATION)?
            .unwrap_or(Duration::ZERO))
    }

    /// Address stored in an authority sysvar.
    pub fn address(&self, name: &str) -> Result<Option<String>, TxError> {
        self.get_typed(name)
    }
}

/// Reject values for well-known names that would not decode later.
pub fn validate_value(name: &str, value: &[u8]) -> Result<(), TxError> {
    fn decodes<T: DeserializeOwned>(name: &str, value: &[u8]) -> Result<T, TxError> {
        bincode::deserialize(value).map_err(|e| TxError::Encoding(format!("sysvar {}: {}", name, e)))
    }
    match name {
        TRANSACTION_FEE_SCRIPT => {
            ndau_vm::Chaincode::parse(value)?;
        }
        EAI_FEE_TABLE => {
            decodes::<EaiFeeTable>(name, value)?
                .validate()
                .map_err(TxError::Validation)?;
        }
        ACCOUNT_ATTRIBUTES => {
            decodes::<BTreeMap<String, AccountAttributes>>(name, value)?;
        }
        UNLOCKED_RATE_TABLE | LOCKED_RATE_TABLE => {
            let t: RateTable = decodes(name, value)?;
            if !t.is_sorted() {
                return Err(TxError::Validation(format!("{} rows out of order", name)));
            }
        }
        MIN_DURATION_BETWEEN_NNRS | DEFAULT_SETTLEMENT_DURATION => {
            decodes::<Duration>(name, value)?;
        }
        MIN_NODE_REGISTRATION_STAKE => {
            decodes::<u64>(name, value)?;
        }
        NODE_RULES_ACCOUNT_ADDRESS
        | RELEASE_FROM_ENDOWMENT_ADDRESS
        | NOMINATE_NODE_REWARD_ADDRESS
        | COMMAND_VALIDATOR_CHANGE_ADDRESS
        | SET_SYSVAR_ADDRESS
        | RECORD_PRICE_ADDRESS => {
            let addr: String = decodes(name, value)?;
            if !ndau_crypto::validate_address(&addr) {
                return Err(TxError::Validation(format!("{}: invalid address {}", name, addr)));
            }
        }
        _ => {}
    }
    Ok(())
}

/// bincode-encode a typed sysvar value.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, TxError> {
    Ok(bincode::serialize(value)?)
}

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.serialize_str(&STANDARD.encode(v))
        } else {
            s.serialize_bytes(v)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        if d.is_human_readable() {
            let text = String::deserialize(d)?;
            STANDARD.decode(text).map_err(serde::de::Error::custom)
        } else {
            Vec::<u8>::deserialize(d)
        }
    }
}
