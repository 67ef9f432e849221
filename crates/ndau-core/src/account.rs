// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ACCOUNT DATA
//
// Per-address ledger record. All balance arithmetic is checked; the only
// way money enters an account is `credit`, the only way it leaves is
// `debit`, and both first bring EAI accrual up to the current block time so
// interest is always computed on the balance that actually sat there.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::duration::{Duration, Timestamp};
use crate::eai::{calculate_eai, RateTables};
use crate::error::TxError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    pub notice_period: Duration,
    /// Set by Notify; the lock ends at this time.
    pub unlocks_on: Option<Timestamp>,
    /// Bonus rate from the lock bonus table.
    pub bonus: u64,
    /// Full rate (unlocked rate at age + notice, plus bonus) fixed at lock time.
    pub rate: u64,
}

/// Funds received under the sender's settlement period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hold {
    pub qty: u64,
    pub expiry: Timestamp,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSettlement {
    pub period: Duration,
    pub changes_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementSettings {
    pub period: Duration,
    pub next: Option<PendingSettlement>,
}

/// Stake held against a node under a node-rules account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeRules {
    pub rules: String,
    pub node: String,
    pub qty: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountData {
    pub balance: u64,
    /// Hex-encoded ed25519 keys; `None` until the account is claimed.
    pub validation_keys: Option<Vec<String>>,
    /// Raw chaincode, base64 in JSON.
    #[serde(with = "opt_b64")]
    pub validation_script: Option<Vec<u8>>,
    pub rewards_target: Option<String>,
    pub incoming_rewards_from: Vec<String>,
    pub delegation_node: Option<String>,
    pub lock: Option<Lock>,
    pub stake_rules: Option<StakeRules>,
    pub last_eai_update: Timestamp,
    pub last_waa_update: Timestamp,
    pub weighted_average_age: Duration,
    pub sequence: u64,
    pub holds: Vec<Hold>,
    pub settlement_settings: SettlementSettings,
    pub parent: Option<String>,
    pub progenitor: Option<String>,
    pub uncredited_eai: u64,
}

impl AccountData {
    /// A fresh account first seen at `now`.
    pub fn new(now: Timestamp) -> Self {
        AccountData {
            last_eai_update: now,
            last_waa_update: now,
            ..Default::default()
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.validation_keys.as_ref().map_or(false, |k| !k.is_empty())
    }

    /// No money, no keys, no lock: safe to hand to TransferAndLock or a child claim.
    pub fn is_empty(&self) -> bool {
        self.balance == 0 && !self.is_claimed() && self.lock.is_none() && self.holds.is_empty()
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    pub fn is_notified(&self) -> bool {
        self.lock.as_ref().map_or(false, |l| l.unlocks_on.is_some())
    }

    /// Age of the balance at `now`.
    pub fn age_at(&self, now: Timestamp) -> Duration {
        Duration(
            self.weighted_average_age
                .0
                .saturating_add(now.saturating_sub(self.last_waa_update)),
        )
    }

    /// Sum of holds not yet expired at `now`, plus any stake.
    pub fn held(&self, now: Timestamp) -> u64 {
        let holds = self
            .holds
            .iter()
            .filter(|h| h.expiry > now)
            .fold(0u64, |acc, h| acc.saturating_add(h.qty));
        holds.saturating_add(self.stake_rules.as_ref().map_or(0, |s| s.qty))
    }

    /// Balance that may be spent at `now`.
    pub fn available(&self, now: Timestamp) -> u64 {
        self.balance.saturating_sub(self.held(now))
    }

    /// Bring lazily-maintained fields up to `now`: accrue EAI on the current
    /// balance, promote a due settlement change, drop expired holds and end
    /// an expired lock.
    pub fn touch(&mut self, now: Timestamp, tables: &RateTables) {
        self.accrue(now, tables);

        if let Some(next) = self.settlement_settings.next.clone() {
            if next.changes_at <= now {
                self.settlement_settings.period = next.period;
                self.settlement_settings.next = None;
            }
        }

        self.holds.retain(|h| h.expiry > now);

        if let Some(u) = self.lock.as_ref().and_then(|l| l.unlocks_on) {
            if u <= now {
                self.lock = None;
            }
        }
    }

    /// Move accrued-but-uncredited interest into `uncredited_eai`.
    pub fn accrue(&mut self, now: Timestamp, tables: &RateTables) {
        if now <= self.last_eai_update {
            return;
        }
        let age = self.age_at(self.last_eai_update);
        let earned = calculate_eai(
            self.balance,
            tables,
            age,
            self.last_eai_update,
            now,
            self.lock.as_ref(),
        );
        self.uncredited_eai = self.uncredited_eai.saturating_add(earned);
        self.last_eai_update = now;
    }

    /// Add `qty` napu. Incoming money is age zero, so the weighted average
    /// age drops in proportion.
    pub fn credit(&mut self, qty: u64, now: Timestamp) -> Result<(), TxError> {
        let new_balance = self
            .balance
            .checked_add(qty)
            .ok_or_else(|| TxError::Validation("balance overflow".into()))?;
        let age = self.age_at(now);
        self.weighted_average_age = if new_balance == 0 {
            Duration::ZERO
        } else {
            Duration((age.0 as u128 * self.balance as u128 / new_balance as u128) as u64)
        };
        self.last_waa_update = now;
        self.balance = new_balance;
        Ok(())
    }

    /// Add interest without resetting age.
    pub fn credit_interest(&mut self, qty: u64) -> Result<(), TxError> {
        self.balance = self
            .balance
            .checked_add(qty)
            .ok_or_else(|| TxError::Validation("balance overflow".into()))?;
        Ok(())
    }

    /// Remove `qty` napu that must be available at `now`.
    pub fn debit(&mut self, qty: u64, now: Timestamp) -> Result<(), TxError> {
        let have = self.available(now);
        if have < qty {
            return Err(TxError::InsufficientFunds { need: qty, have });
        }
        let age = self.age_at(now);
        self.weighted_average_age = age;
        self.last_waa_update = now;
        self.balance -= qty;
        Ok(())
    }
}

/// Attribute flags from the `AccountAttributes` sysvar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAttributes {
    pub exchange: bool,
}

mod opt_b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            v.as_ref().map(|b| STANDARD.encode(b)).serialize(s)
        } else {
            v.serialize(s)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        if d.is_human_readable() {
            let text: Option<String> = Option::deserialize(d)?;
            text.map(|t| STANDARD.decode(t).map_err(serde::de::Error::custom))
                .transpose()
        } else {
            Option::<Vec<u8>>::deserialize(d)
        }
    }
}
