// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EAI (EQUITY ACCRUAL INTEREST)
//
// Rates are integers at RATE_DENOMINATOR scale (1e12 = 100 %/year).
// Interest is simple and evaluated piecewise: an unlocked balance earns the
// rate for its age at each moment, stepping up as the age crosses a row of
// the unlocked rate table. A locked balance earns the rate fixed when the
// lock was placed until the lock expires.
//
// Fee table split: each row takes floor(eai * fee / FEE_TABLE_DENOMINATOR);
// the delegator keeps the remainder, so the split always sums to the input.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::account::Lock;
use crate::duration::{opt_rfc3339, rfc3339, Duration, Timestamp, YEAR};
use crate::{FEE_TABLE_DENOMINATOR, RATE_DENOMINATOR};
use serde::{Deserialize, Serialize};

/// One percent at rate scale.
pub const RATE_PERCENT: u64 = RATE_DENOMINATOR / 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRow {
    /// Minimum age (or notice period) at which `rate` applies.
    pub from: Duration,
    pub rate: u64,
}

/// Step function from duration to rate. Rows sorted by `from`, strictly.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RateTable(pub Vec<RateRow>);

impl RateTable {
    pub fn new(mut rows: Vec<RateRow>) -> Result<Self, String> {
        rows.sort_by_key(|r| r.from);
        if rows.windows(2).any(|w| w[0].from == w[1].from) {
            return Err("duplicate rate table row".into());
        }
        if rows.iter().any(|r| r.rate > RATE_DENOMINATOR) {
            return Err("rate above 100%".into());
        }
        Ok(RateTable(rows))
    }

    /// Rate of the last row whose `from` ≤ `d`, or 0.
    pub fn rate_at(&self, d: Duration) -> u64 {
        self.0
            .iter()
            .take_while(|r| r.from <= d)
            .last()
            .map_or(0, |r| r.rate)
    }

    /// First row boundary strictly after `d`.
    fn next_boundary(&self, d: Duration) -> Option<Duration> {
        self.0.iter().map(|r| r.from).find(|f| *f > d)
    }

    pub fn is_sorted(&self) -> bool {
        self.0.windows(2).all(|w| w[0].from < w[1].from)
    }
}

/// Unlocked rates: 2 % at one month of age rising by 1 % per month to 10 %.
pub fn default_unlocked_table() -> RateTable {
    RateTable(
        (1..=9)
            .map(|m| RateRow {
                from: Duration::months(m),
                rate: (m + 1) * RATE_PERCENT,
            })
            .collect(),
    )
}

/// Lock bonus by notice period.
pub fn default_lock_bonus_table() -> RateTable {
    RateTable(vec![
        RateRow { from: Duration::months(3), rate: RATE_PERCENT },
        RateRow { from: Duration::months(6), rate: 2 * RATE_PERCENT },
        RateRow { from: Duration::years(1), rate: 3 * RATE_PERCENT },
        RateRow { from: Duration::years(2), rate: 4 * RATE_PERCENT },
        RateRow { from: Duration::years(3), rate: 5 * RATE_PERCENT },
    ])
}

/// Both tables EAI needs, read from sysvars once per transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateTables {
    pub unlocked: RateTable,
    pub lock_bonus: RateTable,
}

impl Default for RateTables {
    fn default() -> Self {
        RateTables {
            unlocked: default_unlocked_table(),
            lock_bonus: default_lock_bonus_table(),
        }
    }
}

impl RateTables {
    /// Bonus and total rate for a balance of age `age` locked for `notice`.
    pub fn lock_rate(&self, age: Duration, notice: Duration) -> (u64, u64) {
        let bonus = self.lock_bonus.rate_at(notice);
        let base = self.unlocked.rate_at(Duration(age.0.saturating_add(notice.0)));
        (bonus, base.saturating_add(bonus))
    }

    /// Effective rate for the query endpoint.
    pub fn effective_rate(&self, age: Duration, lock: Option<&Lock>, at: Timestamp) -> u64 {
        match lock {
            None => self.unlocked.rate_at(age),
            Some(l) => match l.unlocks_on {
                Some(u) if at >= u => self.unlocked.rate_at(age),
                Some(u) => {
                    let remaining = Duration(u - at);
                    let base = self.unlocked.rate_at(Duration(age.0.saturating_add(remaining.0)));
                    base.saturating_add(self.lock_bonus.rate_at(l.notice_period))
                }
                None => self.lock_rate(age, l.notice_period).1,
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// ACCRUAL
// ─────────────────────────────────────────────────────────────────

/// floor(balance × rate × secs / (RATE_DENOMINATOR × YEAR)) without overflow.
pub fn simple_interest(balance: u64, rate: u64, secs: u64) -> u64 {
    let denom = RATE_DENOMINATOR as u128 * YEAR as u128;
    let numer = balance as u128 * rate as u128;
    let (q, r) = (numer / denom, numer % denom);
    let total = q * secs as u128 + (r * secs as u128) / denom;
    u64::try_from(total).unwrap_or(u64::MAX)
}

/// Interest on an unlocked balance whose age is `age` at the start and
/// grows one-for-one with elapsed time.
pub fn unlocked_interest(balance: u64, table: &RateTable, age: Duration, secs: u64) -> u64 {
    let mut total = 0u64;
    let mut age = age;
    let mut remaining = secs;
    while remaining > 0 {
        let rate = table.rate_at(age);
        let step = match table.next_boundary(age) {
            Some(b) => (b.0 - age.0).min(remaining),
            None => remaining,
        };
        total = total.saturating_add(simple_interest(balance, rate, step));
        age = Duration(age.0.saturating_add(step));
        remaining -= step;
    }
    total
}

/// Interest for `balance` over `[from, to]`. `age_at_from` is the weighted
/// average age at `from`.
pub fn calculate_eai(
    balance: u64,
    tables: &RateTables,
    age_at_from: Duration,
    from: Timestamp,
    to: Timestamp,
    lock: Option<&Lock>,
) -> u64 {
    if to <= from || balance == 0 {
        return 0;
    }
    match lock {
        None => unlocked_interest(balance, &tables.unlocked, age_at_from, to - from),
        Some(l) => {
            let lock_end = l.unlocks_on.map_or(to, |u| u.clamp(from, to));
            let locked = simple_interest(balance, l.rate, lock_end - from);
            let unlocked_age = Duration(age_at_from.0.saturating_add(lock_end - from));
            locked.saturating_add(unlocked_interest(
                balance,
                &tables.unlocked,
                unlocked_age,
                to - lock_end,
            ))
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// FEE TABLE SPLIT
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EaiFeeEntry {
    /// Share at FEE_TABLE_DENOMINATOR scale.
    pub fee: u64,
    /// Recipients, or `None` for the node being credited.
    pub to: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EaiFeeTable(pub Vec<EaiFeeEntry>);

impl EaiFeeTable {
    pub fn total_fee(&self) -> u64 {
        self.0.iter().fold(0u64, |acc, e| acc.saturating_add(e.fee))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.total_fee() > FEE_TABLE_DENOMINATOR {
            return Err(format!(
                "EAI fee table takes {} of {}",
                self.total_fee(),
                FEE_TABLE_DENOMINATOR
            ));
        }
        if self
            .0
            .iter()
            .any(|e| e.to.as_ref().map_or(false, |t| t.is_empty()))
        {
            return Err("EAI fee table entry with empty recipient list".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EaiSplit {
    pub to_addresses: Vec<(String, u64)>,
    pub node_cut: u64,
    pub delegator: u64,
}

impl EaiSplit {
    pub fn total(&self) -> u64 {
        self.to_addresses
            .iter()
            .fold(self.node_cut.saturating_add(self.delegator), |acc, (_, q)| {
                acc.saturating_add(*q)
            })
    }
}

/// Split `eai` through the fee table. A row with several recipients divides
/// its share evenly, the first recipient taking the remainder.
pub fn split_eai(eai: u64, table: &EaiFeeTable) -> EaiSplit {
    let mut split = EaiSplit::default();
    let mut taken = 0u64;
    for entry in &table.0 {
        let part = (eai as u128 * entry.fee as u128 / FEE_TABLE_DENOMINATOR as u128) as u64;
        let part = part.min(eai - taken);
        taken += part;
        match &entry.to {
            None => split.node_cut += part,
            Some(recipients) if !recipients.is_empty() => {
                let n = recipients.len() as u64;
                let each = part / n;
                let extra = part % n;
                for (i, addr) in recipients.iter().enumerate() {
                    let q = if i == 0 { each + extra } else { each };
                    split.to_addresses.push((addr.clone(), q));
                }
            }
            Some(_) => split.node_cut += part,
        }
    }
    split.delegator = eai - taken;
    split
}

/// Lock as described by a rate query. The bonus is supplied by the caller
/// rather than looked up, so hypothetical locks can be priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EaiRateLock {
    pub notice_period: Duration,
    #[serde(default, with = "opt_rfc3339")]
    pub unlocks_on: Option<Timestamp>,
    #[serde(default)]
    pub bonus: u64,
}

/// Request body of the EAI rate query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EaiRateRequest {
    pub address: String,
    pub weighted_average_age: Duration,
    #[serde(default)]
    pub lock: Option<EaiRateLock>,
    #[serde(with = "rfc3339")]
    pub at: Timestamp,
}

impl EaiRateRequest {
    /// Unlocked rate at the age the account will have when the lock ends,
    /// plus the lock bonus; a lock already past `unlocks_on` earns nothing extra.
    pub fn rate(&self, tables: &RateTables) -> u64 {
        let age = self.weighted_average_age;
        let Some(lock) = &self.lock else {
            return tables.unlocked.rate_at(age);
        };
        let remaining = match lock.unlocks_on {
            Some(u) if self.at >= u => return tables.unlocked.rate_at(age),
            Some(u) => u - self.at,
            None => lock.notice_period.0,
        };
        tables
            .unlocked
            .rate_at(Duration(age.0.saturating_add(remaining)))
            .saturating_add(lock.bonus)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EaiRateResponse {
    pub address: String,
    pub eairate: u64,
}

pub fn eai_rates(tables: &RateTables, requests: &[EaiRateRequest]) -> Vec<EaiRateResponse> {
    requests
        .iter()
        .map(|r| EaiRateResponse {
            address: r.address.clone(),
            eairate: r.rate(tables),
        })
        .collect()
}
