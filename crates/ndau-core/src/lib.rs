// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NDAU - CORE MODULE
//
// Deterministic ledger state machine: accounts, signed transactions,
// governance sysvars with history, EAI accrual and node reward nomination.
// All ledger arithmetic is integer napu (no floating point), all maps are
// BTreeMap so iteration order and encodings are identical on every replica.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod account;
pub mod duration;
pub mod eai;
pub mod error;
mod handlers;
pub mod nnr;
pub mod state;
pub mod sysvar;
pub mod tx;

pub use account::{AccountAttributes, AccountData, Hold, Lock, SettlementSettings, StakeRules};
pub use duration::{Duration, Timestamp};
pub use eai::{EaiFeeEntry, EaiFeeTable, RateTable, RateTables};
pub use error::{ErrorKind, TxError};
pub use nnr::{Node, NnrWinner};
pub use state::{State, Summary, TxReceipt, ValidatorUpdate};
pub use sysvar::{HistoryEntry, SysvarStore};
pub use tx::{signable_bytes, SignedTx, Transaction, ValidationChange};

/// 1 ndau = 100_000_000 napu.
pub const NAPU_PER_NDAU: u64 = 100_000_000;

/// EAI rates: 1e12 = 100 % per year.
pub const RATE_DENOMINATOR: u64 = 1_000_000_000_000;

/// EAI fee table shares: 1e8 = 100 %.
pub const FEE_TABLE_DENOMINATOR: u64 = 100_000_000;

/// Convert whole ndau to napu, `None` on overflow.
pub fn ndau_to_napu(ndau: u64) -> Option<u64> {
    ndau.checked_mul(NAPU_PER_NDAU)
}

/// Parse a decimal ndau amount ("1.5") into napu without floating point.
pub fn parse_ndau(text: &str) -> Result<u64, String> {
    let text = text.trim();
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(format!("invalid ndau amount {:?}", text));
    }
    if frac.len() > 8 {
        return Err(format!("{:?} has more than 8 decimal places", text));
    }
    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| format!("invalid ndau amount {:?}", text))?
    };
    let frac_napu: u64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<8}", frac);
        padded
            .parse()
            .map_err(|_| format!("invalid ndau amount {:?}", text))?
    };
    ndau_to_napu(whole)
        .and_then(|n| n.checked_add(frac_napu))
        .ok_or_else(|| format!("ndau amount {:?} overflows", text))
}

/// Render napu as a decimal ndau string, trailing zeros trimmed.
pub fn format_napu(napu: u64) -> String {
    let whole = napu / NAPU_PER_NDAU;
    let frac = napu % NAPU_PER_NDAU;
    if frac == 0 {
        return whole.to_string();
    }
    let f = format!("{:08}", frac);
    format!("{}.{}", whole, f.trim_end_matches('0'))
}
