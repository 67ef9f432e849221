use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use ndau_core::{Duration, Lock, RateTables, RATE_DENOMINATOR};

pub fn tx_hash(signable: &str) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = B64.decode(signable.trim())?;
    println!("{}", ndau_crypto::tx_hash(&bytes));
    Ok(())
}

/// Rate as a percentage with up to four decimals ("8", "12.5").
pub fn format_rate(rate: u64) -> String {
    let scaled = rate as u128 * 1_000_000 / RATE_DENOMINATOR as u128;
    let whole = scaled / 10_000;
    let frac = scaled % 10_000;
    if frac == 0 {
        whole.to_string()
    } else {
        format!("{}.{}", whole, format!("{:04}", frac).trim_end_matches('0'))
    }
}

pub fn eai_rate(age: &str, lock: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let age: Duration = age.parse()?;
    let lock = match lock {
        Some(notice) => {
            let notice: Duration = notice.parse()?;
            Some(Lock {
                notice_period: notice,
                unlocks_on: None,
                bonus: 0,
                rate: 0,
            })
        }
        None => None,
    };
    let rate = RateTables::default().effective_rate(age, lock.as_ref(), 0);
    println!("{}% ({})", format_rate(rate), rate);
    Ok(())
}

pub fn disassemble(script: &str) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = B64.decode(script.trim())?;
    println!("{}", ndau_vm::disassemble(&bytes)?.trim_end());
    Ok(())
}
