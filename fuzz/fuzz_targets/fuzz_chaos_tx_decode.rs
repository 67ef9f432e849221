//! Fuzz target: chaos transaction decoding and signature checks
//!
//! Run: cargo +nightly fuzz run fuzz_chaos_tx_decode -- -max_len=65536

#![no_main]
use libfuzzer_sys::fuzz_target;
use ndau_chaos::SignedChaosTx;

fuzz_target!(|data: &[u8]| {
    if let Ok(tx) = SignedChaosTx::from_bytes(data) {
        let _ = tx.verify();
        let _ = tx.hash();
    }
});
