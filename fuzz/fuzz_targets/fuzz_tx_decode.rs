//! Fuzz target: signed transaction decoding
//!
//! Arbitrary bytes through SignedTx::from_bytes must never panic or
//! allocate past the size limit. Anything that decodes must re-encode and
//! hash without error.
//!
//! Run: cargo +nightly fuzz run fuzz_tx_decode -- -max_len=65536

#![no_main]
use libfuzzer_sys::fuzz_target;
use ndau_core::SignedTx;

fuzz_target!(|data: &[u8]| {
    if let Ok(stx) = SignedTx::from_bytes(data) {
        let bytes = stx.to_bytes().expect("decoded tx must re-encode");
        let again = SignedTx::from_bytes(&bytes).expect("re-encoded tx must decode");
        assert_eq!(again, stx);
        let _ = stx.hash();
    }
});
