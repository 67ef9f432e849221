//! Fuzz target: ndau address validation
//!
//! Feeds arbitrary strings to validate_address() to ensure:
//! 1. No panics on any input
//! 2. Derived addresses always validate and keep their kind
//!
//! Run: cargo +nightly fuzz run fuzz_address_validation -- -max_len=256

#![no_main]
use libfuzzer_sys::fuzz_target;
use ndau_crypto::AddressKind;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = ndau_crypto::validate_address(s);
        let _ = ndau_crypto::parse_address(s);
    }

    if !data.is_empty() {
        let addr = ndau_crypto::public_key_to_address(data, AddressKind::Node);
        assert!(
            ndau_crypto::validate_address(&addr),
            "Generated address must pass validation: {}",
            addr
        );
        assert_eq!(ndau_crypto::parse_address(&addr), Ok(AddressKind::Node));
    }
});
