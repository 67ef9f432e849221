//! Fuzz target: chaincode interpreter
//!
//! Runs arbitrary scripts with arbitrary inputs. The VM must return a value
//! or a VmError, never panic or loop past its step budget.
//!
//! Run: cargo +nightly fuzz run fuzz_chaincode -- -max_len=4096

#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let handler = data[0];
    let input = i64::from(data[1] as i8);
    let script = &data[2..];

    let _ = ndau_vm::execute(script, handler, &[input, input.wrapping_mul(7)]);
    let _ = ndau_vm::disassemble(script);
});
