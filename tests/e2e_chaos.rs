// ========================================
// END-TO-END CHAOS SCENARIOS
// ========================================
//
// The chaos side chain with a whitelist file in a temporary directory.
//
// Scenarios:
// 1. SCP gated by the node-local whitelist
// 2. Per-identity namespaces
// 3. Value history, deletion and namespace dumps
// 4. Old signed writes cannot be replayed
//
// Usage:
//   cargo test --test e2e_chaos -- --nocapture
//
// ========================================

use ndau_chaos::{ChaosApp, ChaosError, SignedChaosTx, Whitelist, SYSVAR_NAMESPACE};
use ndau_crypto::{generate_keypair_from_seed, namespace_for, KeyPair};
use std::path::Path;

fn key(tag: u8) -> KeyPair {
    generate_keypair_from_seed(&[tag; 32]).unwrap()
}

/// One transaction in its own block.
fn submit(app: &mut ChaosApp, stx: &SignedChaosTx) -> Result<String, ChaosError> {
    let bytes = stx.to_bytes()?;
    app.check_tx(&bytes)?;
    app.begin_block();
    let hash = app.deliver_tx(&bytes)?;
    app.commit()?;
    Ok(hash)
}

fn is_listed(path: &Path, key: &[u8], value: &[u8]) -> bool {
    Whitelist::open(path).unwrap().check(key, value)
}

// ========================================
// TEST 1: SCP WHITELIST GATE
// ========================================
#[test]
fn test_scp_requires_whitelist() {
    let dir = tempfile::tempdir().unwrap();
    let wl_path = dir.path().join("scp-whitelist");
    let mut app = ChaosApp::new(&wl_path);

    let (k, v) = (b"MaxWidgets".as_slice(), b"forty-two".as_slice());
    assert!(!is_listed(&wl_path, k, v));

    let err = submit(&mut app, &SignedChaosTx::scp(k, v, 1)).unwrap_err();
    assert!(err.is_policy(), "expected a policy rejection, got {err}");
    assert!(app.get_sys(k).is_empty());

    // the operator edits the whitelist while the node is running
    assert!(Whitelist::open(&wl_path).unwrap().add(k, v).unwrap());
    assert!(is_listed(&wl_path, k, v));

    submit(&mut app, &SignedChaosTx::scp(k, v, 2)).unwrap();
    assert_eq!(app.get_sys(k), v);

    // only the exact pair is allowed
    let err = submit(&mut app, &SignedChaosTx::scp(k, b"forty-three", 3)).unwrap_err();
    assert!(err.is_policy());
    assert_eq!(app.get_sys(k), v);

    assert!(Whitelist::open(&wl_path).unwrap().remove(k, v).unwrap());
    assert!(!is_listed(&wl_path, k, v));
    assert!(submit(&mut app, &SignedChaosTx::scp(k, v, 4)).is_err());
}

// ========================================
// TEST 2: NAMESPACE ISOLATION
// ========================================
#[test]
fn test_namespaces_are_per_identity() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = ChaosApp::new(dir.path().join("wl"));
    let alice = key(1);
    let bob = key(2);

    submit(&mut app, &SignedChaosTx::set(&alice, b"color", b"red", 1).unwrap()).unwrap();
    submit(&mut app, &SignedChaosTx::set(&bob, b"color", b"blue", 1).unwrap()).unwrap();

    let ns_alice = namespace_for(&alice.public_key);
    let ns_bob = namespace_for(&bob.public_key);
    assert_ne!(ns_alice, ns_bob);
    assert_eq!(app.get(&ns_alice, b"color"), b"red");
    assert_eq!(app.get(&ns_bob, b"color"), b"blue");
    // user writes never land in the sysvar namespace
    assert!(app.get_sys(b"color").is_empty());
    assert!(!app.namespaces().contains(&SYSVAR_NAMESPACE.to_string()));
}

// ========================================
// TEST 3: HISTORY, DELETION AND DUMP
// ========================================
#[test]
fn test_history_and_dump() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = ChaosApp::new(dir.path().join("wl"));
    let kp = key(3);
    let ns = namespace_for(&kp.public_key);

    for (nonce, value) in [b"one".as_slice(), b"two", b"three"].into_iter().enumerate() {
        submit(&mut app, &SignedChaosTx::set(&kp, b"counter", value, nonce as u64).unwrap()).unwrap();
    }
    submit(&mut app, &SignedChaosTx::set(&kp, b"other", b"x", 9).unwrap()).unwrap();

    let history = app.history(&ns, b"counter");
    let values: Vec<&[u8]> = history.iter().map(|e| e.value.as_slice()).collect();
    assert_eq!(values, vec![b"one".as_slice(), b"two", b"three"]);
    assert!(history.windows(2).all(|w| w[0].height < w[1].height));

    // an empty value deletes but keeps history
    submit(&mut app, &SignedChaosTx::set(&kp, b"counter", b"", 10).unwrap()).unwrap();
    assert!(app.get(&ns, b"counter").is_empty());
    assert_eq!(app.history(&ns, b"counter").len(), 4);
    assert_eq!(app.dump(&ns), vec![(b"other".to_vec(), b"x".to_vec())]);
    assert_eq!(app.height(), 5);
}

// ========================================
// TEST 4: REPLAYED WRITES
// ========================================
#[test]
fn test_old_writes_cannot_be_replayed() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = ChaosApp::new(dir.path().join("wl"));
    let kp = key(4);
    let ns = namespace_for(&kp.public_key);

    let old = SignedChaosTx::set(&kp, b"k", b"old", 1).unwrap();
    submit(&mut app, &old).unwrap();
    submit(&mut app, &SignedChaosTx::set(&kp, b"k", b"new", 2).unwrap()).unwrap();

    let err = submit(&mut app, &old).unwrap_err();
    assert!(matches!(err, ChaosError::StaleNonce { .. }), "got {err}");
    assert_eq!(app.get(&ns, b"k"), b"new");
    assert_eq!(app.history(&ns, b"k").len(), 2);

    // another identity's nonces are independent
    submit(&mut app, &SignedChaosTx::set(&key(5), b"k", b"mine", 1).unwrap()).unwrap();
}
