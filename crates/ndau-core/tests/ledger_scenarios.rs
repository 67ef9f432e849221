// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LEDGER SCENARIOS — ndau-core
//
// End-to-end transaction flows against an in-memory State: claiming,
// transfers, locks, settlement, validation changes, sysvar governance,
// staking, EAI crediting and node rewards.
//
// Run: cargo test -p ndau-core --test ledger_scenarios
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

mod common;

use common::{seed_key, Ledger};
use ndau_core::duration::{DAY, MONTH};
use ndau_core::eai::{EaiFeeEntry, EaiFeeTable};
use ndau_core::sysvar::{self, encode};
use ndau_core::tx::child_ownership_message;
use ndau_core::{
    AccountAttributes, Duration, ErrorKind, SignedTx, Transaction, TxError, ValidationChange,
    NAPU_PER_NDAU,
};
use ndau_crypto::AddressKind;
use std::collections::BTreeMap;

// ─────────────────────────────────────────────────────────────────
// ACCOUNT LIFECYCLE
// ─────────────────────────────────────────────────────────────────

#[test]
fn account_lifecycle_rfe_then_claim() {
    let mut l = Ledger::new();
    l.set_fee(1);

    let kp = seed_key("alice");
    let addr = kp.address(AddressKind::User);
    assert!(l.state.account(&addr).is_none());

    l.rfe(&addr, 10 * NAPU_PER_NDAU);
    assert_eq!(l.balance(&addr), 10 * NAPU_PER_NDAU);
    assert!(l.state.account(&addr).unwrap().validation_keys.is_none());

    l.claim(&kp, &addr).unwrap();
    let acct = l.state.account(&addr).unwrap();
    assert_eq!(acct.balance, 10 * NAPU_PER_NDAU - 1);
    assert!(acct.validation_keys.is_some());
    assert_eq!(acct.sequence, 1);
}

#[test]
fn claim_twice_is_already_in_state() {
    let mut l = Ledger::new();
    let (kp, addr) = l.funded("bob", 1);
    let err = l.claim(&kp, &addr).unwrap_err();
    assert!(err.is_idempotent());
}

#[test]
fn claim_with_wrong_ownership_key_fails() {
    let mut l = Ledger::new();
    let kp = seed_key("carol");
    let other = seed_key("mallory");
    let addr = kp.address(AddressKind::User);
    l.rfe(&addr, NAPU_PER_NDAU);
    let tx = Transaction::SetValidation {
        target: addr.clone(),
        ownership: other.public_key.clone(),
        validation_keys: vec![other.public_key.clone()],
        validation_script: None,
    };
    let err = l.submit(tx, &[&other]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(l.state.account(&addr).unwrap().validation_keys.is_none());
}

#[test]
fn claim_without_funds_for_fee_fails_post_genesis() {
    let mut l = Ledger::new();
    l.set_fee(1);
    let kp = seed_key("broke");
    let addr = kp.address(AddressKind::User);
    assert!(matches!(
        l.claim(&kp, &addr),
        Err(TxError::InsufficientFunds { need: 1, have: 0 })
    ));
}

#[test]
fn unclaimed_account_cannot_send() {
    let mut l = Ledger::new();
    let kp = seed_key("dave");
    let addr = kp.address(AddressKind::User);
    l.rfe(&addr, NAPU_PER_NDAU);
    let tx = Transaction::Transfer {
        source: addr.clone(),
        destination: l.bpc_addr.clone(),
        qty: 1,
    };
    let err = l.submit(tx, &[&kp]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(l.balance(&addr), NAPU_PER_NDAU);
}

// ─────────────────────────────────────────────────────────────────
// TRANSFERS, FEES, SEQUENCES
// ─────────────────────────────────────────────────────────────────

#[test]
fn transfer_conserves_fee() {
    let mut l = Ledger::new();
    let (kp, a) = l.funded("a1", 10);
    let (_, b) = l.funded("b1", 0);
    l.set_fee(7);

    let before = l.balance(&a);
    let tx = Transaction::Transfer {
        source: a.clone(),
        destination: b.clone(),
        qty: 3 * NAPU_PER_NDAU,
    };
    let receipt = l.submit(tx, &[&kp]).unwrap();
    assert_eq!(receipt.fee, 7);
    assert_eq!(receipt.touched[0], a);
    assert_eq!(l.balance(&a), before - 3 * NAPU_PER_NDAU - 7);
    assert_eq!(l.balance(&b), 3 * NAPU_PER_NDAU);
    l.state.audit_supply().unwrap();
}

#[test]
fn transfer_insufficient_funds_changes_nothing() {
    let mut l = Ledger::new();
    let (kp, a) = l.funded("a2", 1);
    let (_, b) = l.funded("b2", 0);
    let snapshot = l.state.clone();
    let stx = l.sign(
        Transaction::Transfer {
            source: a.clone(),
            destination: b,
            qty: 2 * NAPU_PER_NDAU,
        },
        &[&kp],
    );
    let err = l.state.apply(&stx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert_eq!(l.state, snapshot);
}

#[test]
fn replayed_sequence_is_rejected() {
    let mut l = Ledger::new();
    let (kp, a) = l.funded("a3", 5);
    let (_, b) = l.funded("b3", 0);
    let stx = l.sign(
        Transaction::Transfer {
            source: a.clone(),
            destination: b.clone(),
            qty: NAPU_PER_NDAU,
        },
        &[&kp],
    );
    l.next_block();
    l.state.apply(&stx).unwrap();
    l.next_block();
    let err = l.state.apply(&stx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(l.balance(&b), NAPU_PER_NDAU);
}

#[test]
fn wrong_key_signature_is_rejected() {
    let mut l = Ledger::new();
    let (_, a) = l.funded("a4", 5);
    let intruder = seed_key("intruder");
    let tx = Transaction::Transfer {
        source: a.clone(),
        destination: l.bpc_addr.clone(),
        qty: 1,
    };
    let err = l.submit(tx, &[&intruder]).unwrap_err();
    assert_eq!(err, TxError::Validation("invalid signature".into()));
}

#[test]
fn check_does_not_mutate() {
    let mut l = Ledger::new();
    let (kp, a) = l.funded("a5", 5);
    let (_, b) = l.funded("b5", 0);
    let stx = l.sign(
        Transaction::Transfer {
            source: a,
            destination: b,
            qty: 1,
        },
        &[&kp],
    );
    let snapshot = l.state.clone();
    let receipt = l.state.check(&stx).unwrap();
    assert_eq!(receipt.hash, stx.hash().unwrap());
    assert_eq!(l.state, snapshot);
}

#[test]
fn transfer_lock_scenario() {
    let mut l = Ledger::new();
    l.set_fee(1);
    let (kp, a1) = l.funded("tl1", 10);
    assert_eq!(l.balance(&a1), 10 * NAPU_PER_NDAU - 1);

    let a2 = seed_key("tl2").address(AddressKind::User);
    let tx = Transaction::TransferAndLock {
        source: a1.clone(),
        destination: a2.clone(),
        qty: NAPU_PER_NDAU,
        period: Duration::months(3),
    };
    l.submit(tx, &[&kp]).unwrap();

    assert_eq!(l.balance(&a1), 10 * NAPU_PER_NDAU - NAPU_PER_NDAU - 2);
    let dest = l.state.account(&a2).unwrap();
    assert_eq!(dest.balance, NAPU_PER_NDAU);
    let lock = dest.lock.as_ref().unwrap();
    assert_eq!(lock.unlocks_on, None);
    assert_eq!(lock.notice_period, Duration::months(3));
}

#[test]
fn transfer_lock_to_existing_account_fails() {
    let mut l = Ledger::new();
    let (kp, a1) = l.funded("tl3", 10);
    let (_, a2) = l.funded("tl4", 1);
    let tx = Transaction::TransferAndLock {
        source: a1,
        destination: a2,
        qty: 1,
        period: Duration::months(3),
    };
    assert_eq!(l.submit(tx, &[&kp]).unwrap_err().kind(), ErrorKind::Validation);
}

// ─────────────────────────────────────────────────────────────────
// LOCK / NOTIFY
// ─────────────────────────────────────────────────────────────────

#[test]
fn lock_notify_state_machine() {
    let mut l = Ledger::new();
    let (kp, a) = l.funded("locker", 10);
    let lock = |p| Transaction::Lock {
        target: a.clone(),
        period: p,
    };
    let notify = Transaction::Notify { target: a.clone() };

    // notify before lock
    assert_eq!(
        l.submit(notify.clone(), &[&kp]).unwrap_err().kind(),
        ErrorKind::Policy
    );

    l.submit(lock(Duration::months(3)), &[&kp]).unwrap();
    assert_eq!(l.state.account(&a).unwrap().lock.as_ref().unwrap().unlocks_on, None);

    // shortening is refused, extending is fine
    assert!(l.submit(lock(Duration::months(1)), &[&kp]).is_err());
    l.submit(lock(Duration::months(6)), &[&kp]).unwrap();

    l.submit(notify.clone(), &[&kp]).unwrap();
    let unlocks_on = l.state.account(&a).unwrap().lock.as_ref().unwrap().unlocks_on;
    assert_eq!(unlocks_on, Some(l.now + 6 * MONTH));

    let err = l.submit(notify, &[&kp]).unwrap_err();
    assert!(err.is_idempotent());

    // locked accounts cannot send
    let tx = Transaction::Transfer {
        source: a.clone(),
        destination: l.bpc_addr.clone(),
        qty: 1,
    };
    assert_eq!(l.submit(tx.clone(), &[&kp]).unwrap_err().kind(), ErrorKind::Policy);

    // once the notice period runs out the lock disappears
    l.advance(6 * MONTH);
    l.submit(tx, &[&kp]).unwrap();
    assert!(l.state.account(&a).unwrap().lock.is_none());
}

#[test]
fn relock_while_notified_must_not_shorten() {
    let mut l = Ledger::new();
    let (kp, a) = l.funded("relock", 10);
    l.submit(
        Transaction::Lock {
            target: a.clone(),
            period: Duration::months(6),
        },
        &[&kp],
    )
    .unwrap();
    l.submit(Transaction::Notify { target: a.clone() }, &[&kp])
        .unwrap();
    let short = Transaction::Lock {
        target: a.clone(),
        period: Duration::months(1),
    };
    assert_eq!(l.submit(short, &[&kp]).unwrap_err().kind(), ErrorKind::Policy);
    let long = Transaction::Lock {
        target: a.clone(),
        period: Duration::years(1),
    };
    l.submit(long, &[&kp]).unwrap();
    assert!(!l.state.account(&a).unwrap().is_notified());
}

#[test]
fn exchange_accounts_cannot_lock() {
    let mut l = Ledger::new();
    let (kp, a) = l.funded("exchange", 10);
    let mut attrs = BTreeMap::new();
    attrs.insert(a.clone(), AccountAttributes { exchange: true });
    l.set_sysvar(sysvar::ACCOUNT_ATTRIBUTES, encode(&attrs).unwrap())
        .unwrap();
    let err = l
        .submit(
            Transaction::Lock {
                target: a,
                period: Duration::months(3),
            },
            &[&kp],
        )
        .unwrap_err();
    assert_eq!(err, TxError::Policy("Cannot lock exchange accounts".into()));
}

#[test]
fn notified_destination_cannot_receive() {
    let mut l = Ledger::new();
    let (kp, a) = l.funded("sender", 10);
    let (kp2, b) = l.funded("notified", 10);
    l.submit(
        Transaction::Lock {
            target: b.clone(),
            period: Duration::months(3),
        },
        &[&kp2],
    )
    .unwrap();
    l.submit(Transaction::Notify { target: b.clone() }, &[&kp2])
        .unwrap();
    let err = l
        .submit(
            Transaction::Transfer {
                source: a,
                destination: b,
                qty: 1,
            },
            &[&kp],
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Policy);
}

// ─────────────────────────────────────────────────────────────────
// SETTLEMENT
// ─────────────────────────────────────────────────────────────────

#[test]
fn settlement_change_is_deferred_and_holds_apply() {
    let mut l = Ledger::new();
    let (kp, a) = l.funded("settle", 10);
    let (kp_b, b) = l.funded("settle_dest", 1);

    l.submit(
        Transaction::ChangeSettlementPeriod {
            target: a.clone(),
            period: Duration::days(2),
        },
        &[&kp],
    )
    .unwrap();
    let s = &l.state.account(&a).unwrap().settlement_settings;
    assert_eq!(s.period, Duration::ZERO);
    assert_eq!(s.next.as_ref().unwrap().period, Duration::days(2));

    // the next transaction promotes the pending period before using it
    l.submit(
        Transaction::Transfer {
            source: a.clone(),
            destination: b.clone(),
            qty: 5 * NAPU_PER_NDAU,
        },
        &[&kp],
    )
    .unwrap();
    assert_eq!(
        l.state.account(&a).unwrap().settlement_settings.period,
        Duration::days(2)
    );
    let dest = l.state.account(&b).unwrap();
    assert_eq!(dest.holds.len(), 1);
    assert_eq!(dest.available(l.now), NAPU_PER_NDAU);

    // held funds cannot be spent until the hold expires
    let spend = Transaction::Transfer {
        source: b.clone(),
        destination: a.clone(),
        qty: 3 * NAPU_PER_NDAU,
    };
    assert_eq!(
        l.submit(spend.clone(), &[&kp_b]).unwrap_err().kind(),
        ErrorKind::InsufficientFunds
    );
    l.advance(2 * DAY);
    l.submit(spend, &[&kp_b]).unwrap();
    assert!(l.state.account(&b).unwrap().holds.is_empty());
}

// ─────────────────────────────────────────────────────────────────
// VALIDATION CHANGES
// ─────────────────────────────────────────────────────────────────

#[test]
fn change_validation_add_reset_script() {
    let mut l = Ledger::new();
    let (kp, a) = l.funded("keys", 10);
    let k2 = seed_key("keys-2");
    let k3 = seed_key("keys-3");

    l.submit(
        Transaction::ChangeValidation {
            target: a.clone(),
            change: ValidationChange::Add(k2.public_key.clone()),
        },
        &[&kp],
    )
    .unwrap();
    assert_eq!(l.state.account(&a).unwrap().validation_keys.as_ref().unwrap().len(), 2);

    // the added key can sign
    l.submit(
        Transaction::ChangeValidation {
            target: a.clone(),
            change: ValidationChange::Reset(k3.public_key.clone()),
        },
        &[&k2],
    )
    .unwrap();
    let keys = l.state.account(&a).unwrap().validation_keys.clone().unwrap();
    assert_eq!(keys, vec![hex::encode(&k3.public_key)]);

    // old keys no longer work
    let tx = Transaction::Notify { target: a.clone() };
    assert_eq!(l.submit(tx, &[&kp]).unwrap_err().kind(), ErrorKind::Validation);

    // script requiring key 0 while key 0 signs
    l.submit(
        Transaction::ChangeValidation {
            target: a.clone(),
            change: ValidationChange::SetScript(ndau_vm::require_first_key_script()),
        },
        &[&k3],
    )
    .unwrap();
    assert!(l.state.account(&a).unwrap().validation_script.is_some());

    // a script that always refuses locks the account out
    l.submit(
        Transaction::ChangeValidation {
            target: a.clone(),
            change: ValidationChange::SetScript(ndau_vm::constant_script(0)),
        },
        &[&k3],
    )
    .unwrap();
    let err = l
        .submit(
            Transaction::Notify { target: a.clone() },
            &[&k3],
        )
        .unwrap_err();
    assert_eq!(
        err,
        TxError::Validation("validation script rejected signatures".into())
    );
}

#[test]
fn invalid_validation_script_rejected() {
    let mut l = Ledger::new();
    let (kp, a) = l.funded("badscript", 1);
    let err = l
        .submit(
            Transaction::ChangeValidation {
                target: a,
                change: ValidationChange::SetScript(vec![0xff]),
            },
            &[&kp],
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

// ─────────────────────────────────────────────────────────────────
// SYSVARS
// ─────────────────────────────────────────────────────────────────

#[test]
fn sysvar_history_one_two_three() {
    let mut l = Ledger::new();
    for v in ["one", "two", "three"] {
        l.set_sysvar("FreshTestVar", encode(&v.to_string()).unwrap())
            .unwrap();
    }
    let hist = l.state.sysvars.history("FreshTestVar");
    assert_eq!(hist.len(), 3);
    assert!(hist.windows(2).all(|w| w[0].height < w[1].height));
    let decoded: Vec<String> = hist
        .iter()
        .map(|e| bincode::deserialize(&e.value).unwrap())
        .collect();
    assert_eq!(decoded, ["one", "two", "three"]);
}

#[test]
fn sysvar_set_twice_in_one_block_is_too_soon() {
    let mut l = Ledger::new();
    let bpc = seed_key("bpc");
    let seq = l.next_sequence(&l.bpc_addr);
    let first = SignedTx::sign(
        Transaction::SetSysvar {
            name: "Twice".into(),
            value: vec![1],
        },
        seq,
        &[&bpc],
    )
    .unwrap();
    let second = SignedTx::sign(
        Transaction::SetSysvar {
            name: "Twice".into(),
            value: vec![2],
        },
        seq + 1,
        &[&bpc],
    )
    .unwrap();
    l.next_block();
    l.state.apply(&first).unwrap();
    let err = l.state.apply(&second).unwrap_err();
    assert!(err.is_retriable());
    assert_eq!(l.state.sysvars.history("Twice").len(), 1);
}

#[test]
fn sysvar_requires_governance_signer() {
    let mut l = Ledger::new();
    let (kp, _) = l.funded("not-bpc", 1);
    let err = l
        .submit(
            Transaction::SetSysvar {
                name: "X".into(),
                value: vec![1],
            },
            &[&kp],
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn sysvar_set_pays_current_fee() {
    let mut l = Ledger::new();
    l.set_fee(100);
    let before = l.balance(&l.bpc_addr);
    l.set_sysvar("Paid", vec![9]).unwrap();
    assert_eq!(l.balance(&l.bpc_addr), before - 100);
}

// ─────────────────────────────────────────────────────────────────
// NODES, EAI, NNR
// ─────────────────────────────────────────────────────────────────

struct NodeSetup {
    node_kp: ndau_crypto::KeyPair,
    node: String,
}

fn register_node(l: &mut Ledger, tag: &str) -> NodeSetup {
    let (node_kp, node) = l.funded_kind(tag, 2_000, AddressKind::Node);
    l.submit(
        Transaction::Stake {
            target: node.clone(),
            rules: l.rules_addr.clone(),
            stake_to: node.clone(),
            qty: 1_000 * NAPU_PER_NDAU,
        },
        &[&node_kp],
    )
    .unwrap();
    l.submit(
        Transaction::RegisterNode {
            node: node.clone(),
            distribution_script: vec![0xa0, 0x00, 0x88],
            rpc_address: "http://localhost:26657".into(),
        },
        &[&node_kp],
    )
    .unwrap();
    NodeSetup { node_kp, node }
}

#[test]
fn register_requires_min_stake_and_is_idempotent() {
    let mut l = Ledger::new();
    let (kp, n) = l.funded_kind("small-node", 10, AddressKind::Node);
    let reg = Transaction::RegisterNode {
        node: n.clone(),
        distribution_script: vec![],
        rpc_address: String::new(),
    };
    assert_eq!(l.submit(reg, &[&kp]).unwrap_err().kind(), ErrorKind::Policy);

    let setup = register_node(&mut l, "big-node");
    let again = Transaction::RegisterNode {
        node: setup.node.clone(),
        distribution_script: vec![],
        rpc_address: String::new(),
    };
    assert!(l.submit(again, &[&setup.node_kp]).unwrap_err().is_idempotent());

    let restake = Transaction::Stake {
        target: setup.node.clone(),
        rules: l.rules_addr.clone(),
        stake_to: setup.node.clone(),
        qty: 1,
    };
    assert!(l.submit(restake, &[&setup.node_kp]).unwrap_err().is_idempotent());

    // staked funds are not spendable
    let spend = Transaction::Transfer {
        source: setup.node.clone(),
        destination: l.bpc_addr.clone(),
        qty: 1_500 * NAPU_PER_NDAU,
    };
    assert_eq!(
        l.submit(spend, &[&setup.node_kp]).unwrap_err().kind(),
        ErrorKind::InsufficientFunds
    );
}

#[test]
fn delegate_requires_active_node() {
    let mut l = Ledger::new();
    let (kp, a) = l.funded("delegator0", 10);
    let tx = Transaction::Delegate {
        target: a,
        node: seed_key("ghost").address(AddressKind::Node),
    };
    assert_eq!(l.submit(tx, &[&kp]).unwrap_err().kind(), ErrorKind::Validation);
}

#[test]
fn eai_nnr_and_claim_flow() {
    let mut l = Ledger::new();
    let table = EaiFeeTable(vec![
        EaiFeeEntry { fee: 4_000_000, to: None },
        EaiFeeEntry { fee: 1_000_000, to: Some(vec![l.bpc_addr.clone()]) },
    ]);
    l.set_sysvar(sysvar::EAI_FEE_TABLE, encode(&table).unwrap())
        .unwrap();

    let setup = register_node(&mut l, "node-1");
    let (_, target) = l.funded("rewards-target", 0);
    l.submit(
        Transaction::SetRewardsDestination {
            target: setup.node.clone(),
            destination: target.clone(),
        },
        &[&setup.node_kp],
    )
    .unwrap();
    assert_eq!(
        l.state.account(&target).unwrap().incoming_rewards_from,
        vec![setup.node.clone()]
    );

    let (kp, purchaser) = l.funded("purchaser", 10_000);
    l.submit(
        Transaction::Delegate {
            target: purchaser.clone(),
            node: setup.node.clone(),
        },
        &[&kp],
    )
    .unwrap();

    l.advance(6 * MONTH);
    let before = l.balance(&purchaser);
    let bpc_before = l.balance(&l.bpc_addr);
    l.submit(
        Transaction::CreditEai {
            node: setup.node.clone(),
        },
        &[&setup.node_kp],
    )
    .unwrap();
    let gained = l.balance(&purchaser) - before;
    assert!(gained > 0);
    let pending = l.state.nodes[&setup.node].pending_reward;
    assert!(pending > 0);
    assert!(l.balance(&l.bpc_addr) > bpc_before);
    assert_eq!(l.state.account(&purchaser).unwrap().uncredited_eai, 0);
    l.state.audit_supply().unwrap();

    // NNR, then too soon
    let bpc = seed_key("bpc");
    l.submit(Transaction::NominateNodeReward { random: 7 }, &[&bpc])
        .unwrap();
    assert_eq!(l.state.nnr_winner.as_ref().unwrap().node, setup.node);
    let err = l
        .submit(Transaction::NominateNodeReward { random: 8 }, &[&bpc])
        .unwrap_err();
    assert_eq!(err, TxError::TooSoon("not enough time since last NNR".into()));
    assert!(err.is_retriable());

    // winner claims into its rewards target, once
    let target_before = l.balance(&target);
    l.submit(
        Transaction::ClaimNodeReward {
            node: setup.node.clone(),
        },
        &[&setup.node_kp],
    )
    .unwrap();
    assert_eq!(l.balance(&target), target_before + pending);
    assert_eq!(l.state.nodes[&setup.node].pending_reward, 0);
    let again = l.submit(
        Transaction::ClaimNodeReward {
            node: setup.node.clone(),
        },
        &[&setup.node_kp],
    );
    assert!(again.unwrap_err().is_idempotent());
    l.state.audit_supply().unwrap();

    // a day later nomination is allowed again
    l.advance(DAY);
    l.submit(Transaction::NominateNodeReward { random: 9 }, &[&bpc])
        .unwrap();
}

#[test]
fn locked_delegator_earns_more_than_unlocked() {
    let mut l = Ledger::new();
    let setup = register_node(&mut l, "node-2");
    let (kp_u, unlocked) = l.funded("plain", 1_000);
    let (kp_l, locked) = l.funded("locked", 1_000);
    for (kp, a) in [(&kp_u, &unlocked), (&kp_l, &locked)] {
        l.submit(
            Transaction::Delegate {
                target: a.clone(),
                node: setup.node.clone(),
            },
            &[kp],
        )
        .unwrap();
    }
    l.submit(
        Transaction::Lock {
            target: locked.clone(),
            period: Duration::months(3),
        },
        &[&kp_l],
    )
    .unwrap();
    l.advance(3 * MONTH);
    let (u0, l0) = (l.balance(&unlocked), l.balance(&locked));
    l.submit(
        Transaction::CreditEai {
            node: setup.node.clone(),
        },
        &[&setup.node_kp],
    )
    .unwrap();
    let u_gain = l.balance(&unlocked) - u0;
    let l_gain = l.balance(&locked) - l0;
    assert!(l_gain > u_gain, "locked {} vs unlocked {}", l_gain, u_gain);
}

// ─────────────────────────────────────────────────────────────────
// CHILD ACCOUNTS, VALIDATORS, PRICES
// ─────────────────────────────────────────────────────────────────

#[test]
fn child_account_links_parent_and_progenitor() {
    let mut l = Ledger::new();
    let setup = register_node(&mut l, "node-3");
    let (pkp, parent) = l.funded("parent", 10);

    let ckp = seed_key("child");
    let child = ckp.address(AddressKind::User);
    let sig = ckp.sign(&child_ownership_message(&parent, &child)).unwrap();
    l.submit(
        Transaction::CreateChildAccount {
            target: parent.clone(),
            child: child.clone(),
            child_ownership: ckp.public_key.clone(),
            child_signature: sig,
            child_settlement_period: Duration::days(1),
            child_validation_keys: vec![ckp.public_key.clone()],
            child_validation_script: None,
            child_delegation_node: Some(setup.node.clone()),
        },
        &[&pkp],
    )
    .unwrap();
    let c = l.state.account(&child).unwrap();
    assert_eq!(c.parent.as_deref(), Some(parent.as_str()));
    assert_eq!(c.progenitor.as_deref(), Some(parent.as_str()));
    assert_eq!(c.delegation_node.as_deref(), Some(setup.node.as_str()));

    // grandchild keeps the root progenitor
    let gkp = seed_key("grandchild");
    let grandchild = gkp.address(AddressKind::User);
    let sig = gkp.sign(&child_ownership_message(&child, &grandchild)).unwrap();
    l.submit(
        Transaction::CreateChildAccount {
            target: child.clone(),
            child: grandchild.clone(),
            child_ownership: gkp.public_key.clone(),
            child_signature: sig,
            child_settlement_period: Duration::ZERO,
            child_validation_keys: vec![gkp.public_key.clone()],
            child_validation_script: None,
            child_delegation_node: None,
        },
        &[&ckp],
    )
    .unwrap();
    let g = l.state.account(&grandchild).unwrap();
    assert_eq!(g.parent.as_deref(), Some(child.as_str()));
    assert_eq!(g.progenitor.as_deref(), Some(parent.as_str()));
}

#[test]
fn validator_change_queues_update() {
    let mut l = Ledger::new();
    let bpc = seed_key("bpc");
    let val = seed_key("validator");
    l.submit(
        Transaction::CommandValidatorChange {
            public_key: val.public_key.clone(),
            power: 10,
        },
        &[&bpc],
    )
    .unwrap();
    let updates = l.state.end_block();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].power, 10);
    assert!(l.state.end_block().is_empty());
}

#[test]
fn record_price_is_stored() {
    let mut l = Ledger::new();
    let bpc = seed_key("bpc");
    l.submit(Transaction::RecordPrice { market_price: 1_700 }, &[&bpc])
        .unwrap();
    assert_eq!(l.state.market_price, Some(1_700));
    assert_eq!(l.state.summary().market_price, Some(1_700));
}

#[test]
fn app_hash_changes_with_state() {
    let mut l = Ledger::new();
    let h0 = l.state.app_hash().unwrap();
    l.funded("hash", 1);
    assert_ne!(h0, l.state.app_hash().unwrap());
}
