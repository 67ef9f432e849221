// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TRANSACTION EFFECTS
//
// One function per transaction type. Each runs after the signer has been
// authenticated and charged, against the staging overlay, and either
// returns Ok with the overlay updated or an error that discards it.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::account::{Hold, Lock, PendingSettlement, StakeRules};
use crate::duration::Duration;
use crate::eai::split_eai;
use crate::error::{policy, validation, TxError};
use crate::nnr::{distribute_reward, select_winner, Node, NnrWinner};
use crate::state::{Staged, ValidatorUpdate, MAX_VALIDATION_KEYS};
use crate::sysvar;
use crate::tx::{child_ownership_message, Transaction, ValidationChange};
use ndau_crypto::AddressKind;

pub(crate) fn apply(st: &mut Staged, signer: &str, tx: &Transaction) -> Result<(), TxError> {
    match tx {
        Transaction::Transfer {
            source,
            destination,
            qty,
        } => transfer(st, source, destination, *qty),
        Transaction::TransferAndLock {
            source,
            destination,
            qty,
            period,
        } => transfer_and_lock(st, source, destination, *qty, *period),
        Transaction::SetValidation {
            target,
            validation_keys,
            validation_script,
            ..
        } => set_validation(st, target, validation_keys, validation_script.as_deref()),
        Transaction::ChangeValidation { target, change } => change_validation(st, target, change),
        Transaction::ReleaseFromEndowment { destination, qty } => release_from_endowment(st, destination, *qty),
        Transaction::ChangeSettlementPeriod { target, period } => change_settlement_period(st, target, *period),
        Transaction::Delegate { target, node } => delegate(st, target, node),
        Transaction::CreditEai { node } => credit_eai(st, node),
        Transaction::Lock { target, period } => lock(st, target, *period),
        Transaction::Notify { target } => notify(st, target),
        Transaction::SetRewardsDestination {
            target,
            destination,
        } => set_rewards_destination(st, target, destination),
        Transaction::Stake {
            target,
            rules,
            stake_to,
            qty,
        } => stake(st, target, rules, stake_to, *qty),
        Transaction::RegisterNode {
            node,
            distribution_script,
            rpc_address,
        } => register_node(st, node, distribution_script, rpc_address),
        Transaction::NominateNodeReward { random } => nominate_node_reward(st, *random),
        Transaction::ClaimNodeReward { node } => claim_node_reward(st, node),
        Transaction::CreateChildAccount {
            target,
            child,
            child_ownership,
            child_signature,
            child_settlement_period,
            child_validation_keys,
            child_validation_script,
            child_delegation_node,
        } => create_child_account(
            st,
            ChildSpec {
                parent: target,
                child,
                ownership: child_ownership,
                signature: child_signature,
                settlement_period: *child_settlement_period,
                keys: child_validation_keys,
                script: child_validation_script.as_deref(),
                delegation: child_delegation_node.as_deref(),
            },
        ),
        Transaction::CommandValidatorChange { public_key, power } => {
            command_validator_change(st, public_key, *power)
        }
        Transaction::SetSysvar { name, value } => set_sysvar(st, name, value),
        Transaction::RecordPrice { market_price } => {
            st.market_price = Some(*market_price);
            log::info!("market price recorded by {}: {}", signer, market_price);
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// HELPERS
// ─────────────────────────────────────────────────────────────────

fn require_address(addr: &str) -> Result<(), TxError> {
    if ndau_crypto::validate_address(addr) {
        Ok(())
    } else {
        Err(validation(format!("invalid address {}", addr)))
    }
}

fn require_positive(qty: u64) -> Result<(), TxError> {
    if qty == 0 {
        return Err(validation("quantity must be positive"));
    }
    Ok(())
}

/// Hex-encode validation keys after checking each is a real ed25519 point.
fn encode_keys(keys: &[Vec<u8>]) -> Result<Vec<String>, TxError> {
    if keys.is_empty() {
        return Err(validation("at least one validation key is required"));
    }
    if keys.len() > MAX_VALIDATION_KEYS {
        return Err(validation(format!(
            "at most {} validation keys are allowed",
            MAX_VALIDATION_KEYS
        )));
    }
    let mut out: Vec<String> = Vec::with_capacity(keys.len());
    for k in keys {
        if !ndau_crypto::is_valid_public_key(k) {
            return Err(validation("invalid validation key"));
        }
        let h = hex::encode(k);
        if out.contains(&h) {
            return Err(validation("duplicate validation key"));
        }
        out.push(h);
    }
    Ok(out)
}

fn parse_script(script: Option<&[u8]>) -> Result<Option<Vec<u8>>, TxError> {
    match script {
        None => Ok(None),
        Some([]) => Ok(None),
        Some(s) => {
            ndau_vm::Chaincode::parse(s)?;
            Ok(Some(s.to_vec()))
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// TRANSFERS
// ─────────────────────────────────────────────────────────────────

fn transfer(st: &mut Staged, source: &str, destination: &str, qty: u64) -> Result<(), TxError> {
    require_positive(qty)?;
    require_address(destination)?;
    if source == destination {
        return Err(validation("source and destination are the same account"));
    }
    let now = st.now;
    let hash = st.hash.clone();

    let src = st.account(source);
    if src.is_locked() {
        return Err(policy("source account is locked"));
    }
    src.debit(qty, now)?;
    let period = src.settlement_settings.period;

    let dst = st.account(destination);
    if dst.is_notified() {
        return Err(policy("destination account is notified and cannot receive funds"));
    }
    dst.credit(qty, now)?;
    if !period.is_zero() {
        dst.holds.push(Hold {
            qty,
            expiry: period.after(now),
            tx_hash: hash,
        });
    }
    Ok(())
}

fn transfer_and_lock(
    st: &mut Staged,
    source: &str,
    destination: &str,
    qty: u64,
    period: Duration,
) -> Result<(), TxError> {
    require_positive(qty)?;
    require_address(destination)?;
    if period.is_zero() {
        return Err(validation("lock period must be positive"));
    }
    if source == destination {
        return Err(validation("source and destination are the same account"));
    }
    if st.exists(destination) {
        return Err(validation("destination must be a new, unclaimed account"));
    }
    let now = st.now;
    let (bonus, rate) = st.tables.lock_rate(Duration::ZERO, period);

    let src = st.account(source);
    if src.is_locked() {
        return Err(policy("source account is locked"));
    }
    src.debit(qty, now)?;

    let dst = st.account(destination);
    dst.credit(qty, now)?;
    dst.lock = Some(Lock {
        notice_period: period,
        unlocks_on: None,
        bonus,
        rate,
    });
    Ok(())
}

fn release_from_endowment(st: &mut Staged, destination: &str, qty: u64) -> Result<(), TxError> {
    require_positive(qty)?;
    require_address(destination)?;
    let now = st.now;
    st.account(destination).credit(qty, now)?;
    st.rfe = st
        .rfe
        .checked_add(qty)
        .ok_or_else(|| validation("issuance overflow"))?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// VALIDATION & SETTLEMENT
// ─────────────────────────────────────────────────────────────────

fn set_validation(
    st: &mut Staged,
    target: &str,
    keys: &[Vec<u8>],
    script: Option<&[u8]>,
) -> Result<(), TxError> {
    let keys = encode_keys(keys)?;
    let script = parse_script(script)?;
    let period = st.base.sysvars.default_settlement_duration()?;

    let acct = st.account(target);
    if acct.is_claimed() {
        return Err(TxError::AlreadyInState(format!(
            "{} already has validation keys",
            target
        )));
    }
    acct.validation_keys = Some(keys);
    acct.validation_script = script;
    acct.settlement_settings.period = period;
    acct.settlement_settings.next = None;
    Ok(())
}

fn change_validation(st: &mut Staged, target: &str, change: &ValidationChange) -> Result<(), TxError> {
    let acct = st.account(target);
    match change {
        ValidationChange::Add(key) => {
            let mut keys = acct.validation_keys.clone().unwrap_or_default();
            let mut raw: Vec<Vec<u8>> = keys
                .iter()
                .map(|k| hex::decode(k).map_err(|_| TxError::Encoding("stored key is not hex".into())))
                .collect::<Result<_, _>>()?;
            raw.push(key.clone());
            keys = encode_keys(&raw)?;
            acct.validation_keys = Some(keys);
        }
        ValidationChange::Reset(key) => {
            acct.validation_keys = Some(encode_keys(std::slice::from_ref(key))?);
        }
        ValidationChange::SetScript(script) => {
            acct.validation_script = parse_script(Some(script))?;
        }
    }
    Ok(())
}

fn change_settlement_period(st: &mut Staged, target: &str, period: Duration) -> Result<(), TxError> {
    let now = st.now;
    let acct = st.account(target);
    let changes_at = acct.settlement_settings.period.after(now);
    acct.settlement_settings.next = Some(PendingSettlement { period, changes_at });
    Ok(())
}

fn create_child_account(st: &mut Staged, spec: ChildSpec) -> Result<(), TxError> {
    require_address(spec.child)?;
    let kind = ndau_crypto::parse_address(spec.child).map_err(|e| validation(e.to_string()))?;
    if ndau_crypto::public_key_to_address(spec.ownership, kind) != spec.child {
        return Err(validation("child ownership key does not derive to child address"));
    }
    let msg = child_ownership_message(spec.parent, spec.child);
    if !ndau_crypto::verify_signature(&msg, spec.signature, spec.ownership) {
        return Err(validation("invalid child ownership signature"));
    }
    if spec.parent == spec.child {
        return Err(validation("an account cannot be its own child"));
    }
    if st.exists(spec.child) {
        return Err(validation("child account already exists"));
    }
    let keys = encode_keys(spec.keys)?;
    let script = parse_script(spec.script)?;
    if let Some(node) = spec.delegation {
        if !st.is_active_node(node) {
            return Err(validation(format!("{} is not an active node", node)));
        }
    }

    let progenitor = st
        .account(spec.parent)
        .progenitor
        .clone()
        .unwrap_or_else(|| spec.parent.to_string());

    let child = st.account(spec.child);
    child.validation_keys = Some(keys);
    child.validation_script = script;
    child.settlement_settings.period = spec.settlement_period;
    child.parent = Some(spec.parent.to_string());
    child.progenitor = Some(progenitor);
    child.delegation_node = spec.delegation.map(str::to_string);
    Ok(())
}

struct ChildSpec<'a> {
    parent: &'a str,
    child: &'a str,
    ownership: &'a [u8],
    signature: &'a [u8],
    settlement_period: Duration,
    keys: &'a [Vec<u8>],
    script: Option<&'a [u8]>,
    delegation: Option<&'a str>,
}

// ─────────────────────────────────────────────────────────────────
// LOCKS
// ─────────────────────────────────────────────────────────────────

fn lock(st: &mut Staged, target: &str, period: Duration) -> Result<(), TxError> {
    if period.is_zero() {
        return Err(validation("lock period must be positive"));
    }
    let attributes = st.base.sysvars.account_attributes()?;
    let is_exchange = attributes.get(target).map_or(false, |a| a.exchange)
        || ndau_crypto::parse_address(target).ok() == Some(AddressKind::Exchange);
    if is_exchange {
        return Err(policy("Cannot lock exchange accounts"));
    }
    let now = st.now;
    let tables = st.tables.clone();
    let acct = st.account(target);

    if let Some(existing) = &acct.lock {
        match existing.unlocks_on {
            None if period < existing.notice_period => {
                return Err(policy(format!(
                    "cannot shorten lock notice period from {} to {}",
                    existing.notice_period, period
                )));
            }
            Some(u) if period.after(now) < u => {
                return Err(policy(format!(
                    "new lock of {} would end before the current unlock time",
                    period
                )));
            }
            _ => {}
        }
    }

    let (bonus, rate) = tables.lock_rate(acct.age_at(now), period);
    acct.lock = Some(Lock {
        notice_period: period,
        unlocks_on: None,
        bonus,
        rate,
    });
    Ok(())
}

fn notify(st: &mut Staged, target: &str) -> Result<(), TxError> {
    let now = st.now;
    let acct = st.account(target);
    let lock = acct
        .lock
        .as_mut()
        .ok_or_else(|| policy("account is not locked"))?;
    if lock.unlocks_on.is_some() {
        return Err(TxError::AlreadyInState("account is already notified".into()));
    }
    lock.unlocks_on = Some(lock.notice_period.after(now));
    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// NODES, STAKE, DELEGATION
// ─────────────────────────────────────────────────────────────────

fn delegate(st: &mut Staged, target: &str, node: &str) -> Result<(), TxError> {
    if !st.is_active_node(node) {
        return Err(validation(format!("{} is not an active node", node)));
    }
    let acct = st.account(target);
    if acct.delegation_node.as_deref() == Some(node) {
        return Err(TxError::AlreadyInState(format!("already delegated to {}", node)));
    }
    acct.delegation_node = Some(node.to_string());
    Ok(())
}

fn set_rewards_destination(st: &mut Staged, target: &str, destination: &str) -> Result<(), TxError> {
    require_address(destination)?;
    let previous = st.account(target).rewards_target.clone();
    if let Some(prev) = previous {
        let from = target.to_string();
        st.account(&prev).incoming_rewards_from.retain(|a| *a != from);
    }
    if destination == target {
        st.account(target).rewards_target = None;
        return Ok(());
    }
    if st.peek(destination).map_or(false, |d| d.is_notified()) {
        return Err(policy("rewards destination is notified"));
    }
    st.account(target).rewards_target = Some(destination.to_string());
    let dest = st.account(destination);
    if !dest.incoming_rewards_from.iter().any(|a| a == target) {
        dest.incoming_rewards_from.push(target.to_string());
    }
    Ok(())
}

fn stake(st: &mut Staged, target: &str, rules: &str, stake_to: &str, qty: u64) -> Result<(), TxError> {
    require_positive(qty)?;
    require_address(rules)?;
    require_address(stake_to)?;
    if let Some(expected) = st.base.sysvars.address(sysvar::NODE_RULES_ACCOUNT_ADDRESS)? {
        if expected != rules {
            return Err(validation(format!("{} is not the node rules account", rules)));
        }
    }
    let self_stake = target == stake_to;
    if !self_stake && !st.is_active_node(stake_to) {
        return Err(validation(format!("{} is not an active node", stake_to)));
    }
    let now = st.now;
    let acct = st.account(target);
    if acct.stake_rules.is_some() {
        return Err(TxError::AlreadyInState("account is already staked".into()));
    }
    let have = acct.available(now);
    if have < qty {
        return Err(TxError::InsufficientFunds { need: qty, have });
    }
    acct.stake_rules = Some(StakeRules {
        rules: rules.to_string(),
        node: stake_to.to_string(),
        qty,
    });
    if let Some(node) = st.node_mut(stake_to) {
        *node.stakers.entry(target.to_string()).or_insert(0) += qty;
        node.total_stake = node.total_stake.saturating_add(qty);
    }
    Ok(())
}

fn register_node(
    st: &mut Staged,
    node: &str,
    distribution_script: &[u8],
    rpc_address: &str,
) -> Result<(), TxError> {
    if st.is_active_node(node) {
        return Err(TxError::AlreadyInState(format!("{} is already registered", node)));
    }
    if !distribution_script.is_empty() {
        ndau_vm::Chaincode::parse(distribution_script)?;
    }
    let min = st.base.sysvars.min_node_registration_stake()?;
    let now = st.now;
    let self_stake = match &st.account(node).stake_rules {
        Some(s) if s.node == node => s.qty,
        _ => 0,
    };
    if self_stake < min {
        return Err(policy(format!(
            "node self-stake of {} napu is below the minimum of {} napu",
            self_stake, min
        )));
    }
    let mut stakers = std::collections::BTreeMap::new();
    stakers.insert(node.to_string(), self_stake);
    st.insert_node(Node {
        address: node.to_string(),
        rpc_address: rpc_address.to_string(),
        distribution_script: distribution_script.to_vec(),
        active: true,
        total_stake: self_stake,
        stakers,
        registered_at: now,
        pending_reward: 0,
    });
    log::info!("node {} registered with {} napu self-stake", node, self_stake);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// EAI & NODE REWARDS
// ─────────────────────────────────────────────────────────────────

fn credit_eai(st: &mut Staged, node: &str) -> Result<(), TxError> {
    if !st.is_active_node(node) {
        return Err(validation(format!("{} is not an active node", node)));
    }
    let table = st.base.sysvars.eai_fee_table()?;
    let now = st.now;
    let mut node_cut = 0u64;
    let mut total = 0u64;

    for delegator in st.delegates_of(node) {
        let acct = st.account(&delegator);
        let eai = std::mem::take(&mut acct.uncredited_eai);
        if eai == 0 {
            continue;
        }
        let split = split_eai(eai, &table);
        acct.credit_interest(split.delegator)?;
        for (addr, qty) in &split.to_addresses {
            if *qty > 0 {
                st.account(addr).credit(*qty, now)?;
            }
        }
        node_cut = node_cut.saturating_add(split.node_cut);
        total = total.saturating_add(eai);
    }

    if let Some(n) = st.node_mut(node) {
        n.pending_reward = n.pending_reward.saturating_add(node_cut);
    }
    st.eai = st.eai.saturating_add(total);
    log::info!("credited {} napu EAI for node {} ({} to node reward)", total, node, node_cut);
    Ok(())
}

fn nominate_node_reward(st: &mut Staged, random: u64) -> Result<(), TxError> {
    let min = st.base.sysvars.min_duration_between_nnrs()?;
    if let Some(last) = st.base.last_nnr {
        if st.now < min.after(last) {
            return Err(TxError::TooSoon("not enough time since last NNR".into()));
        }
    }
    let winner = select_winner(&st.base.nodes, random)
        .ok_or_else(|| validation("no eligible node for node reward nomination"))?;
    log::info!("NNR at {} selected {}", st.now, winner);
    st.nnr_winner = Some(NnrWinner {
        node: winner,
        nominated_at: st.now,
        random,
        claimed: false,
    });
    Ok(())
}

fn claim_node_reward(st: &mut Staged, node: &str) -> Result<(), TxError> {
    let mut winner = st
        .current_winner()
        .cloned()
        .ok_or_else(|| validation("no node reward has been nominated"))?;
    if winner.node != node {
        return Err(validation(format!("{} is not the winner of the last NNR", node)));
    }
    if winner.claimed {
        return Err(TxError::AlreadyInState("node reward already claimed".into()));
    }
    let now = st.now;
    let n = st
        .node(node)
        .cloned()
        .ok_or_else(|| validation(format!("{} is not a registered node", node)))?;
    let payouts = distribute_reward(&n, n.pending_reward)?;

    for (addr, qty) in payouts {
        if qty == 0 {
            continue;
        }
        let recipient = st
            .account(&addr)
            .rewards_target
            .clone()
            .unwrap_or(addr);
        st.account(&recipient).credit(qty, now)?;
    }
    if let Some(n) = st.node_mut(node) {
        n.pending_reward = 0;
    }
    winner.claimed = true;
    st.nnr_winner = Some(winner);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// GOVERNANCE
// ─────────────────────────────────────────────────────────────────

fn command_validator_change(st: &mut Staged, public_key: &[u8], power: i64) -> Result<(), TxError> {
    if !ndau_crypto::is_valid_public_key(public_key) {
        return Err(validation("invalid validator public key"));
    }
    if power < 0 {
        return Err(validation("validator power cannot be negative"));
    }
    st.validator_updates.push(ValidatorUpdate {
        public_key: public_key.to_vec(),
        power,
    });
    Ok(())
}

fn set_sysvar(st: &mut Staged, name: &str, value: &[u8]) -> Result<(), TxError> {
    sysvar::validate_value(name, value)?;
    st.base.sysvars.check_set(name, st.base.height)?;
    st.sysvar = Some((name.to_string(), value.to_vec()));
    Ok(())
}
