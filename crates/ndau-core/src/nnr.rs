// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NODE REGISTRY & NODE REWARD NOMINATION
//
// Registered nodes carry their own stake plus the stake of every account
// that staked to them. Nomination is a stake-weighted lottery driven only by
// the `random` value carried in the transaction, so every replica picks the
// same winner. Nodes are visited in address order (BTreeMap) for the same
// reason.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::duration::Timestamp;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub address: String,
    pub rpc_address: String,
    #[serde(with = "hex_bytes")]
    pub distribution_script: Vec<u8>,
    pub active: bool,
    /// Self stake plus costakes.
    pub total_stake: u64,
    /// Costaker address → staked napu (the node itself included).
    pub stakers: BTreeMap<String, u64>,
    pub registered_at: Timestamp,
    /// Node's fee-table cut from CreditEAI, released by ClaimNodeReward.
    pub pending_reward: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NnrWinner {
    pub node: String,
    pub nominated_at: Timestamp,
    pub random: u64,
    pub claimed: bool,
}

/// Stake-weighted draw over active nodes with nonzero stake.
pub fn select_winner(nodes: &BTreeMap<String, Node>, random: u64) -> Option<String> {
    let eligible: Vec<(&String, u64)> = nodes
        .iter()
        .filter(|(_, n)| n.active && n.total_stake > 0)
        .map(|(a, n)| (a, n.total_stake))
        .collect();
    let total: u128 = eligible.iter().map(|(_, s)| *s as u128).sum();
    if total == 0 {
        return None;
    }
    let mut rng = ChaCha20Rng::seed_from_u64(random);
    let mut ticket = rng.gen_range(0..total);
    for (addr, stake) in eligible {
        if ticket < stake as u128 {
            return Some(addr.clone());
        }
        ticket -= stake as u128;
    }
    None
}

/// Split a node reward using the node's distribution script.
///
/// The script's default handler runs with `[total_stake, self_stake, reward]`
/// on the stack and returns what the node keeps (clamped to `0..=reward`);
/// an empty handler therefore keeps everything. The rest goes to the other
/// stakers pro rata; rounding dust stays with the node.
pub fn distribute_reward(node: &Node, reward: u64) -> Result<Vec<(String, u64)>, ndau_vm::VmError> {
    let self_stake = node.stakers.get(&node.address).copied().unwrap_or(0);
    let kept = if node.distribution_script.is_empty() {
        reward
    } else {
        let inputs = [
            i64::try_from(node.total_stake).unwrap_or(i64::MAX),
            i64::try_from(self_stake).unwrap_or(i64::MAX),
            i64::try_from(reward).unwrap_or(i64::MAX),
        ];
        let out = ndau_vm::execute(&node.distribution_script, 0, &inputs)?;
        u64::try_from(out.max(0)).unwrap_or(0).min(reward)
    };

    let others: Vec<(&String, u64)> = node
        .stakers
        .iter()
        .filter(|(a, _)| **a != node.address)
        .map(|(a, q)| (a, *q))
        .collect();
    let other_stake: u128 = others.iter().map(|(_, q)| *q as u128).sum();

    let shared = reward - kept;
    let mut payouts = Vec::new();
    let mut paid = 0u64;
    if other_stake > 0 && shared > 0 {
        for (addr, q) in others {
            let part = (shared as u128 * q as u128 / other_stake) as u64;
            if part > 0 {
                payouts.push((addr.clone(), part));
                paid += part;
            }
        }
    }
    payouts.insert(0, (node.address.clone(), reward - paid));
    Ok(payouts)
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.serialize_str(&hex::encode(v))
        } else {
            s.serialize_bytes(v)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        if d.is_human_readable() {
            let text = String::deserialize(d)?;
            hex::decode(text).map_err(serde::de::Error::custom)
        } else {
            Vec::<u8>::deserialize(d)
        }
    }
}
