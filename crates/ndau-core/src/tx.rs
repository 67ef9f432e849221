// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TRANSACTIONS
//
// Wire form is bincode(SignedTx). Signatures cover the signable bytes:
//   [type_id] ‖ bincode(tx) ‖ sequence (u64 LE)
// and the transaction hash is derived from those same bytes, so a client
// can compute the hash before submitting.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::duration::Duration;
use crate::error::TxError;
use crate::sysvar;
use ndau_crypto::KeyPair;
use serde::{Deserialize, Serialize};

/// Largest accepted encoded transaction.
pub const MAX_TX_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationChange {
    /// Append a key, keeping the existing ones.
    Add(Vec<u8>),
    /// Replace all keys with exactly this one.
    Reset(Vec<u8>),
    /// Install a validation script; an empty script removes it.
    SetScript(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    Transfer {
        source: String,
        destination: String,
        qty: u64,
    },
    TransferAndLock {
        source: String,
        destination: String,
        qty: u64,
        period: Duration,
    },
    /// Claim: installs the first validation keys. Signed by the ownership key.
    SetValidation {
        target: String,
        ownership: Vec<u8>,
        validation_keys: Vec<Vec<u8>>,
        validation_script: Option<Vec<u8>>,
    },
    ChangeValidation {
        target: String,
        change: ValidationChange,
    },
    ReleaseFromEndowment {
        destination: String,
        qty: u64,
    },
    ChangeSettlementPeriod {
        target: String,
        period: Duration,
    },
    Delegate {
        target: String,
        node: String,
    },
    CreditEai {
        node: String,
    },
    Lock {
        target: String,
        period: Duration,
    },
    Notify {
        target: String,
    },
    SetRewardsDestination {
        target: String,
        destination: String,
    },
    Stake {
        target: String,
        rules: String,
        stake_to: String,
        qty: u64,
    },
    RegisterNode {
        node: String,
        distribution_script: Vec<u8>,
        rpc_address: String,
    },
    NominateNodeReward {
        random: u64,
    },
    ClaimNodeReward {
        node: String,
    },
    CreateChildAccount {
        target: String,
        child: String,
        child_ownership: Vec<u8>,
        child_signature: Vec<u8>,
        child_settlement_period: Duration,
        child_validation_keys: Vec<Vec<u8>>,
        child_validation_script: Option<Vec<u8>>,
        child_delegation_node: Option<String>,
    },
    CommandValidatorChange {
        public_key: Vec<u8>,
        power: i64,
    },
    SetSysvar {
        name: String,
        value: Vec<u8>,
    },
    RecordPrice {
        market_price: u64,
    },
}

/// Who must sign a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signer {
    /// An account signing with its validation keys.
    Account(String),
    /// The account named by an authority sysvar, signing with its validation keys.
    System(&'static str),
    /// An unclaimed account proving ownership of its address.
    Ownership { target: String, key: Vec<u8> },
}

impl Transaction {
    /// Stable numeric id; also the fee script handler id.
    pub fn type_id(&self) -> u8 {
        match self {
            Transaction::Transfer { .. } => 1,
            Transaction::ChangeValidation { .. } => 2,
            Transaction::ReleaseFromEndowment { .. } => 3,
            Transaction::ChangeSettlementPeriod { .. } => 4,
            Transaction::Delegate { .. } => 5,
            Transaction::CreditEai { .. } => 6,
            Transaction::Lock { .. } => 7,
            Transaction::Notify { .. } => 8,
            Transaction::SetRewardsDestination { .. } => 9,
            Transaction::SetValidation { .. } => 10,
            Transaction::Stake { .. } => 11,
            Transaction::RegisterNode { .. } => 12,
            Transaction::NominateNodeReward { .. } => 13,
            Transaction::ClaimNodeReward { .. } => 14,
            Transaction::TransferAndLock { .. } => 15,
            Transaction::CommandValidatorChange { .. } => 16,
            Transaction::SetSysvar { .. } => 17,
            Transaction::RecordPrice { .. } => 18,
            Transaction::CreateChildAccount { .. } => 19,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transaction::Transfer { .. } => "Transfer",
            Transaction::TransferAndLock { .. } => "TransferAndLock",
            Transaction::SetValidation { .. } => "SetValidation",
            Transaction::ChangeValidation { .. } => "ChangeValidation",
            Transaction::ReleaseFromEndowment { .. } => "ReleaseFromEndowment",
            Transaction::ChangeSettlementPeriod { .. } => "ChangeSettlementPeriod",
            Transaction::Delegate { .. } => "Delegate",
            Transaction::CreditEai { .. } => "CreditEAI",
            Transaction::Lock { .. } => "Lock",
            Transaction::Notify { .. } => "Notify",
            Transaction::SetRewardsDestination { .. } => "SetRewardsDestination",
            Transaction::Stake { .. } => "Stake",
            Transaction::RegisterNode { .. } => "RegisterNode",
            Transaction::NominateNodeReward { .. } => "NominateNodeReward",
            Transaction::ClaimNodeReward { .. } => "ClaimNodeReward",
            Transaction::CreateChildAccount { .. } => "CreateChildAccount",
            Transaction::CommandValidatorChange { .. } => "CommandValidatorChange",
            Transaction::SetSysvar { .. } => "SetSysvar",
            Transaction::RecordPrice { .. } => "RecordPrice",
        }
    }

    pub fn signer(&self) -> Signer {
        use Transaction::*;
        match self {
            Transfer { source, .. } | TransferAndLock { source, .. } => {
                Signer::Account(source.clone())
            }
            SetValidation {
                target, ownership, ..
            } => Signer::Ownership {
                target: target.clone(),
                key: ownership.clone(),
            },
            ChangeValidation { target, .. }
            | ChangeSettlementPeriod { target, .. }
            | Delegate { target, .. }
            | Lock { target, .. }
            | Notify { target }
            | SetRewardsDestination { target, .. }
            | Stake { target, .. }
            | CreateChildAccount { target, .. } => Signer::Account(target.clone()),
            CreditEai { node } | RegisterNode { node, .. } | ClaimNodeReward { node } => {
                Signer::Account(node.clone())
            }
            ReleaseFromEndowment { .. } => Signer::System(sysvar::RELEASE_FROM_ENDOWMENT_ADDRESS),
            NominateNodeReward { .. } => Signer::System(sysvar::NOMINATE_NODE_REWARD_ADDRESS),
            CommandValidatorChange { .. } => {
                Signer::System(sysvar::COMMAND_VALIDATOR_CHANGE_ADDRESS)
            }
            SetSysvar { .. } => Signer::System(sysvar::SET_SYSVAR_ADDRESS),
            RecordPrice { .. } => Signer::System(sysvar::RECORD_PRICE_ADDRESS),
        }
    }

    /// Transactions that never pay the transaction fee.
    pub fn is_fee_exempt(&self) -> bool {
        matches!(
            self,
            Transaction::CreditEai { .. }
                | Transaction::NominateNodeReward { .. }
                | Transaction::CommandValidatorChange { .. }
        )
    }

    /// Napu this transaction moves out of the signer beyond the fee.
    pub fn outgoing_qty(&self) -> u64 {
        match self {
            Transaction::Transfer { qty, .. } | Transaction::TransferAndLock { qty, .. } => *qty,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    pub tx: Transaction,
    pub sequence: u64,
    pub signatures: Vec<Vec<u8>>,
}

/// Bytes covered by signatures and the transaction hash.
pub fn signable_bytes(tx: &Transaction, sequence: u64) -> Result<Vec<u8>, TxError> {
    let body = bincode::serialize(tx)?;
    let mut out = Vec::with_capacity(body.len() + 9);
    out.push(tx.type_id());
    out.extend_from_slice(&body);
    out.extend_from_slice(&sequence.to_le_bytes());
    Ok(out)
}

impl SignedTx {
    /// Sign `tx` at `sequence` with each of `keys`.
    pub fn sign(tx: Transaction, sequence: u64, keys: &[&KeyPair]) -> Result<Self, TxError> {
        let bytes = signable_bytes(&tx, sequence)?;
        let signatures = keys
            .iter()
            .map(|k| k.sign(&bytes).map_err(|e| TxError::Validation(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SignedTx {
            tx,
            sequence,
            signatures,
        })
    }

    pub fn signable_bytes(&self) -> Result<Vec<u8>, TxError> {
        signable_bytes(&self.tx, self.sequence)
    }

    /// base64url(md5(signable bytes)), unpadded.
    pub fn hash(&self) -> Result<String, TxError> {
        Ok(ndau_crypto::tx_hash(&self.signable_bytes()?))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TxError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TxError> {
        if bytes.len() > MAX_TX_SIZE {
            return Err(TxError::Encoding(format!(
                "transaction of {} bytes exceeds {}",
                bytes.len(),
                MAX_TX_SIZE
            )));
        }
        use bincode::Options;
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .with_limit(MAX_TX_SIZE as u64)
            .deserialize(bytes)
            .map_err(|e| TxError::Encoding(e.to_string()))
    }
}

/// Message a child key signs to prove ownership for CreateChildAccount.
pub fn child_ownership_message(parent: &str, child: &str) -> Vec<u8> {
    format!("ndau-child-account:{}:{}", parent, child).into_bytes()
}
