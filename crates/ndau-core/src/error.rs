// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TRANSACTION ERRORS
//
// Every rejection is returned to the submitter, never raised as a node
// fault. A rejected transaction leaves no trace in state and pays no fee.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxError {
    /// Bad signature, wrong sequence, missing keys, malformed fields.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("insufficient funds: need {need} napu, have {have} napu available")]
    InsufficientFunds { need: u64, have: u64 },
    /// Business-rule rejection ("Cannot lock exchange accounts").
    #[error("{0}")]
    Policy(String),
    /// The account is already in the state the transaction asks for.
    #[error("{0}")]
    AlreadyInState(String),
    /// Timing gate; retry once enough block time has passed.
    #[error("{0}")]
    TooSoon(String),
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Coarse error category, stable across message wording changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Validation,
    InsufficientFunds,
    Policy,
    AlreadyInState,
    TooSoon,
    Encoding,
}

impl TxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TxError::Validation(_) => ErrorKind::Validation,
            TxError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            TxError::Policy(_) => ErrorKind::Policy,
            TxError::AlreadyInState(_) => ErrorKind::AlreadyInState,
            TxError::TooSoon(_) => ErrorKind::TooSoon,
            TxError::Encoding(_) => ErrorKind::Encoding,
        }
    }

    /// Callers may treat this rejection as success.
    pub fn is_idempotent(&self) -> bool {
        matches!(self, TxError::AlreadyInState(_))
    }

    /// The same transaction may succeed later without modification.
    pub fn is_retriable(&self) -> bool {
        matches!(self, TxError::TooSoon(_))
    }

    /// ABCI-style numeric code (0 is reserved for success).
    pub fn code(&self) -> u32 {
        match self.kind() {
            ErrorKind::Validation => 1,
            ErrorKind::InsufficientFunds => 2,
            ErrorKind::Policy => 3,
            ErrorKind::AlreadyInState => 4,
            ErrorKind::TooSoon => 5,
            ErrorKind::Encoding => 6,
        }
    }
}

impl From<bincode::Error> for TxError {
    fn from(e: bincode::Error) -> Self {
        TxError::Encoding(e.to_string())
    }
}

impl From<ndau_vm::VmError> for TxError {
    fn from(e: ndau_vm::VmError) -> Self {
        TxError::Validation(format!("script: {}", e))
    }
}

pub(crate) fn validation<S: Into<String>>(msg: S) -> TxError {
    TxError::Validation(msg.into())
}

pub(crate) fn policy<S: Into<String>>(msg: S) -> TxError {
    TxError::Policy(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let e = TxError::AlreadyInState("already staked".into());
        assert!(e.is_idempotent());
        assert!(!e.is_retriable());
        assert_eq!(e.kind(), ErrorKind::AlreadyInState);

        let e = TxError::TooSoon("not enough time since last NNR".into());
        assert!(e.is_retriable());
        assert_eq!(e.to_string(), "not enough time since last NNR");

        let e = TxError::InsufficientFunds { need: 10, have: 3 };
        assert_eq!(e.code(), 2);
        assert!(!e.is_idempotent());
    }

    #[test]
    fn test_policy_message_is_verbatim() {
        assert_eq!(
            policy("Cannot lock exchange accounts").to_string(),
            "Cannot lock exchange accounts"
        );
    }
}
