use ndau_chaos::ChaosError;
use ndau_core::TxError;
use ndau_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Tx(#[from] TxError),

    #[error(transparent)]
    Chaos(#[from] ChaosError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("database: {0}")]
    Db(#[from] sled::Error),

    #[error("encoding: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("invalid query: {0}")]
    Query(String),

    #[error("transaction {0} is already in the mempool")]
    Duplicate(String),

    #[error("mempool is full ({0} transactions)")]
    MempoolFull(usize),

    #[error("genesis: {0}")]
    Genesis(String),

    /// ABCI calls out of order (deliver outside a block, nested begin_block).
    #[error("block lifecycle: {0}")]
    Lifecycle(String),
}

impl NodeError {
    /// The ledger rejection inside, if this wraps one.
    pub fn tx_error(&self) -> Option<&TxError> {
        match self {
            NodeError::Tx(e) => Some(e),
            _ => None,
        }
    }
}
