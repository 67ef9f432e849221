use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChaosError {
    #[error("SCP {key:?} = {value:?} is not whitelisted")]
    NotWhitelisted { key: String, value: String },

    #[error("invalid namespace key")]
    InvalidNamespaceKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("transaction of {0} bytes exceeds the size limit")]
    TooLarge(usize),

    #[error("malformed chaos transaction: {0}")]
    Decode(String),

    #[error("nonce {nonce} in {namespace} is not above the last applied nonce {last}")]
    StaleNonce { namespace: String, nonce: u64, last: u64 },

    #[error("{key:?} in {namespace} already written at height {height}")]
    TooSoon { namespace: String, key: String, height: u64 },

    #[error("whitelist I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding: {0}")]
    Encoding(#[from] bincode::Error),
}

impl ChaosError {
    pub(crate) fn not_whitelisted(key: &[u8], value: &[u8]) -> Self {
        ChaosError::NotWhitelisted {
            key: String::from_utf8_lossy(key).into_owned(),
            value: String::from_utf8_lossy(value).into_owned(),
        }
    }

    /// Business-rule rejection rather than malformed input.
    pub fn is_policy(&self) -> bool {
        matches!(self, ChaosError::NotWhitelisted { .. })
    }

    /// The same write can succeed in a later block.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ChaosError::TooSoon { .. })
    }
}
