use crate::error::ChaosError;
use bincode::Options;
use ndau_crypto::KeyPair;
use serde::{Deserialize, Serialize};

pub const MAX_CHAOS_TX_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChaosTx {
    /// Write into the namespace owned by `namespace_key`.
    Set {
        namespace_key: Vec<u8>,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    /// State change proposal into the sysvar namespace; admitted only when
    /// the pair is whitelisted on the receiving node.
    Scp { key: Vec<u8>, value: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedChaosTx {
    pub tx: ChaosTx,
    /// Distinguishes otherwise identical writes.
    pub nonce: u64,
    pub signature: Option<Vec<u8>>,
}

impl SignedChaosTx {
    pub fn set(kp: &KeyPair, key: &[u8], value: &[u8], nonce: u64) -> Result<Self, ChaosError> {
        let tx = ChaosTx::Set {
            namespace_key: kp.public_key.clone(),
            key: key.to_vec(),
            value: value.to_vec(),
        };
        let msg = signable_bytes(&tx, nonce)?;
        let signature = kp.sign(&msg).map_err(|_| ChaosError::InvalidSignature)?;
        Ok(SignedChaosTx {
            tx,
            nonce,
            signature: Some(signature),
        })
    }

    pub fn scp(key: &[u8], value: &[u8], nonce: u64) -> Self {
        SignedChaosTx {
            tx: ChaosTx::Scp {
                key: key.to_vec(),
                value: value.to_vec(),
            },
            nonce,
            signature: None,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ChaosError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChaosError> {
        if bytes.len() > MAX_CHAOS_TX_SIZE {
            return Err(ChaosError::TooLarge(bytes.len()));
        }
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_limit(MAX_CHAOS_TX_SIZE as u64)
            .deserialize(bytes)
            .map_err(|e| ChaosError::Decode(e.to_string()))
    }

    pub fn hash(&self) -> Result<String, ChaosError> {
        Ok(ndau_crypto::tx_hash(&signable_bytes(&self.tx, self.nonce)?))
    }

    /// Check the namespace signature of a `Set`. SCPs carry none.
    pub fn verify(&self) -> Result<(), ChaosError> {
        match &self.tx {
            ChaosTx::Set { namespace_key, .. } => {
                if !ndau_crypto::is_valid_public_key(namespace_key) {
                    return Err(ChaosError::InvalidNamespaceKey);
                }
                let sig = self
                    .signature
                    .as_deref()
                    .ok_or(ChaosError::InvalidSignature)?;
                let msg = signable_bytes(&self.tx, self.nonce)?;
                if ndau_crypto::verify_signature(&msg, sig, namespace_key) {
                    Ok(())
                } else {
                    Err(ChaosError::InvalidSignature)
                }
            }
            ChaosTx::Scp { .. } => Ok(()),
        }
    }
}

pub fn signable_bytes(tx: &ChaosTx, nonce: u64) -> Result<Vec<u8>, ChaosError> {
    Ok(bincode::serialize(&(tx, nonce))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndau_crypto::generate_keypair_from_seed;

    #[test]
    fn test_set_verifies() {
        let kp = generate_keypair_from_seed(&[3u8; 32]).unwrap();
        let stx = SignedChaosTx::set(&kp, b"key", b"value", 1).unwrap();
        stx.verify().unwrap();
        let back = SignedChaosTx::from_bytes(&stx.to_bytes().unwrap()).unwrap();
        assert_eq!(back, stx);
    }

    #[test]
    fn test_tampered_value_fails() {
        let kp = generate_keypair_from_seed(&[3u8; 32]).unwrap();
        let mut stx = SignedChaosTx::set(&kp, b"key", b"value", 1).unwrap();
        if let ChaosTx::Set { value, .. } = &mut stx.tx {
            *value = b"other".to_vec();
        }
        assert!(matches!(stx.verify(), Err(ChaosError::InvalidSignature)));
    }

    #[test]
    fn test_nonce_changes_hash() {
        let a = SignedChaosTx::scp(b"k", b"v", 1).hash().unwrap();
        let b = SignedChaosTx::scp(b"k", b"v", 2).hash().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            SignedChaosTx::from_bytes(&[9, 9, 9]),
            Err(ChaosError::Decode(_))
        ));
    }
}
