// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NDAU - CRYPTOGRAPHY MODULE
//
// - Ed25519 key generation (random and deterministic from seed)
// - Message signing and verification
// - ndau address derivation (kind-tagged Base58Check over BLAKE2b-160)
// - Transaction hashes and chaos namespaces
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use blake2::Blake2b512;
use digest::Digest;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

/// Ed25519 public key length in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;
/// Ed25519 signature length in bytes.
pub const SIGNATURE_LEN: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid key format")]
    InvalidKey,
    #[error("Signature verification failed")]
    VerificationFailed,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Seed too short: need at least 32 bytes, got {0}")]
    SeedTooShort(usize),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KeyPair {
    pub public_key: Vec<u8>,
    pub secret_key: Vec<u8>,
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.secret_key.zeroize();
    }
}

impl KeyPair {
    /// Address of the given kind owned by this keypair.
    pub fn address(&self, kind: AddressKind) -> String {
        public_key_to_address(&self.public_key, kind)
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        sign_message(message, &self.secret_key)
    }
}

/// Generate a new random Ed25519 key pair.
pub fn generate_keypair() -> KeyPair {
    let signing = SigningKey::generate(&mut rand::rngs::OsRng);
    KeyPair {
        public_key: signing.verifying_key().to_bytes().to_vec(),
        secret_key: signing.to_bytes().to_vec(),
    }
}

/// Generate a DETERMINISTIC key pair from seed material.
///
/// Domain separation:
///   salt    = SHA-256("ndau-ed25519-keygen-v1")
///   derived = SHA-256(salt || seed) → 32-byte Ed25519 secret
///
/// Same seed always produces the same keypair and address, which is what
/// the devnet genesis generator and the test suites rely on.
pub fn generate_keypair_from_seed(seed: &[u8]) -> Result<KeyPair, CryptoError> {
    if seed.len() < 32 {
        return Err(CryptoError::SeedTooShort(seed.len()));
    }
    let salt = Sha256::digest(b"ndau-ed25519-keygen-v1");
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(seed);
    let mut derived: [u8; 32] = hasher.finalize().into();

    let signing = SigningKey::from_bytes(&derived);
    derived.zeroize();

    Ok(KeyPair {
        public_key: signing.verifying_key().to_bytes().to_vec(),
        secret_key: signing.to_bytes().to_vec(),
    })
}

/// Derive the `index`-th child key of a seed. Used when an account's
/// validation keys are added to or reset.
pub fn derive_child_keypair(seed: &[u8], index: u32) -> Result<KeyPair, CryptoError> {
    let mut material = Vec::with_capacity(seed.len() + 4);
    material.extend_from_slice(seed);
    material.extend_from_slice(&index.to_le_bytes());
    let result = generate_keypair_from_seed(&material);
    material.zeroize();
    result
}

/// Reconstruct a KeyPair from a 32-byte Ed25519 secret key.
pub fn keypair_from_secret(secret_bytes: &[u8]) -> Result<KeyPair, CryptoError> {
    let secret: [u8; 32] = secret_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey)?;
    let signing = SigningKey::from_bytes(&secret);
    Ok(KeyPair {
        public_key: signing.verifying_key().to_bytes().to_vec(),
        secret_key: secret_bytes.to_vec(),
    })
}

/// Sign a message using an Ed25519 secret key.
pub fn sign_message(message: &[u8], secret_key_bytes: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let secret: [u8; 32] = secret_key_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey)?;
    let signing = SigningKey::from_bytes(&secret);
    Ok(signing.sign(message).to_bytes().to_vec())
}

/// Verify an Ed25519 signature. Malformed keys or signatures verify as false.
pub fn verify_signature(message: &[u8], signature_bytes: &[u8], public_key_bytes: &[u8]) -> bool {
    let pk_array: [u8; PUBLIC_KEY_LEN] = match public_key_bytes.try_into() {
        Ok(a) => a,
        Err(_) => return false,
    };
    let vk = match VerifyingKey::from_bytes(&pk_array) {
        Ok(k) => k,
        Err(_) => return false,
    };
    let sig = match Signature::from_slice(signature_bytes) {
        Ok(s) => s,
        Err(_) => return false,
    };
    vk.verify(message, &sig).is_ok()
}

/// True if the bytes decode to a valid Ed25519 point.
pub fn is_valid_public_key(public_key_bytes: &[u8]) -> bool {
    <[u8; PUBLIC_KEY_LEN]>::try_from(public_key_bytes)
        .ok()
        .and_then(|a| VerifyingKey::from_bytes(&a).ok())
        .is_some()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ADDRESS DERIVATION (kind-tagged Base58Check)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Prefix shared by every ndau address.
pub const ADDRESS_PREFIX: &str = "nd";
const VERSION_BYTE: u8 = 0x6E;
const DECODED_ADDRESS_LEN: usize = 26;

/// What an address is used for. The kind is part of the checksummed
/// payload, so it cannot be changed without invalidating the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    User,
    Node,
    Endowment,
    Exchange,
    Bpc,
    MarketMaker,
}

impl AddressKind {
    pub fn as_char(self) -> char {
        match self {
            AddressKind::User => 'a',
            AddressKind::Node => 'n',
            AddressKind::Endowment => 'e',
            AddressKind::Exchange => 'x',
            AddressKind::Bpc => 'b',
            AddressKind::MarketMaker => 'm',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'a' => Some(AddressKind::User),
            'n' => Some(AddressKind::Node),
            'e' => Some(AddressKind::Endowment),
            'x' => Some(AddressKind::Exchange),
            'b' => Some(AddressKind::Bpc),
            'm' => Some(AddressKind::MarketMaker),
            _ => None,
        }
    }
}

fn checksum(payload: &[u8]) -> [u8; 4] {
    let first = Sha256::digest(payload);
    let second = Sha256::digest(first);
    [second[0], second[1], second[2], second[3]]
}

/// Derive an ndau address from a public key.
///
/// Format: "nd" + kind char + Base58(version + kind + BLAKE2b160(pubkey) + checksum)
pub fn public_key_to_address(public_key_bytes: &[u8], kind: AddressKind) -> String {
    let mut hasher = Blake2b512::new();
    hasher.update(public_key_bytes);
    let hash_result = hasher.finalize();

    let mut payload = vec![VERSION_BYTE, kind.as_char() as u8];
    payload.extend_from_slice(&hash_result[..20]);
    let check = checksum(&payload);
    payload.extend_from_slice(&check);

    format!(
        "{}{}{}",
        ADDRESS_PREFIX,
        kind.as_char(),
        bs58::encode(&payload).into_string()
    )
}

/// Decode and verify an address, returning its kind.
pub fn parse_address(address: &str) -> Result<AddressKind, CryptoError> {
    let invalid = || CryptoError::InvalidAddress(address.to_string());

    let rest = address.strip_prefix(ADDRESS_PREFIX).ok_or_else(invalid)?;
    let mut chars = rest.chars();
    let kind = chars
        .next()
        .and_then(AddressKind::from_char)
        .ok_or_else(invalid)?;
    let decoded = bs58::decode(chars.as_str())
        .into_vec()
        .map_err(|_| invalid())?;
    if decoded.len() != DECODED_ADDRESS_LEN {
        return Err(invalid());
    }
    let (payload, check) = decoded.split_at(DECODED_ADDRESS_LEN - 4);
    if payload[0] != VERSION_BYTE || payload[1] != kind.as_char() as u8 {
        return Err(invalid());
    }
    if check != checksum(payload) {
        return Err(invalid());
    }
    Ok(kind)
}

/// Validate address format and checksum.
pub fn validate_address(address: &str) -> bool {
    parse_address(address).is_ok()
}

/// Extract the 20-byte public key hash from a valid address.
pub fn address_to_pubkey_hash(address: &str) -> Option<Vec<u8>> {
    parse_address(address).ok()?;
    let decoded = bs58::decode(&address[ADDRESS_PREFIX.len() + 1..])
        .into_vec()
        .ok()?;
    Some(decoded[2..22].to_vec())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HASHES & ENCODINGS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Transaction hash: URL-safe base64 of md5(signable bytes), `=` padding stripped.
///
/// Clients recompute this from the signable bytes to look up a submitted
/// transaction, so it must stay bit-for-bit stable.
pub fn tx_hash(signable_bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Md5::digest(signable_bytes))
}

/// Chaos namespace of an identity: standard base64 of its public key.
pub fn namespace_for(public_key_bytes: &[u8]) -> String {
    STANDARD.encode(public_key_bytes)
}

/// Inverse of [`namespace_for`].
pub fn namespace_public_key(namespace: &str) -> Result<Vec<u8>, CryptoError> {
    let bytes = STANDARD
        .decode(namespace)
        .map_err(|_| CryptoError::InvalidKey)?;
    if !is_valid_public_key(&bytes) {
        return Err(CryptoError::InvalidKey);
    }
    Ok(bytes)
}
