//! Simulated key material and entropy generation
//!
//! Key material here teaches the *shape* of Bitcoin keys: the public key, the
//! public-key hash and the address are one-way functions of the private key, and
//! two generation events never collide. It is built from plain hashes over random
//! bytes, not from elliptic-curve math.

use crate::constants::KEY_ENTROPY_BITS;
use crate::types::KeyMaterial;
use rand::RngCore;
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Raw randomness drawn for seeding keys or wallets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entropy {
    pub bits: usize,
    pub bytes: Vec<u8>,
}

/// Generate a fresh, effectively-unique identity from thread-local randomness.
pub fn generate_key_material() -> KeyMaterial {
    let mut seed = vec![0u8; KEY_ENTROPY_BITS / 8];
    rand::thread_rng().fill_bytes(&mut seed);
    key_material_from_entropy(&seed)
}

/// The deterministic core: identical entropy always yields identical material.
/// Shared with HD derivation, which feeds it hashed parent/path bytes.
pub fn key_material_from_entropy(entropy: &[u8]) -> KeyMaterial {
    let private_key = hex_encode(entropy);
    let public_key = public_key_for(&private_key);
    let pub_key_hash = hash160_hex(public_key.as_bytes());
    let address = address_from_pub_key_hash(&pub_key_hash);
    KeyMaterial {
        private_key,
        public_key,
        address,
        pub_key_hash,
    }
}

/// Draw `bits` of entropy (rounded up to whole bytes).
pub fn generate_entropy(bits: usize) -> Entropy {
    let mut bytes = vec![0u8; (bits + 7) / 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    Entropy { bits, bytes }
}

/// Simulated signature: binds a private key to a transaction id. The script
/// interpreter treats any well-formed signature as acceptable; tamper detection
/// happens at the public-key-hash comparison instead.
pub fn sign(key: &KeyMaterial, tx_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.private_key.as_bytes());
    hasher.update(tx_id.as_bytes());
    format!("30{}", hex_encode(&hasher.finalize()))
}

/// Simulated compressed public key: 0x02 prefix over a one-way digest.
fn public_key_for(private_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(private_key.as_bytes());
    hasher.update(b"public");
    format!("02{}", hex_encode(&hasher.finalize()))
}

/// HASH160: RIPEMD160(SHA256(x)), rendered as hex.
pub fn hash160_hex(data: &[u8]) -> String {
    let sha = Sha256::digest(data);
    hex_encode(&Ripemd160::digest(sha))
}

/// SHA256 rendered as hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex_encode(&Sha256::digest(data))
}

/// Derive the display address from a public-key hash: version nibble plus the
/// hash and a 4-byte checksum, in the 1-prefixed mainnet style.
pub fn address_from_pub_key_hash(pub_key_hash: &str) -> String {
    let checksum = Sha256::digest(pub_key_hash.as_bytes());
    format!("1{}{}", &pub_key_hash[..20.min(pub_key_hash.len())], hex_encode(&checksum[..4]))
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_unique() {
        let a = generate_key_material();
        let b = generate_key_material();
        assert_ne!(a.private_key, b.private_key);
        assert_ne!(a.address, b.address);
    }

    #[test]
    fn test_material_is_deterministic_in_entropy() {
        let seed = [7u8; 32];
        assert_eq!(key_material_from_entropy(&seed), key_material_from_entropy(&seed));
    }

    #[test]
    fn test_derivations_are_consistent() {
        let key = generate_key_material();
        assert!(key.public_key.starts_with("02"));
        assert_eq!(key.pub_key_hash, hash160_hex(key.public_key.as_bytes()));
        assert_eq!(key.address, address_from_pub_key_hash(&key.pub_key_hash));
        assert!(key.address.starts_with('1'));
    }

    #[test]
    fn test_entropy_length() {
        assert_eq!(generate_entropy(256).bytes.len(), 32);
        assert_eq!(generate_entropy(12).bytes.len(), 2);
    }

    #[test]
    fn test_signature_binds_key_and_tx() {
        let key = generate_key_material();
        let other = generate_key_material();
        assert_eq!(sign(&key, "tx-1"), sign(&key, "tx-1"));
        assert_ne!(sign(&key, "tx-1"), sign(&key, "tx-2"));
        assert_ne!(sign(&key, "tx-1"), sign(&other, "tx-1"));
    }

    #[test]
    fn test_hash160_is_20_bytes_hex() {
        assert_eq!(hash160_hex(b"hello").len(), 40);
    }
}
