//! Hierarchical-deterministic derivation tree
//!
//! Determinism is the teaching point: the same seed phrase always produces the
//! same master node, and the same `(parent, path)` pair always reproduces the
//! same child, while distinct paths diverge. Derivation is plain hashing over
//! the parent material and the path string, not BIP32 math.
//!
//! Path grammar: `m / purpose' / coin_type' / account' / chain / index`, where
//! the first three segments are hardened and `chain` is 0 (receiving) or
//! 1 (change).

use crate::constants::MAX_PATH_DEPTH;
use crate::error::{Result, SimError};
use crate::keys::{key_material_from_entropy, sha256_hex, Entropy};
use crate::types::{HdNode, KeyMaterial, WatchOnlyAddress, WatchOnlyWallet};
use sha2::{Digest, Sha256, Sha512};

/// Fixed word list for simulated seed phrases.
pub const WORD_LIST: [&str; 64] = [
    "abandon", "absorb", "acid", "anchor", "arrow", "autumn", "basket", "beach",
    "bridge", "cabin", "candle", "canyon", "castle", "cedar", "circle", "cloud",
    "copper", "coral", "cradle", "desert", "drift", "eagle", "ember", "fabric",
    "falcon", "fossil", "garden", "glacier", "granite", "harbor", "hollow", "island",
    "ivory", "jungle", "lantern", "ledger", "lunar", "maple", "marble", "meadow",
    "mirror", "nectar", "orbit", "orchid", "oyster", "pebble", "prairie", "quarry",
    "raven", "ridge", "river", "saddle", "shadow", "silver", "spruce", "summit",
    "thunder", "timber", "tundra", "velvet", "violet", "walnut", "willow", "zephyr",
];

/// Map raw entropy bytes to seed words, wrapping indices modulo the list length.
pub fn seed_phrase(entropy: &Entropy, word_count: usize) -> Vec<&'static str> {
    if entropy.bytes.is_empty() {
        return Vec::new();
    }
    (0..word_count)
        .map(|i| {
            let byte = entropy.bytes[i % entropy.bytes.len()];
            WORD_LIST[byte as usize % WORD_LIST.len()]
        })
        .collect()
}

/// One segment of a parsed derivation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSegment {
    pub index: u32,
    pub hardened: bool,
}

/// A validated derivation path below the master node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath {
    pub segments: Vec<PathSegment>,
}

impl DerivationPath {
    /// Parse and validate a path string such as `m/44'/0'/0'/0/7`.
    pub fn parse(path: &str) -> Result<Self> {
        let mut parts = path.split('/');
        if parts.next() != Some("m") {
            return Err(SimError::InvalidPath(format!("{path}: must start with m")));
        }

        let mut segments = Vec::new();
        for part in parts {
            let (digits, hardened) = match part.strip_suffix('\'') {
                Some(rest) => (rest, true),
                None => (part, false),
            };
            let index: u32 = digits
                .parse()
                .map_err(|_| SimError::InvalidPath(format!("{path}: bad segment {part}")))?;
            segments.push(PathSegment { index, hardened });
        }

        if segments.is_empty() || segments.len() > MAX_PATH_DEPTH {
            return Err(SimError::InvalidPath(format!(
                "{path}: depth must be 1..={MAX_PATH_DEPTH}"
            )));
        }
        for (depth, segment) in segments.iter().enumerate() {
            let depth = depth + 1;
            if depth <= 3 && !segment.hardened {
                return Err(SimError::InvalidPath(format!(
                    "{path}: segment at depth {depth} must be hardened"
                )));
            }
            if depth >= 4 && segment.hardened {
                return Err(SimError::InvalidPath(format!(
                    "{path}: segment at depth {depth} must not be hardened"
                )));
            }
            if depth == 4 && segment.index > 1 {
                return Err(SimError::InvalidPath(format!(
                    "{path}: chain must be 0 (receiving) or 1 (change)"
                )));
            }
        }

        Ok(Self { segments })
    }

    /// Human-readable role of the node this path leads to.
    pub fn role(&self) -> String {
        let last = self.segments[self.segments.len() - 1];
        match self.segments.len() {
            1 => format!("purpose {}'", last.index),
            2 => format!("coin type {}'", last.index),
            3 => format!("account {}'", last.index),
            4 => {
                if last.index == 0 {
                    "receiving chain".to_string()
                } else {
                    "change chain".to_string()
                }
            }
            _ => format!("address index {}", last.index),
        }
    }
}

/// Derive the master node from a seed phrase. Identical words always yield the
/// identical node.
pub fn derive_master(seed_words: &[&str]) -> HdNode {
    let mut hasher = Sha512::new();
    hasher.update(seed_words.join(" ").as_bytes());
    hasher.update(b"simulated seed");
    let digest = hasher.finalize();

    let material = key_material_from_entropy(&digest[..32]);
    node_from_material("m", "master", material)
}

/// Derive a child node from parent key material along a full path. Deterministic
/// in `(parent, path)`; distinct paths never collide.
pub fn derive_child(parent: &KeyMaterial, path: &str) -> Result<HdNode> {
    let parsed = DerivationPath::parse(path)?;

    let mut hasher = Sha256::new();
    hasher.update(parent.private_key.as_bytes());
    hasher.update(b"|");
    hasher.update(path.as_bytes());
    let material = key_material_from_entropy(&hasher.finalize());

    Ok(node_from_material(path, &parsed.role(), material))
}

/// Derive `count` consecutive address nodes under an account node, on the given
/// chain (0 receiving, 1 change), starting at index zero.
pub fn derive_address_run(account: &HdNode, chain: u32, count: usize) -> Result<Vec<HdNode>> {
    let parent_material = account.key_material();
    (0..count)
        .map(|index| {
            let path = format!("{}/{}/{}", account.path, chain, index);
            derive_child(&parent_material, &path)
        })
        .collect()
}

/// Extended public key for export: public material fingerprint only.
pub fn extended_public_key(master: &HdNode) -> String {
    let digest = sha256_hex(format!("{}|{}", master.public_key, master.pub_key_hash).as_bytes());
    format!("xpub{}", &digest[..40])
}

/// Build a watch-only wallet: an extended public key plus derived addresses.
/// The structure carries no private key, so it can observe but never sign.
pub fn build_watch_only(master: &HdNode, nodes: &[HdNode]) -> WatchOnlyWallet {
    WatchOnlyWallet {
        extended_public_key: extended_public_key(master),
        addresses: nodes
            .iter()
            .map(|node| WatchOnlyAddress {
                path: node.path.clone(),
                address: node.address.clone(),
                public_key: node.public_key.clone(),
            })
            .collect(),
    }
}

fn node_from_material(path: &str, role: &str, material: KeyMaterial) -> HdNode {
    HdNode {
        path: path.to_string(),
        role: role.to_string(),
        private_key: material.private_key,
        public_key: material.public_key,
        address: material.address,
        pub_key_hash: material.pub_key_hash,
    }
}
