//! Simulation constants shared by the challenge engines

/// Satoshis per BTC
pub const SATS_PER_BTC: u64 = 100_000_000;

/// Entropy drawn for one simulated key: 256 bits
pub const KEY_ENTROPY_BITS: usize = 256;

/// Default transaction fee: 0.001 BTC
pub const DEFAULT_FEE: u64 = 100_000;

/// Default probability that a full/mining peer deems an artifact valid
pub const DEFAULT_VALIDATION_SUCCESS: f64 = 0.93;

/// Base propagation delay per peer index, in simulated milliseconds
pub const PROPAGATION_BASE_DELAY_MS: u64 = 150;

/// Truthy sentinel pushed by a successful signature check
pub const SIG_VALID: &str = "SIG_VALID";

/// Number of seed words drawn for an HD wallet
pub const DEFAULT_SEED_WORDS: usize = 12;

/// Maximum depth of a derivation path below the master node
pub const MAX_PATH_DEPTH: usize = 5;

/// Nonce attempts granted to the toy miner before it reports failure
pub const DEFAULT_MINING_ATTEMPTS: u64 = 4096;

/// Hex prefix a simulated block hash must carry to count as mined
pub const MINING_TARGET_PREFIX: &str = "0";
