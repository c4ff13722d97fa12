//! Block assembly and toy nonce search
//!
//! The merkle root is real (pairwise SHA-256 over transaction ids); the
//! difficulty is not. The target is a single leading hex digit so a mining round
//! visibly succeeds within a handful of attempts during a lesson.

use crate::constants::MINING_TARGET_PREFIX;
use crate::keys::sha256_hex;
use crate::types::{Block, Transaction};
use tracing::debug;

/// Outcome of a bounded nonce search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningResult {
    Success,
    Failure,
}

/// Assemble a candidate block over the given transactions. The nonce starts at
/// zero and is set by [`mine_block`].
pub fn assemble_block(
    number: u64,
    previous_hash: &str,
    transactions: Vec<Transaction>,
    mined_by: &str,
) -> Block {
    let merkle_root = merkle_root(&transactions);
    Block {
        number,
        previous_hash: previous_hash.to_string(),
        merkle_root,
        transactions,
        mined_by: mined_by.to_string(),
        nonce: 0,
    }
}

/// Pairwise SHA-256 tree over transaction ids; odd layers duplicate the last
/// entry, as in the real construction.
pub fn merkle_root(transactions: &[Transaction]) -> String {
    if transactions.is_empty() {
        return sha256_hex(b"empty");
    }

    let mut layer: Vec<String> = transactions
        .iter()
        .map(|tx| sha256_hex(tx.id.as_bytes()))
        .collect();

    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            layer.push(layer.last().cloned().unwrap_or_default());
        }
        layer = layer
            .chunks(2)
            .map(|pair| sha256_hex(format!("{}{}", pair[0], pair[1]).as_bytes()))
            .collect();
    }
    layer.remove(0)
}

/// Hash of the simulated block header fields.
pub fn block_hash(block: &Block) -> String {
    let preimage = format!(
        "{}:{}:{}:{}:{}",
        block.number, block.previous_hash, block.merkle_root, block.mined_by, block.nonce
    );
    sha256_hex(preimage.as_bytes())
}

/// Search for a nonce whose block hash meets the toy target. Returns the block
/// with the found nonce, or unchanged with `Failure` when attempts run out.
pub fn mine_block(mut block: Block, max_attempts: u64) -> (Block, MiningResult) {
    for nonce in 0..max_attempts {
        block.nonce = nonce;
        if block_hash(&block).starts_with(MINING_TARGET_PREFIX) {
            debug!(number = block.number, nonce, "nonce found");
            return (block, MiningResult::Success);
        }
    }
    (block, MiningResult::Failure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            inputs: vec![],
            outputs: vec![],
            fee: 0,
            timestamp: 0,
        }
    }

    #[test]
    fn test_merkle_root_deterministic() {
        let txs = vec![tx("a"), tx("b"), tx("c")];
        assert_eq!(merkle_root(&txs), merkle_root(&txs));
    }

    #[test]
    fn test_merkle_root_depends_on_order() {
        assert_ne!(merkle_root(&[tx("a"), tx("b")]), merkle_root(&[tx("b"), tx("a")]));
    }

    #[test]
    fn test_merkle_root_single_and_empty() {
        // A single transaction is its own root
        assert_eq!(merkle_root(&[tx("a")]), sha256_hex(b"a"));
        assert_eq!(merkle_root(&[]), sha256_hex(b"empty"));
    }

    #[test]
    fn test_mine_block_succeeds_within_budget() {
        let block = assemble_block(1, "genesis", vec![tx("a")], "miner-1");
        // 1-in-16 per attempt; 4096 attempts cannot realistically fail
        let (mined, result) = mine_block(block, 4096);
        assert_eq!(result, MiningResult::Success);
        assert!(block_hash(&mined).starts_with(MINING_TARGET_PREFIX));
    }

    #[test]
    fn test_mine_block_can_report_failure() {
        let block = assemble_block(1, "genesis", vec![tx("a")], "miner-1");
        // With zero attempts the search cannot succeed
        let (_, result) = mine_block(block, 0);
        assert_eq!(result, MiningResult::Failure);
    }

    #[test]
    fn test_block_hash_changes_with_nonce() {
        let mut block = assemble_block(2, "prev", vec![], "miner-2");
        let h0 = block_hash(&block);
        block.nonce = 1;
        assert_ne!(h0, block_hash(&block));
    }
}
