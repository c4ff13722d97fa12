//! Fork construction and winner-takes-all resolution
//!
//! Two candidate tips at the same height split the active peers into disjoint
//! supporter sets. Resolution stands in for "whoever mines the next block
//! first": an injectable [`WinnerPicker`] chooses a branch (uniformly at random
//! in production), every peer adopts the winner's height, and the losing branch
//! is dropped from all state. A picker returning `None` models a round that
//! timed out without a decisive block; the caller simply runs a fresh round.

use crate::error::{Result, SimError};
use crate::types::{ChainTag, ForkBranch, SimulatedPeer};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

/// Chooses which branch wins the next-block race, or `None` when the round
/// expires inconclusively.
pub trait WinnerPicker {
    fn pick(&mut self, a: &ForkBranch, b: &ForkBranch) -> Option<ChainTag>;
}

/// Production picker: a fair coin, seedable for reproducible runs.
pub struct RandomWinner {
    rng: ChaCha8Rng,
}

impl RandomWinner {
    pub fn new() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomWinner {
    fn default() -> Self {
        Self::new()
    }
}

impl WinnerPicker for RandomWinner {
    fn pick(&mut self, a: &ForkBranch, b: &ForkBranch) -> Option<ChainTag> {
        Some(if self.rng.gen_bool(0.5) {
            a.chain_tag
        } else {
            b.chain_tag
        })
    }
}

/// Scripted picker for tests and forced demonstrations. `FixedWinner(None)`
/// models the inconclusive timeout round.
pub struct FixedWinner(pub Option<ChainTag>);

impl WinnerPicker for FixedWinner {
    fn pick(&mut self, _a: &ForkBranch, _b: &ForkBranch) -> Option<ChainTag> {
        self.0
    }
}

/// Result of a decisive fork round. The losing branch is consumed by
/// resolution; only its tag survives for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkResolution {
    pub winner: ForkBranch,
    pub discarded: ChainTag,
    pub adopted_height: u64,
}

/// Open a fork: two branches at the same height, mined by different peers, with
/// disjoint supporter sets covering the active peers (alternating assignment).
pub fn open_fork(
    height: u64,
    miner_a: &str,
    miner_b: &str,
    transaction_counts: (usize, usize),
    peers: &[SimulatedPeer],
) -> (ForkBranch, ForkBranch) {
    let mut supporters_a = Vec::new();
    let mut supporters_b = Vec::new();
    for (index, peer) in peers.iter().filter(|p| p.is_active()).enumerate() {
        if index % 2 == 0 {
            supporters_a.push(peer.name.clone());
        } else {
            supporters_b.push(peer.name.clone());
        }
    }

    debug!(height, miner_a, miner_b, "fork opened");
    (
        ForkBranch {
            chain_tag: ChainTag::A,
            number: height,
            mined_by: miner_a.to_string(),
            transaction_count: transaction_counts.0,
            supporters: supporters_a,
        },
        ForkBranch {
            chain_tag: ChainTag::B,
            number: height,
            mined_by: miner_b.to_string(),
            transaction_count: transaction_counts.1,
            supporters: supporters_b,
        },
    )
}

/// Resolve a fork. On a decisive pick every peer, whichever branch it
/// supported, adopts the winning height; the losing branch is discarded whole.
/// An inconclusive round leaves all peer state untouched.
pub fn resolve_fork(
    branch_a: ForkBranch,
    branch_b: ForkBranch,
    peers: &mut [SimulatedPeer],
    picker: &mut dyn WinnerPicker,
) -> Result<ForkResolution> {
    let Some(tag) = picker.pick(&branch_a, &branch_b) else {
        debug!("fork round expired with no winner");
        return Err(SimError::InconclusiveRound);
    };

    let (winner, loser) = match tag {
        ChainTag::A => (branch_a, branch_b),
        ChainTag::B => (branch_b, branch_a),
    };

    for peer in peers.iter_mut() {
        peer.block_height = winner.number;
    }

    info!(winner = %winner.chain_tag, discarded = %loser.chain_tag, height = winner.number,
        "fork resolved");
    Ok(ForkResolution {
        adopted_height: winner.number,
        discarded: loser.chain_tag,
        winner,
    })
}
