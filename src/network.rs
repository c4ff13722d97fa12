//! Simulated peer network: propagation, validation votes, consensus commit
//!
//! Propagation is modeled as explicit ordering values (per-peer delays consumed
//! by one scheduler loop), never as real timers, so round behavior is observable
//! and reproducible. Validation outcomes for full and mining peers go through an
//! injectable [`ValidationPolicy`]; light peers trust headers and always accept.

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::types::{
    Artifact, Block, ConsensusVote, PeerId, PeerKind, PeerStatus, SimulatedPeer, Transaction,
    VoteDecision,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;
use tracing::debug;

/// How a validating peer judges an artifact. Implementations decide accept or
/// reject and provide the stated reason.
pub trait ValidationPolicy {
    fn assess(&mut self, peer: &SimulatedPeer, artifact: &Artifact) -> (VoteDecision, String);
}

const REJECT_REASONS: [&str; 4] = [
    "signature check failed",
    "suspected double spend",
    "script execution failed",
    "merkle root mismatch",
];

/// Production policy: accepts with a configured probability, otherwise rejects
/// with a randomly chosen stated reason. Seedable for reproducible runs.
pub struct RandomPolicy {
    success_rate: f64,
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate,
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    pub fn seeded(success_rate: f64, seed: u64) -> Self {
        Self {
            success_rate,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl ValidationPolicy for RandomPolicy {
    fn assess(&mut self, peer: &SimulatedPeer, artifact: &Artifact) -> (VoteDecision, String) {
        if self.rng.gen_bool(self.success_rate.clamp(0.0, 1.0)) {
            (
                VoteDecision::Accept,
                format!("validated {}", artifact.describe()),
            )
        } else {
            let reason = REJECT_REASONS[self.rng.gen_range(0..REJECT_REASONS.len())];
            debug!(peer = %peer.name, reason, "peer rejected artifact");
            (VoteDecision::Reject, reason.to_string())
        }
    }
}

/// Scripted policy for tests and forced lesson demonstrations: pops one outcome
/// per assessment, accepting once the script is exhausted.
pub struct FixedPolicy {
    outcomes: VecDeque<bool>,
}

impl FixedPolicy {
    pub fn new(outcomes: impl IntoIterator<Item = bool>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
        }
    }

    pub fn accept_all() -> Self {
        Self {
            outcomes: VecDeque::new(),
        }
    }
}

impl ValidationPolicy for FixedPolicy {
    fn assess(&mut self, _peer: &SimulatedPeer, artifact: &Artifact) -> (VoteDecision, String) {
        match self.outcomes.pop_front() {
            Some(false) => (VoteDecision::Reject, REJECT_REASONS[0].to_string()),
            _ => (
                VoteDecision::Accept,
                format!("validated {}", artifact.describe()),
            ),
        }
    }
}

/// One entry of the propagation schedule: the peer and the simulated delay
/// before the artifact reaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationEvent {
    pub peer_id: PeerId,
    pub delay_ms: u64,
}

/// Staggered delivery order: delay grows with peer index, modeling latency
/// ordering without wall-clock timers.
pub fn propagation_schedule(peers: &[SimulatedPeer], base_delay_ms: u64) -> Vec<PropagationEvent> {
    peers
        .iter()
        .enumerate()
        .map(|(index, peer)| PropagationEvent {
            peer_id: peer.id,
            delay_ms: base_delay_ms * index as u64,
        })
        .collect()
}

/// Build the standard lesson network from the configured peer mix.
pub fn standard_network(config: &SimConfig) -> Vec<SimulatedPeer> {
    let mut peers = Vec::with_capacity(config.peer_count());
    let mut id: PeerId = 0;
    let mut push = |peers: &mut Vec<SimulatedPeer>, kind: PeerKind, ordinal: usize| {
        peers.push(SimulatedPeer {
            id,
            kind,
            name: format!("{}-{}", kind, ordinal + 1),
            block_height: 0,
            mempool: Vec::new(),
            validating: false,
            status: PeerStatus::Active,
        });
        id += 1;
    };

    for i in 0..config.full_peers {
        push(&mut peers, PeerKind::Full, i);
    }
    for i in 0..config.light_peers {
        push(&mut peers, PeerKind::Light, i);
    }
    for i in 0..config.mining_peers {
        push(&mut peers, PeerKind::Mining, i);
    }
    peers
}

/// Deliver a transaction to every active peer's mempool in schedule order.
pub fn broadcast_transaction(peers: &mut [SimulatedPeer], tx: &Transaction, base_delay_ms: u64) {
    let schedule = propagation_schedule(peers, base_delay_ms);
    for event in schedule {
        let Some(peer) = peers.iter_mut().find(|p| p.id == event.peer_id) else {
            continue;
        };
        if !peer.is_active() {
            continue;
        }
        if !peer.mempool.iter().any(|seen| seen.id == tx.id) {
            peer.mempool.push(tx.clone());
            debug!(peer = %peer.name, delay_ms = event.delay_ms, tx = %tx.id, "transaction propagated");
        }
    }
}

/// Collect one vote per active peer, in schedule order. Light peers accept
/// unconditionally (SPV trust); full and mining peers consult the policy.
pub fn collect_votes(
    peers: &mut [SimulatedPeer],
    artifact: &Artifact,
    policy: &mut dyn ValidationPolicy,
    base_delay_ms: u64,
) -> Vec<ConsensusVote> {
    let schedule = propagation_schedule(peers, base_delay_ms);
    let mut votes = Vec::new();

    for event in schedule {
        let Some(index) = peers.iter().position(|p| p.id == event.peer_id) else {
            continue;
        };
        if !peers[index].is_active() {
            continue;
        }

        peers[index].validating = true;
        let (decision, reason) = match peers[index].kind {
            PeerKind::Light => (
                VoteDecision::Accept,
                "header chain OK (SPV, not validating scripts)".to_string(),
            ),
            PeerKind::Full | PeerKind::Mining => policy.assess(&peers[index], artifact),
        };
        peers[index].validating = false;

        votes.push(ConsensusVote {
            peer_id: peers[index].id,
            peer_name: peers[index].name.clone(),
            decision,
            reason,
        });
    }

    votes
}

/// Aggregated result of one voting round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    pub accepted: bool,
    pub accepts: usize,
    pub rejects: usize,
    pub total: usize,
}

/// Strict-majority tally, evaluated only once every expected vote has arrived.
/// A tie rejects.
pub fn tally(votes: &[ConsensusVote]) -> RoundOutcome {
    let accepts = votes
        .iter()
        .filter(|v| v.decision == VoteDecision::Accept)
        .count();
    let total = votes.len();
    RoundOutcome {
        accepted: accepts * 2 > total,
        accepts,
        rejects: total - accepts,
        total,
    }
}

/// Commit an accepted block: every peer adopts its height and drops its
/// transactions from their mempools. Callers must not invoke this on a
/// rejected round; rejection leaves all peer state untouched.
pub fn commit_block(peers: &mut [SimulatedPeer], block: &Block) {
    for peer in peers.iter_mut() {
        peer.block_height = block.number;
        peer.mempool
            .retain(|tx| !block.transactions.iter().any(|included| included.id == tx.id));
    }
    debug!(number = block.number, mined_by = %block.mined_by, "block committed network-wide");
}

/// Run a full voting round and commit on acceptance. On rejection nothing
/// changes and the caller may re-propose the same artifact.
pub fn propose_block(
    peers: &mut [SimulatedPeer],
    block: &Block,
    policy: &mut dyn ValidationPolicy,
    base_delay_ms: u64,
) -> Result<(Vec<ConsensusVote>, RoundOutcome)> {
    let artifact = Artifact::Block(block.clone());
    let votes = collect_votes(peers, &artifact, policy, base_delay_ms);
    let outcome = tally(&votes);

    if !outcome.accepted {
        return Err(SimError::ConsensusRejected {
            accepts: outcome.accepts,
            total: outcome.total,
        });
    }
    commit_block(peers, block);
    Ok((votes, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mining::assemble_block;

    fn test_network() -> Vec<SimulatedPeer> {
        standard_network(&SimConfig::default())
    }

    fn test_block(peers_txs: Vec<Transaction>) -> Block {
        assemble_block(1, "genesis", peers_txs, "miner-1")
    }

    #[test]
    fn test_standard_network_mix() {
        let peers = test_network();
        assert_eq!(peers.len(), 7);
        assert_eq!(peers.iter().filter(|p| p.kind == PeerKind::Full).count(), 3);
        assert_eq!(peers.iter().filter(|p| p.kind == PeerKind::Light).count(), 2);
        assert_eq!(peers.iter().filter(|p| p.kind == PeerKind::Mining).count(), 2);
        // Ids and names are unique
        let mut names: Vec<_> = peers.iter().map(|p| p.name.clone()).collect();
        names.dedup();
        assert_eq!(names.len(), 7);
    }

    #[test]
    fn test_propagation_schedule_is_staggered() {
        let peers = test_network();
        let schedule = propagation_schedule(&peers, 150);
        assert_eq!(schedule.len(), peers.len());
        assert_eq!(schedule[0].delay_ms, 0);
        assert_eq!(schedule[3].delay_ms, 450);
        // Strictly increasing order
        assert!(schedule.windows(2).all(|w| w[0].delay_ms < w[1].delay_ms));
    }

    #[test]
    fn test_light_peers_always_accept() {
        let mut peers = test_network();
        let block = test_block(vec![]);
        // Every validating peer rejects; only the two light peers accept
        let mut policy = FixedPolicy::new(vec![false; 5]);
        let votes = collect_votes(&mut peers, &Artifact::Block(block), &mut policy, 150);

        let accepts: Vec<_> = votes
            .iter()
            .filter(|v| v.decision == VoteDecision::Accept)
            .collect();
        assert_eq!(accepts.len(), 2);
        assert!(accepts.iter().all(|v| v.peer_name.starts_with("spv")));
    }

    #[test]
    fn test_inactive_peer_casts_no_vote() {
        let mut peers = test_network();
        peers[0].status = PeerStatus::Inactive;
        let block = test_block(vec![]);
        let mut policy = FixedPolicy::accept_all();
        let votes = collect_votes(&mut peers, &Artifact::Block(block), &mut policy, 150);
        assert_eq!(votes.len(), 6);
    }

    #[test]
    fn test_tally_strict_majority() {
        let vote = |decision| ConsensusVote {
            peer_id: 0,
            peer_name: "p".to_string(),
            decision,
            reason: String::new(),
        };

        // 4 of 7 accepts
        let votes: Vec<_> = (0..4)
            .map(|_| vote(VoteDecision::Accept))
            .chain((0..3).map(|_| vote(VoteDecision::Reject)))
            .collect();
        assert!(tally(&votes).accepted);

        // 3 of 6 is a tie: reject
        let votes: Vec<_> = (0..3)
            .map(|_| vote(VoteDecision::Accept))
            .chain((0..3).map(|_| vote(VoteDecision::Reject)))
            .collect();
        assert!(!tally(&votes).accepted);

        // Minority rejects
        let votes: Vec<_> = (0..2)
            .map(|_| vote(VoteDecision::Accept))
            .chain((0..5).map(|_| vote(VoteDecision::Reject)))
            .collect();
        assert!(!tally(&votes).accepted);
    }

    #[test]
    fn test_propose_block_accept_commits_everywhere() {
        let mut peers = test_network();
        let tx = Transaction {
            id: "tx-1".to_string(),
            inputs: vec![],
            outputs: vec![],
            fee: 0,
            timestamp: 0,
        };
        broadcast_transaction(&mut peers, &tx, 150);
        assert!(peers.iter().all(|p| p.mempool.len() == 1));

        let block = test_block(vec![tx]);
        let mut policy = FixedPolicy::accept_all();
        let (votes, outcome) = propose_block(&mut peers, &block, &mut policy, 150).unwrap();

        assert_eq!(votes.len(), 7);
        assert!(outcome.accepted);
        assert!(peers.iter().all(|p| p.block_height == 1));
        assert!(peers.iter().all(|p| p.mempool.is_empty()));
    }

    #[test]
    fn test_propose_block_reject_mutates_nothing() {
        let mut peers = test_network();
        let tx = Transaction {
            id: "tx-1".to_string(),
            inputs: vec![],
            outputs: vec![],
            fee: 0,
            timestamp: 0,
        };
        broadcast_transaction(&mut peers, &tx, 150);

        let block = test_block(vec![tx]);
        let mut policy = FixedPolicy::new(vec![false; 5]);
        let err = propose_block(&mut peers, &block, &mut policy, 150).unwrap_err();

        assert!(matches!(err, SimError::ConsensusRejected { accepts: 2, total: 7 }));
        assert!(peers.iter().all(|p| p.block_height == 0));
        assert!(peers.iter().all(|p| p.mempool.len() == 1));
    }

    #[test]
    fn test_broadcast_is_idempotent_per_tx() {
        let mut peers = test_network();
        let tx = Transaction {
            id: "tx-1".to_string(),
            inputs: vec![],
            outputs: vec![],
            fee: 0,
            timestamp: 0,
        };
        broadcast_transaction(&mut peers, &tx, 150);
        broadcast_transaction(&mut peers, &tx, 150);
        assert!(peers.iter().all(|p| p.mempool.len() == 1));
    }

    #[test]
    fn test_random_policy_seeded_is_reproducible() {
        let peers = test_network();
        let artifact = Artifact::Block(test_block(vec![]));
        let mut a = RandomPolicy::seeded(0.5, 42);
        let mut b = RandomPolicy::seeded(0.5, 42);
        for _ in 0..16 {
            assert_eq!(a.assess(&peers[0], &artifact).0, b.assess(&peers[0], &artifact).0);
        }
    }
}
