//! Consensus challenge: propagation ordering, vote threshold, fork convergence

use chainlab::config::SimConfig;
use chainlab::error::SimError;
use chainlab::fork::FixedWinner;
use chainlab::network::{propagation_schedule, tally, FixedPolicy};
use chainlab::simulator::ConsensusSimulator;
use chainlab::types::{ChainTag, ConsensusVote, VoteDecision};

fn forced(winner: Option<ChainTag>, outcomes: Vec<bool>) -> ConsensusSimulator {
    let mut sim = ConsensusSimulator::new(SimConfig::default());
    sim.set_policy(Box::new(FixedPolicy::new(outcomes)));
    sim.set_picker(Box::new(FixedWinner(winner)));
    sim
}

#[test]
fn test_consensus_challenge_end_to_end() {
    let mut sim = forced(Some(ChainTag::A), vec![]);

    let peer_count = sim.setup_network().unwrap().len();
    assert_eq!(peer_count, 7);

    let tx = sim.submit_transaction(50_000_000).unwrap().clone();
    assert!(sim
        .peers()
        .iter()
        .all(|p| p.mempool.iter().any(|seen| seen.id == tx.id)));

    let block = sim.mine_candidate().unwrap().clone();
    assert_eq!(block.number, 1);
    assert!(block.transactions.iter().any(|t| t.id == tx.id));
    assert!(block.mined_by.starts_with("miner"));

    let outcome = sim.vote_and_commit().unwrap();
    assert!(outcome.accepted);
    assert_eq!(sim.votes().len(), 7);
    assert!(sim.peers().iter().all(|p| p.block_height == 1));
    assert!(sim.peers().iter().all(|p| p.mempool.is_empty()));

    let (a, b) = sim.open_fork().unwrap();
    assert_eq!(a.number, b.number);
    let a_supporters = a.supporters.clone();
    assert!(a_supporters.iter().all(|name| !b.supporters.contains(name)));

    let resolution = sim.resolve().unwrap().clone();
    assert_eq!(resolution.winner.chain_tag, ChainTag::A);
    assert_eq!(resolution.discarded, ChainTag::B);

    // Fork convergence: one height everywhere, losing branch gone
    assert!(sim.peers().iter().all(|p| p.block_height == resolution.adopted_height));
    assert!(sim.fork().is_none());
    assert!(sim.session().challenge.completed);
}

#[test]
fn test_majority_reject_leaves_peers_untouched() {
    // All five validating peers reject; the two SPV accepts are a minority
    let mut sim = forced(Some(ChainTag::A), vec![false; 5]);
    sim.setup_network().unwrap();
    sim.submit_transaction(50_000_000).unwrap();
    sim.mine_candidate().unwrap();

    let err = sim.vote_and_commit().unwrap_err();
    assert!(matches!(err, SimError::ConsensusRejected { accepts: 2, total: 7 }));
    assert!(sim.peers().iter().all(|p| p.block_height == 0));
    assert!(sim.peers().iter().all(|p| !p.mempool.is_empty()));

    // The session stayed on the voting step; a cleaner round commits
    assert_eq!(sim.session().current_step, 4);
    assert!(sim.vote_and_commit().unwrap().accepted);
}

#[test]
fn test_threshold_needs_strict_majority() {
    let vote = |decision| ConsensusVote {
        peer_id: 0,
        peer_name: "peer".to_string(),
        decision,
        reason: String::new(),
    };
    let round = |accepts: usize, rejects: usize| {
        let votes: Vec<_> = (0..accepts)
            .map(|_| vote(VoteDecision::Accept))
            .chain((0..rejects).map(|_| vote(VoteDecision::Reject)))
            .collect();
        tally(&votes)
    };

    assert!(round(4, 3).accepted);
    assert!(round(7, 0).accepted);
    assert!(!round(3, 3).accepted); // tie
    assert!(!round(3, 4).accepted); // minority
    assert!(!round(0, 0).accepted); // no votes, nothing to accept
}

#[test]
fn test_propagation_order_follows_peer_index() {
    let mut sim = forced(Some(ChainTag::A), vec![]);
    sim.setup_network().unwrap();

    let schedule = propagation_schedule(sim.peers(), 150);
    let delays: Vec<u64> = schedule.iter().map(|e| e.delay_ms).collect();
    assert_eq!(delays, vec![0, 150, 300, 450, 600, 750, 900]);
}

#[test]
fn test_inconclusive_fork_round_repeats_until_decisive() {
    let mut sim = forced(None, vec![]);
    sim.setup_network().unwrap();
    sim.submit_transaction(50_000_000).unwrap();
    sim.mine_candidate().unwrap();
    sim.vote_and_commit().unwrap();
    sim.open_fork().unwrap();

    // Two expired rounds in a row, then a winner
    assert!(matches!(sim.resolve(), Err(SimError::InconclusiveRound)));
    assert!(matches!(sim.resolve(), Err(SimError::InconclusiveRound)));
    assert!(sim.fork().is_some());

    sim.set_picker(Box::new(FixedWinner(Some(ChainTag::B))));
    let resolution = sim.resolve().unwrap();
    assert_eq!(resolution.winner.chain_tag, ChainTag::B);
    assert!(sim.session().challenge.completed);
}

#[test]
fn test_reset_rebuilds_a_clean_network() {
    let mut sim = forced(Some(ChainTag::A), vec![]);
    sim.setup_network().unwrap();
    sim.submit_transaction(50_000_000).unwrap();

    sim.reset();
    assert_eq!(sim.session().current_step, 1);
    assert!(sim.peers().is_empty());
    assert!(sim.transaction().is_none());

    assert_eq!(sim.setup_network().unwrap().len(), 7);
    assert!(sim.peers().iter().all(|p| p.mempool.is_empty() && p.block_height == 0));
}
