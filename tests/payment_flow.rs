//! End-to-end payment challenge: keys -> UTXOs -> transaction -> scripts -> consensus

use chainlab::config::SimConfig;
use chainlab::error::SimError;
use chainlab::network::FixedPolicy;
use chainlab::simulator::PaymentSimulator;
use chainlab::types::VoteDecision;
use std::cell::Cell;
use std::rc::Rc;

const SATS_PER_BTC: u64 = 100_000_000;

fn btc(value: f64) -> u64 {
    (value * SATS_PER_BTC as f64).round() as u64
}

fn accepting_simulator() -> PaymentSimulator {
    let mut sim = PaymentSimulator::new(SimConfig::default());
    sim.set_policy(Box::new(FixedPolicy::accept_all()));
    sim
}

#[test]
fn test_payment_challenge_end_to_end() {
    let completions = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&completions);

    let mut sim = accepting_simulator();
    sim.on_complete(Box::new(move || counter.set(counter.get() + 1)));

    let (sender, recipient) = {
        let (s, r) = sim.generate_participants().unwrap();
        (s.clone(), r.clone())
    };
    assert_ne!(sender.address, recipient.address);

    sim.fund_sender(&[btc(0.8), btc(0.5), btc(0.2)]).unwrap();
    assert_eq!(sim.utxos().len(), 3);

    // The worked selection scenario: 1.0 BTC payment at a 0.001 BTC fee picks
    // 0.8 + 0.5 and returns 0.299 BTC in change.
    let tx = sim.build_payment(btc(1.0)).unwrap().clone();
    assert_eq!(tx.inputs.len(), 2);
    assert_eq!(tx.total_input(), btc(1.3));
    assert_eq!(tx.outputs[0].address, recipient.address);
    assert_eq!(tx.outputs[0].amount, btc(1.0));
    assert_eq!(tx.outputs[1].address, sender.address);
    assert_eq!(tx.outputs[1].amount, btc(0.299));
    assert_eq!(tx.fee, btc(0.001));
    assert!(tx.conserves_value());

    let outcome = sim.sign_and_validate().unwrap().clone();
    assert!(outcome.valid);
    assert!(!outcome.trace.is_empty());

    // The spent inputs flipped and the new outputs joined the ledger view
    assert!(sim.utxos()[0].spent);
    assert!(sim.utxos()[1].spent);
    assert!(!sim.utxos()[2].spent);
    assert_eq!(sim.utxos().len(), 5);

    let round = sim.broadcast().unwrap();
    assert!(round.accepted);
    assert_eq!(round.total, 7);

    // Light peers do not validate; they accept on header trust
    assert!(sim
        .votes()
        .iter()
        .filter(|v| v.peer_name.starts_with("spv"))
        .all(|v| v.decision == VoteDecision::Accept));

    // Every active peer saw the transaction
    assert!(sim
        .peers()
        .iter()
        .all(|p| p.mempool.iter().any(|seen| seen.id == tx.id)));

    assert!(sim.session().challenge.completed);
    assert!(sim.session().challenge.success);
    assert_eq!(completions.get(), 1);
}

#[test]
fn test_steps_enforce_order_and_reset_restores() {
    let mut sim = accepting_simulator();

    assert!(matches!(
        sim.broadcast(),
        Err(SimError::StepNotReached { required: 5, current: 1 })
    ));

    sim.generate_participants().unwrap();
    sim.fund_sender(&[btc(0.5)]).unwrap();

    sim.reset();
    assert_eq!(sim.session().current_step, 1);
    assert!(sim.utxos().is_empty());
    assert!(sim.transaction().is_none());
    assert!(sim.outcome().is_none());

    // The whole flow works again after the reset
    sim.generate_participants().unwrap();
    sim.fund_sender(&[btc(0.8), btc(0.5)]).unwrap();
    sim.build_payment(btc(1.0)).unwrap();
    assert!(sim.sign_and_validate().unwrap().valid);
    assert!(sim.broadcast().unwrap().accepted);
}

#[test]
fn test_insufficient_funds_never_emits_a_transaction() {
    let mut sim = accepting_simulator();
    sim.generate_participants().unwrap();
    sim.fund_sender(&[btc(0.1), btc(0.2)]).unwrap();

    let err = sim.build_payment(btc(1.0)).unwrap_err();
    match err {
        SimError::InsufficientFunds { requested, available } => {
            assert_eq!(requested, btc(1.0) + btc(0.001));
            assert_eq!(available, btc(0.3));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(sim.transaction().is_none());
}

#[test]
fn test_session_snapshot_serializes_for_host() {
    let mut sim = accepting_simulator();
    sim.generate_participants().unwrap();

    let snapshot = serde_json::to_value(sim.session()).unwrap();
    assert_eq!(snapshot["current_step"], 2);
    assert_eq!(snapshot["processing"], false);
    assert_eq!(snapshot["challenge"]["completed"], false);
}
