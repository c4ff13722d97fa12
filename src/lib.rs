//! # chainlab
//!
//! Step-driven Bitcoin protocol simulators for interactive lessons.
//!
//! Three challenge engines share one architectural shape: a forward-only,
//! user-advanced step machine producing structured artifacts (keys, UTXOs,
//! transactions, scripts, blocks, votes, derivation paths) that the next step
//! consumes.
//!
//! - [`simulator::PaymentSimulator`] — build and validate a P2PKH payment:
//!   key generation, first-fit UTXO selection, script execution with a full
//!   trace, then a network consensus round.
//! - [`simulator::ConsensusSimulator`] — propagate a transaction, mine a
//!   candidate block, tally peer votes, then open and resolve a fork.
//! - [`simulator::HdWalletSimulator`] — seed phrase, master key, hardened
//!   account path, address runs, watch-only export.
//!
//! ## Design principles
//!
//! 1. **Explicit sessions**: every simulator owns its state; all mutation goes
//!    through gated step actions, and `reset()` is the only way back.
//! 2. **Injectable randomness**: validation outcomes and fork races are
//!    strategy objects, so lessons and tests can script them.
//! 3. **Simulated cryptography**: keys and hashes teach shape and determinism,
//!    not security; nothing here signs real transactions.
//!
//! ## Usage
//!
//! ```rust
//! use chainlab::config::SimConfig;
//! use chainlab::network::FixedPolicy;
//! use chainlab::simulator::PaymentSimulator;
//!
//! let mut sim = PaymentSimulator::new(SimConfig::default());
//! sim.set_policy(Box::new(FixedPolicy::accept_all()));
//!
//! sim.generate_participants().unwrap();
//! sim.fund_sender(&[80_000_000, 50_000_000, 20_000_000]).unwrap();
//! let tx = sim.build_payment(100_000_000).unwrap();
//! assert!(tx.conserves_value());
//!
//! assert!(sim.sign_and_validate().unwrap().valid);
//! assert!(sim.broadcast().unwrap().accepted);
//! assert!(sim.session().challenge.completed);
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod fork;
pub mod hd;
pub mod keys;
pub mod mining;
pub mod network;
pub mod script;
pub mod session;
pub mod simulator;
pub mod transaction;
pub mod types;

// Re-export commonly used types
pub use config::SimConfig;
pub use constants::*;
pub use error::{Result, SimError};
pub use simulator::{ConsensusSimulator, HdWalletSimulator, PaymentSimulator};
pub use types::*;
