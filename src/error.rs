//! Error types for the simulation engine
//!
//! Everything here is recoverable inside a running session: the host retries the
//! step or calls `reset()`. Script validation failure is deliberately *not* an
//! error variant; the interpreter always returns a [`crate::script::ScriptOutcome`].

use crate::types::Amount;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("insufficient funds: requested {requested} sats, only {available} sats spendable")]
    InsufficientFunds { requested: Amount, available: Amount },

    #[error("consensus rejected: {accepts} of {total} peers accepted")]
    ConsensusRejected { accepts: usize, total: usize },

    #[error("round ended without a decisive outcome")]
    InconclusiveRound,

    #[error("a step action is already in progress")]
    SessionBusy,

    #[error("step {required} not reached (session is at step {current})")]
    StepNotReached { required: u32, current: u32 },

    #[error("invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("UTXO already spent: {0}")]
    UtxoAlreadySpent(String),

    #[error("UTXO not found: {0}")]
    UnknownUtxo(String),

    #[error("step action not available: {0}")]
    MissingArtifact(String),
}

pub type Result<T> = std::result::Result<T, SimError>;
