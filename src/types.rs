//! Core data model for the challenge simulators

use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount type: integer satoshis
pub type Amount = u64;

/// Peer identifier within one simulated network
pub type PeerId = u32;

/// Simulated key material for one identity. The public key, public-key hash and
/// address are deterministic functions of the private-key bytes; none of them is
/// real cryptography.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMaterial {
    pub private_key: String,
    pub public_key: String,
    pub address: String,
    pub pub_key_hash: String,
}

/// A spendable output in the append-only ledger view. Only `spent` ever mutates,
/// and only from false to true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub id: String,
    pub owner_address: String,
    pub amount: Amount,
    pub spent: bool,
    pub locking_script: Script,
    pub pub_key_hash: String,
}

/// Transaction input: references a prior output and carries its locking script
/// so the spender knows which condition to satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub previous_utxo_id: String,
    pub amount: Amount,
    pub locking_script: Script,
}

/// Transaction output: an amount locked to an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub amount: Amount,
    pub locking_script: Script,
}

/// A constructed transaction. Invariant: `sum(inputs) == sum(outputs) + fee`.
/// Immutable once built; the witness is attached separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub fee: Amount,
    pub timestamp: u64,
}

impl Transaction {
    pub fn total_input(&self) -> Amount {
        self.inputs.iter().map(|i| i.amount).sum()
    }

    pub fn total_output(&self) -> Amount {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    /// Conservation check: inputs fund outputs plus the fee, exactly.
    pub fn conserves_value(&self) -> bool {
        self.total_input() == self.total_output() + self.fee
    }
}

/// Spend authorization attached to a transaction, kept separate from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub signature: String,
    pub public_key: String,
    pub unlocking_script: Script,
}

/// One token of a script. Unlocking scripts contain only the push variants;
/// locking scripts mix operators and pushed literals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptToken {
    PushSig(String),
    PushPubKey(String),
    PushHash(String),
    Dup,
    Hash160,
    EqualVerify,
    CheckSig,
}

impl fmt::Display for ScriptToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptToken::PushSig(sig) => write!(f, "<sig {}>", abbreviate(sig)),
            ScriptToken::PushPubKey(pk) => write!(f, "<pubkey {}>", abbreviate(pk)),
            ScriptToken::PushHash(h) => write!(f, "<hash {}>", abbreviate(h)),
            ScriptToken::Dup => write!(f, "OP_DUP"),
            ScriptToken::Hash160 => write!(f, "OP_HASH160"),
            ScriptToken::EqualVerify => write!(f, "OP_EQUALVERIFY"),
            ScriptToken::CheckSig => write!(f, "OP_CHECKSIG"),
        }
    }
}

/// Ordered token sequence forming an unlocking or locking script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script(pub Vec<ScriptToken>);

impl Script {
    pub fn tokens(&self) -> &[ScriptToken] {
        &self.0
    }

    /// The hash literal embedded in a P2PKH-style locking script, if any.
    pub fn embedded_hash(&self) -> Option<&str> {
        self.0.iter().find_map(|t| match t {
            ScriptToken::PushHash(h) => Some(h.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", rendered.join(" "))
    }
}

/// Kind of simulated network peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerKind {
    Full,
    Light,
    Mining,
}

impl fmt::Display for PeerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerKind::Full => write!(f, "full"),
            PeerKind::Light => write!(f, "spv"),
            PeerKind::Mining => write!(f, "miner"),
        }
    }
}

/// Peers are never removed from the set; a peer caught misbehaving is marked
/// inactive and stops participating in rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerStatus {
    Active,
    Inactive,
}

/// One simulated network peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedPeer {
    pub id: PeerId,
    pub kind: PeerKind,
    pub name: String,
    pub block_height: u64,
    pub mempool: Vec<Transaction>,
    pub validating: bool,
    pub status: PeerStatus,
}

impl SimulatedPeer {
    pub fn is_active(&self) -> bool {
        self.status == PeerStatus::Active
    }
}

/// Accept/reject decision cast by one peer in one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteDecision {
    Accept,
    Reject,
}

/// One peer's vote on a proposed artifact; recomputed every round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusVote {
    pub peer_id: PeerId,
    pub peer_name: String,
    pub decision: VoteDecision,
    pub reason: String,
}

/// A simulated block, immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    pub previous_hash: String,
    pub merkle_root: String,
    pub transactions: Vec<Transaction>,
    pub mined_by: String,
    pub nonce: u64,
}

/// Label distinguishing the two competing fork branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainTag {
    A,
    B,
}

impl fmt::Display for ChainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainTag::A => write!(f, "A"),
            ChainTag::B => write!(f, "B"),
        }
    }
}

/// One side of a temporary fork: a candidate tip and the peers backing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkBranch {
    pub chain_tag: ChainTag,
    pub number: u64,
    pub mined_by: String,
    pub transaction_count: usize,
    pub supporters: Vec<String>,
}

/// A node in the HD derivation tree. The master node has `path == "m"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdNode {
    pub path: String,
    pub role: String,
    pub private_key: String,
    pub public_key: String,
    pub address: String,
    pub pub_key_hash: String,
}

impl HdNode {
    pub fn key_material(&self) -> KeyMaterial {
        KeyMaterial {
            private_key: self.private_key.clone(),
            public_key: self.public_key.clone(),
            address: self.address.clone(),
            pub_key_hash: self.pub_key_hash.clone(),
        }
    }
}

/// A derived address exposed by a watch-only wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchOnlyAddress {
    pub path: String,
    pub address: String,
    pub public_key: String,
}

/// Public-material-only wallet. There is no private-key field anywhere in this
/// structure, so it cannot authorize a spend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchOnlyWallet {
    pub extended_public_key: String,
    pub addresses: Vec<WatchOnlyAddress>,
}

/// Payload of one broadcast round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Artifact {
    Transaction(Transaction),
    Block(Block),
}

impl Artifact {
    pub fn describe(&self) -> String {
        match self {
            Artifact::Transaction(tx) => format!("transaction {}", abbreviate(&tx.id)),
            Artifact::Block(block) => format!("block #{}", block.number),
        }
    }
}

/// Shorten a hex value for rendering in traces and peer logs.
pub fn abbreviate(value: &str) -> String {
    if value.len() <= 10 {
        value.to_string()
    } else {
        format!("{}..{}", &value[..6], &value[value.len() - 4..])
    }
}
