//! The three interactive challenge simulators
//!
//! Each simulator owns a [`SessionController`], its artifacts, and its
//! configuration. Every public method below is one step action: it gates on the
//! session, produces the step's artifact, and advances. All state mutation goes
//! through these actions; the host only reads the exposed state and renders it.

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::fork::{resolve_fork, open_fork, ForkResolution, RandomWinner, WinnerPicker};
use crate::hd::{
    build_watch_only, derive_address_run, derive_child, derive_master, seed_phrase,
};
use crate::keys::{generate_entropy, generate_key_material, sign, Entropy};
use crate::mining::{assemble_block, mine_block, MiningResult};
use crate::network::{
    broadcast_transaction, collect_votes, propose_block, standard_network, tally, RandomPolicy,
    RoundOutcome, ValidationPolicy,
};
use crate::script::{execute, p2pkh_unlocking_script, ScriptOutcome};
use crate::session::{SessionController, SimulationSession};
use crate::transaction::{apply_transaction, build_transaction, fund_address, select_inputs};
use crate::types::{
    Amount, Artifact, Block, ConsensusVote, ForkBranch, HdNode, KeyMaterial, PeerKind,
    SimulatedPeer, Transaction, Utxo, WatchOnlyWallet, Witness,
};
use crate::constants::{DEFAULT_SEED_WORDS, KEY_ENTROPY_BITS};
use tracing::info;

// ---------------------------------------------------------------------------
// Payment challenge: keys -> UTXOs -> transaction -> scripts -> consensus
// ---------------------------------------------------------------------------

pub struct PaymentSimulator {
    config: SimConfig,
    session: SessionController,
    policy: Box<dyn ValidationPolicy>,
    sender: Option<KeyMaterial>,
    recipient: Option<KeyMaterial>,
    utxos: Vec<Utxo>,
    transaction: Option<Transaction>,
    witness: Option<Witness>,
    outcome: Option<ScriptOutcome>,
    peers: Vec<SimulatedPeer>,
    votes: Vec<ConsensusVote>,
}

impl PaymentSimulator {
    pub fn new(config: SimConfig) -> Self {
        let policy = Box::new(RandomPolicy::new(config.validation_success));
        let peers = standard_network(&config);
        Self {
            config,
            session: SessionController::new(),
            policy,
            sender: None,
            recipient: None,
            utxos: Vec::new(),
            transaction: None,
            witness: None,
            outcome: None,
            peers,
            votes: Vec::new(),
        }
    }

    pub fn on_complete(&mut self, callback: Box<dyn FnMut()>) {
        self.session.set_on_complete(callback);
    }

    /// Swap the validation policy, e.g. for a scripted demonstration.
    pub fn set_policy(&mut self, policy: Box<dyn ValidationPolicy>) {
        self.policy = policy;
    }

    /// Step 1: create the two participant identities.
    pub fn generate_participants(&mut self) -> Result<(&KeyMaterial, &KeyMaterial)> {
        self.session.begin(1)?;
        self.sender = Some(generate_key_material());
        self.recipient = Some(generate_key_material());
        self.session.finish(2);
        info!("participants generated");
        Ok((
            self.sender.as_ref().unwrap(),
            self.recipient.as_ref().unwrap(),
        ))
    }

    /// Step 2: fund the sender with genesis-style UTXOs.
    pub fn fund_sender(&mut self, amounts: &[Amount]) -> Result<&[Utxo]> {
        self.session.begin(2)?;
        let Some(sender) = self.sender.clone() else {
            self.session.abort();
            return Err(SimError::MissingArtifact("sender keys".to_string()));
        };
        self.utxos = fund_address(&sender, amounts, "genesis");
        self.session.finish(3);
        Ok(&self.utxos)
    }

    /// Step 3: select inputs first-fit and assemble the transaction.
    pub fn build_payment(&mut self, amount: Amount) -> Result<&Transaction> {
        self.session.begin(3)?;
        let (Some(sender), Some(recipient)) = (self.sender.clone(), self.recipient.clone()) else {
            self.session.abort();
            return Err(SimError::MissingArtifact("participant keys".to_string()));
        };
        let fee = self.config.default_fee;

        let selection = match select_inputs(&self.utxos, &sender.address, amount + fee) {
            Ok(selection) => selection,
            Err(err) => {
                self.session.abort();
                return Err(err);
            }
        };
        let tx = match build_transaction(&selection, &sender, &recipient, amount, fee) {
            Ok(tx) => tx,
            Err(err) => {
                self.session.abort();
                return Err(err);
            }
        };

        info!(tx = %tx.id, fee, "payment built");
        self.transaction = Some(tx);
        self.session.finish(4);
        Ok(self.transaction.as_ref().unwrap())
    }

    /// Step 4: sign, run unlocking + locking scripts, and settle the ledger when
    /// the scripts validate. A failing script is a normal outcome: the session
    /// stays on this step so the host can show the trace and retry.
    pub fn sign_and_validate(&mut self) -> Result<&ScriptOutcome> {
        self.session.begin(4)?;
        let (Some(sender), Some(tx)) = (self.sender.clone(), self.transaction.clone()) else {
            self.session.abort();
            return Err(SimError::MissingArtifact("built transaction".to_string()));
        };

        let signature = sign(&sender, &tx.id);
        let unlocking = p2pkh_unlocking_script(&signature, &sender.public_key);
        let witness = Witness {
            signature,
            public_key: sender.public_key.clone(),
            unlocking_script: unlocking.clone(),
        };

        // Every input is locked to the sender here, so one execution teaches the
        // whole spend.
        let locking = &tx.inputs[0].locking_script;
        let outcome = execute(&unlocking, locking);
        let valid = outcome.valid;
        self.witness = Some(witness);
        self.outcome = Some(outcome);

        if valid {
            if let Err(err) = apply_transaction(&mut self.utxos, &tx) {
                self.session.abort();
                return Err(err);
            }
            self.session.finish(5);
        } else {
            self.session.abort();
        }
        Ok(self.outcome.as_ref().unwrap())
    }

    /// Step 5: broadcast to the simulated network and tally the votes. On
    /// acceptance the challenge completes; a rejection leaves the session here
    /// so the payment can be re-proposed.
    pub fn broadcast(&mut self) -> Result<RoundOutcome> {
        self.session.begin(5)?;
        let Some(tx) = self.transaction.clone() else {
            self.session.abort();
            return Err(SimError::MissingArtifact("validated transaction".to_string()));
        };

        let delay = self.config.propagation_base_delay_ms;
        broadcast_transaction(&mut self.peers, &tx, delay);
        self.votes = collect_votes(
            &mut self.peers,
            &Artifact::Transaction(tx),
            self.policy.as_mut(),
            delay,
        );
        let outcome = tally(&self.votes);

        if !outcome.accepted {
            self.session.abort();
            return Err(SimError::ConsensusRejected {
                accepts: outcome.accepts,
                total: outcome.total,
            });
        }

        self.session.finish(6);
        self.session.complete(
            true,
            format!(
                "payment accepted by {} of {} peers",
                outcome.accepts, outcome.total
            ),
        );
        Ok(outcome)
    }

    pub fn reset(&mut self) {
        self.session.reset();
        self.sender = None;
        self.recipient = None;
        self.utxos.clear();
        self.transaction = None;
        self.witness = None;
        self.outcome = None;
        self.votes.clear();
        self.peers = standard_network(&self.config);
    }

    // Read-only state for the host.
    pub fn session(&self) -> &SimulationSession {
        self.session.session()
    }
    pub fn utxos(&self) -> &[Utxo] {
        &self.utxos
    }
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }
    pub fn witness(&self) -> Option<&Witness> {
        self.witness.as_ref()
    }
    pub fn outcome(&self) -> Option<&ScriptOutcome> {
        self.outcome.as_ref()
    }
    pub fn peers(&self) -> &[SimulatedPeer] {
        &self.peers
    }
    pub fn votes(&self) -> &[ConsensusVote] {
        &self.votes
    }
}

// ---------------------------------------------------------------------------
// Consensus challenge: network -> broadcast -> mine -> vote -> fork -> resolve
// ---------------------------------------------------------------------------

pub struct ConsensusSimulator {
    config: SimConfig,
    session: SessionController,
    policy: Box<dyn ValidationPolicy>,
    picker: Box<dyn WinnerPicker>,
    treasury: Option<KeyMaterial>,
    recipient: Option<KeyMaterial>,
    utxos: Vec<Utxo>,
    peers: Vec<SimulatedPeer>,
    transaction: Option<Transaction>,
    block: Option<Block>,
    votes: Vec<ConsensusVote>,
    fork: Option<(ForkBranch, ForkBranch)>,
    resolution: Option<ForkResolution>,
}

impl ConsensusSimulator {
    pub fn new(config: SimConfig) -> Self {
        let policy = Box::new(RandomPolicy::new(config.validation_success));
        Self {
            config,
            session: SessionController::new(),
            policy,
            picker: Box::new(RandomWinner::new()),
            treasury: None,
            recipient: None,
            utxos: Vec::new(),
            peers: Vec::new(),
            transaction: None,
            block: None,
            votes: Vec::new(),
            fork: None,
            resolution: None,
        }
    }

    pub fn on_complete(&mut self, callback: Box<dyn FnMut()>) {
        self.session.set_on_complete(callback);
    }

    pub fn set_policy(&mut self, policy: Box<dyn ValidationPolicy>) {
        self.policy = policy;
    }

    pub fn set_picker(&mut self, picker: Box<dyn WinnerPicker>) {
        self.picker = picker;
    }

    /// Step 1: stand up the peer network and a funded treasury identity.
    pub fn setup_network(&mut self) -> Result<&[SimulatedPeer]> {
        self.session.begin(1)?;
        self.peers = standard_network(&self.config);
        let treasury = generate_key_material();
        self.utxos = fund_address(&treasury, &[150_000_000, 50_000_000], "coinbase");
        self.treasury = Some(treasury);
        self.recipient = Some(generate_key_material());
        self.session.finish(2);
        info!(peers = self.peers.len(), "network ready");
        Ok(&self.peers)
    }

    /// Step 2: build a treasury payment and propagate it to every mempool.
    pub fn submit_transaction(&mut self, amount: Amount) -> Result<&Transaction> {
        self.session.begin(2)?;
        let (Some(treasury), Some(recipient)) = (self.treasury.clone(), self.recipient.clone())
        else {
            self.session.abort();
            return Err(SimError::MissingArtifact("network setup".to_string()));
        };
        let fee = self.config.default_fee;

        let result = select_inputs(&self.utxos, &treasury.address, amount + fee)
            .and_then(|selection| build_transaction(&selection, &treasury, &recipient, amount, fee));
        let tx = match result {
            Ok(tx) => tx,
            Err(err) => {
                self.session.abort();
                return Err(err);
            }
        };

        if let Err(err) = apply_transaction(&mut self.utxos, &tx) {
            self.session.abort();
            return Err(err);
        }
        broadcast_transaction(&mut self.peers, &tx, self.config.propagation_base_delay_ms);
        self.transaction = Some(tx);
        self.session.finish(3);
        Ok(self.transaction.as_ref().unwrap())
    }

    /// Step 3: the first mining peer assembles a candidate block from its
    /// mempool and searches for a nonce. Running out of attempts is an
    /// inconclusive round; the step can simply be retried.
    pub fn mine_candidate(&mut self) -> Result<&Block> {
        self.session.begin(3)?;
        let Some(miner) = self
            .peers
            .iter()
            .find(|p| p.kind == PeerKind::Mining && p.is_active())
            .cloned()
        else {
            self.session.abort();
            return Err(SimError::MissingArtifact("an active mining peer".to_string()));
        };

        let height = miner.block_height + 1;
        let candidate = assemble_block(height, "tip", miner.mempool.clone(), &miner.name);
        let (mined, result) = mine_block(candidate, self.config.mining_max_attempts);
        if result == MiningResult::Failure {
            self.session.abort();
            return Err(SimError::InconclusiveRound);
        }

        info!(number = mined.number, nonce = mined.nonce, miner = %mined.mined_by, "candidate mined");
        self.block = Some(mined);
        self.session.finish(4);
        Ok(self.block.as_ref().unwrap())
    }

    /// Step 4: collect one vote per peer and commit on strict majority. A
    /// rejection mutates nothing and leaves the session here for re-proposal.
    pub fn vote_and_commit(&mut self) -> Result<RoundOutcome> {
        self.session.begin(4)?;
        let Some(block) = self.block.clone() else {
            self.session.abort();
            return Err(SimError::MissingArtifact("mined candidate block".to_string()));
        };

        match propose_block(
            &mut self.peers,
            &block,
            self.policy.as_mut(),
            self.config.propagation_base_delay_ms,
        ) {
            Ok((votes, outcome)) => {
                self.votes = votes;
                self.session.finish(5);
                Ok(outcome)
            }
            Err(err) => {
                self.session.abort();
                Err(err)
            }
        }
    }

    /// Step 5: two mining peers find blocks at the same height; the network
    /// splits into disjoint supporter camps.
    pub fn open_fork(&mut self) -> Result<(&ForkBranch, &ForkBranch)> {
        self.session.begin(5)?;
        let miners: Vec<String> = self
            .peers
            .iter()
            .filter(|p| p.kind == PeerKind::Mining && p.is_active())
            .map(|p| p.name.clone())
            .collect();
        if miners.len() < 2 {
            self.session.abort();
            return Err(SimError::MissingArtifact("two active mining peers".to_string()));
        }

        let height = self.peers.iter().map(|p| p.block_height).max().unwrap_or(0) + 1;
        let branches = open_fork(height, &miners[0], &miners[1], (2, 1), &self.peers);
        self.fork = Some(branches);
        self.session.finish(6);
        let (a, b) = self.fork.as_ref().unwrap();
        Ok((a, b))
    }

    /// Step 6: the next-block race. Inconclusive rounds keep the fork open and
    /// the step retryable; a decisive pick converges every peer and completes
    /// the challenge.
    pub fn resolve(&mut self) -> Result<&ForkResolution> {
        self.session.begin(6)?;
        let Some((a, b)) = self.fork.clone() else {
            self.session.abort();
            return Err(SimError::MissingArtifact("an open fork".to_string()));
        };

        match resolve_fork(a, b, &mut self.peers, self.picker.as_mut()) {
            Ok(resolution) => {
                self.fork = None;
                let message = format!(
                    "chain {} won at height {}; network converged",
                    resolution.winner.chain_tag, resolution.adopted_height
                );
                self.resolution = Some(resolution);
                self.session.finish(7);
                self.session.complete(true, message);
                Ok(self.resolution.as_ref().unwrap())
            }
            Err(err) => {
                self.session.abort();
                Err(err)
            }
        }
    }

    pub fn reset(&mut self) {
        self.session.reset();
        self.treasury = None;
        self.recipient = None;
        self.utxos.clear();
        self.peers.clear();
        self.transaction = None;
        self.block = None;
        self.votes.clear();
        self.fork = None;
        self.resolution = None;
    }

    // Read-only state for the host.
    pub fn session(&self) -> &SimulationSession {
        self.session.session()
    }
    pub fn peers(&self) -> &[SimulatedPeer] {
        &self.peers
    }
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }
    pub fn block(&self) -> Option<&Block> {
        self.block.as_ref()
    }
    pub fn votes(&self) -> &[ConsensusVote] {
        &self.votes
    }
    pub fn fork(&self) -> Option<&(ForkBranch, ForkBranch)> {
        self.fork.as_ref()
    }
    pub fn resolution(&self) -> Option<&ForkResolution> {
        self.resolution.as_ref()
    }
}

// ---------------------------------------------------------------------------
// HD wallet challenge: entropy -> seed -> master -> tree -> watch-only
// ---------------------------------------------------------------------------

pub struct HdWalletSimulator {
    session: SessionController,
    entropy: Option<Entropy>,
    phrase: Vec<&'static str>,
    master: Option<HdNode>,
    tree: Vec<HdNode>,
    account: Option<HdNode>,
    addresses: Vec<HdNode>,
    watch_only: Option<WatchOnlyWallet>,
}

impl HdWalletSimulator {
    pub fn new() -> Self {
        Self {
            session: SessionController::new(),
            entropy: None,
            phrase: Vec::new(),
            master: None,
            tree: Vec::new(),
            account: None,
            addresses: Vec::new(),
            watch_only: None,
        }
    }

    pub fn on_complete(&mut self, callback: Box<dyn FnMut()>) {
        self.session.set_on_complete(callback);
    }

    /// Step 1: draw entropy and map it to a seed phrase.
    pub fn generate_seed(&mut self) -> Result<&[&'static str]> {
        self.session.begin(1)?;
        let entropy = generate_entropy(KEY_ENTROPY_BITS);
        self.phrase = seed_phrase(&entropy, DEFAULT_SEED_WORDS);
        self.entropy = Some(entropy);
        self.session.finish(2);
        Ok(&self.phrase)
    }

    /// Step 2: derive the master node from the seed phrase.
    pub fn derive_master_node(&mut self) -> Result<&HdNode> {
        self.session.begin(2)?;
        if self.phrase.is_empty() {
            self.session.abort();
            return Err(SimError::MissingArtifact("seed phrase".to_string()));
        }
        self.master = Some(derive_master(&self.phrase));
        self.session.finish(3);
        Ok(self.master.as_ref().unwrap())
    }

    /// Step 3: walk the hardened levels down to the account node, recording
    /// every intermediate node with its role.
    pub fn derive_account(&mut self, purpose: u32, coin_type: u32, account: u32) -> Result<&HdNode> {
        self.session.begin(3)?;
        let Some(master) = self.master.clone() else {
            self.session.abort();
            return Err(SimError::MissingArtifact("master node".to_string()));
        };
        let material = master.key_material();

        let levels = [
            format!("m/{purpose}'"),
            format!("m/{purpose}'/{coin_type}'"),
            format!("m/{purpose}'/{coin_type}'/{account}'"),
        ];
        self.tree.clear();
        for path in &levels {
            match derive_child(&material, path) {
                Ok(node) => self.tree.push(node),
                Err(err) => {
                    self.session.abort();
                    return Err(err);
                }
            }
        }

        self.account = self.tree.last().cloned();
        self.session.finish(4);
        Ok(self.account.as_ref().unwrap())
    }

    /// Step 4: derive a run of consecutive addresses on the chosen chain.
    pub fn derive_addresses(&mut self, chain: u32, count: usize) -> Result<&[HdNode]> {
        self.session.begin(4)?;
        let Some(account) = self.account.clone() else {
            self.session.abort();
            return Err(SimError::MissingArtifact("account node".to_string()));
        };
        match derive_address_run(&account, chain, count) {
            Ok(nodes) => {
                self.addresses = nodes;
                self.session.finish(5);
                Ok(&self.addresses)
            }
            Err(err) => {
                self.session.abort();
                Err(err)
            }
        }
    }

    /// Step 5: export the watch-only wallet and complete the challenge.
    pub fn export_watch_only(&mut self) -> Result<&WatchOnlyWallet> {
        self.session.begin(5)?;
        let Some(master) = self.master.as_ref() else {
            self.session.abort();
            return Err(SimError::MissingArtifact("master node".to_string()));
        };
        let wallet = build_watch_only(master, &self.addresses);
        self.watch_only = Some(wallet);
        self.session.finish(6);
        self.session.complete(
            true,
            format!(
                "watch-only wallet exported with {} addresses",
                self.addresses.len()
            ),
        );
        Ok(self.watch_only.as_ref().unwrap())
    }

    pub fn reset(&mut self) {
        self.session.reset();
        self.entropy = None;
        self.phrase.clear();
        self.master = None;
        self.tree.clear();
        self.account = None;
        self.addresses.clear();
        self.watch_only = None;
    }

    // Read-only state for the host.
    pub fn session(&self) -> &SimulationSession {
        self.session.session()
    }
    pub fn entropy(&self) -> Option<&Entropy> {
        self.entropy.as_ref()
    }
    pub fn phrase(&self) -> &[&'static str] {
        &self.phrase
    }
    pub fn master(&self) -> Option<&HdNode> {
        self.master.as_ref()
    }
    pub fn tree(&self) -> &[HdNode] {
        &self.tree
    }
    pub fn addresses(&self) -> &[HdNode] {
        &self.addresses
    }
    pub fn watch_only(&self) -> Option<&WatchOnlyWallet> {
        self.watch_only.as_ref()
    }
}

impl Default for HdWalletSimulator {
    fn default() -> Self {
        Self::new()
    }
}
