//! Stack-machine execution of locking/unlocking script pairs
//!
//! Script execution follows the classic two-phase stack model:
//! 1. Initialize stack S = []
//! 2. Execute the unlocking script: data pushes only (signature, public key)
//! 3. Execute the locking script operator by operator against S
//! 4. Succeed iff S is non-empty and its top equals the signature sentinel
//!
//! An operator invoked with too few operands never panics and never errors; it
//! leaves the run in a failing state and execution continues, so the trace always
//! shows the full script. The trace records every push and pop together with the
//! stack contents after it, which is what the lesson UI renders.

use crate::constants::SIG_VALID;
use crate::keys::hash160_hex;
use crate::types::{abbreviate, Script, ScriptToken};

/// Result of one script execution. Validation failure is a normal outcome, not
/// an error: both branches carry a full trace for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub valid: bool,
    pub trace: Vec<String>,
    pub final_stack: Vec<String>,
}

struct Machine {
    stack: Vec<String>,
    trace: Vec<String>,
    failed: bool,
}

impl Machine {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            trace: Vec::new(),
            failed: false,
        }
    }

    fn render_stack(&self) -> String {
        let items: Vec<String> = self.stack.iter().map(|v| abbreviate(v)).collect();
        format!("[{}]", items.join(", "))
    }

    fn push(&mut self, label: &str, value: String) {
        self.stack.push(value);
        self.trace.push(format!("{}: push, stack {}", label, self.render_stack()));
    }

    fn pop(&mut self, op: &str) -> Option<String> {
        match self.stack.pop() {
            Some(value) => {
                self.trace.push(format!("{}: pop {}, stack {}", op, abbreviate(&value), self.render_stack()));
                Some(value)
            }
            None => {
                self.fail(&format!("{}: stack underflow", op));
                None
            }
        }
    }

    fn fail(&mut self, note: &str) {
        self.trace.push(format!("{} -- script invalid", note));
        self.failed = true;
    }
}

/// Execute an unlocking script followed by a locking script.
pub fn execute(unlocking: &Script, locking: &Script) -> ScriptOutcome {
    let mut machine = Machine::new();

    machine.trace.push(format!("unlocking script: {}", unlocking));
    for token in unlocking.tokens() {
        match token {
            ScriptToken::PushSig(sig) => machine.push("<sig>", sig.clone()),
            ScriptToken::PushPubKey(pk) => machine.push("<pubkey>", pk.clone()),
            ScriptToken::PushHash(h) => machine.push("<hash>", h.clone()),
            op => machine.fail(&format!("{}: operator not allowed in unlocking script", op)),
        }
    }

    machine.trace.push(format!("locking script: {}", locking));
    for token in locking.tokens() {
        execute_token(token, &mut machine);
    }

    let valid = !machine.failed && machine.stack.last().map(String::as_str) == Some(SIG_VALID);
    machine.trace.push(if valid {
        format!("result: VALID, top of stack is {}", SIG_VALID)
    } else {
        "result: INVALID".to_string()
    });

    ScriptOutcome {
        valid,
        trace: machine.trace,
        final_stack: machine.stack,
    }
}

fn execute_token(token: &ScriptToken, machine: &mut Machine) {
    match token {
        ScriptToken::PushSig(sig) => machine.push("<sig>", sig.clone()),
        ScriptToken::PushPubKey(pk) => machine.push("<pubkey>", pk.clone()),
        ScriptToken::PushHash(h) => machine.push("OP_PUSH <hash>", h.clone()),

        ScriptToken::Dup => match machine.stack.last().cloned() {
            Some(top) => machine.push("OP_DUP", top),
            None => machine.fail("OP_DUP: stack underflow"),
        },

        ScriptToken::Hash160 => {
            if let Some(value) = machine.pop("OP_HASH160") {
                let hashed = hash160_hex(value.as_bytes());
                machine.push("OP_HASH160", hashed);
            }
        }

        ScriptToken::EqualVerify => {
            if machine.stack.len() < 2 {
                machine.fail("OP_EQUALVERIFY: stack underflow");
                return;
            }
            let a = machine.pop("OP_EQUALVERIFY").unwrap();
            let b = machine.pop("OP_EQUALVERIFY").unwrap();
            if a == b {
                machine
                    .trace
                    .push(format!("OP_EQUALVERIFY: {} == {}", abbreviate(&a), abbreviate(&b)));
            } else {
                machine.fail(&format!(
                    "OP_EQUALVERIFY: {} != {}",
                    abbreviate(&a),
                    abbreviate(&b)
                ));
            }
        }

        ScriptToken::CheckSig => {
            if machine.stack.len() < 2 {
                machine.fail("OP_CHECKSIG: stack underflow");
                return;
            }
            let _pubkey = machine.pop("OP_CHECKSIG").unwrap();
            let _signature = machine.pop("OP_CHECKSIG").unwrap();
            machine.push("OP_CHECKSIG", SIG_VALID.to_string());
        }
    }
}

/// Standard pay-to-public-key-hash locking script for an owner's key hash.
pub fn p2pkh_locking_script(pub_key_hash: &str) -> Script {
    Script(vec![
        ScriptToken::Dup,
        ScriptToken::Hash160,
        ScriptToken::PushHash(pub_key_hash.to_string()),
        ScriptToken::EqualVerify,
        ScriptToken::CheckSig,
    ])
}

/// Unlocking script satisfying a P2PKH lock: signature first, public key second.
pub fn p2pkh_unlocking_script(signature: &str, public_key: &str) -> Script {
    Script(vec![
        ScriptToken::PushSig(signature.to_string()),
        ScriptToken::PushPubKey(public_key.to_string()),
    ])
}
