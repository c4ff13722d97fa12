//! UTXO selection and transaction assembly
//!
//! Selection is deliberately first-fit, not optimal: UTXOs are scanned in their
//! existing order and accumulation stops the moment the target is reached, which
//! is what the lesson demonstrates. Construction never emits an
//! under-collateralized transaction; insufficient funds surface before any
//! `Transaction` value exists.

use crate::error::{Result, SimError};
use crate::keys::sha256_hex;
use crate::script::p2pkh_locking_script;
use crate::types::{Amount, KeyMaterial, Transaction, TxInput, TxOutput, Utxo};
use std::time::{SystemTime, UNIX_EPOCH};

/// Inputs chosen to fund a payment, plus their accumulated value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSelection {
    pub selected: Vec<Utxo>,
    pub total: Amount,
}

/// First-fit selection over the owner's unspent UTXOs, in their existing order.
pub fn select_inputs(utxos: &[Utxo], owner_address: &str, target: Amount) -> Result<InputSelection> {
    let mut selected = Vec::new();
    let mut total: Amount = 0;

    for utxo in utxos.iter().filter(|u| u.owner_address == owner_address && !u.spent) {
        selected.push(utxo.clone());
        total += utxo.amount;
        if total >= target {
            return Ok(InputSelection { selected, total });
        }
    }

    Err(SimError::InsufficientFunds {
        requested: target,
        available: total,
    })
}

/// Assemble a transaction from a selection: one recipient output, and a change
/// output back to the sender only when change is positive.
pub fn build_transaction(
    selection: &InputSelection,
    sender: &KeyMaterial,
    recipient: &KeyMaterial,
    amount: Amount,
    fee: Amount,
) -> Result<Transaction> {
    if selection.total < amount + fee {
        return Err(SimError::InsufficientFunds {
            requested: amount + fee,
            available: selection.total,
        });
    }
    let change = selection.total - amount - fee;

    let inputs: Vec<TxInput> = selection
        .selected
        .iter()
        .map(|utxo| TxInput {
            previous_utxo_id: utxo.id.clone(),
            amount: utxo.amount,
            locking_script: utxo.locking_script.clone(),
        })
        .collect();

    let mut outputs = vec![TxOutput {
        address: recipient.address.clone(),
        amount,
        locking_script: p2pkh_locking_script(&recipient.pub_key_hash),
    }];
    if change > 0 {
        outputs.push(TxOutput {
            address: sender.address.clone(),
            amount: change,
            locking_script: p2pkh_locking_script(&sender.pub_key_hash),
        });
    }

    let timestamp = unix_timestamp();
    let id = transaction_id(&inputs, &outputs, fee, timestamp);

    Ok(Transaction {
        id,
        inputs,
        outputs,
        fee,
        timestamp,
    })
}

/// Create the genesis-style UTXOs that fund a lesson wallet.
pub fn fund_address(owner: &KeyMaterial, amounts: &[Amount], tag: &str) -> Vec<Utxo> {
    amounts
        .iter()
        .enumerate()
        .map(|(i, &amount)| Utxo {
            id: format!("{}:{}", tag, i),
            owner_address: owner.address.clone(),
            amount,
            spent: false,
            locking_script: p2pkh_locking_script(&owner.pub_key_hash),
            pub_key_hash: owner.pub_key_hash.clone(),
        })
        .collect()
}

/// Apply a transaction to the ledger view: flip consumed inputs to spent and
/// append the new outputs as fresh unspent UTXOs. A spent or unknown input
/// rejects the whole application with no partial mutation.
pub fn apply_transaction(utxos: &mut Vec<Utxo>, tx: &Transaction) -> Result<()> {
    // Validate everything before mutating anything
    for input in &tx.inputs {
        let utxo = utxos
            .iter()
            .find(|u| u.id == input.previous_utxo_id)
            .ok_or_else(|| SimError::UnknownUtxo(input.previous_utxo_id.clone()))?;
        if utxo.spent {
            return Err(SimError::UtxoAlreadySpent(utxo.id.clone()));
        }
    }

    for input in &tx.inputs {
        if let Some(utxo) = utxos.iter_mut().find(|u| u.id == input.previous_utxo_id) {
            utxo.spent = true;
        }
    }

    for (index, output) in tx.outputs.iter().enumerate() {
        let pub_key_hash = output
            .locking_script
            .embedded_hash()
            .unwrap_or_default()
            .to_string();
        utxos.push(Utxo {
            id: format!("{}:{}", tx.id, index),
            owner_address: output.address.clone(),
            amount: output.amount,
            spent: false,
            locking_script: output.locking_script.clone(),
            pub_key_hash,
        });
    }

    Ok(())
}

fn transaction_id(inputs: &[TxInput], outputs: &[TxOutput], fee: Amount, timestamp: u64) -> String {
    let mut preimage = String::new();
    for input in inputs {
        preimage.push_str(&input.previous_utxo_id);
        preimage.push_str(&input.amount.to_string());
    }
    for output in outputs {
        preimage.push_str(&output.address);
        preimage.push_str(&output.amount.to_string());
    }
    preimage.push_str(&fee.to_string());
    preimage.push_str(&timestamp.to_string());
    sha256_hex(preimage.as_bytes())
}

pub(crate) fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
