use serde::{Deserialize, Serialize};
use trellis_proto::Address;

use crate::dag::{Dag, Sequence};
use crate::error::InvariantViolation;
use crate::state::{LedgerState, OutputRef, SpendKey};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Unspent outputs of stable good units plus unspent commission earnings.
    pub stable: u64,
    /// Unspent outputs of good units that are not stable yet.
    pub pending: u64,
}

/// An output is spent as soon as any spender that has not lost a conflict references it.
pub fn is_spent(dag: &Dag, state: &LedgerState, key: &SpendKey) -> Result<bool, InvariantViolation> {
    for spender in state.spenders(key) {
        if dag.record(spender)?.sequence != Sequence::FinalBad {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn balance_of(dag: &Dag, state: &LedgerState, address: &Address) -> Result<Balance, InvariantViolation> {
    let mut balance = Balance::default();
    for (output_ref, output) in state.outputs_of(address) {
        let record = dag.record(&output_ref.unit)?;
        if record.sequence != Sequence::Good || is_spent(dag, state, &SpendKey::Output(*output_ref))? {
            continue;
        }
        if record.is_stable {
            balance.stable = balance.stable.saturating_add(output.amount);
        } else {
            balance.pending = balance.pending.saturating_add(output.amount);
        }
    }
    for (key, amount) in state.earnings_of(address) {
        if !is_spent(dag, state, &SpendKey::Commission(key.clone()))? {
            balance.stable = balance.stable.saturating_add(*amount);
        }
    }
    Ok(balance)
}

/// Unspent outputs of `address` in stable good units, in output order.
pub fn spendable_outputs(dag: &Dag, state: &LedgerState, address: &Address) -> Result<Vec<(OutputRef, u64)>, InvariantViolation> {
    let mut outputs = Vec::new();
    for (output_ref, output) in state.outputs_of(address) {
        let record = dag.record(&output_ref.unit)?;
        if record.is_stable && record.sequence == Sequence::Good && !is_spent(dag, state, &SpendKey::Output(*output_ref))? {
            outputs.push((*output_ref, output.amount));
        }
    }
    Ok(outputs)
}
