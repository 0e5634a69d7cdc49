//! Headers and witnessing commissions, paid out only from the stable part of the DAG.

use std::collections::{BTreeSet, VecDeque};

use trellis_proto::{sha256_hex, Address, CommissionKind, Mci, UnitId};

use crate::action_debug;
use crate::dag::{Dag, Sequence};
use crate::error::InvariantViolation;
use crate::state::{CommissionKey, LedgerState};

/// Distribute whatever commissions became payable now that `mci` is stable.
pub fn distribute(dag: &Dag, state: &mut LedgerState, mci: Mci, paid_witnessing_window: u64) -> Result<(), InvariantViolation> {
    if mci >= 1 {
        pay_headers(dag, state, mci - 1)?;
    }
    if let Some(paid) = mci.checked_sub(paid_witnessing_window + 1) {
        pay_witnessing(dag, state, paid, paid_witnessing_window)?;
    }
    Ok(())
}

/// The child of `payer` that earns its headers commission: among good children indexed no
/// later than `next_mc_unit`, the one minimizing `sha256(child ++ next_mc_unit)`.
pub fn headers_commission_winner(dag: &Dag, payer: &UnitId, next_mc_unit: &UnitId) -> Result<Option<UnitId>, InvariantViolation> {
    let next_mci = dag.record(next_mc_unit)?.main_chain_index;
    let mut winner: Option<(String, UnitId)> = None;
    for child in &dag.node(payer)?.children {
        let record = dag.record(child)?;
        if record.sequence != Sequence::Good || record.main_chain_index.is_none() || record.main_chain_index > next_mci {
            continue;
        }
        let digest = sha256_hex(format!("{child}{next_mc_unit}").as_bytes());
        if winner.as_ref().map_or(true, |(best, _)| digest < *best) {
            winner = Some((digest, *child));
        }
    }
    Ok(winner.map(|(_, child)| child))
}

/// Split `amount` by percentage shares, rounding each part.
pub fn split_by_shares(amount: u64, shares: &[(Address, u32)]) -> Vec<(Address, u64)> {
    shares.iter().map(|(address, share)| (address.clone(), ((amount as u128 * *share as u128 + 50) / 100) as u64)).collect()
}

fn pay_headers(dag: &Dag, state: &mut LedgerState, payer_mci: Mci) -> Result<(), InvariantViolation> {
    let next_mc_unit = dag.main_chain_unit(payer_mci + 1).ok_or(InvariantViolation::MissingMainChainIndex(payer_mci + 1))?;
    for payer in dag.units_at(payer_mci) {
        let node = dag.node(&payer)?;
        if node.record.sequence != Sequence::Good || node.headers_commission == 0 {
            continue;
        }
        let Some(winner) = headers_commission_winner(dag, &payer, &next_mc_unit)? else { continue };
        let winner_node = dag.node(&winner)?;
        let shares: Vec<(Address, u32)> = if winner_node.recipients.is_empty() {
            winner_node.authors.first().map(|author| vec![(author.clone(), 100)]).unwrap_or_default()
        } else {
            winner_node.recipients.iter().map(|r| (r.address.clone(), r.share)).collect()
        };
        for (address, amount) in split_by_shares(node.headers_commission, &shares) {
            if amount > 0 {
                state.credit(CommissionKey { address, kind: CommissionKind::Headers, mci: payer_mci }, amount);
            }
        }
        action_debug!(payer, "headers commission paid", "to {:#}, {}", winner, node.headers_commission);
    }
    state.set_paid_through(CommissionKind::Headers, payer_mci);
    Ok(())
}

fn pay_witnessing(dag: &Dag, state: &mut LedgerState, paid_mci: Mci, window: u64) -> Result<(), InvariantViolation> {
    let horizon = paid_mci + window;
    for unit in dag.units_at(paid_mci) {
        let node = dag.node(&unit)?;
        if node.record.sequence != Sequence::Good || node.payload_commission == 0 {
            continue;
        }
        let mut paid: BTreeSet<Address> = BTreeSet::new();
        let mut visited: BTreeSet<UnitId> = BTreeSet::new();
        let mut queue: VecDeque<UnitId> = node.children.iter().copied().collect();
        while let Some(descendant) = queue.pop_front() {
            if !visited.insert(descendant) {
                continue;
            }
            let descendant_node = dag.node(&descendant)?;
            match descendant_node.record.main_chain_index {
                Some(mci) if mci <= horizon => {}
                _ => continue,
            }
            if descendant_node.record.sequence == Sequence::Good {
                for author in &descendant_node.authors {
                    if node.witnesses.binary_search(author).is_ok() {
                        paid.insert(author.clone());
                    }
                }
            }
            queue.extend(descendant_node.children.iter().copied());
        }
        if paid.is_empty() {
            paid = node.witnesses.iter().cloned().collect();
        }
        let each = node.payload_commission / paid.len().max(1) as u64;
        if each == 0 {
            continue;
        }
        for address in paid {
            state.credit(CommissionKey { address, kind: CommissionKind::Witnessing, mci: paid_mci }, each);
        }
    }
    state.set_paid_through(CommissionKind::Witnessing, paid_mci);
    Ok(())
}
