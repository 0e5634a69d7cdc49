//! Checks that need the DAG: parents, witness list, last ball, authentication, payments
//! and conflicts with units already accepted.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use trellis_proto::{Address, BallId, Input, Lineage, ProtocolConfig, Unit, UnitId, ValidationError, WitnessListRef};

use crate::config::LedgerConfig;
use crate::dag::{Dag, Sequence, WitnessList};
use crate::error::AdmissionError;
use crate::state::{spend_keys, LedgerState, OutputRef, SpendKey};

/// What a unit that passed contextual validation brings into the ledger.
#[derive(Debug, Clone)]
pub struct Admission {
    pub witnesses: WitnessList,
    pub sequence: Sequence,
    pub spends: Vec<SpendKey>,
    /// Unstable good units that now conflict with this one and lose their standing.
    pub demoted: Vec<UnitId>,
}

pub fn admit(unit: &Unit, dag: &Dag, state: &LedgerState, config: &LedgerConfig) -> Result<Admission, AdmissionError> {
    let witnesses = match &unit.lineage {
        Lineage::Genesis => {
            if dag.genesis().is_some() {
                return Err(ValidationError::GenesisExists.into());
            }
            if let Some(expected) = &config.genesis_unit {
                if *expected != unit.unit {
                    return Err(ValidationError::UnexpectedGenesis(unit.unit).into());
                }
            }
            match &unit.witness_list {
                WitnessListRef::Inline(list) => Arc::new(list.clone()),
                WitnessListRef::Unit(reference) => return Err(ValidationError::BadWitnessListUnit(*reference).into()),
            }
        }
        Lineage::Regular { parent_units, last_ball, last_ball_unit } => {
            let missing: Vec<UnitId> = parent_units.iter().filter(|parent| !dag.contains(parent)).copied().collect();
            if !missing.is_empty() {
                return Err(AdmissionError::MissingParents(missing));
            }
            let witnesses = resolve_witnesses(unit, parent_units, dag, state)?;
            check_parents(parent_units, &witnesses, dag)?;
            check_last_ball(parent_units, last_ball_unit, last_ball, dag, state)?;
            witnesses
        }
    };

    authenticate(unit, state)?;
    let spends = check_payments(unit, dag, state, &config.protocol)?;

    let mut sequence = Sequence::Good;
    let mut demoted = Vec::new();
    let parents = unit.parent_units();
    for key in &spends {
        for spender in state.spenders(key) {
            let record = dag.record(spender)?;
            if record.sequence == Sequence::FinalBad {
                continue;
            }
            if dag.is_included_in_any(spender, parents)? {
                return Err(ValidationError::DoubleSpend.into());
            }
            sequence = Sequence::TempBad;
            if !record.is_stable && record.sequence == Sequence::Good && !demoted.contains(spender) {
                demoted.push(*spender);
            }
        }
    }

    Ok(Admission { witnesses, sequence, spends, demoted })
}

fn resolve_witnesses(unit: &Unit, parents: &[UnitId], dag: &Dag, state: &LedgerState) -> Result<WitnessList, AdmissionError> {
    match &unit.witness_list {
        WitnessListRef::Inline(list) => {
            // share the parent's list when it is the same one
            for parent in parents {
                let witnesses = &dag.node(parent)?.witnesses;
                if witnesses.as_slice() == list.as_slice() {
                    return Ok(witnesses.clone());
                }
            }
            Ok(Arc::new(list.clone()))
        }
        WitnessListRef::Unit(reference) => {
            let declares_list = state.joint(reference).is_some_and(|joint| matches!(joint.unit.witness_list, WitnessListRef::Inline(_)));
            if !declares_list || !dag.contains(reference) || !dag.record(reference)?.is_stable {
                return Err(ValidationError::BadWitnessListUnit(*reference).into());
            }
            Ok(dag.node(reference)?.witnesses.clone())
        }
    }
}

fn check_parents(parents: &[UnitId], witnesses: &WitnessList, dag: &Dag) -> Result<(), AdmissionError> {
    let mut compatible = false;
    let mut seen: BTreeMap<&Address, UnitId> = BTreeMap::new();
    for parent in parents {
        let node = dag.node(parent)?;
        compatible |= dag.is_compatible(&node.witnesses, witnesses);
        for author in &node.authors {
            if let Some(other) = seen.insert(author, *parent) {
                if other != *parent {
                    return Err(ValidationError::SameAuthorInParents(author.clone()).into());
                }
            }
        }
    }
    if !compatible {
        return Err(ValidationError::NoCompatibleParent.into());
    }
    Ok(())
}

fn check_last_ball(
    parents: &[UnitId],
    last_ball_unit: &UnitId,
    last_ball: &BallId,
    dag: &Dag,
    state: &LedgerState,
) -> Result<(), AdmissionError> {
    if !dag.contains(last_ball_unit) {
        return Err(ValidationError::LastBallUnknown(*last_ball_unit).into());
    }
    let record = dag.record(last_ball_unit)?;
    if !record.is_on_main_chain {
        return Err(ValidationError::LastBallNotOnMainChain(*last_ball_unit).into());
    }
    if !dag.is_included_in_any(last_ball_unit, parents)? {
        return Err(ValidationError::LastBallNotIncluded(*last_ball_unit).into());
    }
    let last_ball_mci = record.main_chain_index;
    for parent in parents {
        let Some(joint) = state.joint(parent) else { continue };
        if let Lineage::Regular { last_ball_unit: parent_last_ball_unit, .. } = &joint.unit.lineage {
            if dag.record(parent_last_ball_unit)?.main_chain_index > last_ball_mci {
                return Err(ValidationError::LastBallRetreats.into());
            }
        }
    }
    if record.is_stable && state.ball(last_ball_unit).as_ref() != Some(last_ball) {
        return Err(ValidationError::LastBallMismatch(*last_ball_unit).into());
    }
    Ok(())
}

fn authenticate(unit: &Unit, state: &LedgerState) -> Result<(), AdmissionError> {
    let digest = unit.hash_to_sign().map_err(ValidationError::from)?;
    for author in &unit.authors {
        let definition = match (&author.definition, state.definition(&author.address)) {
            (Some(carried), _) => carried,
            (None, Some(known)) => known,
            (None, None) => return Err(ValidationError::UnknownDefinition(author.address.clone()).into()),
        };
        definition.verify(&author.authentifiers, &digest).map_err(|_| ValidationError::InvalidSignature(author.address.clone()))?;
    }
    Ok(())
}

/// Check every input and the balance of the unit, returning the keys it spends.
fn check_payments(unit: &Unit, dag: &Dag, state: &LedgerState, protocol: &ProtocolConfig) -> Result<Vec<SpendKey>, AdmissionError> {
    let authors: BTreeSet<&Address> = unit.author_addresses().collect();
    let owner_of = |address: Option<&Address>| -> Result<Address, ValidationError> {
        let address = address.or_else(|| unit.authors.first().map(|author| &author.address)).ok_or(ValidationError::AuthorCount(0))?;
        if !authors.contains(address) {
            return Err(ValidationError::NotOwner(address.clone()));
        }
        Ok(address.clone())
    };

    let mut inputs_total: u64 = 0;
    let mut outputs_total: u64 = unit.headers_commission.checked_add(unit.payload_commission).ok_or(ValidationError::AmountOverflow)?;
    for message in &unit.messages {
        for input in &message.payload.inputs {
            let amount = match input {
                Input::Issue { amount, address, .. } => {
                    if !unit.is_genesis() {
                        return Err(ValidationError::IssueOutsideGenesis.into());
                    }
                    if *amount != protocol.total_supply {
                        return Err(ValidationError::IssueAmount { expected: protocol.total_supply, actual: *amount }.into());
                    }
                    owner_of(address.as_ref())?;
                    *amount
                }
                Input::Transfer { unit: source, message_index, output_index } => {
                    let output_ref = OutputRef { unit: *source, message_index: *message_index, output_index: *output_index };
                    let output = state.output(&output_ref).ok_or(ValidationError::UnknownOutput {
                        unit: *source,
                        message_index: *message_index,
                        output_index: *output_index,
                    })?;
                    if !dag.is_included_in_any(source, unit.parent_units())? {
                        return Err(ValidationError::SourceNotIncluded(*source).into());
                    }
                    if dag.record(source)?.sequence != Sequence::Good {
                        return Err(ValidationError::SourceNotGood(*source).into());
                    }
                    if !authors.contains(&output.address) {
                        return Err(ValidationError::NotOwner(output.address.clone()).into());
                    }
                    output.amount
                }
                Input::HeadersCommission { .. } | Input::Witnessing { .. } => {
                    let Some((kind, from, to, address)) = input.commission_range() else { continue };
                    let address = owner_of(address)?;
                    if from > to {
                        return Err(ValidationError::InvalidCommissionRange { from, to }.into());
                    }
                    match state.paid_through(kind) {
                        Some(paid) if to <= paid => {}
                        _ => return Err(ValidationError::CommissionNotSpendable(to).into()),
                    }
                    let mut earned: u64 = 0;
                    for (_, amount) in state.earnings_in(&address, kind, from, to) {
                        earned = earned.checked_add(*amount).ok_or(ValidationError::AmountOverflow)?;
                    }
                    if earned == 0 {
                        return Err(ValidationError::EmptyCommissionRange { from, to }.into());
                    }
                    earned
                }
            };
            inputs_total = inputs_total.checked_add(amount).ok_or(ValidationError::AmountOverflow)?;
        }
        for output in &message.payload.outputs {
            outputs_total = outputs_total.checked_add(output.amount).ok_or(ValidationError::AmountOverflow)?;
        }
    }
    if inputs_total != outputs_total {
        return Err(ValidationError::Unbalanced { inputs: inputs_total, outputs: outputs_total }.into());
    }

    let spends = spend_keys(unit);
    let distinct: BTreeSet<&SpendKey> = spends.iter().collect();
    if distinct.len() != spends.len() {
        return Err(ValidationError::DuplicateInput.into());
    }
    Ok(spends)
}

