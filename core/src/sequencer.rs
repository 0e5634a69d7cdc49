use tracing::debug;
use trellis_proto::{Mci, UnitId};

use crate::dag::{CausalOrder, Dag, Sequence};
use crate::error::InvariantViolation;
use crate::state::LedgerState;

/// Settle every temp-bad unit at `mci`, which is about to become stable.
///
/// Units are taken in identifier order. A unit loses (becomes final-bad) when a good unit
/// by one of its authors has an index in `(limci, mci]` and neither includes the other;
/// otherwise it becomes good. Everything at or below `mci` counts as stable here.
pub fn settle(dag: &mut Dag, state: &mut LedgerState, mci: Mci) -> Result<Vec<(UnitId, Sequence)>, InvariantViolation> {
    let mut settled = Vec::new();
    for unit in dag.units_at(mci) {
        let record = dag.record(&unit)?;
        if record.sequence == Sequence::Good {
            continue;
        }
        let limci = record.latest_included_mc_index;
        let joint = state.joint(&unit).ok_or(InvariantViolation::UnknownUnit(unit))?.clone();

        let mut rival = None;
        'authors: for author in joint.unit.author_addresses() {
            for candidate in state.units_by(author) {
                if *candidate == unit {
                    continue;
                }
                let other = dag.record(candidate)?;
                if other.sequence != Sequence::Good {
                    continue;
                }
                let Some(other_mci) = other.main_chain_index else { continue };
                if other_mci > mci || Some(other_mci) <= limci {
                    continue;
                }
                if dag.compare(&unit, candidate)? == CausalOrder::Concurrent {
                    rival = Some(*candidate);
                    break 'authors;
                }
            }
        }

        let sequence = if rival.is_some() { Sequence::FinalBad } else { Sequence::Good };
        dag.set_sequence(&unit, sequence)?;
        if rival.is_some() {
            let content_hash = joint.unit.content_hash().map_err(|e| InvariantViolation::Hash(e.to_string()))?;
            state.mark_final_bad(unit, content_hash);
        }
        debug!(unit = %unit, mci, ?sequence, rival = ?rival, "sequence settled");
        settled.push((unit, sequence));
    }
    Ok(settled)
}
