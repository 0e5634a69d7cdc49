use trellis_proto::{ball_hash, skiplist_mcis, BallId, Mci, UnitId};

use crate::dag::{Dag, Sequence};
use crate::error::InvariantViolation;
use crate::state::LedgerState;

/// Compute the balls of `units`, all just stabilized at `mci`, parents first.
pub fn compute(dag: &Dag, state: &mut LedgerState, mci: Mci, units: &[UnitId]) -> Result<(), InvariantViolation> {
    let mut ordered = Vec::with_capacity(units.len());
    for unit in units {
        ordered.push((dag.record(unit)?.level, *unit));
    }
    ordered.sort();

    for (_, unit) in ordered {
        let node = dag.node(&unit)?;
        let mut parent_balls = Vec::with_capacity(node.parents.len());
        for parent in &node.parents {
            parent_balls.push(state.ball(parent).ok_or(InvariantViolation::MissingBall(*parent))?);
        }
        let mut skiplist_balls: Vec<BallId> = Vec::new();
        if node.record.is_on_main_chain {
            for skip_mci in skiplist_mcis(mci) {
                let skip_unit = dag.main_chain_unit(skip_mci).ok_or(InvariantViolation::MissingMainChainIndex(skip_mci))?;
                skiplist_balls.push(state.ball(&skip_unit).ok_or(InvariantViolation::MissingBall(skip_unit))?);
            }
        }
        let nonserial = node.record.sequence != Sequence::Good;
        let ball = ball_hash(&unit, &parent_balls, &skiplist_balls, nonserial).map_err(|e| InvariantViolation::Hash(e.to_string()))?;
        state.set_ball(unit, ball);
    }
    Ok(())
}
