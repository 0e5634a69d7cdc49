use std::collections::VecDeque;

use tracing::debug;
use trellis_proto::{Mci, UnitId};

use super::Dag;
use crate::error::InvariantViolation;

impl Dag {
    /// The next main chain index that can be declared stable, if any.
    ///
    /// Index `k` following the last stable one is stable once the witnessed level of the
    /// main chain tip exceeds the highest level any alternative branch could use to
    /// overtake it. Alternative branches are grown from the best-children of the last
    /// stable main chain unit other than the main chain child; an alternative unit only
    /// counts when it shares enough witnesses and raised its own witnessed level.
    pub fn next_stable_mci(&self) -> Result<Option<Mci>, InvariantViolation> {
        let Some(last_stable) = self.last_stable_mci() else {
            // genesis is final the moment it is accepted
            return Ok(self.main_chain_unit(0).map(|_| 0));
        };
        let k = last_stable + 1;
        let Some(first_unstable) = self.main_chain_unit(k) else {
            return Ok(None);
        };
        let last_stable_unit = self.main_chain_unit(last_stable).ok_or(InvariantViolation::MissingMainChainIndex(last_stable))?;
        let Some(tip_mci) = self.last_main_chain_index() else {
            return Ok(None);
        };
        let tip = self.main_chain_unit(tip_mci).ok_or(InvariantViolation::MissingMainChainIndex(tip_mci))?;
        let min_mc_wl = self.record(&tip)?.witnessed_level;

        let witnesses = self.node(&last_stable_unit)?.witnesses.clone();
        let mut max_alt_level = self.record(&first_unstable)?.level.saturating_sub(1);
        let mut queue: VecDeque<UnitId> = self.best_children(&last_stable_unit)?.into_iter().filter(|unit| *unit != first_unstable).collect();
        while let Some(unit) = queue.pop_front() {
            let node = self.node(&unit)?;
            if self.is_compatible(&witnesses, &node.witnesses) {
                let mut parents_wl = 0;
                for parent in &node.parents {
                    parents_wl = parents_wl.max(self.record(parent)?.witnessed_level);
                }
                if node.record.witnessed_level > parents_wl {
                    max_alt_level = max_alt_level.max(node.record.level);
                }
            }
            queue.extend(self.best_children(&unit)?);
        }

        if min_mc_wl > max_alt_level {
            Ok(Some(k))
        } else {
            debug!(k, min_mc_wl, max_alt_level, "main chain index not yet stable");
            Ok(None)
        }
    }

    /// Freeze every unit at `mci`. Their sequences must already be settled.
    pub fn mark_stable(&mut self, mci: Mci) -> Result<Vec<UnitId>, InvariantViolation> {
        if self.main_chain_unit(mci).is_none() {
            return Err(InvariantViolation::MissingMainChainIndex(mci));
        }
        let units = self.units_at(mci);
        for unit in &units {
            self.update_record(unit, |record| record.is_stable = true)?;
            self.unstable.remove(unit);
        }
        self.last_stable_mci.set(Some(mci));
        Ok(units)
    }

    pub fn is_stable(&self, unit: &UnitId) -> Result<bool, InvariantViolation> { Ok(self.record(unit)?.is_stable) }
}
