use std::cmp::Ordering;

use tracing::debug;
use trellis_proto::{Mci, UnitId};

use super::frontier::Frontier;
use super::Dag;
use crate::error::InvariantViolation;

/// A settled LIMCI pass changes nothing; anything past this many passes is a defect.
const MAX_LIMCI_PASSES: usize = 8;

/// What changed when the main chain was rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MainChainUpdate {
    /// Highest index that kept its unit.
    pub anchor: Mci,
    /// Units that joined the main chain, ancestor first.
    pub added: Vec<UnitId>,
    /// Units that left the main chain.
    pub removed: Vec<UnitId>,
}

impl Dag {
    /// The free unit the main chain is grown towards.
    pub fn best_free_unit(&self) -> Result<Option<UnitId>, InvariantViolation> {
        let mut best: Option<UnitId> = None;
        for unit in self.free.keys() {
            let replace = match &best {
                Some(current) => self.best_parent_order(unit, current)? == Ordering::Less,
                None => true,
            };
            if replace {
                best = Some(*unit);
            }
        }
        Ok(best)
    }

    /// Rebuild the unstable end of the main chain from the best free unit and reassign
    /// main chain indices and LIMCIs of every unstable unit.
    pub fn update_main_chain(&mut self) -> Result<MainChainUpdate, InvariantViolation> {
        let Some(tip) = self.best_free_unit()? else {
            return Ok(MainChainUpdate::default());
        };

        // climb until we meet the current chain
        let mut path = Vec::new();
        let mut cursor = tip;
        loop {
            let record = self.record(&cursor)?;
            if record.is_on_main_chain {
                break;
            }
            path.push(cursor);
            cursor = match record.best_parent {
                Some(parent) => parent,
                None => return Err(InvariantViolation::UnindexedMainChainUnit(cursor)),
            };
        }
        let anchor = self.record(&cursor)?.main_chain_index.ok_or(InvariantViolation::UnindexedMainChainUnit(cursor))?;
        if let Some(last_stable) = self.last_stable_mci() {
            if anchor < last_stable {
                return Err(InvariantViolation::StableChainTruncation { anchor, last_stable });
            }
        }

        let retreating: Vec<(Mci, UnitId)> = self.main_chain.range(anchor + 1..).map(|(mci, unit)| (*mci, *unit)).collect();
        if path.is_empty() && retreating.is_empty() {
            // only a side unit arrived; it still needs its LIMCI
            self.update_limci()?;
            return Ok(MainChainUpdate { anchor, added: Vec::new(), removed: Vec::new() });
        }

        let mut removed = Vec::with_capacity(retreating.len());
        for (mci, unit) in retreating {
            self.main_chain.remove(&mci);
            self.update_record(&unit, |record| record.is_on_main_chain = false)?;
            removed.push(unit);
        }
        let stale: Vec<UnitId> = self.by_mci.range(anchor + 1..).flat_map(|(_, units)| units.iter().copied()).collect();
        for unit in stale {
            self.set_main_chain_index(&unit, None)?;
        }

        path.reverse();
        let mut mci = anchor;
        for unit in &path {
            mci += 1;
            self.main_chain.insert(mci, *unit);
            self.update_record(unit, |record| record.is_on_main_chain = true)?;
            self.set_main_chain_index(unit, Some(mci))?;
            self.assign_included(*unit, mci)?;
        }
        self.update_limci()?;

        debug!(anchor, tip = %tip, added = path.len(), removed = removed.len(), "main chain updated");
        Ok(MainChainUpdate { anchor, added: path, removed })
    }

    /// Give every unindexed ancestor of the main chain unit at `mci` that index.
    fn assign_included(&mut self, mc_unit: UnitId, mci: Mci) -> Result<(), InvariantViolation> {
        let mut frontier = Frontier::new(self.node(&mc_unit)?.parents.clone());
        while let Some(unit) = frontier.pop() {
            if self.record(&unit)?.main_chain_index.is_some() {
                continue;
            }
            self.set_main_chain_index(&unit, Some(mci))?;
            frontier.extend(self.node(&unit)?.parents.iter().copied());
        }
        Ok(())
    }

    /// Recompute LIMCI of unstable units in level order until nothing changes.
    fn update_limci(&mut self) -> Result<(), InvariantViolation> {
        let mut order = Vec::with_capacity(self.unstable.len());
        for unit in self.unstable.keys() {
            order.push((self.record(unit)?.level, *unit));
        }
        order.sort();

        for _ in 0..MAX_LIMCI_PASSES {
            let mut changed = false;
            for (_, unit) in &order {
                let mut limci: Option<Mci> = None;
                for parent in &self.node(unit)?.parents {
                    let record = self.record(parent)?;
                    let included = if record.is_on_main_chain { record.main_chain_index } else { record.latest_included_mc_index };
                    limci = limci.max(included);
                }
                if self.record(unit)?.latest_included_mc_index != limci {
                    self.update_record(unit, |record| record.latest_included_mc_index = limci)?;
                    changed = true;
                }
            }
            if !changed {
                return Ok(());
            }
        }
        Err(InvariantViolation::LimciFixedPointNotReached(MAX_LIMCI_PASSES))
    }
}
