use serde::{Deserialize, Serialize};
use trellis_proto::UnitId;

use super::frontier::Frontier;
use super::{Dag, TopologyRecord};
use crate::error::InvariantViolation;

/// Causal relation of one unit to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CausalOrder {
    /// The first unit is an ancestor of the second.
    Before,
    /// The first unit is a descendant of the second.
    After,
    Equal,
    Concurrent,
}

impl Dag {
    pub fn compare(&self, a: &UnitId, b: &UnitId) -> Result<CausalOrder, InvariantViolation> {
        if a == b {
            return Ok(CausalOrder::Equal);
        }
        let (ra, rb) = (self.record(a)?, self.record(b)?);
        if ra.is_free && rb.is_free {
            return Ok(CausalOrder::Concurrent);
        }
        if ra.level < rb.level {
            return Ok(if self.is_ancestor(a, ra, b, rb)? { CausalOrder::Before } else { CausalOrder::Concurrent });
        }
        if rb.level < ra.level {
            return Ok(if self.is_ancestor(b, rb, a, ra)? { CausalOrder::After } else { CausalOrder::Concurrent });
        }
        Ok(CausalOrder::Concurrent)
    }

    /// Whether `earlier` is included by `later`, `earlier` itself excluded.
    pub fn is_included_in(&self, earlier: &UnitId, later: &UnitId) -> Result<bool, InvariantViolation> {
        if earlier == later {
            return Ok(false);
        }
        let (re, rl) = (self.record(earlier)?, self.record(later)?);
        if re.level >= rl.level {
            return Ok(false);
        }
        self.is_ancestor(earlier, re, later, rl)
    }

    pub fn is_included_or_equal(&self, earlier: &UnitId, later: &UnitId) -> Result<bool, InvariantViolation> {
        Ok(earlier == later || self.is_included_in(earlier, later)?)
    }

    /// Whether any of `later` includes (or is) `earlier`.
    pub fn is_included_in_any<'a>(&self, earlier: &UnitId, later: impl IntoIterator<Item = &'a UnitId>) -> Result<bool, InvariantViolation> {
        if self.genesis().as_ref() == Some(earlier) {
            return Ok(true);
        }
        for unit in later {
            if self.is_included_or_equal(earlier, unit)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// `a` has a strictly smaller level than `b`. Decide from the index bounds where
    /// possible, otherwise walk the parents of `b` down to `a`'s level.
    fn is_ancestor(&self, a: &UnitId, ra: &TopologyRecord, b: &UnitId, rb: &TopologyRecord) -> Result<bool, InvariantViolation> {
        if ra.is_free {
            return Ok(false);
        }
        // every unit at or below b's LIMCI is an ancestor of b
        if let (Some(mci), Some(limci)) = (ra.main_chain_index, rb.latest_included_mc_index) {
            if mci <= limci {
                return Ok(true);
            }
        }
        // an ancestor of b is included by whatever main chain unit includes b
        if let Some(b_mci) = rb.main_chain_index {
            match ra.main_chain_index {
                Some(a_mci) if a_mci <= b_mci => {}
                _ => return Ok(false),
            }
        }
        if ra.latest_included_mc_index > rb.latest_included_mc_index {
            return Ok(false);
        }

        let mut frontier = Frontier::new(self.parents_above(b, ra.level)?);
        while let Some((level, unit)) = frontier.pop() {
            if unit == *a {
                return Ok(true);
            }
            if level > ra.level {
                frontier.extend(self.parents_above(&unit, ra.level)?);
            }
        }
        Ok(false)
    }

    /// Parents of `unit` at or above `min_level`, keyed for a walk towards genesis.
    fn parents_above(&self, unit: &UnitId, min_level: u64) -> Result<Vec<(u64, UnitId)>, InvariantViolation> {
        let mut parents = Vec::new();
        for parent in &self.node(unit)?.parents {
            let level = self.record(parent)?.level;
            if level >= min_level {
                parents.push((level, *parent));
            }
        }
        Ok(parents)
    }
}
