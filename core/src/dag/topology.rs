use std::cmp::Ordering;
use std::collections::BTreeSet;

use trellis_proto::{Address, Recipient, UnitId};

use super::{Dag, Sequence, TopologyRecord, UnitNode, WitnessList};
use crate::error::InvariantViolation;

/// Static facts about a unit, as handed to [`Dag::attach`].
#[derive(Debug, Clone)]
pub struct NewUnit {
    pub id: UnitId,
    pub parents: Vec<UnitId>,
    pub authors: Vec<Address>,
    pub witnesses: WitnessList,
    pub headers_commission: u64,
    pub payload_commission: u64,
    pub recipients: Vec<Recipient>,
    pub sequence: Sequence,
}

impl Dag {
    /// Register a unit whose parents are all known.
    ///
    /// Sets level, best parent and witnessed level, moves the parents out of the free set
    /// and adds the unit to it. Main chain indices are left for [`Dag::update_main_chain`],
    /// except for genesis which is the root of the chain.
    pub fn attach(&mut self, unit: NewUnit) -> Result<&TopologyRecord, InvariantViolation> {
        let id = unit.id;
        let record = if unit.parents.is_empty() {
            TopologyRecord {
                level: 0,
                witnessed_level: 0,
                best_parent: None,
                main_chain_index: Some(0),
                latest_included_mc_index: None,
                is_on_main_chain: true,
                is_free: true,
                is_stable: false,
                sequence: unit.sequence,
            }
        } else {
            let mut level = 0;
            for parent in &unit.parents {
                level = level.max(self.record(parent)?.level + 1);
            }
            let best_parent = self.best_parent(&id, &unit.parents, &unit.witnesses)?;
            let witnessed_level = self.witnessed_level(best_parent, &unit.witnesses)?;
            TopologyRecord {
                level,
                witnessed_level,
                best_parent: Some(best_parent),
                main_chain_index: None,
                latest_included_mc_index: None,
                is_on_main_chain: false,
                is_free: true,
                is_stable: false,
                sequence: unit.sequence,
            }
        };

        for parent in &unit.parents {
            let node = self.units.get_mut(parent).ok_or(InvariantViolation::UnknownUnit(*parent))?;
            node.children.push(id);
            // a stable parent may still lose its free flag; it is not a consensus field
            node.record.is_free = false;
            self.free.remove(parent);
        }

        let genesis = unit.parents.is_empty();
        self.units.insert(
            id,
            UnitNode {
                parents: unit.parents,
                children: Vec::new(),
                authors: unit.authors,
                witnesses: unit.witnesses,
                headers_commission: unit.headers_commission,
                payload_commission: unit.payload_commission,
                recipients: unit.recipients,
                record,
            },
        );
        self.free.insert(id, ());
        self.unstable.insert(id, ());
        if genesis {
            self.genesis.set(Some(id));
            self.main_chain.insert(0, id);
            self.by_mci.insert(0, BTreeSet::from([id]));
        }
        self.record(&id)
    }

    /// Order two candidates for best parent: higher witnessed level first, then smaller
    /// `level - witnessed_level`, then smaller identifier.
    pub(crate) fn best_parent_order(&self, a: &UnitId, b: &UnitId) -> Result<Ordering, InvariantViolation> {
        let (ra, rb) = (self.record(a)?, self.record(b)?);
        Ok(rb
            .witnessed_level
            .cmp(&ra.witnessed_level)
            .then((ra.level - ra.witnessed_level).cmp(&(rb.level - rb.witnessed_level)))
            .then(a.cmp(b)))
    }

    /// The preferred parent among those sharing enough witnesses with `witnesses`.
    pub fn best_parent(&self, unit: &UnitId, parents: &[UnitId], witnesses: &WitnessList) -> Result<UnitId, InvariantViolation> {
        let mut best: Option<UnitId> = None;
        for parent in parents {
            if !self.is_compatible(&self.node(parent)?.witnesses, witnesses) {
                continue;
            }
            let replace = match &best {
                Some(current) => self.best_parent_order(parent, current)? == Ordering::Less,
                None => true,
            };
            if replace {
                best = Some(*parent);
            }
        }
        best.ok_or(InvariantViolation::BestParentNotFound(*unit))
    }

    /// Walk the best-parent chain from `start` collecting authors that are witnesses; the
    /// level where a majority is first seen is the witnessed level. Reaching genesis
    /// without a majority gives 0.
    pub fn witnessed_level(&self, start: UnitId, witnesses: &WitnessList) -> Result<u64, InvariantViolation> {
        let majority = self.params.majority_of_witnesses;
        let mut collected: BTreeSet<&Address> = BTreeSet::new();
        let mut cursor = Some(start);
        while let Some(unit) = cursor {
            let node = self.node(&unit)?;
            for author in &node.authors {
                if witnesses.binary_search(author).is_ok() {
                    collected.insert(author);
                }
            }
            if collected.len() >= majority {
                return Ok(node.record.level);
            }
            cursor = node.record.best_parent;
        }
        Ok(0)
    }
}
