//! The DAG arena.
//!
//! One table owns every unit's static facts (parents, authors, witness list) and its
//! [`TopologyRecord`]. The topology tracker, main chain constructor, stability engine and
//! comparator are all methods over this table, so there is exactly one place a unit's
//! level or index can live.
//!
//! All tables are journaled: a unit's whole pipeline runs between `begin` and either
//! `commit` or `rollback`.

mod compare;
mod frontier;
mod main_chain;
mod stability;
mod topology;


use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use trellis_proto::{Address, Mci, ProtocolConfig, Recipient, UnitId};

use crate::error::InvariantViolation;
use crate::util::{JournaledCell, JournaledMap};

pub use compare::CausalOrder;
pub use main_chain::MainChainUpdate;
pub use topology::NewUnit;

/// A sorted witness list, shared between every unit that uses it.
pub type WitnessList = Arc<Vec<Address>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sequence {
    Good,
    TempBad,
    FinalBad,
}

/// Derived per-unit consensus state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyRecord {
    pub level: u64,
    pub witnessed_level: u64,
    pub best_parent: Option<UnitId>,
    pub main_chain_index: Option<Mci>,
    pub latest_included_mc_index: Option<Mci>,
    pub is_on_main_chain: bool,
    pub is_free: bool,
    pub is_stable: bool,
    pub sequence: Sequence,
}

impl TopologyRecord {
    /// Equality over the fields that are frozen once a unit is stable. Freeness is not one
    /// of them: a stable unit still gains children.
    pub fn consensus_eq(&self, other: &TopologyRecord) -> bool {
        self.level == other.level
            && self.witnessed_level == other.witnessed_level
            && self.best_parent == other.best_parent
            && self.main_chain_index == other.main_chain_index
            && self.latest_included_mc_index == other.latest_included_mc_index
            && self.is_on_main_chain == other.is_on_main_chain
            && self.is_stable == other.is_stable
            && self.sequence == other.sequence
    }
}

#[derive(Debug, Clone)]
pub struct UnitNode {
    pub parents: Vec<UnitId>,
    pub children: Vec<UnitId>,
    pub authors: Vec<Address>,
    pub witnesses: WitnessList,
    pub headers_commission: u64,
    pub payload_commission: u64,
    pub recipients: Vec<Recipient>,
    pub record: TopologyRecord,
}

/// Consensus thresholds the DAG needs.
#[derive(Debug, Clone, Copy)]
pub struct DagParams {
    pub majority_of_witnesses: usize,
    pub min_shared_witnesses: usize,
}

impl From<&ProtocolConfig> for DagParams {
    fn from(config: &ProtocolConfig) -> Self {
        Self { majority_of_witnesses: config.majority_of_witnesses, min_shared_witnesses: config.min_shared_witnesses() }
    }
}

#[derive(Debug, Clone)]
pub struct Dag {
    params: DagParams,
    units: JournaledMap<UnitId, UnitNode>,
    free: JournaledMap<UnitId, ()>,
    unstable: JournaledMap<UnitId, ()>,
    main_chain: JournaledMap<Mci, UnitId>,
    by_mci: JournaledMap<Mci, BTreeSet<UnitId>>,
    last_stable_mci: JournaledCell<Option<Mci>>,
    genesis: JournaledCell<Option<UnitId>>,
}

impl Dag {
    pub fn new(params: DagParams) -> Self {
        Self {
            params,
            units: JournaledMap::new(),
            free: JournaledMap::new(),
            unstable: JournaledMap::new(),
            main_chain: JournaledMap::new(),
            by_mci: JournaledMap::new(),
            last_stable_mci: JournaledCell::new(None),
            genesis: JournaledCell::new(None),
        }
    }

    pub fn begin(&mut self) {
        self.units.begin();
        self.free.begin();
        self.unstable.begin();
        self.main_chain.begin();
        self.by_mci.begin();
        self.last_stable_mci.begin();
        self.genesis.begin();
    }

    pub fn rollback(&mut self) {
        self.units.rollback();
        self.free.rollback();
        self.unstable.rollback();
        self.main_chain.rollback();
        self.by_mci.rollback();
        self.last_stable_mci.rollback();
        self.genesis.rollback();
    }

    pub fn commit(&mut self) {
        self.units.commit();
        self.free.commit();
        self.unstable.commit();
        self.main_chain.commit();
        self.by_mci.commit();
        self.last_stable_mci.commit();
        self.genesis.commit();
    }

    /// Units whose node changed since `begin`.
    pub fn touched(&self) -> impl Iterator<Item = &UnitId> { self.units.touched() }

    pub fn params(&self) -> DagParams { self.params }

    pub fn contains(&self, unit: &UnitId) -> bool { self.units.contains_key(unit) }

    pub fn len(&self) -> usize { self.units.len() }

    pub fn is_empty(&self) -> bool { self.units.is_empty() }

    pub fn genesis(&self) -> Option<UnitId> { *self.genesis.get() }

    pub fn node(&self, unit: &UnitId) -> Result<&UnitNode, InvariantViolation> {
        self.units.get(unit).ok_or(InvariantViolation::UnknownUnit(*unit))
    }

    pub fn record(&self, unit: &UnitId) -> Result<&TopologyRecord, InvariantViolation> { Ok(&self.node(unit)?.record) }

    pub fn last_stable_mci(&self) -> Option<Mci> { *self.last_stable_mci.get() }

    pub fn main_chain_unit(&self, mci: Mci) -> Option<UnitId> { self.main_chain.get(&mci).copied() }

    pub fn main_chain(&self) -> impl Iterator<Item = (Mci, UnitId)> + '_ { self.main_chain.iter().map(|(mci, unit)| (*mci, *unit)) }

    pub fn last_main_chain_index(&self) -> Option<Mci> { self.main_chain.last_key_value().map(|(mci, _)| *mci) }

    pub fn free_units(&self) -> impl Iterator<Item = &UnitId> { self.free.keys() }

    /// Units currently assigned `mci`, in identifier order.
    pub fn units_at(&self, mci: Mci) -> Vec<UnitId> { self.by_mci.get(&mci).map(|units| units.iter().copied().collect()).unwrap_or_default() }

    /// Children whose best parent is `unit`.
    pub fn best_children(&self, unit: &UnitId) -> Result<Vec<UnitId>, InvariantViolation> {
        let node = self.node(unit)?;
        let mut children = Vec::new();
        for child in &node.children {
            if self.record(child)?.best_parent.as_ref() == Some(unit) {
                children.push(*child);
            }
        }
        Ok(children)
    }

    /// Apply `update` to a unit's record, refusing any change to a stable unit's consensus fields.
    pub(crate) fn update_record<F>(&mut self, unit: &UnitId, update: F) -> Result<(), InvariantViolation>
    where F: FnOnce(&mut TopologyRecord) {
        let node = self.units.get_mut(unit).ok_or(InvariantViolation::UnknownUnit(*unit))?;
        if node.record.is_stable {
            let before = node.record.clone();
            update(&mut node.record);
            if !before.consensus_eq(&node.record) {
                node.record = before;
                return Err(InvariantViolation::StableRecordMutated(*unit));
            }
        } else {
            update(&mut node.record);
        }
        Ok(())
    }

    /// Change the sequence of an unstable unit.
    pub fn set_sequence(&mut self, unit: &UnitId, sequence: Sequence) -> Result<(), InvariantViolation> {
        self.update_record(unit, |record| record.sequence = sequence)
    }

    fn set_main_chain_index(&mut self, unit: &UnitId, mci: Option<Mci>) -> Result<(), InvariantViolation> {
        let previous = self.record(unit)?.main_chain_index;
        if previous == mci {
            return Ok(());
        }
        self.update_record(unit, |record| record.main_chain_index = mci)?;
        if let Some(previous) = previous {
            if let Some(units) = self.by_mci.get_mut(&previous) {
                units.remove(unit);
                if units.is_empty() {
                    self.by_mci.remove(&previous);
                }
            }
        }
        if let Some(mci) = mci {
            match self.by_mci.get_mut(&mci) {
                Some(units) => {
                    units.insert(*unit);
                }
                None => {
                    self.by_mci.insert(mci, BTreeSet::from([*unit]));
                }
            }
        }
        Ok(())
    }

    /// Number of witnesses two lists have in common.
    pub fn shared_witnesses(a: &WitnessList, b: &WitnessList) -> usize {
        if Arc::ptr_eq(a, b) {
            return a.len();
        }
        let (mut i, mut j, mut shared) = (0, 0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    shared += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        shared
    }

    pub fn is_compatible(&self, a: &WitnessList, b: &WitnessList) -> bool {
        Self::shared_witnesses(a, b) >= self.params.min_shared_witnesses
    }
}
