//! Ledger state derived from accepted units: outputs, who spends what, balls, revealed
//! definitions and commission earnings.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use trellis_proto::{Address, BallId, CommissionKind, ContentHash, Definition, Input, Joint, Mci, Output, Unit, UnitId};

use crate::util::{JournaledCell, JournaledMap};

/// Position of an output inside its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    pub unit: UnitId,
    pub message_index: u32,
    pub output_index: u32,
}

impl std::fmt::Display for OutputRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}:{}:{}", self.unit, self.message_index, self.output_index)
    }
}

/// Commission earned by `address` at one main chain index. Ordered by address first so an
/// address's earnings form one contiguous range.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommissionKey {
    pub address: Address,
    pub kind: CommissionKind,
    pub mci: Mci,
}

/// Something an input consumes. Two units conflict when they share a key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpendKey {
    Output(OutputRef),
    Commission(CommissionKey),
}

/// The keys spent by `unit`, in input order.
///
/// A commission input spends one key per index in its range, so overlapping ranges share
/// keys. Inputs without an explicit address spend on behalf of the first author.
pub fn spend_keys(unit: &Unit) -> Vec<SpendKey> {
    let default_address = unit.authors.first().map(|author| &author.address);
    let mut keys = Vec::new();
    for message in &unit.messages {
        for input in &message.payload.inputs {
            match input {
                Input::Issue { .. } => {}
                Input::Transfer { unit, message_index, output_index } => {
                    keys.push(SpendKey::Output(OutputRef { unit: *unit, message_index: *message_index, output_index: *output_index }))
                }
                Input::HeadersCommission { .. } | Input::Witnessing { .. } => {
                    let Some((kind, from, to, address)) = input.commission_range() else { continue };
                    let Some(address) = address.or(default_address) else { continue };
                    for mci in from..=to {
                        keys.push(SpendKey::Commission(CommissionKey { address: address.clone(), kind, mci }));
                    }
                }
            }
        }
    }
    keys
}

#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    joints: JournaledMap<UnitId, Arc<Joint>>,
    outputs: JournaledMap<OutputRef, Output>,
    outputs_by_address: JournaledMap<Address, BTreeSet<OutputRef>>,
    spends: JournaledMap<SpendKey, BTreeSet<UnitId>>,
    by_author: JournaledMap<Address, BTreeSet<UnitId>>,
    balls: JournaledMap<UnitId, BallId>,
    final_bad: JournaledMap<UnitId, ContentHash>,
    definitions: JournaledMap<Address, Definition>,
    earnings: JournaledMap<CommissionKey, u64>,
    headers_paid_through: JournaledCell<Option<Mci>>,
    witnessing_paid_through: JournaledCell<Option<Mci>>,
}

impl LedgerState {
    pub fn new() -> Self { Self::default() }

    pub fn begin(&mut self) {
        self.joints.begin();
        self.outputs.begin();
        self.outputs_by_address.begin();
        self.spends.begin();
        self.by_author.begin();
        self.balls.begin();
        self.final_bad.begin();
        self.definitions.begin();
        self.earnings.begin();
        self.headers_paid_through.begin();
        self.witnessing_paid_through.begin();
    }

    pub fn rollback(&mut self) {
        self.joints.rollback();
        self.outputs.rollback();
        self.outputs_by_address.rollback();
        self.spends.rollback();
        self.by_author.rollback();
        self.balls.rollback();
        self.final_bad.rollback();
        self.definitions.rollback();
        self.earnings.rollback();
        self.headers_paid_through.rollback();
        self.witnessing_paid_through.rollback();
    }

    pub fn commit(&mut self) {
        self.joints.commit();
        self.outputs.commit();
        self.outputs_by_address.commit();
        self.spends.commit();
        self.by_author.commit();
        self.balls.commit();
        self.final_bad.commit();
        self.definitions.commit();
        self.earnings.commit();
        self.headers_paid_through.commit();
        self.witnessing_paid_through.commit();
    }

    /// Record an accepted unit: its outputs, the keys it spends and any definitions it reveals.
    pub fn add_unit(&mut self, joint: Arc<Joint>, spends: &[SpendKey]) {
        let unit = &joint.unit;
        let id = unit.unit;
        for (message_index, message) in unit.messages.iter().enumerate() {
            for (output_index, output) in message.payload.outputs.iter().enumerate() {
                let output_ref = OutputRef { unit: id, message_index: message_index as u32, output_index: output_index as u32 };
                self.outputs.insert(output_ref, output.clone());
                match self.outputs_by_address.get_mut(&output.address) {
                    Some(refs) => {
                        refs.insert(output_ref);
                    }
                    None => {
                        self.outputs_by_address.insert(output.address.clone(), BTreeSet::from([output_ref]));
                    }
                }
            }
        }
        for key in spends {
            match self.spends.get_mut(key) {
                Some(spenders) => {
                    spenders.insert(id);
                }
                None => {
                    self.spends.insert(key.clone(), BTreeSet::from([id]));
                }
            }
        }
        for author in &unit.authors {
            match self.by_author.get_mut(&author.address) {
                Some(units) => {
                    units.insert(id);
                }
                None => {
                    self.by_author.insert(author.address.clone(), BTreeSet::from([id]));
                }
            }
            if let Some(definition) = &author.definition {
                if !self.definitions.contains_key(&author.address) {
                    self.definitions.insert(author.address.clone(), definition.clone());
                }
            }
        }
        self.joints.insert(id, joint);
    }

    pub fn joint(&self, unit: &UnitId) -> Option<&Arc<Joint>> { self.joints.get(unit) }

    pub fn joints(&self) -> impl Iterator<Item = &Arc<Joint>> { self.joints.iter().map(|(_, joint)| joint) }

    pub fn output(&self, output: &OutputRef) -> Option<&Output> { self.outputs.get(output) }

    pub fn outputs_of(&self, address: &Address) -> impl Iterator<Item = (&OutputRef, &Output)> {
        self.outputs_by_address
            .get(address)
            .into_iter()
            .flat_map(|refs| refs.iter())
            .filter_map(|output_ref| self.outputs.get(output_ref).map(|output| (output_ref, output)))
    }

    /// Every unit that spends `key`, in identifier order.
    pub fn spenders(&self, key: &SpendKey) -> impl Iterator<Item = &UnitId> { self.spends.get(key).into_iter().flatten() }

    /// Every unit `address` authored or co-authored, in identifier order.
    pub fn units_by(&self, address: &Address) -> impl Iterator<Item = &UnitId> { self.by_author.get(address).into_iter().flatten() }

    pub fn definition(&self, address: &Address) -> Option<&Definition> { self.definitions.get(address) }

    pub fn ball(&self, unit: &UnitId) -> Option<BallId> { self.balls.get(unit).copied() }

    pub fn set_ball(&mut self, unit: UnitId, ball: BallId) { self.balls.insert(unit, ball); }

    pub fn new_balls(&self) -> impl Iterator<Item = (UnitId, BallId)> + '_ {
        self.balls.touched().filter_map(|unit| self.balls.get(unit).map(|ball| (*unit, *ball)))
    }

    pub fn mark_final_bad(&mut self, unit: UnitId, content_hash: ContentHash) { self.final_bad.insert(unit, content_hash); }

    /// Content hash kept for a unit that lost a conflict.
    pub fn final_bad_content(&self, unit: &UnitId) -> Option<&ContentHash> { self.final_bad.get(unit) }

    pub fn credit(&mut self, key: CommissionKey, amount: u64) {
        let total = self.earnings.get(&key).copied().unwrap_or(0).saturating_add(amount);
        self.earnings.insert(key, total);
    }

    pub fn earning(&self, key: &CommissionKey) -> Option<u64> { self.earnings.get(key).copied() }

    /// Earnings of `address` of one kind over `from..=to`.
    pub fn earnings_in(&self, address: &Address, kind: CommissionKind, from: Mci, to: Mci) -> impl Iterator<Item = (&CommissionKey, &u64)> {
        let start = CommissionKey { address: address.clone(), kind, mci: from };
        let end = CommissionKey { address: address.clone(), kind, mci: to };
        self.earnings.range(start..=end)
    }

    /// All earnings of `address`.
    pub fn earnings_of<'a>(&'a self, address: &'a Address) -> impl Iterator<Item = (&'a CommissionKey, &'a u64)> {
        self.earnings.range(CommissionKey { address: address.clone(), kind: CommissionKind::Headers, mci: 0 }..).take_while(move |(key, _)| &key.address == address)
    }

    pub fn new_earnings(&self) -> impl Iterator<Item = (CommissionKey, u64)> + '_ {
        self.earnings.touched().filter_map(|key| self.earnings.get(key).map(|amount| (key.clone(), *amount)))
    }

    /// Highest main chain index whose commission of `kind` has been distributed.
    pub fn paid_through(&self, kind: CommissionKind) -> Option<Mci> {
        match kind {
            CommissionKind::Headers => *self.headers_paid_through.get(),
            CommissionKind::Witnessing => *self.witnessing_paid_through.get(),
        }
    }

    pub fn set_paid_through(&mut self, kind: CommissionKind, mci: Mci) {
        match kind {
            CommissionKind::Headers => self.headers_paid_through.set(Some(mci)),
            CommissionKind::Witnessing => self.witnessing_paid_through.set(Some(mci)),
        }
    }
}
