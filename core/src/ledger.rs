use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use trellis_proto::{validate_unit, Address, BallId, Definition, Joint, Mci, UnitId};

use crate::balance::{self, Balance};
use crate::config::LedgerConfig;
use crate::dag::{CausalOrder, Dag, NewUnit, Sequence, TopologyRecord};
use crate::error::{InvariantViolation, LedgerError, Rejection, StoreError};
use crate::state::{CommissionKey, LedgerState, OutputRef};
use crate::storage::{LedgerStore, MemoryStore, WriteBatch};
use crate::{action_info, action_warn, balls, commission, sequencer, validation};

/// Result of accepting a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accepted {
    pub unit: UnitId,
    pub sequence: Sequence,
    /// Main chain indices that became stable because of this unit.
    pub stabilized: Vec<Mci>,
    pub last_stable_mci: Option<Mci>,
}

/// The DAG and the ledger state derived from it.
#[derive(Debug, Clone)]
struct LedgerCore {
    dag: Dag,
    state: LedgerState,
}

impl LedgerCore {
    fn new(config: &LedgerConfig) -> Self { Self { dag: Dag::new((&config.protocol).into()), state: LedgerState::new() } }

    fn begin(&mut self) {
        self.dag.begin();
        self.state.begin();
    }

    fn rollback(&mut self) {
        self.dag.rollback();
        self.state.rollback();
    }

    fn commit(&mut self) {
        self.dag.commit();
        self.state.commit();
    }

    /// Validate `joint` and run it through topology, main chain, stability, sequencing and
    /// commissions. Must run inside a journal.
    fn apply(&mut self, joint: Arc<Joint>, config: &LedgerConfig) -> Result<Accepted, Rejection> {
        let unit = &joint.unit;
        let id = unit.unit;
        if self.dag.contains(&id) {
            return Err(Rejection::AlreadyKnown(id));
        }
        validate_unit(unit, &config.protocol)?;
        let admission = validation::admit(unit, &self.dag, &self.state, config)?;

        for demoted in &admission.demoted {
            debug!(unit = %demoted, by = %id, "conflicting spend, demoted to temp-bad");
            self.dag.set_sequence(demoted, Sequence::TempBad)?;
        }
        self.state.add_unit(joint.clone(), &admission.spends);
        self.dag.attach(NewUnit {
            id,
            parents: unit.parent_units().to_vec(),
            authors: unit.author_addresses().cloned().collect(),
            witnesses: admission.witnesses,
            headers_commission: unit.headers_commission,
            payload_commission: unit.payload_commission,
            recipients: unit.earned_headers_commission_recipients.clone().unwrap_or_default(),
            sequence: admission.sequence,
        })?;
        self.dag.update_main_chain()?;

        let mut stabilized = Vec::new();
        while let Some(mci) = self.dag.next_stable_mci()? {
            self.stabilize(mci, config)?;
            stabilized.push(mci);
        }
        let sequence = self.dag.record(&id)?.sequence;
        Ok(Accepted { unit: id, sequence, stabilized, last_stable_mci: self.dag.last_stable_mci() })
    }

    fn stabilize(&mut self, mci: Mci, config: &LedgerConfig) -> Result<(), InvariantViolation> {
        sequencer::settle(&mut self.dag, &mut self.state, mci)?;
        let units = self.dag.mark_stable(mci)?;
        balls::compute(&self.dag, &mut self.state, mci, &units)?;
        commission::distribute(&self.dag, &mut self.state, mci, config.protocol.count_mc_balls_for_paid_witnessing)?;
        action_info!(format!("mci {mci}"), "stable", "{} unit(s)", units.len());
        Ok(())
    }

    /// Everything the current journal changed.
    fn batch(&self, joint: &Joint) -> Result<WriteBatch, InvariantViolation> {
        let mut records = Vec::new();
        for unit in self.dag.touched() {
            records.push((*unit, self.dag.record(unit)?.clone()));
        }
        Ok(WriteBatch {
            joint: Some(joint.clone()),
            records,
            balls: self.state.new_balls().collect(),
            commissions: self.state.new_earnings().collect(),
        })
    }
}

/// A journaled change to the core. Dropping it without [`Pending::commit`] rolls back,
/// which also covers a cancelled submission.
struct Pending<'a> {
    core: &'a mut LedgerCore,
    committed: bool,
}

impl<'a> Pending<'a> {
    fn begin(core: &'a mut LedgerCore) -> Self {
        core.begin();
        Self { core, committed: false }
    }

    fn commit(mut self) {
        self.core.commit();
        self.committed = true;
    }
}

impl Deref for Pending<'_> {
    type Target = LedgerCore;
    fn deref(&self) -> &LedgerCore { self.core }
}

impl DerefMut for Pending<'_> {
    fn deref_mut(&mut self) -> &mut LedgerCore { self.core }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.core.rollback();
        }
    }
}

enum AttemptError {
    Rejected(Rejection),
    Transient(StoreError),
}

impl From<Rejection> for AttemptError {
    fn from(err: Rejection) -> Self { AttemptError::Rejected(err) }
}

impl From<InvariantViolation> for AttemptError {
    fn from(err: InvariantViolation) -> Self { AttemptError::Rejected(err.into()) }
}

/// A node's view of the DAG ledger.
///
/// Units are accepted one at a time; reads run concurrently against the last committed
/// state. The writer works on its own copy of the core and only swaps it in once the
/// store has the batch, so readers never wait on store I/O.
pub struct Ledger {
    config: LedgerConfig,
    store: Arc<dyn LedgerStore>,
    /// Working copy, equal to `core` whenever no submission is in flight.
    writer: Mutex<LedgerCore>,
    core: RwLock<LedgerCore>,
}

impl Ledger {
    /// Open a ledger over `store`, replaying whatever it holds.
    pub async fn open(config: LedgerConfig, store: Arc<dyn LedgerStore>) -> Result<Self, LedgerError> {
        let stored = store.load().await?;
        let mut core = LedgerCore::new(&config);

        let mut order: Vec<(u64, UnitId)> =
            stored.joints.keys().map(|id| (stored.records.get(id).map_or(u64::MAX, |record| record.level), *id)).collect();
        order.sort();
        for (_, id) in &order {
            let Some(joint) = stored.joints.get(id) else { continue };
            let mut pending = Pending::begin(&mut core);
            if let Err(rejection) = pending.apply(Arc::new(joint.clone()), &config) {
                return Err(LedgerError::CorruptStore { unit: *id, reason: rejection.to_string() });
            }
            pending.commit();
        }

        for (id, stored_record) in &stored.records {
            if !stored_record.is_stable {
                continue;
            }
            if !core.dag.record(id)?.consensus_eq(stored_record) {
                error!(unit = %id, "replayed record differs from the stored one");
                return Err(InvariantViolation::Replay(*id).into());
            }
        }
        for (id, ball) in &stored.balls {
            if core.state.ball(id).as_ref() != Some(ball) {
                error!(unit = %id, "replayed ball differs from the stored one");
                return Err(InvariantViolation::Replay(*id).into());
            }
        }

        info!(units = order.len(), last_stable_mci = ?core.dag.last_stable_mci(), "ledger opened");
        Ok(Self { config, store, writer: Mutex::new(core.clone()), core: RwLock::new(core) })
    }

    /// A ledger backed by a fresh [`MemoryStore`].
    pub async fn in_memory(config: LedgerConfig) -> Result<Self, LedgerError> { Self::open(config, Arc::new(MemoryStore::new())).await }

    pub fn config(&self) -> &LedgerConfig { &self.config }

    /// Validate and accept a unit, persisting everything it changed.
    ///
    /// Transient store failures restart the whole pipeline after a backoff. Nothing is
    /// visible to readers until the store has taken the batch.
    pub async fn submit_unit(&self, joint: Joint) -> Result<Accepted, Rejection> {
        let joint = Arc::new(joint);
        let id = joint.unit.unit;
        let mut working = self.writer.lock().await;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(&mut working, &joint).await {
                Ok(accepted) => {
                    action_info!(id, "accepted", "{:?}, last stable {:?}", accepted.sequence, accepted.last_stable_mci);
                    return Ok(accepted);
                }
                Err(AttemptError::Rejected(rejection)) => {
                    match &rejection {
                        Rejection::Fatal(err) => error!(unit = %id, "processing aborted: {err}"),
                        other => action_warn!(id, "rejected", "{}", other),
                    }
                    return Err(rejection);
                }
                Err(AttemptError::Transient(err)) => {
                    if attempt >= self.config.retry.max_attempts {
                        warn!(unit = %id, attempt, "giving up after transient store failures: {err}");
                        return Err(Rejection::Unavailable(format!("store unavailable after {attempt} attempts")));
                    }
                    let delay = self.config.retry.backoff(attempt);
                    debug!(unit = %id, attempt, ?delay, "transient store failure, retrying: {err}");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(&self, working: &mut LedgerCore, joint: &Arc<Joint>) -> Result<Accepted, AttemptError> {
        let mut pending = Pending::begin(working);
        let accepted = pending.apply(joint.clone(), &self.config)?;
        let batch = pending.batch(joint)?;
        match self.store.commit(batch).await {
            Ok(()) => {}
            Err(err) if err.is_transient() => return Err(AttemptError::Transient(err)),
            Err(err) => return Err(AttemptError::Rejected(Rejection::Fatal(LedgerError::Store(err)))),
        }
        let mut published = self.core.write().await;
        pending.commit();
        std::mem::swap(&mut *published, working);
        drop(published);

        // the working copy now holds the previous state; bring it level outside the lock
        let caught_up = {
            let mut pending = Pending::begin(working);
            match pending.apply(joint.clone(), &self.config) {
                Ok(_) => {
                    pending.commit();
                    true
                }
                Err(err) => {
                    error!(unit = %joint.unit.unit, "working copy diverged from the published ledger: {err}");
                    false
                }
            }
        };
        if !caught_up {
            *working = self.core.read().await.clone();
        }
        Ok(accepted)
    }

    pub async fn query_balance(&self, address: &Address) -> Result<Balance, LedgerError> {
        let core = self.core.read().await;
        Ok(balance::balance_of(&core.dag, &core.state, address)?)
    }

    /// Stable unspent outputs of `address`.
    pub async fn spendable_outputs(&self, address: &Address) -> Result<Vec<(OutputRef, u64)>, LedgerError> {
        let core = self.core.read().await;
        Ok(balance::spendable_outputs(&core.dag, &core.state, address)?)
    }

    /// Commissions credited to `address`, spent or not, in key order.
    pub async fn commission_earnings(&self, address: &Address) -> Vec<(CommissionKey, u64)> {
        let core = self.core.read().await;
        core.state.earnings_of(address).map(|(key, amount)| (key.clone(), *amount)).collect()
    }

    /// The configured witness list, or the one declared by genesis.
    pub async fn query_witness_list(&self) -> Vec<Address> {
        if let Some(witnesses) = &self.config.witnesses {
            return witnesses.clone();
        }
        let core = self.core.read().await;
        core.dag.genesis().and_then(|genesis| core.dag.node(&genesis).ok()).map(|node| node.witnesses.to_vec()).unwrap_or_default()
    }

    pub async fn compare(&self, a: &UnitId, b: &UnitId) -> Result<CausalOrder, LedgerError> { Ok(self.core.read().await.dag.compare(a, b)?) }

    pub async fn is_included_in(&self, earlier: &UnitId, later: &UnitId) -> Result<bool, LedgerError> {
        Ok(self.core.read().await.dag.is_included_in(earlier, later)?)
    }

    pub async fn unit_props(&self, unit: &UnitId) -> Option<TopologyRecord> { self.core.read().await.dag.record(unit).ok().cloned() }

    pub async fn joint(&self, unit: &UnitId) -> Option<Joint> { self.core.read().await.state.joint(unit).map(|joint| joint.as_ref().clone()) }

    pub async fn ball(&self, unit: &UnitId) -> Option<BallId> { self.core.read().await.state.ball(unit) }

    pub async fn last_stable_mci(&self) -> Option<Mci> { self.core.read().await.dag.last_stable_mci() }

    /// The last stable main chain unit and its ball, which new units reference.
    pub async fn last_stable_ball(&self) -> Option<(UnitId, BallId)> {
        let core = self.core.read().await;
        let unit = core.dag.main_chain_unit(core.dag.last_stable_mci()?)?;
        Some((unit, core.state.ball(&unit)?))
    }

    pub async fn main_chain(&self) -> Vec<(Mci, UnitId)> { self.core.read().await.dag.main_chain().collect() }

    pub async fn free_units(&self) -> Vec<UnitId> { self.core.read().await.dag.free_units().copied().collect() }

    pub async fn definition(&self, address: &Address) -> Option<Definition> { self.core.read().await.state.definition(address).cloned() }

    pub async fn is_stable(&self, unit: &UnitId) -> bool { self.core.read().await.dag.is_stable(unit).unwrap_or(false) }
}
