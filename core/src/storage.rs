use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use trellis_proto::{BallId, Joint, UnitId};

use crate::dag::TopologyRecord;
use crate::error::StoreError;
use crate::state::CommissionKey;

pub mod memory;

pub use memory::MemoryStore;

/// Everything one accepted unit changed, written atomically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteBatch {
    pub joint: Option<Joint>,
    pub records: Vec<(UnitId, TopologyRecord)>,
    pub balls: Vec<(UnitId, BallId)>,
    pub commissions: Vec<(CommissionKey, u64)>,
}

impl WriteBatch {
    pub fn is_empty(&self) -> bool { self.joint.is_none() && self.records.is_empty() && self.balls.is_empty() && self.commissions.is_empty() }
}

/// The persisted ledger as loaded on open.
#[derive(Debug, Clone, Default)]
pub struct StoredLedger {
    pub joints: BTreeMap<UnitId, Joint>,
    pub records: BTreeMap<UnitId, TopologyRecord>,
    pub balls: BTreeMap<UnitId, BallId>,
    pub commissions: BTreeMap<CommissionKey, u64>,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn load(&self) -> Result<StoredLedger, StoreError>;

    /// Apply `batch` in full or not at all.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
