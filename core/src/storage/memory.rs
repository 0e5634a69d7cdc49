use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{LedgerStore, StoredLedger, WriteBatch};
use crate::error::StoreError;

/// A store that keeps everything in memory. Used by tests and by nodes that rebuild from
/// peers on every start.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: Mutex<StoredLedger>,
    failures: AtomicU32,
    commits: AtomicU32,
}

#[derive(Debug, thiserror::Error)]
#[error("simulated store outage")]
struct SimulatedOutage;

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Make the next `count` commits fail with a transient error.
    pub fn fail_next_commits(&self, count: u32) { self.failures.store(count, Ordering::SeqCst); }

    /// Number of batches applied so far.
    pub fn commit_count(&self) -> u32 { self.commits.load(Ordering::SeqCst) }

    pub async fn snapshot(&self) -> StoredLedger { self.ledger.lock().await.clone() }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn load(&self) -> Result<StoredLedger, StoreError> { Ok(self.ledger.lock().await.clone()) }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            return Err(StoreError::Transient(Box::new(SimulatedOutage)));
        }
        let mut ledger = self.ledger.lock().await;
        if let Some(joint) = batch.joint {
            ledger.joints.insert(joint.unit.unit, joint);
        }
        ledger.records.extend(batch.records);
        ledger.balls.extend(batch.balls);
        ledger.commissions.extend(batch.commissions);
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
