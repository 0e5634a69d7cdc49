use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use sled::transaction::ConflictableTransactionError;
use sled::{Config, Transactional};
use tokio::task;
use tracing::debug;
use trellis_core::{CommissionKey, LedgerStore, StoreError, StoredLedger, WriteBatch};

use crate::database::{parse_unit_key, unit_key, Database};
use crate::error::SledStoreError;

pub struct SledStore {
    pub database: Arc<Database>,
}

impl SledStore {
    pub fn with_homedir_folder(folder_name: &str) -> anyhow::Result<Self> {
        let dir = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Failed to get home directory"))?.join(folder_name);

        Self::with_path(dir)
    }

    pub fn with_path(path: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&path)?;
        let dbpath = path.join("sled");
        let db = sled::open(&dbpath)?;
        Ok(Self { database: Arc::new(Database::open(db)?) })
    }

    pub fn new() -> anyhow::Result<Self> { Self::with_homedir_folder(".trellis") }

    pub fn new_test() -> anyhow::Result<Self> {
        let db = Config::new().temporary(true).flush_every_ms(None).open()?;
        Ok(Self { database: Arc::new(Database::open(db)?) })
    }

    fn load_blocking(database: &Database) -> Result<StoredLedger, SledStoreError> {
        let mut ledger = StoredLedger::default();
        for entry in database.joints.iter() {
            let (key, value) = entry?;
            ledger.joints.insert(parse_unit_key("joints", &key)?, bincode::deserialize(&value)?);
        }
        for entry in database.records.iter() {
            let (key, value) = entry?;
            ledger.records.insert(parse_unit_key("records", &key)?, bincode::deserialize(&value)?);
        }
        for entry in database.balls.iter() {
            let (key, value) = entry?;
            ledger.balls.insert(parse_unit_key("balls", &key)?, bincode::deserialize(&value)?);
        }
        for entry in database.commissions.iter() {
            let (key, value) = entry?;
            let key: CommissionKey = bincode::deserialize(&key)?;
            ledger.commissions.insert(key, bincode::deserialize(&value)?);
        }
        Ok(ledger)
    }

    async fn commit_batch(&self, batch: WriteBatch) -> Result<(), SledStoreError> {
        // encode everything up front so the transaction body cannot fail on its own
        let joint = match &batch.joint {
            Some(joint) => Some((unit_key(&joint.unit.unit).to_vec(), bincode::serialize(joint)?)),
            None => None,
        };
        let mut records = Vec::with_capacity(batch.records.len());
        for (unit, record) in &batch.records {
            records.push((unit_key(unit).to_vec(), bincode::serialize(record)?));
        }
        let mut balls = Vec::with_capacity(batch.balls.len());
        for (unit, ball) in &batch.balls {
            balls.push((unit_key(unit).to_vec(), bincode::serialize(ball)?));
        }
        let mut commissions = Vec::with_capacity(batch.commissions.len());
        for (key, amount) in &batch.commissions {
            commissions.push((bincode::serialize(key)?, bincode::serialize(amount)?));
        }

        let database = &self.database;
        (&database.joints, &database.records, &database.balls, &database.commissions).transaction(
            |(joints_tx, records_tx, balls_tx, commissions_tx)| {
                if let Some((key, value)) = &joint {
                    joints_tx.insert(key.as_slice(), value.as_slice())?;
                }
                for (key, value) in &records {
                    records_tx.insert(key.as_slice(), value.as_slice())?;
                }
                for (key, value) in &balls {
                    balls_tx.insert(key.as_slice(), value.as_slice())?;
                }
                for (key, value) in &commissions {
                    commissions_tx.insert(key.as_slice(), value.as_slice())?;
                }
                Ok::<(), ConflictableTransactionError<()>>(())
            },
        )?;
        database.db.flush_async().await?;
        debug!(records = records.len(), balls = balls.len(), commissions = commissions.len(), "batch committed");
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for SledStore {
    async fn load(&self) -> Result<StoredLedger, StoreError> {
        // a full scan, so keep it off the async workers
        let database = self.database.clone();
        Ok(task::spawn_blocking(move || Self::load_blocking(&database)).await.map_err(SledStoreError::from)??)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> { Ok(self.commit_batch(batch).await?) }
}
