use sled::Db;
use trellis_proto::UnitId;

use crate::error::SledStoreError;

/// One sled tree per logical table.
pub struct Database {
    pub db: Db,
    pub(crate) joints: sled::Tree,
    pub(crate) records: sled::Tree,
    pub(crate) balls: sled::Tree,
    pub(crate) commissions: sled::Tree,
}

impl Database {
    pub fn open(db: Db) -> anyhow::Result<Self> {
        let joints = db.open_tree("joints")?; // units as received, keyed by unit id
        let records = db.open_tree("records")?; // topology records
        let balls = db.open_tree("balls")?;
        let commissions = db.open_tree("commissions")?; // earned commission per (address, kind, mci)

        Ok(Self { db, joints, records, balls, commissions })
    }

    /// Convenience method for tests - delegates to underlying sled db
    pub fn tree_names(&self) -> Vec<sled::IVec> { self.db.tree_names() }
}

pub(crate) fn unit_key(unit: &UnitId) -> &[u8] { unit.as_str().as_bytes() }

pub(crate) fn parse_unit_key(tree: &'static str, key: &[u8]) -> Result<UnitId, SledStoreError> {
    let text = std::str::from_utf8(key).map_err(|e| SledStoreError::InvalidKey { tree, reason: e.to_string() })?;
    UnitId::from_base64(text).map_err(|e| SledStoreError::InvalidKey { tree, reason: e.to_string() })
}
