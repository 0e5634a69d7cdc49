use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::BallId;
use crate::unit::Unit;

/// A unit as it was ingested: the unit itself, its ball once known, and when it arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Joint {
    pub unit: Unit,
    pub ball: Option<BallId>,
    pub received_at: DateTime<Utc>,
}

impl Joint {
    pub fn new(unit: Unit) -> Self { Self { unit, ball: None, received_at: Utc::now() } }
}
