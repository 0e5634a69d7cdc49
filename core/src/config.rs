use std::time::Duration;

use trellis_proto::{Address, ProtocolConfig, UnitId};

/// How a unit's pipeline is retried after a transient store failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self { Self { max_attempts: 5, initial_backoff: Duration::from_millis(20), max_backoff: Duration::from_secs(2) } }
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (1-based), doubling from the initial backoff.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LedgerConfig {
    pub protocol: ProtocolConfig,
    pub retry: RetryPolicy,
    /// When set, only this unit is accepted as genesis.
    pub genesis_unit: Option<UnitId>,
    /// The witness list this node prefers; defaults to the genesis list.
    pub witnesses: Option<Vec<Address>>,
}

impl LedgerConfig {
    pub fn new() -> Self { Self::default() }

    pub fn with_protocol(mut self, protocol: ProtocolConfig) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_genesis_unit(mut self, unit: UnitId) -> Self {
        self.genesis_unit = Some(unit);
        self
    }

    pub fn with_witnesses(mut self, mut witnesses: Vec<Address>) -> Self {
        witnesses.sort();
        self.witnesses = Some(witnesses);
        self
    }
}
