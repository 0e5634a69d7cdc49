pub mod balance;
pub mod balls;
pub mod commission;
pub mod config;
pub mod dag;
pub mod error;
pub mod ledger;
pub mod sequencer;
pub mod state;
pub mod storage;
pub mod util;
pub mod validation;

pub use balance::Balance;
pub use config::{LedgerConfig, RetryPolicy};
pub use dag::{CausalOrder, Dag, Sequence, TopologyRecord};
pub use error::{InvariantViolation, LedgerError, Rejection, RejectionKind, StoreError};
pub use ledger::{Accepted, Ledger};
pub use state::{CommissionKey, OutputRef, SpendKey};
pub use storage::{LedgerStore, MemoryStore, StoredLedger, WriteBatch};

pub use trellis_proto as proto;

#[cfg(test)]
#[ctor::ctor]
fn init_tracing() {
    use std::str::FromStr;
    // if LOG_LEVEL env var is set, use it
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        tracing_subscriber::fmt().with_max_level(tracing::Level::from_str(&level).unwrap()).with_test_writer().init();
    } else {
        tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).with_test_writer().init();
    }
}
