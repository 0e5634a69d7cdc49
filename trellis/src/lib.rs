//! # Trellis
//!
//! A DAG ledger. Units reference several earlier units as parents; a deterministic main
//! chain is derived from that DAG, and a fixed set of witnesses decides when a prefix of
//! the chain is final. Once an index is stable its units are sequenced, double spends are
//! settled, balls are computed and commissions are paid, identically on every node.
//!
//! ## Core Concepts
//!
//! - **Unit**: a signed DAG node carrying payment messages
//! - **Main chain**: the best-parent path from the best free unit back to genesis
//! - **Stability**: the point past which no alternate branch can overtake the main chain
//! - **Sequence**: whether a unit's spends stand (`Good`) or lost a conflict (`FinalBad`)
//! - **Ball**: the finality hash of a stable unit and its stable ancestry
//!
//! ## Example
//!
//! ```rust
//! # use trellis::{Ledger, LedgerConfig, proto::{Joint, ProtocolConfig, UnitComposer, Definition}};
//! # use ed25519_dalek::SigningKey;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let keys: Vec<SigningKey> = (1..=12u8).map(|seed| SigningKey::from_bytes(&[seed; 32])).collect();
//! let witnesses = keys
//!     .iter()
//!     .map(|key| Definition::from_verifying_key(&key.verifying_key()).address())
//!     .collect::<Result<Vec<_>, _>>()?;
//!
//! let protocol = ProtocolConfig::default();
//! let ledger = Ledger::in_memory(LedgerConfig::new().with_protocol(protocol.clone())).await?;
//! let genesis = UnitComposer::genesis(&protocol, witnesses.clone())
//!     .author(&keys[0], true)
//!     .change_to(witnesses[0].clone())
//!     .compose()?;
//! let accepted = ledger.submit_unit(Joint::new(genesis)).await?;
//! assert_eq!(accepted.last_stable_mci, Some(0));
//! # Ok(())
//! # }
//! ```

pub use trellis_core as core;
pub use trellis_proto as proto;
#[cfg(feature = "sled")]
pub use trellis_storage_sled as sled;

pub use proto::{Address, BallId, Joint, Mci, Unit, UnitId};
pub use trellis_core::{
    Accepted, Balance, CausalOrder, InvariantViolation, Ledger, LedgerConfig, LedgerError, LedgerStore, MemoryStore, Rejection,
    RejectionKind, RetryPolicy, Sequence, TopologyRecord,
};
