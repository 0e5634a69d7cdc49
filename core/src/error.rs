use thiserror::Error;
use trellis_proto::{Mci, UnitId, ValidationError};

/// A fact the engine relies on does not hold.
///
/// These are defects, not adversarial input: validation is supposed to make every one of
/// them unreachable. They abort the unit being processed and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("unit {0} is not in the DAG")]
    UnknownUnit(UnitId),
    #[error("no witness-compatible best parent for {0}")]
    BestParentNotFound(UnitId),
    #[error("main chain would be rebuilt from {anchor} below the last stable index {last_stable}")]
    StableChainTruncation { anchor: Mci, last_stable: Mci },
    #[error("main chain unit {0} has no index")]
    UnindexedMainChainUnit(UnitId),
    #[error("latest included main chain indices did not settle after {0} passes")]
    LimciFixedPointNotReached(usize),
    #[error("consensus fields of stable unit {0} would change")]
    StableRecordMutated(UnitId),
    #[error("no ball for stable unit {0}")]
    MissingBall(UnitId),
    #[error("no main chain unit at index {0}")]
    MissingMainChainIndex(Mci),
    #[error("canonical hashing failed: {0}")]
    Hash(String),
    #[error("replay diverged at {0}")]
    Replay(UnitId),
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// Worth retrying: the same batch may succeed later.
    #[error("transient store failure: {0}")]
    Transient(Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("store failure: {0}")]
    Fatal(Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("encoding error: {0}")]
    Codec(#[from] bincode::Error),
}

impl StoreError {
    pub fn is_transient(&self) -> bool { matches!(self, StoreError::Transient(_)) }
}

/// Why a submitted unit was not accepted.
#[derive(Error, Debug)]
pub enum Rejection {
    #[error("unit {0} is already known")]
    AlreadyKnown(UnitId),
    #[error("invalid unit: {0}")]
    Invalid(#[from] ValidationError),
    #[error("temporarily unavailable: {0}")]
    Unavailable(String),
    #[error("internal failure: {0}")]
    Fatal(#[from] LedgerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    AlreadyKnown,
    Invalid,
    Unavailable,
    Fatal,
}

impl From<InvariantViolation> for Rejection {
    fn from(err: InvariantViolation) -> Self { Rejection::Fatal(LedgerError::Invariant(err)) }
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Rejection::AlreadyKnown(_) => RejectionKind::AlreadyKnown,
            Rejection::Invalid(_) => RejectionKind::Invalid,
            Rejection::Unavailable(_) => RejectionKind::Unavailable,
            Rejection::Fatal(_) => RejectionKind::Fatal,
        }
    }
}

/// Outcome of checking a unit against the DAG.
#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("missing parents: {0:?}")]
    MissingParents(Vec<UnitId>),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

impl From<AdmissionError> for Rejection {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::Invalid(e) => Rejection::Invalid(e),
            AdmissionError::MissingParents(parents) => Rejection::Unavailable(format!("{} parent(s) not yet known", parents.len())),
            AdmissionError::Invariant(e) => Rejection::Fatal(LedgerError::Invariant(e)),
        }
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("stored unit {unit} no longer validates: {reason}")]
    CorruptStore { unit: UnitId, reason: String },
}
