use thiserror::Error;

use crate::id::{Address, UnitId};

#[derive(Debug)]
pub enum DecodeError {
    InvalidBase64(base64::DecodeError),
    InvalidBase32(char),
    InvalidLength(usize),
    InvalidChecksum,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InvalidBase64(e) => write!(f, "Invalid Base64: {}", e),
            DecodeError::InvalidBase32(c) => write!(f, "Invalid Base32 character: {:?}", c),
            DecodeError::InvalidLength(len) => write!(f, "Invalid Length: {}", len),
            DecodeError::InvalidChecksum => write!(f, "Invalid Checksum"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<base64::DecodeError> for DecodeError {
    fn from(e: base64::DecodeError) -> Self { DecodeError::InvalidBase64(e) }
}

/// Failures of the canonical source-string serializer.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("null value at {0}")]
    NullValue(String),
    #[error("empty array at {0}")]
    EmptyArray(String),
    #[error("empty object at {0}")]
    EmptyObject(String),
    #[error("value is not representable: {0}")]
    Unrepresentable(#[from] serde_json::Error),
}

/// Reasons a unit is permanently rejected.
///
/// Everything here is a property of the unit and the DAG it references, never of the
/// local node's transient condition, so a unit rejected with one of these is never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    // structure
    #[error("declared hash {declared} does not match computed {computed}")]
    HashMismatch { declared: UnitId, computed: UnitId },
    #[error("unsupported version {0}")]
    UnsupportedVersion(String),
    #[error("unsupported alt {0}")]
    UnsupportedAlt(String),
    #[error("wrong number of parents: {0}")]
    ParentCount(usize),
    #[error("parent units are not strictly ascending")]
    ParentsNotSorted,
    #[error("wrong number of authors: {0}")]
    AuthorCount(usize),
    #[error("authors are not strictly ascending")]
    AuthorsNotSorted,
    #[error("invalid address {0}")]
    InvalidAddress(String),
    #[error("author {0} has no authentifiers")]
    MissingAuthentifiers(Address),
    #[error("definition does not hash to author {0}")]
    DefinitionMismatch(Address),
    #[error("wrong number of witnesses: {0}")]
    WitnessCount(usize),
    #[error("witnesses are not strictly ascending")]
    WitnessesNotSorted,
    #[error("genesis must declare its witness list inline")]
    GenesisWitnessReference,
    #[error("wrong number of messages: {0}")]
    MessageCount(usize),
    #[error("unsupported app {0}")]
    UnsupportedApp(String),
    #[error("unsupported payload location {0}")]
    UnsupportedPayloadLocation(String),
    #[error("payload hash mismatch in message {0}")]
    PayloadHashMismatch(usize),
    #[error("wrong number of inputs in message {message}: {count}")]
    InputCount { message: usize, count: usize },
    #[error("wrong number of outputs in message {message}: {count}")]
    OutputCount { message: usize, count: usize },
    #[error("zero amount output in message {0}")]
    ZeroAmount(usize),
    #[error("outputs of message {0} are not sorted")]
    OutputsNotSorted(usize),
    #[error("{field} declared {declared}, computed {computed}")]
    CommissionMismatch { field: &'static str, declared: u64, computed: u64 },
    #[error("multi-author units must name headers commission recipients")]
    RecipientsRequired,
    #[error("wrong number of headers commission recipients: {0}")]
    RecipientCount(usize),
    #[error("headers commission recipient share {0} is outside 1..=100")]
    RecipientShare(u32),
    #[error("headers commission recipient shares sum to {0}")]
    RecipientShares(u64),
    #[error("headers commission recipients are not strictly ascending")]
    RecipientsNotSorted,
    #[error("canonical form: {0}")]
    Canonical(String),

    // context
    #[error("a genesis unit is already known")]
    GenesisExists,
    #[error("genesis {0} is not the configured genesis")]
    UnexpectedGenesis(UnitId),
    #[error("witness list unit {0} is unknown, unstable or declares no list")]
    BadWitnessListUnit(UnitId),
    #[error("no parent shares enough witnesses")]
    NoCompatibleParent,
    #[error("author {0} appears in more than one parent")]
    SameAuthorInParents(Address),
    #[error("last ball unit {0} is unknown")]
    LastBallUnknown(UnitId),
    #[error("last ball unit {0} is not on the main chain")]
    LastBallNotOnMainChain(UnitId),
    #[error("last ball of {0} does not match the stable ball")]
    LastBallMismatch(UnitId),
    #[error("last ball unit {0} is not included by the parents")]
    LastBallNotIncluded(UnitId),
    #[error("last ball retreats behind a parent's last ball")]
    LastBallRetreats,
    #[error("definition of {0} is neither carried nor known")]
    UnknownDefinition(Address),
    #[error("bad signature by {0}")]
    InvalidSignature(Address),
    #[error("input spends unknown output {unit}:{message_index}:{output_index}")]
    UnknownOutput { unit: UnitId, message_index: u32, output_index: u32 },
    #[error("input source {0} is not included by the parents")]
    SourceNotIncluded(UnitId),
    #[error("input source {0} is not serial")]
    SourceNotGood(UnitId),
    #[error("output owner {0} is not among the authors")]
    NotOwner(Address),
    #[error("issue inputs are only valid in genesis")]
    IssueOutsideGenesis,
    #[error("issue must cover the whole supply of {expected}, got {actual}")]
    IssueAmount { expected: u64, actual: u64 },
    #[error("the same source is spent twice within the unit")]
    DuplicateInput,
    #[error("inputs total {inputs}, outputs plus fees total {outputs}")]
    Unbalanced { inputs: u64, outputs: u64 },
    #[error("double spend of a source already spent by an ancestor")]
    DoubleSpend,
    #[error("invalid commission range {from}..={to}")]
    InvalidCommissionRange { from: u64, to: u64 },
    #[error("commission range ending at {0} is not spendable yet")]
    CommissionNotSpendable(u64),
    #[error("commission range {from}..={to} has no earnings")]
    EmptyCommissionRange { from: u64, to: u64 },
    #[error("amount overflow")]
    AmountOverflow,
}

impl From<HashError> for ValidationError {
    fn from(err: HashError) -> Self { ValidationError::Canonical(err.to_string()) }
}
