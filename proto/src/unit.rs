//! The unit: a DAG node carrying authors, a witness list reference and payment messages.
//!
//! Units are stored and shipped with their derived serde representation, but every hash
//! is computed over an explicit canonical JSON form built here, so that field naming and
//! optional-field handling in the hashed form never depend on serde attributes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::HashError;
use crate::hash::{base64, sha256, value_digest};
use crate::id::{Address, BallId, ContentHash, UnitId, HASH_LENGTH};
use crate::signature::Definition;
use crate::source_string::{object_length, source_string};

/// Main chain index.
pub type Mci = u64;

/// Fixed header size charged for parent references, whatever their count.
pub const PARENT_UNITS_SIZE: u64 = 2 * HASH_LENGTH as u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub unit: UnitId,
    pub version: String,
    pub alt: String,
    pub lineage: Lineage,
    pub witness_list: WitnessListRef,
    pub authors: Vec<Author>,
    pub messages: Vec<Message>,
    pub headers_commission: u64,
    pub payload_commission: u64,
    pub earned_headers_commission_recipients: Option<Vec<Recipient>>,
}

/// Genesis is the only unit without parents, so it is its own variant rather than a unit
/// whose parent and last ball fields happen to be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lineage {
    Genesis,
    Regular { parent_units: Vec<UnitId>, last_ball: BallId, last_ball_unit: UnitId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WitnessListRef {
    Inline(Vec<Address>),
    Unit(UnitId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub address: Address,
    /// Signature path (`r` for a plain signature definition) to base64 signature.
    pub authentifiers: BTreeMap<String, String>,
    /// Carried on the first use of an address only.
    pub definition: Option<Definition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub address: Address,
    pub share: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub app: String,
    pub payload_location: String,
    pub payload_hash: String,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Input {
    /// Creation of the whole supply, only valid in genesis.
    Issue { amount: u64, serial_number: u64, address: Option<Address> },
    Transfer { unit: UnitId, message_index: u32, output_index: u32 },
    HeadersCommission { from_main_chain_index: Mci, to_main_chain_index: Mci, address: Option<Address> },
    Witnessing { from_main_chain_index: Mci, to_main_chain_index: Mci, address: Option<Address> },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Output {
    pub address: Address,
    pub amount: u64,
}

/// Which commission ledger a commission input draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CommissionKind {
    Headers,
    Witnessing,
}

impl Input {
    pub fn canonical(&self) -> Value {
        match self {
            Input::Issue { amount, serial_number, address } => {
                let mut map = Map::new();
                map.insert("type".into(), json!("issue"));
                map.insert("amount".into(), json!(amount));
                map.insert("serial_number".into(), json!(serial_number));
                if let Some(address) = address {
                    map.insert("address".into(), json!(address));
                }
                Value::Object(map)
            }
            Input::Transfer { unit, message_index, output_index } => {
                json!({"unit": unit, "message_index": message_index, "output_index": output_index})
            }
            Input::HeadersCommission { from_main_chain_index, to_main_chain_index, address } => {
                commission_input("headers_commission", *from_main_chain_index, *to_main_chain_index, address.as_ref())
            }
            Input::Witnessing { from_main_chain_index, to_main_chain_index, address } => {
                commission_input("witnessing", *from_main_chain_index, *to_main_chain_index, address.as_ref())
            }
        }
    }

    /// The commission range spent by this input, if it is a commission input.
    pub fn commission_range(&self) -> Option<(CommissionKind, Mci, Mci, Option<&Address>)> {
        match self {
            Input::HeadersCommission { from_main_chain_index, to_main_chain_index, address } => {
                Some((CommissionKind::Headers, *from_main_chain_index, *to_main_chain_index, address.as_ref()))
            }
            Input::Witnessing { from_main_chain_index, to_main_chain_index, address } => {
                Some((CommissionKind::Witnessing, *from_main_chain_index, *to_main_chain_index, address.as_ref()))
            }
            _ => None,
        }
    }
}

fn commission_input(kind: &str, from: Mci, to: Mci, address: Option<&Address>) -> Value {
    let mut map = Map::new();
    map.insert("type".into(), json!(kind));
    map.insert("from_main_chain_index".into(), json!(from));
    map.insert("to_main_chain_index".into(), json!(to));
    if let Some(address) = address {
        map.insert("address".into(), json!(address));
    }
    Value::Object(map)
}

impl Output {
    pub fn canonical(&self) -> Value { json!({"address": self.address, "amount": self.amount}) }
}

impl Payload {
    pub fn canonical(&self) -> Value {
        json!({
            "inputs": self.inputs.iter().map(Input::canonical).collect::<Vec<_>>(),
            "outputs": self.outputs.iter().map(Output::canonical).collect::<Vec<_>>(),
        })
    }

    pub fn hash(&self) -> Result<String, HashError> { Ok(base64(&value_digest(&self.canonical())?)) }
}

impl Message {
    pub fn canonical(&self, with_payload: bool) -> Value {
        let mut map = Map::new();
        map.insert("app".into(), json!(self.app));
        map.insert("payload_location".into(), json!(self.payload_location));
        map.insert("payload_hash".into(), json!(self.payload_hash));
        if with_payload {
            map.insert("payload".into(), self.payload.canonical());
        }
        Value::Object(map)
    }
}

impl Author {
    pub fn canonical(&self, with_authentifiers: bool) -> Value {
        let mut map = Map::new();
        map.insert("address".into(), json!(self.address));
        if with_authentifiers {
            map.insert("authentifiers".into(), json!(self.authentifiers));
        }
        if let Some(definition) = &self.definition {
            map.insert("definition".into(), definition.canonical());
        }
        Value::Object(map)
    }
}

impl Recipient {
    pub fn canonical(&self) -> Value { json!({"address": self.address, "share": self.share}) }
}

impl Unit {
    pub fn is_genesis(&self) -> bool { matches!(self.lineage, Lineage::Genesis) }

    pub fn parent_units(&self) -> &[UnitId] {
        match &self.lineage {
            Lineage::Genesis => &[],
            Lineage::Regular { parent_units, .. } => parent_units,
        }
    }

    pub fn author_addresses(&self) -> impl Iterator<Item = &Address> { self.authors.iter().map(|a| &a.address) }

    fn insert_witness_list(&self, map: &mut Map<String, Value>) {
        match &self.witness_list {
            WitnessListRef::Inline(witnesses) => map.insert("witnesses".into(), json!(witnesses)),
            WitnessListRef::Unit(unit) => map.insert("witness_list_unit".into(), json!(unit)),
        };
    }

    fn insert_lineage(&self, map: &mut Map<String, Value>) {
        if let Lineage::Regular { parent_units, last_ball, last_ball_unit } = &self.lineage {
            map.insert("parent_units".into(), json!(parent_units));
            map.insert("last_ball".into(), json!(last_ball));
            map.insert("last_ball_unit".into(), json!(last_ball_unit));
        }
    }

    /// The unit without its identity, commissions and message payloads.
    pub fn naked(&self, with_authentifiers: bool) -> Value {
        let mut map = Map::new();
        map.insert("version".into(), json!(self.version));
        map.insert("alt".into(), json!(self.alt));
        self.insert_witness_list(&mut map);
        self.insert_lineage(&mut map);
        map.insert("authors".into(), Value::Array(self.authors.iter().map(|a| a.canonical(with_authentifiers)).collect()));
        map.insert("messages".into(), Value::Array(self.messages.iter().map(|m| m.canonical(false)).collect()));
        if let Some(recipients) = &self.earned_headers_commission_recipients {
            map.insert("earned_headers_commission_recipients".into(), Value::Array(recipients.iter().map(Recipient::canonical).collect()));
        }
        Value::Object(map)
    }

    pub fn content_hash(&self) -> Result<ContentHash, HashError> { Ok(ContentHash::from_digest(&value_digest(&self.naked(true))?)) }

    /// Recompute the identity hash from content.
    pub fn compute_hash(&self) -> Result<UnitId, HashError> {
        let mut map = Map::new();
        map.insert("alt".into(), json!(self.alt));
        map.insert("version".into(), json!(self.version));
        map.insert("content_hash".into(), json!(self.content_hash()?));
        map.insert("authors".into(), Value::Array(self.authors.iter().map(|a| json!({"address": a.address})).collect()));
        self.insert_witness_list(&mut map);
        self.insert_lineage(&mut map);
        Ok(UnitId::from_digest(&value_digest(&Value::Object(map))?))
    }

    /// Digest the authors sign: the naked unit without authentifiers.
    pub fn hash_to_sign(&self) -> Result<[u8; 32], HashError> { Ok(sha256(source_string(&self.naked(false))?.as_bytes())) }

    /// Anti-spam size of everything but the messages.
    pub fn headers_size(&self) -> u64 {
        let mut map = Map::new();
        self.insert_witness_list(&mut map);
        map.insert("authors".into(), Value::Array(self.authors.iter().map(|a| a.canonical(true)).collect()));
        map.insert("version".into(), json!(self.version));
        map.insert("alt".into(), json!(self.alt));
        object_length(&Value::Object(map)) + PARENT_UNITS_SIZE
    }

    pub fn payload_size(&self) -> u64 { object_length(&Value::Array(self.messages.iter().map(|m| m.canonical(true)).collect())) }
}
