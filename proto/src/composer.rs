//! Mechanical finalization of units.
//!
//! Coin selection is the caller's business; the composer only fills in what is fully
//! determined once inputs and outputs are chosen: commission sizes, the change amount,
//! payload hashes, signatures and the identity hash.

use std::collections::BTreeMap;

use ed25519_dalek::SigningKey;
use thiserror::Error;

use crate::config::ProtocolConfig;
use crate::error::HashError;
use crate::id::{Address, BallId, UnitId};
use crate::signature::{sign_digest, Definition, SIGNATURE_PATH};
use crate::unit::{Author, Input, Lineage, Message, Output, Payload, Recipient, Unit, WitnessListRef};
use crate::validation::{INLINE_LOCATION, PAYMENT_APP};

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("inputs of {available} cannot cover {required}")]
    InsufficientFunds { available: u64, required: u64 },
    #[error("no change address and inputs exceed outputs by {0}")]
    Unbalanced(u64),
    #[error("a unit needs at least one author")]
    NoAuthors,
    #[error(transparent)]
    Hash(#[from] HashError),
}

pub struct UnitComposer {
    version: String,
    alt: String,
    lineage: Lineage,
    witness_list: WitnessListRef,
    signers: Vec<(SigningKey, bool)>,
    inputs: Vec<Input>,
    input_total: u64,
    outputs: Vec<Output>,
    change_address: Option<Address>,
    recipients: Option<Vec<Recipient>>,
}

impl UnitComposer {
    fn new(config: &ProtocolConfig, lineage: Lineage, witness_list: WitnessListRef) -> Self {
        Self {
            version: config.version.clone(),
            alt: config.alt.clone(),
            lineage,
            witness_list,
            signers: Vec::new(),
            inputs: Vec::new(),
            input_total: 0,
            outputs: Vec::new(),
            change_address: None,
            recipients: None,
        }
    }

    pub fn genesis(config: &ProtocolConfig, mut witnesses: Vec<Address>) -> Self {
        witnesses.sort();
        let mut composer = Self::new(config, Lineage::Genesis, WitnessListRef::Inline(witnesses));
        composer.inputs.push(Input::Issue { amount: config.total_supply, serial_number: 1, address: None });
        composer.input_total = config.total_supply;
        composer
    }

    pub fn regular(
        config: &ProtocolConfig,
        mut parent_units: Vec<UnitId>,
        last_ball_unit: UnitId,
        last_ball: BallId,
        witness_list: WitnessListRef,
    ) -> Self {
        parent_units.sort();
        parent_units.dedup();
        Self::new(config, Lineage::Regular { parent_units, last_ball, last_ball_unit }, witness_list)
    }

    /// Sign as the address of `key`, revealing its definition when it has not been used before.
    pub fn author(mut self, key: &SigningKey, reveal_definition: bool) -> Self {
        self.signers.push((key.clone(), reveal_definition));
        self
    }

    pub fn input(mut self, input: Input, amount: u64) -> Self {
        self.inputs.push(input);
        self.input_total = self.input_total.saturating_add(amount);
        self
    }

    pub fn output(mut self, address: Address, amount: u64) -> Self {
        self.outputs.push(Output { address, amount });
        self
    }

    pub fn change_to(mut self, address: Address) -> Self {
        self.change_address = Some(address);
        self
    }

    pub fn recipients(mut self, recipients: Vec<Recipient>) -> Self {
        self.recipients = Some(recipients);
        self
    }

    pub fn compose(self) -> Result<Unit, ComposeError> {
        if self.signers.is_empty() {
            return Err(ComposeError::NoAuthors);
        }
        // a signature is always 88 base64 characters, so sizes can be taken before signing
        let placeholder = BTreeMap::from([(SIGNATURE_PATH.to_string(), "A".repeat(88))]);
        let mut signers = Vec::with_capacity(self.signers.len());
        for (key, reveal) in self.signers {
            let definition = Definition::from_verifying_key(&key.verifying_key());
            let address = definition.address()?;
            signers.push((address, definition, reveal, key));
        }
        signers.sort_by(|a, b| a.0.cmp(&b.0));
        let authors = signers
            .iter()
            .map(|(address, definition, reveal, _)| Author {
                address: address.clone(),
                authentifiers: placeholder.clone(),
                definition: reveal.then(|| definition.clone()),
            })
            .collect();

        let mut outputs = self.outputs;
        if let Some(change) = &self.change_address {
            // amounts are sized as numbers regardless of value
            outputs.push(Output { address: change.clone(), amount: 1 });
        }
        let payload = Payload { inputs: self.inputs, outputs };
        let mut unit = Unit {
            unit: UnitId::from_digest(&[0u8; 32]),
            version: self.version,
            alt: self.alt,
            lineage: self.lineage,
            witness_list: self.witness_list,
            authors,
            messages: vec![Message {
                app: PAYMENT_APP.to_string(),
                payload_location: INLINE_LOCATION.to_string(),
                payload_hash: payload.hash()?,
                payload,
            }],
            headers_commission: 0,
            payload_commission: 0,
            earned_headers_commission_recipients: self.recipients,
        };
        unit.headers_commission = unit.headers_size();
        unit.payload_commission = unit.payload_size();

        let declared: u64 = unit.messages[0].payload.outputs.iter().map(|o| o.amount).sum();
        let required = declared - u64::from(self.change_address.is_some()) + unit.headers_commission + unit.payload_commission;
        let message = &mut unit.messages[0];
        if self.change_address.is_some() {
            // the change output must stay positive
            if self.input_total <= required {
                return Err(ComposeError::InsufficientFunds { available: self.input_total, required: required + 1 });
            }
            if let Some(change) = message.payload.outputs.last_mut() {
                change.amount = self.input_total - required;
            }
        } else if self.input_total < required {
            return Err(ComposeError::InsufficientFunds { available: self.input_total, required });
        } else if self.input_total > required {
            return Err(ComposeError::Unbalanced(self.input_total - required));
        }
        message.payload.outputs.sort();
        message.payload_hash = message.payload.hash()?;

        let digest = unit.hash_to_sign()?;
        for (author, (_, _, _, key)) in unit.authors.iter_mut().zip(signers.iter()) {
            author.authentifiers = sign_digest(key, &digest);
        }
        unit.unit = unit.compute_hash()?;
        Ok(unit)
    }
}
