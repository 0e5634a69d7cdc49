//! Structural validation: everything about a unit that can be checked without the DAG.

use crate::chash::CHASH160_LENGTH;
use crate::config::ProtocolConfig;
use crate::error::ValidationError;
use crate::id::Address;
use crate::unit::{Lineage, Unit, WitnessListRef};

pub const PAYMENT_APP: &str = "payment";
pub const INLINE_LOCATION: &str = "inline";

fn strictly_ascending<T: Ord>(items: &[T]) -> bool { items.windows(2).all(|pair| pair[0] < pair[1]) }

fn check_address(address: &Address) -> Result<(), ValidationError> {
    // addresses are checked on deserialization, but units can also be built in memory
    if address.as_str().len() != CHASH160_LENGTH || Address::parse(address.as_str()).is_err() {
        return Err(ValidationError::InvalidAddress(address.to_string()));
    }
    Ok(())
}

pub fn validate_unit(unit: &Unit, config: &ProtocolConfig) -> Result<(), ValidationError> {
    if unit.version != config.version {
        return Err(ValidationError::UnsupportedVersion(unit.version.clone()));
    }
    if unit.alt != config.alt {
        return Err(ValidationError::UnsupportedAlt(unit.alt.clone()));
    }

    match &unit.lineage {
        Lineage::Genesis => {
            if !matches!(unit.witness_list, WitnessListRef::Inline(_)) {
                return Err(ValidationError::GenesisWitnessReference);
            }
        }
        Lineage::Regular { parent_units, .. } => {
            if parent_units.is_empty() || parent_units.len() > config.max_parents {
                return Err(ValidationError::ParentCount(parent_units.len()));
            }
            if !strictly_ascending(parent_units) {
                return Err(ValidationError::ParentsNotSorted);
            }
        }
    }

    if unit.authors.is_empty() || unit.authors.len() > config.max_authors {
        return Err(ValidationError::AuthorCount(unit.authors.len()));
    }
    let addresses: Vec<&Address> = unit.author_addresses().collect();
    if !strictly_ascending(&addresses) {
        return Err(ValidationError::AuthorsNotSorted);
    }
    for author in &unit.authors {
        check_address(&author.address)?;
        if author.authentifiers.is_empty() {
            return Err(ValidationError::MissingAuthentifiers(author.address.clone()));
        }
        if let Some(definition) = &author.definition {
            if definition.address()? != author.address {
                return Err(ValidationError::DefinitionMismatch(author.address.clone()));
            }
        }
    }

    if let WitnessListRef::Inline(witnesses) = &unit.witness_list {
        if witnesses.len() != config.count_witnesses {
            return Err(ValidationError::WitnessCount(witnesses.len()));
        }
        if !strictly_ascending(witnesses) {
            return Err(ValidationError::WitnessesNotSorted);
        }
        witnesses.iter().try_for_each(check_address)?;
    }

    if unit.messages.is_empty() || unit.messages.len() > config.max_messages {
        return Err(ValidationError::MessageCount(unit.messages.len()));
    }
    for (index, message) in unit.messages.iter().enumerate() {
        if message.app != PAYMENT_APP {
            return Err(ValidationError::UnsupportedApp(message.app.clone()));
        }
        if message.payload_location != INLINE_LOCATION {
            return Err(ValidationError::UnsupportedPayloadLocation(message.payload_location.clone()));
        }
        let payload = &message.payload;
        if payload.inputs.is_empty() || payload.inputs.len() > config.max_inputs {
            return Err(ValidationError::InputCount { message: index, count: payload.inputs.len() });
        }
        if payload.outputs.is_empty() || payload.outputs.len() > config.max_outputs {
            return Err(ValidationError::OutputCount { message: index, count: payload.outputs.len() });
        }
        if payload.outputs.iter().any(|o| o.amount == 0) {
            return Err(ValidationError::ZeroAmount(index));
        }
        if !payload.outputs.windows(2).all(|pair| pair[0] <= pair[1]) {
            return Err(ValidationError::OutputsNotSorted(index));
        }
        payload.outputs.iter().try_for_each(|o| check_address(&o.address))?;
        if payload.hash()? != message.payload_hash {
            return Err(ValidationError::PayloadHashMismatch(index));
        }
    }

    match &unit.earned_headers_commission_recipients {
        None if unit.authors.len() > 1 => return Err(ValidationError::RecipientsRequired),
        None => {}
        Some(recipients) => {
            if recipients.is_empty() || recipients.len() > config.max_authors {
                return Err(ValidationError::RecipientCount(recipients.len()));
            }
            if let Some(bad) = recipients.iter().find(|r| !(1..=100).contains(&r.share)) {
                return Err(ValidationError::RecipientShare(bad.share));
            }
            let total: u64 = recipients.iter().map(|r| u64::from(r.share)).sum();
            if total != 100 {
                return Err(ValidationError::RecipientShares(total));
            }
            let recipient_addresses: Vec<&Address> = recipients.iter().map(|r| &r.address).collect();
            if !strictly_ascending(&recipient_addresses) {
                return Err(ValidationError::RecipientsNotSorted);
            }
            recipients.iter().try_for_each(|r| check_address(&r.address))?;
        }
    }

    let headers = unit.headers_size();
    if unit.headers_commission != headers {
        return Err(ValidationError::CommissionMismatch { field: "headers_commission", declared: unit.headers_commission, computed: headers });
    }
    let payload = unit.payload_size();
    if unit.payload_commission != payload {
        return Err(ValidationError::CommissionMismatch { field: "payload_commission", declared: unit.payload_commission, computed: payload });
    }

    let computed = unit.compute_hash()?;
    if computed != unit.unit {
        return Err(ValidationError::HashMismatch { declared: unit.unit, computed });
    }
    Ok(())
}
