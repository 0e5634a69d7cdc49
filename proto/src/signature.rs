//! Spending definitions and their ed25519 authentication.
//!
//! A definition is the condition an author must satisfy to spend from an address. The
//! address is the chash160 of the definition, so a definition can be revealed lazily on
//! first use and checked against the address forever after.

use std::collections::BTreeMap;

use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use thiserror::Error;

use crate::chash::chash160;
use crate::error::HashError;
use crate::id::Address;

/// Authentifier path of a plain signature definition.
pub const SIGNATURE_PATH: &str = "r";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid signature encoding")]
    InvalidSignatureEncoding,
    #[error("signature does not verify")]
    InvalidSignature,
    #[error("no authentifier at path {0}")]
    MissingAuthentifier(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    /// `["sig", {"pubkey": <base64 ed25519 public key>}]`
    Sig { pubkey: String },
}

#[derive(Serialize, Deserialize)]
struct SigArgs {
    pubkey: String,
}

impl Serialize for Definition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Definition::Sig { pubkey } => ("sig", SigArgs { pubkey: pubkey.clone() }).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Definition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (op, args): (String, SigArgs) = Deserialize::deserialize(deserializer)?;
        match op.as_str() {
            "sig" => Ok(Definition::Sig { pubkey: args.pubkey }),
            other => Err(serde::de::Error::custom(format!("unsupported definition operator {other}"))),
        }
    }
}

impl Definition {
    pub fn from_verifying_key(key: &ed25519_dalek::VerifyingKey) -> Self {
        Definition::Sig { pubkey: general_purpose::STANDARD.encode(key.as_bytes()) }
    }

    pub fn canonical(&self) -> Value {
        match self {
            Definition::Sig { pubkey } => json!(["sig", {"pubkey": pubkey}]),
        }
    }

    pub fn address(&self) -> Result<Address, HashError> { Ok(Address::from_chash(chash160(&self.canonical())?)) }

    /// Check the authentifiers an author supplied against the digest the unit was signed over.
    pub fn verify(&self, authentifiers: &BTreeMap<String, String>, digest: &[u8; 32]) -> Result<(), CryptoError> {
        match self {
            Definition::Sig { pubkey } => {
                let key_bytes: [u8; 32] = general_purpose::STANDARD
                    .decode(pubkey)
                    .map_err(|_| CryptoError::InvalidPublicKey)?
                    .try_into()
                    .map_err(|_| CryptoError::InvalidPublicKey)?;
                let key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
                let encoded = authentifiers.get(SIGNATURE_PATH).ok_or(CryptoError::MissingAuthentifier(SIGNATURE_PATH))?;
                let sig_bytes: [u8; 64] = general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|_| CryptoError::InvalidSignatureEncoding)?
                    .try_into()
                    .map_err(|_| CryptoError::InvalidSignatureEncoding)?;
                let signature = ed25519_dalek::Signature::from_bytes(&sig_bytes);
                key.verify(digest, &signature).map_err(|_| CryptoError::InvalidSignature)
            }
        }
    }
}

/// Sign a unit digest, producing the authentifier map for a plain signature definition.
pub fn sign_digest(key: &ed25519_dalek::SigningKey, digest: &[u8; 32]) -> BTreeMap<String, String> {
    let signature = key.sign(digest);
    BTreeMap::from([(SIGNATURE_PATH.to_string(), general_purpose::STANDARD.encode(signature.to_bytes()))])
}
