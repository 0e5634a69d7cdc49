use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::chash::{validate_chash, CHASH160_LENGTH};
use crate::error::DecodeError;

/// Length of a base64 encoded sha256 digest, the textual form of every identifier.
pub const HASH_LENGTH: usize = 44;

macro_rules! digest_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(PartialEq, Eq, Hash, Clone, Copy, Ord, PartialOrd)]
        pub struct $name([u8; HASH_LENGTH]);

        impl $name {
            pub fn from_digest(digest: &[u8; 32]) -> Self {
                let mut text = [0u8; HASH_LENGTH];
                text.copy_from_slice(general_purpose::STANDARD.encode(digest).as_bytes());
                Self(text)
            }

            pub fn from_base64<T: AsRef<str>>(input: T) -> Result<Self, DecodeError> {
                let input = input.as_ref();
                if input.len() != HASH_LENGTH {
                    return Err(DecodeError::InvalidLength(input.len()));
                }
                let decoded = general_purpose::STANDARD.decode(input)?;
                let digest: [u8; 32] = decoded[..].try_into().map_err(|_| DecodeError::InvalidLength(decoded.len()))?;
                Ok(Self::from_digest(&digest))
            }

            // only ever built from base64 output, which is ascii
            pub fn as_str(&self) -> &str { std::str::from_utf8(&self.0).unwrap_or_default() }

            pub fn to_base64_short(&self) -> &str { &self.as_str()[HASH_LENGTH - 6..] }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if f.alternate() {
                    write!(f, "{}", self.to_base64_short())
                } else {
                    write!(f, "{}", self.as_str())
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}({})", stringify!($name), self.to_base64_short()) }
        }

        impl FromStr for $name {
            type Err = DecodeError;
            fn from_str(s: &str) -> Result<Self, Self::Err> { Self::from_base64(s) }
        }

        impl TryFrom<&str> for $name {
            type Error = DecodeError;
            fn try_from(id: &str) -> Result<Self, Self::Error> { Self::from_base64(id) }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> { serializer.serialize_str(self.as_str()) }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                Self::from_base64(&text).map_err(serde::de::Error::custom)
            }
        }
    };
}

digest_id!(
    /// Identity hash of a unit. Ordering is the byte order of the base64 text.
    UnitId
);
digest_id!(
    /// Hash anchoring a stabilized unit.
    BallId
);
digest_id!(
    /// Hash of a unit's naked content, retained after the payload of a final-bad unit is dropped.
    ContentHash
);

/// A checksummed 160-bit hash of a spending definition.
#[derive(PartialEq, Eq, Hash, Clone, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn parse(text: impl Into<String>) -> Result<Self, DecodeError> {
        let text = text.into();
        if text.len() != CHASH160_LENGTH {
            return Err(DecodeError::InvalidLength(text.len()));
        }
        validate_chash(&text)?;
        Ok(Address(text))
    }

    pub(crate) fn from_chash(text: String) -> Self { Address(text) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{}", &self.0[..6.min(self.0.len())])
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Address({})", self.0) }
}

impl FromStr for Address {
    type Err = DecodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Address::parse(s) }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Address::parse(text).map_err(serde::de::Error::custom)
    }
}
