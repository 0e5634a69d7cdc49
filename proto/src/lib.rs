pub mod chash;
pub mod composer;
pub mod config;
pub mod error;
pub mod hash;
pub mod id;
pub mod joint;
pub mod signature;
pub mod source_string;
pub mod unit;
pub mod validation;

pub use chash::{chash160, chash288, is_chash_valid};
pub use composer::{ComposeError, UnitComposer};
pub use config::ProtocolConfig;
pub use error::*;
pub use hash::{ball_hash, object_hash, sha256_hex, skiplist_mcis};
pub use id::*;
pub use joint::Joint;
pub use signature::{sign_digest, CryptoError, Definition};
pub use source_string::{object_length, source_string};
pub use unit::*;
pub use validation::validate_unit;
