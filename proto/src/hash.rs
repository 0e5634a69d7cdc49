use base64::{engine::general_purpose, Engine as _};
use ripemd::Ripemd160;
use serde::Serialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::error::HashError;
use crate::id::{BallId, UnitId};
use crate::source_string::source_string;

pub fn sha256(data: &[u8]) -> [u8; 32] { Sha256::digest(data).into() }

pub fn ripemd160(data: &[u8]) -> [u8; 20] { Ripemd160::digest(data).into() }

pub fn sha256_hex(data: &[u8]) -> String { hex::encode(sha256(data)) }

pub fn base64(data: &[u8]) -> String { general_purpose::STANDARD.encode(data) }

/// sha256 digest of the canonical source string of `value`.
pub fn value_digest(value: &Value) -> Result<[u8; 32], HashError> { Ok(sha256(source_string(value)?.as_bytes())) }

/// base64 sha256 of the canonical source string of any serializable value.
pub fn object_hash<T: Serialize + ?Sized>(value: &T) -> Result<String, HashError> {
    let value = serde_json::to_value(value)?;
    Ok(base64(&value_digest(&value)?))
}

/// Hash anchoring a stabilized unit together with its stabilized ancestry.
pub fn ball_hash(unit: &UnitId, parent_balls: &[BallId], skiplist_balls: &[BallId], nonserial: bool) -> Result<BallId, HashError> {
    let mut ball = Map::new();
    ball.insert("unit".into(), json!(unit));
    if !parent_balls.is_empty() {
        let mut sorted = parent_balls.to_vec();
        sorted.sort();
        ball.insert("parent_balls".into(), json!(sorted));
    }
    if !skiplist_balls.is_empty() {
        let mut sorted = skiplist_balls.to_vec();
        sorted.sort();
        ball.insert("skiplist_balls".into(), json!(sorted));
    }
    if nonserial {
        ball.insert("is_nonserial".into(), Value::Bool(true));
    }
    Ok(BallId::from_digest(&value_digest(&Value::Object(ball))?))
}

/// Main chain indices referenced by the skiplist of the main chain unit at `mci`:
/// `mci - 10` when divisible by 10, `mci - 100` when divisible by 100, and so on.
pub fn skiplist_mcis(mci: u64) -> Vec<u64> {
    let mut mcis = Vec::new();
    let mut divisor = 10u64;
    while mci > 0 && mci % divisor == 0 {
        mcis.push(mci - divisor);
        match divisor.checked_mul(10) {
            Some(next) => divisor = next,
            None => break,
        }
    }
    mcis
}
