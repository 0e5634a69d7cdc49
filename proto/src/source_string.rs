//! Canonical serialization used for every hash in the ledger.
//!
//! A value is flattened into a list of components joined with `\x00`. Strings are
//! prefixed with `s`, numbers with `n` and booleans with `b`. Arrays are bracketed with
//! `[` and `]` components, and objects contribute each key (in byte order) followed by
//! the components of its value. Two implementations agreeing on this encoding agree on
//! every unit, ball and address hash, so anything that would make the encoding
//! ambiguous (nulls, empty containers) is refused outright.

use std::fmt;

use serde_json::Value;

use crate::error::HashError;

const SEPARATOR: &str = "\x00";

#[derive(Clone, Copy)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

struct Path<'a>(Vec<Segment<'a>>);

impl fmt::Display for Path<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.0 {
            match segment {
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Encode `value` into its canonical source string.
pub fn source_string(value: &Value) -> Result<String, HashError> {
    let mut components = Vec::new();
    let mut path = Path(Vec::new());
    extract_components(value, &mut path, &mut components)?;
    Ok(components.join(SEPARATOR))
}

fn extract_components<'a>(value: &'a Value, path: &mut Path<'a>, components: &mut Vec<String>) -> Result<(), HashError> {
    match value {
        Value::Null => return Err(HashError::NullValue(path.to_string())),
        Value::String(s) => components.push(format!("s{s}")),
        Value::Number(n) => components.push(format!("n{n}")),
        Value::Bool(b) => components.push(format!("b{b}")),
        Value::Array(items) => {
            if items.is_empty() {
                return Err(HashError::EmptyArray(path.to_string()));
            }
            components.push("[".to_string());
            for (index, item) in items.iter().enumerate() {
                path.0.push(Segment::Index(index));
                extract_components(item, path, components)?;
                path.0.pop();
            }
            components.push("]".to_string());
        }
        Value::Object(map) => {
            if map.is_empty() {
                return Err(HashError::EmptyObject(path.to_string()));
            }
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                components.push(key.clone());
                path.0.push(Segment::Key(key));
                extract_components(&map[key.as_str()], path, components)?;
                path.0.pop();
            }
        }
    }
    Ok(())
}

/// Size of a value for commission purposes: string length, 8 per number, 1 per boolean,
/// summed through arrays and object values. Keys are free.
pub fn object_length(value: &Value) -> u64 {
    match value {
        Value::Null => 0,
        Value::String(s) => s.len() as u64,
        Value::Number(_) => 8,
        Value::Bool(_) => 1,
        Value::Array(items) => items.iter().map(object_length).sum(),
        Value::Object(map) => map.values().map(object_length).sum(),
    }
}
