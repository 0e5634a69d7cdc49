//! Checksummed hashes.
//!
//! A chash is a digest with a 32-bit checksum spliced into it at fixed bit offsets, so
//! that a mistyped address is caught before any funds move. Two widths exist:
//!
//! - 160 bits: ripemd160 of the source string minus its first 4 bytes (128 bits of clean
//!   data) plus the checksum, rendered as 32 base32 characters. Addresses use this form.
//! - 288 bits: sha256 of the source string plus the checksum, rendered as 48 base64
//!   characters.
//!
//! The checksum is bytes 5, 13, 21 and 29 of the sha256 of the clean data. Its bits are
//! placed at offsets derived from the decimal digits of pi: each non-zero digit (plus 4 in
//! the 288-bit form) is the distance from the previous offset.

use std::sync::OnceLock;

use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;

use crate::error::{DecodeError, HashError};
use crate::hash::{ripemd160, sha256};
use crate::source_string::source_string;

const PI: &str = "14159265358979323846264338327950288419716939937510";
const CHECKSUM_BITS: usize = 32;
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Encoded length of a 160-bit chash.
pub const CHASH160_LENGTH: usize = 32;
/// Encoded length of a 288-bit chash.
pub const CHASH288_LENGTH: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChashWidth {
    Bits160,
    Bits288,
}

impl ChashWidth {
    fn bits(self) -> usize {
        match self {
            ChashWidth::Bits160 => 160,
            ChashWidth::Bits288 => 288,
        }
    }

    fn offsets(self) -> &'static [usize] {
        static OFFSETS_160: OnceLock<Vec<usize>> = OnceLock::new();
        static OFFSETS_288: OnceLock<Vec<usize>> = OnceLock::new();
        match self {
            ChashWidth::Bits160 => OFFSETS_160.get_or_init(|| checksum_offsets(self)),
            ChashWidth::Bits288 => OFFSETS_288.get_or_init(|| checksum_offsets(self)),
        }
    }
}

fn checksum_offsets(width: ChashWidth) -> Vec<usize> {
    let total = width.bits();
    let mut offsets = Vec::with_capacity(CHECKSUM_BITS);
    let mut offset = 0;
    for digit in PI.bytes().map(|b| (b - b'0') as usize) {
        if digit == 0 {
            continue;
        }
        offset += digit;
        if width == ChashWidth::Bits288 {
            offset += 4;
        }
        if offset >= total {
            break;
        }
        offsets.push(offset);
    }
    // the digit table is fixed, so this only trips if the constants above are edited
    assert_eq!(offsets.len(), CHECKSUM_BITS, "pi digits yield {} checksum offsets", offsets.len());
    offsets
}

fn checksum(clean: &[u8]) -> [u8; 4] {
    let digest = sha256(clean);
    [digest[5], digest[13], digest[21], digest[29]]
}

fn to_bits(bytes: &[u8]) -> Vec<bool> { bytes.iter().flat_map(|byte| (0..8).rev().map(move |i| (byte >> i) & 1 == 1)).collect() }

fn from_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8).map(|chunk| chunk.iter().fold(0u8, |acc, bit| (acc << 1) | u8::from(*bit))).collect()
}

fn mix(clean: &[u8], width: ChashWidth) -> Vec<u8> {
    let clean_bits = to_bits(clean);
    let checksum_bits = to_bits(&checksum(clean));
    let mut mixed = Vec::with_capacity(width.bits());
    let mut clean_iter = clean_bits.into_iter();
    let mut checksum_iter = checksum_bits.into_iter();
    let offsets = width.offsets();
    let mut next = 0;
    for position in 0..width.bits() {
        if next < offsets.len() && offsets[next] == position {
            mixed.extend(checksum_iter.next());
            next += 1;
        } else {
            mixed.extend(clean_iter.next());
        }
    }
    from_bits(&mixed)
}

fn separate(mixed: &[u8], width: ChashWidth) -> (Vec<u8>, Vec<u8>) {
    let offsets = width.offsets();
    let mut clean = Vec::with_capacity(width.bits() - CHECKSUM_BITS);
    let mut check = Vec::with_capacity(CHECKSUM_BITS);
    let mut next = 0;
    for (position, bit) in to_bits(mixed).into_iter().enumerate() {
        if next < offsets.len() && offsets[next] == position {
            check.push(bit);
            next += 1;
        } else {
            clean.push(bit);
        }
    }
    (from_bits(&clean), from_bits(&check))
}

pub(crate) fn base32_encode(bytes: &[u8]) -> String {
    let mut result = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u64 = 0;
    let mut bits = 0;
    for byte in bytes {
        buffer = (buffer << 8) | (*byte as u64);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            result.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        result.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    result
}

pub(crate) fn base32_decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut buffer: u64 = 0;
    let mut bits = 0;
    for c in text.chars() {
        let value = BASE32_ALPHABET.iter().position(|a| *a as char == c).ok_or(DecodeError::InvalidBase32(c))?;
        buffer = (buffer << 5) | value as u64;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }
    Ok(out)
}

/// Checksummed hash of raw bytes.
pub fn chash_bytes(data: &[u8], width: ChashWidth) -> String {
    match width {
        ChashWidth::Bits160 => base32_encode(&mix(&ripemd160(data)[4..], width)),
        ChashWidth::Bits288 => general_purpose::STANDARD.encode(mix(&sha256(data), width)),
    }
}

pub fn chash160(value: &Value) -> Result<String, HashError> { Ok(chash_bytes(source_string(value)?.as_bytes(), ChashWidth::Bits160)) }

pub fn chash288(value: &Value) -> Result<String, HashError> { Ok(chash_bytes(source_string(value)?.as_bytes(), ChashWidth::Bits288)) }

/// Re-derive the embedded checksum and compare it with the one carried in `encoded`.
pub fn validate_chash(encoded: &str) -> Result<(), DecodeError> {
    let (mixed, width) = match encoded.len() {
        CHASH160_LENGTH => (base32_decode(encoded)?, ChashWidth::Bits160),
        CHASH288_LENGTH => (general_purpose::STANDARD.decode(encoded)?, ChashWidth::Bits288),
        len => return Err(DecodeError::InvalidLength(len)),
    };
    if mixed.len() * 8 != width.bits() {
        return Err(DecodeError::InvalidLength(mixed.len()));
    }
    let (clean, carried) = separate(&mixed, width);
    if checksum(&clean)[..] != carried[..] {
        return Err(DecodeError::InvalidChecksum);
    }
    Ok(())
}

pub fn is_chash_valid(encoded: &str) -> bool { validate_chash(encoded).is_ok() }
