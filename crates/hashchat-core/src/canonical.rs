//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 milliseconds)
//!
//! The canonical encoding is critical twice over: message signatures are
//! computed over canonical payload bytes and must recompute identically
//! on the verifier's side, and the policy oracle binds sealed keys to the
//! canonical bytes of a condition set; a sender and a later reader must
//! produce the same bytes or key release fails.

use ciborium::value::Value;
use serde::Serialize;

use crate::error::CoreError;
use crate::payload::MessagePayload;

/// Encode any serializable value to canonical CBOR bytes.
///
/// The value is first serialized through serde, then re-encoded with
/// sorted map keys and minimal integer widths. Floats are rejected.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CoreError> {
    let mut interim = Vec::new();
    ciborium::into_writer(value, &mut interim)
        .map_err(|e| CoreError::EncodingError(e.to_string()))?;
    let value: Value = ciborium::from_reader(interim.as_slice())
        .map_err(|e| CoreError::DecodingError(e.to_string()))?;

    let mut buf = Vec::new();
    encode_value_to(&mut buf, &value)?;
    Ok(buf)
}

/// Canonical bytes of a message payload: the bytes a message signature
/// covers.
pub fn canonical_payload_bytes(payload: &MessagePayload) -> Result<Vec<u8>, CoreError> {
    canonical_bytes(payload)
}

/// Canonical bytes of an arbitrary JSON value.
///
/// Integer-valued numbers encode as CBOR integers; non-integer numbers
/// are rejected like any other float.
pub fn canonical_json_value(value: &serde_json::Value) -> Result<Vec<u8>, CoreError> {
    canonical_bytes(value)
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<(), CoreError> {
    match value {
        Value::Integer(i) => {
            encode_integer(buf, *i);
            Ok(())
        }
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
            Ok(())
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
            Ok(())
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item)?;
            }
            Ok(())
        }
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => {
            buf.push(if *b { 0xf5 } else { 0xf4 });
            Ok(())
        }
        Value::Null => {
            buf.push(0xf6);
            Ok(())
        }
        Value::Float(_) => Err(CoreError::FloatInCanonicalValue),
        other => Err(CoreError::EncodingError(format!(
            "unsupported CBOR value: {other:?}"
        ))),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<(), CoreError> {
    let mut pairs: Vec<(Vec<u8>, &Value)> = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}
