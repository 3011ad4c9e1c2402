//! Stable digests of JSON-like values.
//!
//! A digest names a cache partition, so it must not depend on map iteration
//! order, process, or platform. Every value is written into the hasher with a
//! one-byte kind tag, and variable-length data is length-prefixed, which keeps
//! the encoding unambiguous: `"1"` and `1`, or `["ab"]` and `["a", "b"]`, never
//! produce the same byte stream.

use serde::Serialize;
use serde_json::Value;
use xxhash_rust::xxh3::Xxh3;

const TAG_NULL: u8 = b'n';
const TAG_FALSE: u8 = b'f';
const TAG_TRUE: u8 = b't';
const TAG_NUMBER: u8 = b'#';
const TAG_STRING: u8 = b's';
const TAG_ARRAY: u8 = b'[';
const TAG_OBJECT: u8 = b'{';

/// Computes the stable digest of a JSON value as 32 lowercase hex characters.
///
/// Object keys are sorted before hashing; array order is preserved.
pub fn digest(value: &Value) -> String {
    let mut hasher = Xxh3::new();
    write_value(&mut hasher, value);
    format!("{:032x}", hasher.digest128())
}

/// Computes the stable digest of any serializable value.
///
/// The value is first converted to a [`serde_json::Value`]. Values JSON
/// cannot represent, such as maps with non-string keys, are an error.
pub fn digest_serializable<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(digest(&serde_json::to_value(value)?))
}

fn write_len(hasher: &mut Xxh3, len: usize) {
    hasher.update(&(len as u64).to_le_bytes());
}

fn write_str(hasher: &mut Xxh3, s: &str) {
    write_len(hasher, s.len());
    hasher.update(s.as_bytes());
}

fn write_value(hasher: &mut Xxh3, value: &Value) {
    match value {
        Value::Null => hasher.update(&[TAG_NULL]),
        Value::Bool(false) => hasher.update(&[TAG_FALSE]),
        Value::Bool(true) => hasher.update(&[TAG_TRUE]),
        Value::Number(n) => {
            hasher.update(&[TAG_NUMBER]);
            write_str(hasher, &n.to_string());
        }
        Value::String(s) => {
            hasher.update(&[TAG_STRING]);
            write_str(hasher, s);
        }
        Value::Array(items) => {
            hasher.update(&[TAG_ARRAY]);
            write_len(hasher, items.len());
            for item in items {
                write_value(hasher, item);
            }
        }
        Value::Object(map) => {
            hasher.update(&[TAG_OBJECT]);
            write_len(hasher, map.len());
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                write_str(hasher, key);
                write_value(hasher, &map[key]);
            }
        }
    }
}
