use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::descriptor::{RequestBody, RequestDescriptor};

/// Identity of a logical request for deduplication and caching.
#[derive(Hash, Eq, PartialEq, Clone, Debug, PartialOrd, Ord)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the key of a request from its method, url, body, headers and
/// response type. Header names and JSON object keys are canonicalized so
/// that insertion order never changes the result.
pub fn derive_key(descriptor: &RequestDescriptor) -> RequestKey {
    let mut hasher = Sha256::new();
    update_field(&mut hasher, descriptor.method().to_uppercase().as_bytes());
    update_field(&mut hasher, descriptor.url().as_bytes());

    match descriptor.body() {
        None => update_field(&mut hasher, b"none"),
        Some(RequestBody::Json(value)) => {
            update_field(&mut hasher, b"json");
            update_field(&mut hasher, canonical_json(value).as_bytes());
        }
        Some(RequestBody::Text(text)) => {
            update_field(&mut hasher, b"text");
            update_field(&mut hasher, text.as_bytes());
        }
        Some(RequestBody::Binary(bytes)) => {
            update_field(&mut hasher, b"binary");
            update_field(&mut hasher, bytes);
        }
    }

    let mut headers: Vec<_> = descriptor
        .headers()
        .iter()
        .map(|(name, value)| (name.to_lowercase(), value.as_str()))
        .collect();
    headers.sort();
    for (name, value) in headers {
        update_field(&mut hasher, name.as_bytes());
        update_field(&mut hasher, value.as_bytes());
    }

    update_field(&mut hasher, descriptor.response_type().to_string().as_bytes());

    RequestKey(hex::encode(hasher.finalize()))
}

// Length-prefixed so adjacent fields cannot run into each other.
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (i, (name, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(name.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
