//! Field codec applied at the storage boundary
//!
//! Strings are percent-encoded with the URI-component safe set before they
//! are written and decoded after they are read. Declared JSON fields are
//! held as parsed values in memory and as JSON text at rest.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::warn;

use crate::engine::query::Record;

/// Characters left untouched, matching URI-component encoding
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

/// Decode percent escapes; malformed input comes back unchanged
pub fn decode_component(s: &str) -> String {
    match percent_decode_str(s).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            warn!(error = %e, "value is not valid percent-encoded UTF-8, keeping raw text");
            s.to_string()
        }
    }
}

/// Encodes records for storage and decodes them back
#[derive(Debug, Clone, Default)]
pub struct FieldCodec {
    json_fields: BTreeSet<String>,
}

impl FieldCodec {
    pub fn new(json_fields: BTreeSet<String>) -> Self {
        Self { json_fields }
    }

    pub fn is_json_field(&self, field: &str) -> bool {
        self.json_fields.contains(field)
    }

    /// Stringify structured values, then percent-encode text
    pub fn encode(&self, record: &Record) -> Record {
        record
            .iter()
            .map(|(field, value)| (field.clone(), self.encode_value(field, value)))
            .collect()
    }

    fn encode_value(&self, field: &str, value: &Value) -> Value {
        if self.is_json_field(field) && !value.is_null() {
            return Value::String(encode_component(&value.to_string()));
        }

        match value {
            Value::String(s) => Value::String(encode_component(s)),
            Value::Array(_) | Value::Object(_) => {
                warn!(field, "structured value in an undeclared field is stored as JSON text");
                Value::String(encode_component(&value.to_string()))
            }
            other => other.clone(),
        }
    }

    /// Percent-decode text, then parse declared JSON fields.
    /// A JSON field that fails to parse becomes null.
    pub fn decode(&self, record: Record) -> Record {
        record
            .into_iter()
            .map(|(field, value)| {
                let value = self.decode_value(&field, value);
                (field, value)
            })
            .collect()
    }

    fn decode_value(&self, field: &str, value: Value) -> Value {
        let value = match value {
            Value::String(s) => Value::String(decode_component(&s)),
            other => other,
        };

        if !self.is_json_field(field) {
            return value;
        }

        match value {
            Value::String(text) => match serde_json::from_str(&text) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(field, error = %e, "malformed JSON field, setting it to null");
                    Value::Null
                }
            },
            other => other,
        }
    }
}
