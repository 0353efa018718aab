//! Read-only access to untrusted upstream JSON records.
//!
//! The roads and weather feeds are third-party and inconsistent: the same
//! concept shows up under different keys, fields go missing, and types drift.
//! Rather than deserializing into a fully-typed contract, the pipeline reads
//! each record through [`RawRecord`], which only ever answers "is there a
//! usable value of this type under this key?".

use serde_json::{Map, Value};

/// A borrowed view over one JSON object from an upstream payload.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> RawRecord<'a> {
    pub fn new(fields: &'a Map<String, Value>) -> Self {
        Self { fields }
    }

    /// View a JSON value as a record. Returns `None` for anything that isn't an object.
    pub fn from_value(value: &'a Value) -> Option<Self> {
        value.as_object().map(Self::new)
    }

    /// Non-blank string under `key`.
    ///
    /// Blank strings are treated as absent so fallback chains move on to the
    /// next alias instead of selecting an empty value.
    pub fn str(&self, key: &str) -> Option<&'a str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Owned copy of [`RawRecord::str`].
    pub fn string(&self, key: &str) -> Option<String> {
        self.str(key).map(str::to_string)
    }

    /// First non-blank string across `keys`, in order.
    pub fn first_str(&self, keys: &[&str]) -> Option<&'a str> {
        keys.iter().find_map(|key| self.str(key))
    }

    /// Finite number under `key`.
    pub fn f64(&self, key: &str) -> Option<f64> {
        self.fields
            .get(key)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    }

    /// Nested object under `key`.
    pub fn object(&self, key: &str) -> Option<RawRecord<'a>> {
        self.fields.get(key).and_then(RawRecord::from_value)
    }

    /// Nested object under `key`, cloned out as an opaque map.
    pub fn map(&self, key: &str) -> Option<Map<String, Value>> {
        self.fields.get(key).and_then(Value::as_object).cloned()
    }

    /// Object entries of the array under `key`.
    ///
    /// A missing or non-array value yields no records. Non-object entries are
    /// skipped with a warning.
    pub fn records(&self, key: &str) -> Vec<RawRecord<'a>> {
        match self.fields.get(key).and_then(Value::as_array) {
            Some(values) => records_in(values, key),
            None => Vec::new(),
        }
    }
}

/// Object entries of `values`, skipping (and logging) anything else.
pub fn records_in<'a>(values: &'a [Value], context: &str) -> Vec<RawRecord<'a>> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| {
            let record = RawRecord::from_value(v);
            if record.is_none() {
                tracing::warn!(
                    "Skipping non-object entry {} in '{}' ({})",
                    i,
                    context,
                    json_type_name(v)
                );
            }
            record
        })
        .collect()
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
