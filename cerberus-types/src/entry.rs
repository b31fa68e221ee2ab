use crate::EntryId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the identifier field in stored and serialized entries.
pub const ID_FIELD: &str = "_id";
/// Name of the owner field in stored and serialized entries.
pub const OWNER_FIELD: &str = "_owner";

/// One instance of a model's data.
///
/// The system fields (`_id`, `_owner`) live outside `fields`; everything the
/// model declares is in `fields`. Raw payloads may spell the identifier
/// `id` or `_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntryId>,
    #[serde(rename = "_owner", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<EntryId>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Entry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an entry from a raw JSON payload.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Builds entries from a raw JSON array payload.
    pub fn many_from_value(value: Value) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn with_id(mut self, id: EntryId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_owner(mut self, owner: EntryId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Extract a string value of a top-level field.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_str())
    }

    /// Extract a boolean value of a top-level field.
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.fields.get(field).and_then(|v| v.as_bool())
    }

    /// Extract a numeric value of a top-level field.
    pub fn get_number(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(|v| v.as_f64())
    }

    /// Extract a nested value using a JSON pointer (e.g., "/address/city").
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        let mut parts = pointer.trim_start_matches('/').splitn(2, '/');
        let head = parts.next()?;
        let value = self.fields.get(head)?;
        match parts.next() {
            Some(rest) => value.pointer(&format!("/{rest}")),
            None => Some(value),
        }
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Whether the field is present with a non-null value.
    pub fn has(&self, field: &str) -> bool {
        matches!(self.fields.get(field), Some(v) if !v.is_null())
    }

    pub fn to_value(&self) -> Value {
        // Serialization of a map of JSON values with string keys cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Result of a count operation, serialized as `{"count": n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Count {
    pub count: u64,
}
