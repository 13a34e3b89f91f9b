//! The budget entry payloads that pass through the queue.

use crate::error::Res;
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// One budget entry, e.g. `{"name": "coffee", "value": -4.5, "date": "..."}`.
///
/// The queue does not know or care about the shape of a record. It must be a JSON object, and its
/// fields are passed to the remote endpoint unchanged and in their original order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serializes the record for storage in a single text column.
    pub(crate) fn to_payload(&self) -> Res<String> {
        serde_json::to_string(&self.0).context("Unable to serialize record")
    }

    /// Reverses `to_payload`.
    pub(crate) fn from_payload(payload: &str) -> Res<Self> {
        payload.parse()
    }
}

impl TryFrom<Value> for Record {
    type Error = anyhow::Error;

    fn try_from(value: Value) -> Res<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => bail!(
                "A record must be a JSON object, got {}",
                json_type_name(&other)
            ),
        }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0)
    }
}

impl FromStr for Record {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Res<Self> {
        let value: Value = serde_json::from_str(s).context("A record must be valid JSON")?;
        Self::try_from(value)
    }
}

/// A record as read back from the local store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedRecord {
    /// Assigned by the store on insert. Never reused and never sent to the remote endpoint.
    pub id: i64,
    pub saved_at: DateTime<Utc>,
    pub record: Record,
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
