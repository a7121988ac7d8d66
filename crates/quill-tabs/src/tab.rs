//! Tab record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    /// Opaque identifier, unique among open tabs
    pub id: String,
    /// When the tab was opened
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub opened_at: DateTime<Utc>,
    /// Caller-defined data (template name, channel, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl Tab {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            opened_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Returns true if the stored value changed
    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if self.metadata.get(&key) == Some(&value) {
            return false;
        }
        self.metadata.insert(key, value);
        true
    }

    pub fn remove_metadata(&mut self, key: &str) -> Option<Value> {
        self.metadata.remove(key)
    }
}

/// RFC 3339 string or epoch milliseconds; anything else reads as now
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Value::deserialize(deserializer)? {
        Value::String(raw) => DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(millis) => millis.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    };
    Ok(parsed.unwrap_or_else(Utc::now))
}
