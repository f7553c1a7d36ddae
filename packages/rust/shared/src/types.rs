//! Core domain types for a metrics run.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key under which the generation timestamp is stored in the uploaded record.
pub const DATE_KEY: &str = "date";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run in logs (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MetricValue
// ---------------------------------------------------------------------------

/// A single metric: a number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetricValue {
    /// Integer view, if this metric is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// `false` for NaN and infinite floats, which JSON cannot represent.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(v) => v.is_finite(),
            _ => true,
        }
    }

    /// Convert a JSON scalar into a metric. Arrays, objects and null have no
    /// metric representation; booleans become `0`/`1`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            serde_json::Value::Bool(b) => Some(Self::Integer(i64::from(*b))),
            _ => None,
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

// ---------------------------------------------------------------------------
// Accumulator
// ---------------------------------------------------------------------------

/// The adapter's output record: metric key to value.
///
/// Keys are expected to be unique under case-insensitive comparison. This is
/// checked once when the adapter is loaded, not on every mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Accumulator(BTreeMap<String, MetricValue>);

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MetricValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Add `delta` to an integer metric, starting from zero. Returns `false`
    /// if the key already holds a non-integer value.
    pub fn increment(&mut self, key: impl Into<String>, delta: i64) -> bool {
        let entry = self.0.entry(key.into()).or_insert(MetricValue::Integer(0));
        match entry {
            MetricValue::Integer(v) => {
                *v += delta;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys that collide with an earlier key once lower-cased.
    pub fn case_insensitive_duplicates(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.0
            .keys()
            .filter(|k| !seen.insert(k.to_lowercase()))
            .cloned()
            .collect()
    }

    /// Consume the accumulator and stamp it with the generation time.
    ///
    /// Any entry whose key equals `date` ignoring case (`date`, `Date`,
    /// `DATE`) is dropped first, so the record holds exactly one date key.
    pub fn finalize(mut self, generated_at: DateTime<Utc>) -> MetricsRecord {
        self.0.retain(|key, _| {
            let stamped = key.eq_ignore_ascii_case(DATE_KEY);
            if stamped && key != DATE_KEY {
                tracing::warn!(%key, "dropping adapter key shadowed by the generation date");
            }
            !stamped
        });
        self.0.insert(
            DATE_KEY.to_string(),
            MetricValue::Text(generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        MetricsRecord(self.0)
    }
}

impl FromIterator<(String, MetricValue)> for Accumulator {
    fn from_iter<I: IntoIterator<Item = (String, MetricValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The finalized record written to disk and uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsRecord(BTreeMap<String, MetricValue>);

impl MetricsRecord {
    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pretty JSON with two-space indentation and sorted keys.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.0)
    }
}

// ---------------------------------------------------------------------------
// SearchResults
// ---------------------------------------------------------------------------

/// Opaque search results read back from an external tool's output file.
///
/// The pipeline never looks inside; only adapter handlers do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchResults(serde_json::Value);

impl SearchResults {
    /// Results of a tool run that produced nothing.
    pub fn empty() -> Self {
        Self(serde_json::Value::Object(serde_json::Map::new()))
    }

    pub fn from_value(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Resolve a JSON pointer (`/issues/0/key`) inside the results.
    pub fn pointer(&self, pointer: &str) -> Option<&serde_json::Value> {
        self.0.pointer(pointer)
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            serde_json::Value::Object(map) => map.is_empty(),
            serde_json::Value::Array(items) => items.is_empty(),
            serde_json::Value::Null => true,
            _ => false,
        }
    }
}

impl Default for SearchResults {
    fn default() -> Self {
        Self::empty()
    }
}
