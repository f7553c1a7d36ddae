//! Result handlers and the registry they are resolved from.
//!
//! A handler turns one tool's raw search results into accumulator entries.
//! Manifests refer to handlers by kind; the registry builds them from the
//! manifest parameters. Built-in kinds:
//!
//! - `noop`: accept anything, write nothing.
//! - `count`: length of the array at `items` stored under `key`.
//! - `count-by-field`: per-value counts of `field` across the array at `items`.
//! - `value`: copy the scalar at `pointer` into `key`.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use metriccli_shared::{Accumulator, MetricValue, SearchResults};

/// Handler parameters as declared in the manifest.
pub type HandlerParams = serde_json::Map<String, serde_json::Value>;

/// Builds a handler from its parameters, or explains why it cannot.
pub type HandlerFactory = fn(&HandlerParams) -> Result<Box<dyn ResultHandler>, String>;

/// Turns search results into accumulator entries.
pub trait ResultHandler: Send + Sync {
    /// Registered kind, for tracing.
    fn kind(&self) -> &str;

    /// Process `results`, writing into `output`. Returns `false` if the
    /// results could not be handled.
    fn handle(&self, results: &SearchResults, output: &mut Accumulator) -> bool;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps handler kinds to factories.
pub struct HandlerRegistry {
    factories: BTreeMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// A registry with all built-in handlers.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("noop", |_| Ok(Box::new(NoopHandler)));
        registry.register("count", |p| Ok(Box::new(params::<CountHandler>(p)?)));
        registry.register("count-by-field", |p| {
            Ok(Box::new(params::<CountByFieldHandler>(p)?))
        });
        registry.register("value", |p| Ok(Box::new(params::<ValueHandler>(p)?)));
        registry
    }

    /// Register (or replace) a handler kind.
    pub fn register(&mut self, kind: impl Into<String>, factory: HandlerFactory) {
        self.factories.insert(kind.into(), factory);
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build a handler. `None` if `kind` is not registered.
    pub fn build(
        &self,
        kind: &str,
        params: &HandlerParams,
    ) -> Option<Result<Box<dyn ResultHandler>, String>> {
        self.factories.get(kind).map(|factory| factory(params))
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn params<T: DeserializeOwned>(params: &HandlerParams) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::Object(params.clone())).map_err(|e| e.to_string())
}

fn default_items() -> String {
    "/issues".into()
}

// ---------------------------------------------------------------------------
// Built-in handlers
// ---------------------------------------------------------------------------

/// Accepts any results and records nothing.
pub struct NoopHandler;

impl ResultHandler for NoopHandler {
    fn kind(&self) -> &str {
        "noop"
    }

    fn handle(&self, _results: &SearchResults, _output: &mut Accumulator) -> bool {
        true
    }
}

/// Stores the length of an array.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CountHandler {
    /// Accumulator key to write.
    pub key: String,
    /// JSON pointer to the array.
    #[serde(default = "default_items")]
    pub items: String,
}

impl ResultHandler for CountHandler {
    fn kind(&self) -> &str {
        "count"
    }

    fn handle(&self, results: &SearchResults, output: &mut Accumulator) -> bool {
        let Some(items) = results.pointer(&self.items).and_then(|v| v.as_array()) else {
            warn!(items = %self.items, "no result array to count");
            return false;
        };
        debug!(key = %self.key, count = items.len(), "counted results");
        output.set(self.key.clone(), items.len() as i64);
        true
    }
}

/// Counts array elements grouped by the value of one field.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CountByFieldHandler {
    /// JSON pointer to the array.
    #[serde(default = "default_items")]
    pub items: String,
    /// JSON pointer, relative to each element, to the grouping field.
    pub field: String,
    /// Prepended to each field value to form the key.
    #[serde(default)]
    pub prefix: String,
}

impl CountByFieldHandler {
    fn group_key(&self, item: &serde_json::Value) -> String {
        let value = match item.pointer(&self.field) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => "none".to_string(),
            Some(other) => other.to_string(),
        };
        format!("{}{}", self.prefix, value)
    }
}

impl ResultHandler for CountByFieldHandler {
    fn kind(&self) -> &str {
        "count-by-field"
    }

    fn handle(&self, results: &SearchResults, output: &mut Accumulator) -> bool {
        let Some(items) = results.pointer(&self.items).and_then(|v| v.as_array()) else {
            warn!(items = %self.items, "no result array to group");
            return false;
        };

        for item in items {
            let key = self.group_key(item);
            if !output.increment(key.clone(), 1) {
                warn!(%key, "cannot count into a non-integer metric");
                return false;
            }
        }
        true
    }
}

/// Copies one scalar from the results.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueHandler {
    pub key: String,
    pub pointer: String,
}

impl ResultHandler for ValueHandler {
    fn kind(&self) -> &str {
        "value"
    }

    fn handle(&self, results: &SearchResults, output: &mut Accumulator) -> bool {
        match results.pointer(&self.pointer).and_then(MetricValue::from_json) {
            Some(value) => {
                output.set(self.key.clone(), value);
                true
            }
            None => {
                warn!(pointer = %self.pointer, "no scalar value at pointer");
                false
            }
        }
    }
}
