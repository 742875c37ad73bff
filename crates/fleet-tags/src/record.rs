//! Cluster records: the per-cluster attribute bag supplied by the
//! inventory provider.
//!
//! The resolution engine treats a record as an opaque, immutable input
//! to expression evaluation. It never mutates one and never looks at
//! attributes beyond what the configured expressions reference.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One inventory item's attributes (name, tier, region, and whatever
/// else the provider returns).
///
/// Records are owned by the inventory collaborator; this crate only
/// reads them. Attribute keys nested in sub-objects are reachable from
/// expressions through dotted paths (`cluster.provider.region`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterRecord {
    attrs: Map<String, Value>,
}

impl ClusterRecord {
    /// Creates a record from a JSON attribute map.
    #[must_use]
    pub fn new(attrs: Map<String, Value>) -> Self {
        Self { attrs }
    }

    /// Creates a record from a JSON value, if it is an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(attrs) => Some(Self { attrs }),
            _ => None,
        }
    }

    /// Returns the attribute with the given top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// The raw attribute map.
    #[must_use]
    pub fn attrs(&self) -> &Map<String, Value> {
        &self.attrs
    }

    /// A human-readable identity for log lines: the record's `name`
    /// attribute, falling back to `id`, then a placeholder.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.attrs
            .get("name")
            .or_else(|| self.attrs.get("id"))
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
    }
}

impl From<Map<String, Value>> for ClusterRecord {
    fn from(attrs: Map<String, Value>) -> Self {
        Self::new(attrs)
    }
}
