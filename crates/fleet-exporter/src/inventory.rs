//! The inventory provider boundary.
//!
//! The exporter does not own the fleet: it polls an external inventory
//! and mirrors whatever that inventory says. [`InventoryProvider`] is
//! the seam; [`HttpInventoryProvider`] speaks to an Atlas-shaped REST
//! endpoint, and [`StaticInventoryProvider`] serves fixed records for
//! tests and offline runs.

use async_trait::async_trait;
use fleet_tags::ClusterRecord;
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;

/// Source of the current cluster inventory.
///
/// Implementations own authentication, pagination, and retries; the
/// exporter only sees a sequence of cluster records per fetch.
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// Fetches the full current inventory.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the inventory cannot be retrieved or
    /// decoded.
    async fn fetch_clusters(&self) -> Result<Vec<ClusterRecord>, FetchError>;
}

/// HTTP inventory provider for an Atlas-shaped clusters endpoint
/// (`GET {base}/groups/{project}/clusters`).
///
/// Accepts both a `{"results": [...]}` envelope and a bare JSON array.
#[derive(Debug, Clone)]
pub struct HttpInventoryProvider {
    client: reqwest::Client,
    url: String,
    credentials: Option<(String, String)>,
}

impl HttpInventoryProvider {
    /// Creates a provider for the given API base URL and project.
    #[must_use]
    pub fn new(base_url: &str, project_id: &str, credentials: Option<(String, String)>) -> Self {
        let url = format!("{}/groups/{project_id}/clusters", base_url.trim_end_matches('/'));
        Self {
            client: reqwest::Client::new(),
            url,
            credentials,
        }
    }

    /// The fully-resolved clusters URL this provider polls.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl InventoryProvider for HttpInventoryProvider {
    async fn fetch_clusters(&self) -> Result<Vec<ClusterRecord>, FetchError> {
        let mut request = self.client.get(&self.url);
        if let Some((user, key)) = &self.credentials {
            request = request.basic_auth(user, Some(key));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body: Value = response.json().await?;
        let records = decode_inventory(body)?;
        debug!(clusters = records.len(), url = %self.url, "inventory fetched");
        Ok(records)
    }
}

/// Extracts cluster records from an inventory response body.
fn decode_inventory(body: Value) -> Result<Vec<ClusterRecord>, FetchError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(FetchError::Decode {
                    reason: format!("`results` must be an array, found {}", json_kind(&other)),
                });
            }
            None => {
                return Err(FetchError::Decode {
                    reason: "response object has no `results` array".to_owned(),
                });
            }
        },
        other => {
            return Err(FetchError::Decode {
                reason: format!("expected array or object, found {}", json_kind(&other)),
            });
        }
    };

    items
        .into_iter()
        .map(|item| {
            ClusterRecord::from_value(item).ok_or_else(|| FetchError::Decode {
                reason: "inventory entry is not an object".to_owned(),
            })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Inventory provider that always returns the same records.
#[derive(Debug, Clone, Default)]
pub struct StaticInventoryProvider {
    clusters: Vec<ClusterRecord>,
}

impl StaticInventoryProvider {
    /// Creates a provider serving the given records.
    #[must_use]
    pub fn new(clusters: Vec<ClusterRecord>) -> Self {
        Self { clusters }
    }
}

#[async_trait]
impl InventoryProvider for StaticInventoryProvider {
    async fn fetch_clusters(&self) -> Result<Vec<ClusterRecord>, FetchError> {
        Ok(self.clusters.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_results_envelope() {
        let records = decode_inventory(json!({
            "results": [{"name": "prod-1"}, {"name": "stage-1"}],
            "totalCount": 2
        }))
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].display_name(), "prod-1");
    }

    #[test]
    fn decodes_bare_array() {
        let records = decode_inventory(json!([{"name": "prod-1"}])).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn rejects_non_object_entries() {
        let err = decode_inventory(json!({"results": ["prod-1"]})).unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn rejects_scalar_body() {
        let err = decode_inventory(json!(42)).unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn rejects_object_without_results() {
        let err = decode_inventory(json!({"clusters": []})).unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn provider_url_includes_project() {
        let provider =
            HttpInventoryProvider::new("https://cloud.example.com/api/v1.0/", "proj42", None);
        assert_eq!(
            provider.url(),
            "https://cloud.example.com/api/v1.0/groups/proj42/clusters"
        );
    }

    #[tokio::test]
    async fn static_provider_returns_records() {
        let record = ClusterRecord::from_value(json!({"name": "prod-1"})).unwrap();
        let provider = StaticInventoryProvider::new(vec![record.clone()]);
        let fetched = provider.fetch_clusters().await.unwrap();
        assert_eq!(fetched, vec![record]);
    }
}
