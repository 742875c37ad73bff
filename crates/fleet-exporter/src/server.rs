//! The metrics exposition endpoint.
//!
//! The gauge is exported through a custom [`Collector`] that encodes
//! the currently published snapshot at scrape time. A scrape pins the
//! snapshot `Arc` once and encodes from it, so it can never observe a
//! cycle mid-rebuild, and it never blocks the poll loop.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use axum::routing::get;
use prometheus_client::collector::Collector;
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{DescriptorEncoder, EncodeMetric};
use prometheus_client::metrics::MetricType;
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::registry::Registry;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::ServerError;
use crate::snapshot::{ACTIVE_CLUSTERS_HELP, ACTIVE_CLUSTERS_METRIC, SnapshotHandle};

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Collector exporting one `fleetgauge_active_clusters` series per
/// cluster in the current snapshot.
#[derive(Debug)]
pub struct ActiveClustersCollector {
    handle: SnapshotHandle,
}

impl ActiveClustersCollector {
    /// Creates a collector reading from the given snapshot handle.
    #[must_use]
    pub fn new(handle: SnapshotHandle) -> Self {
        Self { handle }
    }
}

impl Collector for ActiveClustersCollector {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), std::fmt::Error> {
        let snapshot = self.handle.load();
        let mut family = encoder.encode_descriptor(
            ACTIVE_CLUSTERS_METRIC,
            ACTIVE_CLUSTERS_HELP,
            None,
            MetricType::Gauge,
        )?;
        for (labels, value) in snapshot.iter() {
            let pairs: Vec<(String, String)> = labels
                .iter()
                .map(|(name, val)| (name.to_owned(), val.to_owned()))
                .collect();
            let gauge = ConstGauge::new(value);
            gauge.encode(family.encode_family(&pairs)?)?;
        }
        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    registry: Arc<Registry>,
}

/// HTTP server exposing the current snapshot in OpenMetrics text.
pub struct MetricsServer {
    registry: Arc<Registry>,
}

impl std::fmt::Debug for MetricsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsServer").finish_non_exhaustive()
    }
}

impl MetricsServer {
    /// Creates a server whose registry exports the given snapshot.
    #[must_use]
    pub fn new(handle: SnapshotHandle) -> Self {
        let mut registry = Registry::default();
        registry.register_collector(Box::new(ActiveClustersCollector::new(handle)));
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Builds the router: `/metrics` plus a `/health` probe.
    #[must_use]
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
        };
        Router::new()
            .route("/metrics", get(serve_metrics))
            .route("/health", get(health_check))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Binds the listen address and serves until a fatal error.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if binding or serving fails.
    pub async fn serve(&self, addr: SocketAddr) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!(addr = %addr, "metrics server listening");
        axum::serve(listener, self.router())
            .await
            .map_err(ServerError::Serve)
    }
}

async fn serve_metrics(State(state): State<AppState>) -> Response {
    let mut body = String::new();
    match encode(&mut body, &state.registry) {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SeriesSnapshot;
    use axum::body::Body;
    use axum::http::Request;
    use fleet_tags::LabelSet;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn handle_with(series: &[&[(&str, &str)]]) -> SnapshotHandle {
        let handle = SnapshotHandle::new();
        let mut snapshot = SeriesSnapshot::new();
        for labels in series {
            snapshot.insert(LabelSet::from_entries(
                labels
                    .iter()
                    .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                    .collect(),
            ));
        }
        handle.publish(snapshot);
        handle
    }

    async fn scrape(server: &MetricsServer) -> String {
        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn metrics_endpoint_exports_series() {
        let handle = handle_with(&[
            &[("env", "production"), ("region", "us-east-1")],
            &[("env", "staging"), ("region", "eu-west-1")],
        ]);
        let server = MetricsServer::new(handle);
        let body = scrape(&server).await;

        assert!(body.contains(ACTIVE_CLUSTERS_METRIC));
        assert!(body.contains("env=\"production\""));
        assert!(body.contains("region=\"eu-west-1\""));
        assert!(body.contains("# EOF"));
    }

    #[tokio::test]
    async fn gauge_value_is_one_per_cluster() {
        let handle = handle_with(&[&[("env", "production")]]);
        let server = MetricsServer::new(handle);
        let body = scrape(&server).await;

        let line = body
            .lines()
            .find(|l| l.starts_with(ACTIVE_CLUSTERS_METRIC) && l.contains("env="))
            .unwrap();
        assert!(line.ends_with(" 1"), "unexpected sample line: {line}");
    }

    #[tokio::test]
    async fn scrape_reflects_latest_published_snapshot() {
        let handle = handle_with(&[&[("env", "production")]]);
        let server = MetricsServer::new(handle.clone());

        assert!(scrape(&server).await.contains("env=\"production\""));

        // Inventory shrank to nothing; the old series must vanish.
        handle.publish(SeriesSnapshot::new());
        let body = scrape(&server).await;
        assert!(!body.contains("env=\"production\""));
    }

    #[tokio::test]
    async fn health_endpoint_answers_ok() {
        let server = MetricsServer::new(SnapshotHandle::new());
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
