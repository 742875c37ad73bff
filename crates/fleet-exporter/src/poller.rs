//! The poll loop driving fetch and synchronization.
//!
//! One background task owns the cycle: fetch the inventory (bounded by
//! a timeout), then hand it to the synchronizer. Cycles are strictly
//! serialized; if a cycle outruns the interval, the next tick is
//! skipped rather than started concurrently. A failed cycle leaves the
//! previously published snapshot serving.

use std::time::Duration;

use fleet_tags::Evaluator;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};

use crate::error::FetchError;
use crate::inventory::InventoryProvider;
use crate::sync::MetricSynchronizer;

/// Default seconds between poll cycles.
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Default bound on a single inventory fetch.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Timing configuration for the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Wall-clock interval between cycles.
    pub interval: Duration,
    /// Bound on a single inventory fetch; a hung fetch counts as a
    /// fetch failure and cannot stall future cycles.
    pub fetch_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

/// Periodically fetches the inventory and synchronizes the exported
/// series set.
#[derive(Debug)]
pub struct Poller<P, E> {
    provider: P,
    synchronizer: MetricSynchronizer<E>,
    config: PollerConfig,
}

impl<P, E> Poller<P, E>
where
    P: InventoryProvider,
    E: Evaluator,
{
    /// Creates a poller over the given provider and synchronizer.
    pub fn new(provider: P, synchronizer: MetricSynchronizer<E>, config: PollerConfig) -> Self {
        Self {
            provider,
            synchronizer,
            config,
        }
    }

    /// Runs the poll loop forever. The first cycle starts immediately.
    pub async fn run(self) {
        let mut ticker = time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            interval_secs = self.config.interval.as_secs(),
            "poller started"
        );
        loop {
            ticker.tick().await;
            self.cycle().await;
        }
    }

    /// Executes one fetch-and-synchronize cycle.
    ///
    /// Failures are logged, never propagated: the previous snapshot
    /// keeps serving and the next tick retries.
    pub async fn cycle(&self) {
        let inventory = match self.fetch_bounded().await {
            Ok(inventory) => inventory,
            Err(err) => {
                warn!(error = %err, "inventory fetch failed; keeping previous snapshot");
                return;
            }
        };

        match self.synchronizer.synchronize(&inventory) {
            Ok(report) => info!(
                clusters = inventory.len(),
                published = report.published,
                skipped = report.skipped,
                "poll cycle complete"
            ),
            Err(err) => {
                warn!(error = %err, "cycle aborted; keeping previous snapshot");
            }
        }
    }

    async fn fetch_bounded(&self) -> Result<Vec<fleet_tags::ClusterRecord>, FetchError> {
        time::timeout(self.config.fetch_timeout, self.provider.fetch_clusters())
            .await
            .map_err(|_| FetchError::Timeout {
                seconds: self.config.fetch_timeout.as_secs(),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::StaticInventoryProvider;
    use crate::snapshot::SnapshotHandle;
    use crate::sync::FailurePolicy;
    use async_trait::async_trait;
    use fleet_tags::{ClusterRecord, ExprEvaluator, LabelResolver, TagModel, ValueSpec};
    use serde_json::json;
    use std::sync::Arc;

    fn record(value: serde_json::Value) -> ClusterRecord {
        ClusterRecord::from_value(value).unwrap()
    }

    fn synchronizer() -> (MetricSynchronizer<ExprEvaluator>, SnapshotHandle) {
        let model = TagModel::from_entries([(
            "name".to_string(),
            ValueSpec::StringExpression("cluster.name".to_string()),
        )])
        .unwrap();
        let resolver = LabelResolver::new(Arc::new(model), ExprEvaluator::new());
        let handle = SnapshotHandle::new();
        let sync = MetricSynchronizer::new(resolver, handle.clone(), FailurePolicy::SkipCluster);
        (sync, handle)
    }

    /// Provider that always fails.
    #[derive(Debug)]
    struct FailingProvider;

    #[async_trait]
    impl InventoryProvider for FailingProvider {
        async fn fetch_clusters(&self) -> Result<Vec<ClusterRecord>, FetchError> {
            Err(FetchError::Status { status: 503 })
        }
    }

    /// Provider that never answers.
    #[derive(Debug)]
    struct HangingProvider;

    #[async_trait]
    impl InventoryProvider for HangingProvider {
        async fn fetch_clusters(&self) -> Result<Vec<ClusterRecord>, FetchError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn cycle_publishes_fetched_inventory() {
        let (sync, handle) = synchronizer();
        let provider =
            StaticInventoryProvider::new(vec![record(json!({"name": "prod-1"}))]);
        let poller = Poller::new(provider, sync, PollerConfig::default());

        poller.cycle().await;
        assert_eq!(handle.load().len(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_keeps_previous_snapshot() {
        let (sync, handle) = synchronizer();
        sync.synchronize(&[record(json!({"name": "prod-1"}))]).unwrap();

        let poller = Poller::new(FailingProvider, sync, PollerConfig::default());
        poller.cycle().await;

        // The last good snapshot still serves.
        assert_eq!(handle.load().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_fetch_is_bounded_by_the_timeout() {
        let (sync, handle) = synchronizer();
        sync.synchronize(&[record(json!({"name": "prod-1"}))]).unwrap();

        let config = PollerConfig {
            interval: Duration::from_secs(10),
            fetch_timeout: Duration::from_millis(50),
        };
        let poller = Poller::new(HangingProvider, sync, config);

        // With paused time this returns as soon as the timeout would
        // fire; a hang would make the test itself hang.
        poller.cycle().await;
        assert_eq!(handle.load().len(), 1);
    }

    #[tokio::test]
    async fn consecutive_cycles_track_inventory_shrink() {
        let (sync, handle) = synchronizer();

        let first = StaticInventoryProvider::new(vec![
            record(json!({"name": "prod-1"})),
            record(json!({"name": "prod-2"})),
        ]);
        Poller::new(first, sync.clone(), PollerConfig::default())
            .cycle()
            .await;
        assert_eq!(handle.load().len(), 2);

        let second = StaticInventoryProvider::new(vec![record(json!({"name": "prod-1"}))]);
        Poller::new(second, sync, PollerConfig::default())
            .cycle()
            .await;
        assert_eq!(handle.load().len(), 1);
    }
}
