//! Metric synchronization: inventory in, published snapshot out.
//!
//! Each cycle rebuilds the exported series set from scratch. A cluster
//! that disappeared from the inventory simply never enters the fresh
//! snapshot, so stale series cannot linger. The fresh snapshot is
//! installed with a single swap (see [`SnapshotHandle`]).

use fleet_tags::{ClusterRecord, Evaluator, LabelResolver};
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::snapshot::{SeriesSnapshot, SnapshotHandle};

/// What to do when a cluster's labels cannot be resolved.
///
/// The policy is fixed at construction; skipping and aborting are
/// never mixed within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log and drop the offending cluster for this cycle, publish the
    /// rest. Its series is simply absent until it resolves again.
    #[default]
    SkipCluster,
    /// Discard the entire fresh snapshot, keep the previous one
    /// unchanged, and report the first error.
    AbortCycle,
}

/// Outcome of one successful synchronization cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    /// Series published in the new snapshot.
    pub published: usize,
    /// Clusters skipped under [`FailurePolicy::SkipCluster`].
    pub skipped: usize,
}

/// Rebuilds the exported series set from the current inventory.
#[derive(Debug, Clone)]
pub struct MetricSynchronizer<E> {
    resolver: LabelResolver<E>,
    handle: SnapshotHandle,
    policy: FailurePolicy,
}

impl<E: Evaluator> MetricSynchronizer<E> {
    /// Creates a synchronizer publishing through the given handle.
    pub fn new(resolver: LabelResolver<E>, handle: SnapshotHandle, policy: FailurePolicy) -> Self {
        Self {
            resolver,
            handle,
            policy,
        }
    }

    /// The handle scrapes read from.
    #[must_use]
    pub fn handle(&self) -> SnapshotHandle {
        self.handle.clone()
    }

    /// Resolves labels for every cluster and atomically publishes the
    /// resulting snapshot.
    ///
    /// # Errors
    ///
    /// Under [`FailurePolicy::AbortCycle`], returns the first
    /// resolution failure; the previously published snapshot stays in
    /// place untouched.
    pub fn synchronize(&self, inventory: &[ClusterRecord]) -> Result<SyncReport, SyncError> {
        let mut fresh = SeriesSnapshot::new();
        let mut skipped = 0usize;

        for record in inventory {
            match self.resolver.resolve(record) {
                Ok(labels) => fresh.insert(labels),
                Err(err) => match self.policy {
                    FailurePolicy::SkipCluster => {
                        warn!(
                            cluster = record.display_name(),
                            tag = err.tag(),
                            expr = err.expression(),
                            error = %err,
                            "label resolution failed; skipping cluster for this cycle"
                        );
                        skipped += 1;
                    }
                    FailurePolicy::AbortCycle => {
                        return Err(SyncError::Resolve {
                            cluster: record.display_name().to_owned(),
                            source: err,
                        });
                    }
                },
            }
        }

        let published = fresh.len();
        self.handle.publish(fresh);
        debug!(published, skipped, "snapshot published");
        Ok(SyncReport { published, skipped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_tags::{ExprEvaluator, LabelSet, TagModel, ValueSpec};
    use serde_json::json;
    use std::sync::Arc;

    fn record(value: serde_json::Value) -> ClusterRecord {
        ClusterRecord::from_value(value).unwrap()
    }

    fn synchronizer(policy: FailurePolicy) -> MetricSynchronizer<ExprEvaluator> {
        let model = TagModel::from_entries([(
            "name".to_string(),
            ValueSpec::StringExpression("cluster.name".to_string()),
        )])
        .unwrap();
        let resolver = LabelResolver::new(Arc::new(model), ExprEvaluator::new());
        MetricSynchronizer::new(resolver, SnapshotHandle::new(), policy)
    }

    fn name_labels(name: &str) -> LabelSet {
        LabelSet::from_entries(vec![("name".to_string(), name.to_string())])
    }

    #[test]
    fn publishes_one_series_per_cluster() {
        let sync = synchronizer(FailurePolicy::SkipCluster);
        let inventory = vec![
            record(json!({"name": "prod-1"})),
            record(json!({"name": "stage-1"})),
        ];

        let report = sync.synchronize(&inventory).unwrap();
        assert_eq!(report, SyncReport { published: 2, skipped: 0 });

        let snapshot = sync.handle().load();
        assert!(snapshot.contains(&name_labels("prod-1")));
        assert!(snapshot.contains(&name_labels("stage-1")));
    }

    #[test]
    fn absent_clusters_drop_out_of_the_next_snapshot() {
        let sync = synchronizer(FailurePolicy::SkipCluster);

        sync.synchronize(&[
            record(json!({"name": "prod-1"})),
            record(json!({"name": "prod-2"})),
        ])
        .unwrap();
        assert_eq!(sync.handle().load().len(), 2);

        sync.synchronize(&[record(json!({"name": "prod-1"}))]).unwrap();
        let snapshot = sync.handle().load();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains(&name_labels("prod-1")));
        assert!(!snapshot.contains(&name_labels("prod-2")));
    }

    #[test]
    fn empty_inventory_publishes_empty_snapshot() {
        let sync = synchronizer(FailurePolicy::SkipCluster);
        sync.synchronize(&[record(json!({"name": "prod-1"}))]).unwrap();
        sync.synchronize(&[]).unwrap();
        assert!(sync.handle().load().is_empty());
    }

    #[test]
    fn skip_policy_drops_only_the_offending_cluster() {
        let sync = synchronizer(FailurePolicy::SkipCluster);
        let inventory = vec![
            record(json!({"name": "prod-1"})),
            // No `name` attribute: `cluster.name` cannot resolve.
            record(json!({"id": "broken"})),
        ];

        let report = sync.synchronize(&inventory).unwrap();
        assert_eq!(report, SyncReport { published: 1, skipped: 1 });
        assert!(sync.handle().load().contains(&name_labels("prod-1")));
    }

    #[test]
    fn abort_policy_keeps_previous_snapshot_intact() {
        let sync = synchronizer(FailurePolicy::AbortCycle);
        sync.synchronize(&[record(json!({"name": "prod-1"}))]).unwrap();

        let err = sync
            .synchronize(&[record(json!({"id": "broken"})), record(json!({"name": "prod-2"}))])
            .unwrap_err();
        assert!(matches!(err, SyncError::Resolve { ref cluster, .. } if cluster == "broken"));

        // The failed cycle must not have touched the published set.
        let snapshot = sync.handle().load();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains(&name_labels("prod-1")));
    }

    #[test]
    fn clusters_with_identical_labels_share_a_series() {
        let sync = synchronizer(FailurePolicy::SkipCluster);
        let inventory = vec![
            record(json!({"name": "prod-1", "region": "us"})),
            record(json!({"name": "prod-1", "region": "eu"})),
        ];
        let report = sync.synchronize(&inventory).unwrap();
        assert_eq!(report.published, 1);
    }
}
