//! The exported series snapshot and its shared handle.
//!
//! The snapshot is the only mutable state shared between the poll loop
//! and concurrent scrapes. Publication is a pointer swap: the poller
//! builds a fresh [`SeriesSnapshot`] off to the side and installs it in
//! one step, so a scrape observes either the fully-old or the
//! fully-new series set, never a half-rebuilt one. Clearing a live
//! registry and refilling it would leave exactly that gap.

use std::collections::BTreeMap;
use std::sync::Arc;

use fleet_tags::LabelSet;
use parking_lot::RwLock;

/// Exported metric name.
pub const ACTIVE_CLUSTERS_METRIC: &str = "fleetgauge_active_clusters";

/// Exported metric help text.
pub const ACTIVE_CLUSTERS_HELP: &str =
    "Clusters present in the latest inventory poll, labeled by configured tags";

/// The complete set of currently exported `(label set -> value)` pairs.
///
/// Built fresh each poll cycle and immutable once published. Identical
/// label sets collapse into one series; iteration order is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesSnapshot {
    series: BTreeMap<LabelSet, i64>,
}

impl SeriesSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one active-cluster series with value `1`.
    pub fn insert(&mut self, labels: LabelSet) {
        self.series.insert(labels, 1);
    }

    /// Whether a series with the given label set is present.
    #[must_use]
    pub fn contains(&self, labels: &LabelSet) -> bool {
        self.series.contains_key(labels)
    }

    /// Iterates over `(label set, value)` pairs in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&LabelSet, i64)> {
        self.series.iter().map(|(labels, value)| (labels, *value))
    }

    /// Number of exported series.
    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether the snapshot has no series.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Clonable handle to the currently published snapshot.
///
/// The poll loop is the sole writer; scrapes only [`load`] the current
/// `Arc` and encode from it. Readers never block the writer beyond the
/// duration of the pointer swap, and never block each other.
///
/// [`load`]: SnapshotHandle::load
#[derive(Debug, Clone, Default)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<Arc<SeriesSnapshot>>>,
}

impl SnapshotHandle {
    /// Creates a handle over an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the currently published snapshot.
    #[must_use]
    pub fn load(&self) -> Arc<SeriesSnapshot> {
        self.inner.read().clone()
    }

    /// Atomically replaces the published snapshot.
    pub fn publish(&self, snapshot: SeriesSnapshot) {
        *self.inner.write() = Arc::new(snapshot);
    }
}
