//! Prometheus exporter for an externally-owned cluster fleet.
#![forbid(unsafe_code)]
//!
//! `fleet-exporter` polls a cloud cluster inventory on a fixed
//! interval and publishes one gauge series per cluster, value `1`,
//! labeled by evaluating the configured tag expressions against each
//! cluster's attributes (see the `fleet-tags` crate).
//!
//! The moving parts, in data-flow order:
//!
//! - [`InventoryProvider`]: fetches the current fleet.
//! - [`MetricSynchronizer`]: rebuilds the exported series set from one
//!   fetched inventory and publishes it with a single atomic swap.
//! - [`Poller`]: drives fetch + synchronize on the interval, bounding
//!   the fetch with a timeout and serializing cycles.
//! - [`MetricsServer`]: serves the current [`SnapshotHandle`] contents
//!   at `/metrics` without ever blocking the poll loop.
//!
//! A scrape always gets a syntactically valid response; in the worst
//! case it reflects the previous cycle's inventory rather than an
//! empty or half-built one.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod inventory;
pub mod poller;
pub mod server;
pub mod settings;
pub mod snapshot;
pub mod sync;

// Re-export main types at crate root
pub use error::{FetchError, ServerError, SettingsError, SyncError};
pub use inventory::{HttpInventoryProvider, InventoryProvider, StaticInventoryProvider};
pub use poller::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_INTERVAL_SECS, Poller, PollerConfig};
pub use server::{ActiveClustersCollector, MetricsServer};
pub use settings::Settings;
pub use snapshot::{
    ACTIVE_CLUSTERS_HELP, ACTIVE_CLUSTERS_METRIC, SeriesSnapshot, SnapshotHandle,
};
pub use sync::{FailurePolicy, MetricSynchronizer, SyncReport};
