//! Tag configuration and label resolution for the fleetgauge exporter.
#![forbid(unsafe_code)]
//!
//! `fleet-tags` turns a declarative tag configuration plus an
//! expression language into deterministic string labels per cluster:
//!
//! - [`TagModel`]: the parsed-once, immutable description of each
//!   exported label's computation rule.
//! - [`Evaluator`] / [`ExprEvaluator`]: the expression-evaluation
//!   boundary and its `evalexpr`-backed implementation.
//! - [`LabelResolver`]: one cluster record in, one complete
//!   [`LabelSet`] out.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use fleet_tags::{ClusterRecord, ExprEvaluator, LabelResolver, TagModel, ValueSpec};
//!
//! let model = TagModel::from_entries([(
//!     "region".to_string(),
//!     ValueSpec::StringExpression("cluster.region".to_string()),
//! )])
//! .unwrap();
//!
//! let resolver = LabelResolver::new(Arc::new(model), ExprEvaluator::new());
//! let record = ClusterRecord::from_value(serde_json::json!({"region": "us-east-1"})).unwrap();
//!
//! let labels = resolver.resolve(&record).unwrap();
//! assert_eq!(labels.get("region"), Some("us-east-1"));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod eval;
pub mod record;
pub mod resolver;

// Re-export main types at crate root
pub use config::{ConditionRule, TagModel, ValueSpec};
pub use error::{ConfigError, ConfigResult, EvalError, EvalResult};
pub use eval::{EvalFailure, EvalValue, Evaluator, ExprEvaluator, RECORD_VARIABLE};
pub use record::ClusterRecord;
pub use resolver::{LabelResolver, LabelSet};
