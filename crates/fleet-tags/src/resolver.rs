//! Label resolution: tag configuration + cluster record -> label set.
//!
//! This is the deterministic core of the exporter. For a fixed
//! [`TagModel`] and [`ClusterRecord`], resolution always produces the
//! same [`LabelSet`], with exactly one entry per configured tag.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::{ConditionRule, TagModel, ValueSpec};
use crate::error::{EvalError, EvalResult};
use crate::eval::{EvalValue, Evaluator};
use crate::record::ClusterRecord;

/// The resolved `name -> value` labels for one cluster, forming one
/// exported time series's identity.
///
/// Entries are kept in the tag model's schema order. Every configured
/// tag is present; a tag with no matching condition carries the empty
/// string, never a missing key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct LabelSet {
    entries: Vec<(String, String)>,
}

impl LabelSet {
    /// Builds a label set from `(name, value)` pairs already in schema
    /// order. Intended for tests and the resolver itself.
    #[must_use]
    pub fn from_entries(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    /// The value for the given label name, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over `(name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves label sets for cluster records against a fixed tag model.
///
/// The model is shared and immutable; the evaluator is pure. Resolving
/// different records concurrently is therefore safe, though the
/// synchronizer currently walks the inventory sequentially.
#[derive(Debug, Clone)]
pub struct LabelResolver<E> {
    model: Arc<TagModel>,
    evaluator: E,
}

impl<E: Evaluator> LabelResolver<E> {
    /// Creates a resolver over the given model and evaluator.
    pub fn new(model: Arc<TagModel>, evaluator: E) -> Self {
        Self { model, evaluator }
    }

    /// The tag model this resolver evaluates.
    #[must_use]
    pub fn model(&self) -> &TagModel {
        &self.model
    }

    /// Resolves the full label set for one cluster record.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] if any expression fails to evaluate or a
    /// condition predicate yields a non-boolean.
    pub fn resolve(&self, record: &ClusterRecord) -> EvalResult<LabelSet> {
        let mut entries = Vec::with_capacity(self.model.len());
        for (name, spec) in self.model.iter() {
            let value = match spec {
                ValueSpec::StringExpression(expr) => self
                    .evaluate(name, expr, record)?
                    .into_label_value(),
                ValueSpec::ConditionList(conditions) => {
                    self.resolve_conditions(name, conditions, record)?
                }
            };
            entries.push((name.to_owned(), value));
        }
        trace!(
            cluster = record.display_name(),
            labels = entries.len(),
            "labels resolved"
        );
        Ok(LabelSet { entries })
    }

    /// Walks conditions in declared order; the first predicate that
    /// evaluates to `true` supplies the value and ends the walk. No
    /// match falls back to the empty string.
    fn resolve_conditions(
        &self,
        tag: &str,
        conditions: &[ConditionRule],
        record: &ClusterRecord,
    ) -> EvalResult<String> {
        for rule in conditions {
            match self.evaluate(tag, &rule.predicate, record)? {
                EvalValue::Bool(true) => return Ok(rule.result.clone()),
                EvalValue::Bool(false) => {}
                other => {
                    return Err(EvalError::PredicateType {
                        tag: tag.to_owned(),
                        expr: rule.predicate.clone(),
                        actual: other.kind().to_owned(),
                    });
                }
            }
        }
        Ok(String::new())
    }

    fn evaluate(&self, tag: &str, expr: &str, record: &ClusterRecord) -> EvalResult<EvalValue> {
        self.evaluator
            .evaluate(expr, record)
            .map_err(|failure| EvalError::Expression {
                tag: tag.to_owned(),
                expr: expr.to_owned(),
                reason: failure.to_string(),
            })
    }
}
