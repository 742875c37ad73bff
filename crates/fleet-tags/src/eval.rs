//! The expression evaluator boundary.
//!
//! Label values are computed by evaluating user-supplied expressions
//! against one cluster record at a time. The expression language itself
//! is a consumed capability, not something this crate implements: the
//! [`Evaluator`] trait pins down the contract, and [`ExprEvaluator`]
//! provides the production implementation on top of the `evalexpr`
//! crate.
//!
//! Environment contract: an evaluation sees exactly the current
//! cluster's attributes, flattened into dotted `cluster.*` variables.
//! No other cluster, no prior poll state, no mutable globals. The same
//! expression against the same record always yields the same value, so
//! predicates may safely be re-evaluated within a cycle.

use evalexpr::{ContextWithMutableVariables, HashMapContext, Value as ExprValue};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::record::ClusterRecord;

/// Variable prefix under which a record's attributes are exposed.
pub const RECORD_VARIABLE: &str = "cluster";

/// A typed scalar produced by expression evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    /// A string result, used verbatim as a label value.
    Str(String),
    /// A boolean result, required for condition predicates.
    Bool(bool),
    /// Any other structured result (number, tuple, null).
    Other(JsonValue),
}

impl EvalValue {
    /// A short name for the value's kind, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Bool(_) => "boolean",
            Self::Other(JsonValue::Null) => "null",
            Self::Other(JsonValue::Number(_)) => "number",
            Self::Other(JsonValue::Array(_)) => "array",
            Self::Other(_) => "structured",
        }
    }

    /// Coerces the value to a label string.
    ///
    /// Strings are used verbatim; every other value is serialized to
    /// its canonical JSON text (null included, as `"null"`) so the
    /// result is deterministic for a given value. The empty string
    /// only ever means "no condition matched".
    #[must_use]
    pub fn into_label_value(self) -> String {
        match self {
            Self::Str(s) => s,
            Self::Bool(b) => b.to_string(),
            Self::Other(v) => v.to_string(),
        }
    }
}

/// A failure reported by the expression evaluator.
///
/// Carries only the evaluator's own description; the resolver wraps it
/// with the tag name and expression for diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EvalFailure(pub String);

/// The consumed expression-evaluation capability.
///
/// Implementations must be pure: re-evaluating the same expression
/// against the same record must yield the same result with no side
/// effects.
pub trait Evaluator: Send + Sync {
    /// Evaluates `expr` against the given cluster record.
    ///
    /// # Errors
    ///
    /// Returns [`EvalFailure`] if the expression cannot be parsed or
    /// evaluated against the record's attributes.
    fn evaluate(&self, expr: &str, record: &ClusterRecord) -> Result<EvalValue, EvalFailure>;
}

/// Production evaluator backed by the `evalexpr` crate.
///
/// Each call builds a fresh variable context from the record, so no
/// state leaks between evaluations or between clusters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprEvaluator;

impl ExprEvaluator {
    /// Creates a new evaluator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for ExprEvaluator {
    fn evaluate(&self, expr: &str, record: &ClusterRecord) -> Result<EvalValue, EvalFailure> {
        let context = context_for(record)?;
        let value = evalexpr::eval_with_context(expr, &context)
            .map_err(|e| EvalFailure(e.to_string()))?;
        Ok(convert(value))
    }
}

/// Builds the per-record variable context.
fn context_for(record: &ClusterRecord) -> Result<HashMapContext, EvalFailure> {
    let mut context = HashMapContext::new();
    for (key, value) in record.attrs() {
        bind(&mut context, &format!("{RECORD_VARIABLE}.{key}"), value)?;
    }
    Ok(context)
}

/// Binds one attribute, recursing through nested objects so that
/// `cluster.provider.region` style paths resolve.
fn bind(context: &mut HashMapContext, name: &str, value: &JsonValue) -> Result<(), EvalFailure> {
    match value {
        JsonValue::Object(map) => {
            for (key, nested) in map {
                bind(context, &format!("{name}.{key}"), nested)?;
            }
            Ok(())
        }
        other => context
            .set_value(name.to_owned(), to_expr_value(other))
            .map_err(|e| EvalFailure(e.to_string())),
    }
}

fn to_expr_value(value: &JsonValue) -> ExprValue {
    match value {
        JsonValue::Null => ExprValue::Empty,
        JsonValue::Bool(b) => ExprValue::Boolean(*b),
        JsonValue::Number(n) => n
            .as_i64()
            .map_or_else(|| ExprValue::Float(n.as_f64().unwrap_or(f64::NAN)), ExprValue::Int),
        JsonValue::String(s) => ExprValue::String(s.clone()),
        JsonValue::Array(items) => ExprValue::Tuple(items.iter().map(to_expr_value).collect()),
        // Objects inside arrays have no tuple representation; expose
        // their JSON text so comparisons stay possible.
        JsonValue::Object(_) => ExprValue::String(value.to_string()),
    }
}

fn convert(value: ExprValue) -> EvalValue {
    match value {
        ExprValue::String(s) => EvalValue::Str(s),
        ExprValue::Boolean(b) => EvalValue::Bool(b),
        other => EvalValue::Other(to_json(other)),
    }
}

fn to_json(value: ExprValue) -> JsonValue {
    match value {
        ExprValue::String(s) => JsonValue::String(s),
        ExprValue::Boolean(b) => JsonValue::Bool(b),
        ExprValue::Int(i) => JsonValue::from(i),
        ExprValue::Float(f) => serde_json::Number::from_f64(f)
            .map_or(JsonValue::Null, JsonValue::Number),
        ExprValue::Tuple(items) => JsonValue::Array(items.into_iter().map(to_json).collect()),
        ExprValue::Empty => JsonValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn record(value: JsonValue) -> ClusterRecord {
        ClusterRecord::from_value(value).unwrap()
    }

    #[test]
    fn resolves_string_attribute() {
        let rec = record(json!({"region": "us-east-1"}));
        let value = ExprEvaluator::new().evaluate("cluster.region", &rec).unwrap();
        assert_eq!(value, EvalValue::Str("us-east-1".to_string()));
    }

    #[test]
    fn resolves_nested_attribute() {
        let rec = record(json!({"provider": {"instance_size": "M30"}}));
        let value = ExprEvaluator::new()
            .evaluate("cluster.provider.instance_size", &rec)
            .unwrap();
        assert_eq!(value, EvalValue::Str("M30".to_string()));
    }

    #[test]
    fn boolean_expressions_yield_bool() {
        let rec = record(json!({"name": "prod-1"}));
        let value = ExprEvaluator::new()
            .evaluate("cluster.name == \"prod-1\"", &rec)
            .unwrap();
        assert_eq!(value, EvalValue::Bool(true));
    }

    #[test]
    fn regex_match_on_record_attribute() {
        let rec = record(json!({"name": "prod-cluster-1"}));
        let value = ExprEvaluator::new()
            .evaluate("str::regex_matches(cluster.name, \"^prod\")", &rec)
            .unwrap();
        assert_eq!(value, EvalValue::Bool(true));
    }

    #[test]
    fn unknown_variable_is_a_failure() {
        let rec = record(json!({"name": "prod-1"}));
        let err = ExprEvaluator::new()
            .evaluate("cluster.missing", &rec)
            .unwrap_err();
        assert!(!err.0.is_empty());
    }

    #[test]
    fn same_input_same_output() {
        let rec = record(json!({"name": "prod-1", "disk_gb": 40}));
        let eval = ExprEvaluator::new();
        let first = eval.evaluate("cluster.disk_gb * 2", &rec).unwrap();
        let second = eval.evaluate("cluster.disk_gb * 2", &rec).unwrap();
        assert_eq!(first, second);
    }

    #[test_case(EvalValue::Str("production".into()), "production"; "string verbatim")]
    #[test_case(EvalValue::Bool(true), "true"; "boolean")]
    #[test_case(EvalValue::Other(json!(42)), "42"; "integer")]
    #[test_case(EvalValue::Other(json!(null)), "null"; "null as json text")]
    #[test_case(EvalValue::Other(json!([1, 2])), "[1,2]"; "tuple as json")]
    fn label_value_coercion(value: EvalValue, expected: &str) {
        assert_eq!(value.into_label_value(), expected);
    }

    #[test]
    fn numeric_results_are_structured() {
        let rec = record(json!({"disk_gb": 40}));
        let value = ExprEvaluator::new().evaluate("cluster.disk_gb", &rec).unwrap();
        assert_eq!(value, EvalValue::Other(json!(40)));
        assert_eq!(value.kind(), "number");
    }

    #[test]
    fn null_attribute_coerces_to_null_text() {
        let rec = record(json!({"paused": null}));
        let value = ExprEvaluator::new().evaluate("cluster.paused", &rec).unwrap();
        assert_eq!(value.into_label_value(), "null");
    }
}
