//! Error types for the fleet-tags crate.

use thiserror::Error;

/// Errors raised while loading the tag configuration.
///
/// All of these are startup failures: the process must not begin
/// serving with a partially-validated tag model.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The same label name was configured more than once.
    #[error("duplicate tag: {tag}")]
    DuplicateTag {
        /// The label name that appeared twice.
        tag: String,
    },

    /// The label name is not a valid Prometheus label name.
    #[error("invalid label name for tag {tag}: {reason}")]
    InvalidLabelName {
        /// The offending label name.
        tag: String,
        /// The reason the name is invalid.
        reason: String,
    },

    /// The tag value was neither a string expression nor a condition list.
    #[error("tag {tag}: value must be a string expression or a list of conditions, found {found}")]
    InvalidValueShape {
        /// The tag whose value was malformed.
        tag: String,
        /// A short description of the shape that was found.
        found: String,
    },

    /// A condition entry contained a key other than `if` or `then`.
    #[error("tag {tag}: key {key} is not supported for if-then conditions")]
    UnknownConditionKey {
        /// The tag whose condition was malformed.
        tag: String,
        /// The unrecognized key.
        key: String,
    },

    /// A condition entry was missing a required key.
    #[error("tag {tag}: condition is missing required key {key}")]
    MissingConditionKey {
        /// The tag whose condition was malformed.
        tag: String,
        /// The missing key (`if` or `then`).
        key: String,
    },

    /// A condition entry was not a mapping, or one of its fields had
    /// an unusable type.
    #[error("tag {tag}: malformed condition: {reason}")]
    MalformedCondition {
        /// The tag whose condition was malformed.
        tag: String,
        /// The reason the condition was rejected.
        reason: String,
    },
}

/// Errors raised while resolving labels for a single cluster record.
///
/// These are per-cluster, per-cycle failures. The caller decides
/// whether to skip the offending cluster or abort the whole cycle.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The expression evaluator rejected or failed on an expression.
    #[error("tag {tag}: expression `{expr}` failed: {reason}")]
    Expression {
        /// The tag being resolved.
        tag: String,
        /// The expression that failed.
        expr: String,
        /// The evaluator's failure description.
        reason: String,
    },

    /// A condition predicate evaluated to something other than a boolean.
    #[error("tag {tag}: predicate `{expr}` returned {actual}, expected boolean")]
    PredicateType {
        /// The tag being resolved.
        tag: String,
        /// The predicate expression.
        expr: String,
        /// The kind of value the predicate actually produced.
        actual: String,
    },
}

impl EvalError {
    /// The tag whose resolution failed.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Expression { tag, .. } | Self::PredicateType { tag, .. } => tag,
        }
    }

    /// The expression involved in the failure.
    #[must_use]
    pub fn expression(&self) -> &str {
        match self {
            Self::Expression { expr, .. } | Self::PredicateType { expr, .. } => expr,
        }
    }
}

/// Result type for tag configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type for label resolution.
pub type EvalResult<T> = std::result::Result<T, EvalError>;
