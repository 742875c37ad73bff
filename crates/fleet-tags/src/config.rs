//! The tag configuration model.
//!
//! A tag is one exported label name plus the rule for computing its
//! value. Rules come in two shapes, decided once at load time:
//!
//! - a single expression string, evaluated per cluster, or
//! - an ordered list of `{if, then}` conditions, where the first
//!   predicate that evaluates to `true` supplies the value.
//!
//! [`TagModel`] is immutable for the process lifetime. It also exposes
//! the full label-name schema up front, because the exposition layer
//! fixes the label set at metric registration time.

use serde_yaml::Value as YamlValue;

use crate::error::{ConfigError, ConfigResult};

/// How one tag's value is computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSpec {
    /// A single expression evaluated against the cluster record.
    StringExpression(String),
    /// Ordered conditions; the first matching predicate wins.
    ConditionList(Vec<ConditionRule>),
}

/// One `{if, then}` entry of a condition list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionRule {
    /// Expression expected to evaluate to a boolean.
    pub predicate: String,
    /// Literal label value assigned when the predicate matches.
    pub result: String,
}

/// The immutable, validated set of configured tags.
///
/// Tag names are unique and kept in a stable (sorted) order which
/// doubles as the exported label schema.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagModel {
    tags: Vec<(String, ValueSpec)>,
}

impl TagModel {
    /// Builds a model from already-classified entries.
    ///
    /// This is the programmatic path used by tests and embedders; the
    /// YAML path goes through [`TagModel::from_yaml_entries`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on duplicate or invalid label names.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, ValueSpec)>,
    ) -> ConfigResult<Self> {
        let mut tags: Vec<(String, ValueSpec)> = entries.into_iter().collect();
        for (name, _) in &tags {
            validate_label_name(name)?;
        }
        tags.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(pair) = tags.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(ConfigError::DuplicateTag {
                tag: pair[0].0.clone(),
            });
        }
        Ok(Self { tags })
    }

    /// Builds a model from raw `name -> value` YAML entries, classifying
    /// each value as a string expression or a condition list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for any malformed value shape, unknown
    /// condition key, or invalid/duplicate label name.
    pub fn from_yaml_entries(
        entries: impl IntoIterator<Item = (String, YamlValue)>,
    ) -> ConfigResult<Self> {
        let classified = entries
            .into_iter()
            .map(|(name, value)| {
                let spec = classify(&name, value)?;
                Ok((name, spec))
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        Self::from_entries(classified)
    }

    /// The configured label names, in schema order.
    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|(name, _)| name.as_str())
    }

    /// Iterates over `(name, spec)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValueSpec)> {
        self.tags.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Number of configured tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether no tags are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Classifies one raw tag value into its [`ValueSpec`].
fn classify(tag: &str, value: YamlValue) -> ConfigResult<ValueSpec> {
    match value {
        YamlValue::String(expr) => Ok(ValueSpec::StringExpression(expr)),
        YamlValue::Sequence(items) => {
            let conditions = items
                .into_iter()
                .map(|item| classify_condition(tag, item))
                .collect::<ConfigResult<Vec<_>>>()?;
            Ok(ValueSpec::ConditionList(conditions))
        }
        // A bare mapping is treated as a single condition entry so a
        // typo like `value: {unexpected_key: true}` is reported with
        // the offending key rather than a generic shape error.
        YamlValue::Mapping(_) => Ok(ValueSpec::ConditionList(vec![classify_condition(
            tag, value,
        )?])),
        other => Err(ConfigError::InvalidValueShape {
            tag: tag.to_owned(),
            found: yaml_kind(&other).to_owned(),
        }),
    }
}

/// Classifies one condition entry, accepting exactly the keys `if`
/// and `then`.
fn classify_condition(tag: &str, item: YamlValue) -> ConfigResult<ConditionRule> {
    let YamlValue::Mapping(mapping) = item else {
        return Err(ConfigError::MalformedCondition {
            tag: tag.to_owned(),
            reason: format!("condition must be a mapping, found {}", yaml_kind(&item)),
        });
    };

    let mut predicate = None;
    let mut result = None;
    for (key, value) in mapping {
        let Some(key) = key.as_str() else {
            return Err(ConfigError::MalformedCondition {
                tag: tag.to_owned(),
                reason: "condition keys must be strings".to_owned(),
            });
        };
        match key {
            "if" => {
                let YamlValue::String(expr) = value else {
                    return Err(ConfigError::MalformedCondition {
                        tag: tag.to_owned(),
                        reason: format!("`if` must be an expression string, found {}", yaml_kind(&value)),
                    });
                };
                predicate = Some(expr);
            }
            "then" => result = Some(literal(tag, value)?),
            other => {
                return Err(ConfigError::UnknownConditionKey {
                    tag: tag.to_owned(),
                    key: other.to_owned(),
                });
            }
        }
    }

    let predicate = predicate.ok_or_else(|| ConfigError::MissingConditionKey {
        tag: tag.to_owned(),
        key: "if".to_owned(),
    })?;
    let result = result.ok_or_else(|| ConfigError::MissingConditionKey {
        tag: tag.to_owned(),
        key: "then".to_owned(),
    })?;
    Ok(ConditionRule { predicate, result })
}

/// Coerces a `then` scalar to its literal label value.
fn literal(tag: &str, value: YamlValue) -> ConfigResult<String> {
    match value {
        YamlValue::String(s) => Ok(s),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Number(n) => Ok(n.to_string()),
        // Same canonical text as an evaluated null; the empty string
        // stays reserved for the no-match fallback.
        YamlValue::Null => Ok("null".to_owned()),
        other => Err(ConfigError::MalformedCondition {
            tag: tag.to_owned(),
            reason: format!("`then` must be a scalar, found {}", yaml_kind(&other)),
        }),
    }
}

fn yaml_kind(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "null",
        YamlValue::Bool(_) => "boolean",
        YamlValue::Number(_) => "number",
        YamlValue::String(_) => "string",
        YamlValue::Sequence(_) => "sequence",
        YamlValue::Mapping(_) => "mapping",
        YamlValue::Tagged(_) => "tagged value",
    }
}

/// Validates a Prometheus label name: `[a-zA-Z_][a-zA-Z0-9_]*`.
fn validate_label_name(name: &str) -> ConfigResult<()> {
    if name.is_empty() {
        return Err(ConfigError::InvalidLabelName {
            tag: name.to_owned(),
            reason: "label name cannot be empty".to_owned(),
        });
    }
    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(ConfigError::InvalidLabelName {
                tag: name.to_owned(),
                reason: "label name must start with a letter or underscore".to_owned(),
            });
        }
    }
    for c in chars {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return Err(ConfigError::InvalidLabelName {
                tag: name.to_owned(),
                reason: format!("invalid character '{c}' in label name"),
            });
        }
    }
    Ok(())
}
