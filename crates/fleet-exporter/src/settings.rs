//! Settings file loading.
//!
//! The settings file is YAML with two top-level fields:
//!
//! ```yaml
//! projectId: 5f1a2b3c4d5e6f
//! tags:
//!   region:
//!     value: cluster.region
//!   env:
//!     value:
//!       - if: str::regex_matches(cluster.name, "^prod")
//!         then: production
//!       - if: str::regex_matches(cluster.name, "^stage")
//!         then: staging
//! ```
//!
//! Tag values are classified once at load into the immutable
//! [`TagModel`]; any malformed shape aborts startup.

use std::fmt;
use std::fs;
use std::path::Path;

use fleet_tags::TagModel;
use serde::Deserialize;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde_yaml::Value as YamlValue;
use tracing::debug;

use crate::error::SettingsError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    #[serde(rename = "projectId")]
    project_id: String,
    #[serde(default, deserialize_with = "tag_entries")]
    tags: Vec<(String, RawTag)>,
}

/// Deserializes the `tags` mapping into a duplicate-preserving entry
/// list. A map type would quietly keep the last of two identically
/// named tags; the duplicate check belongs to `TagModel`, so every
/// entry must survive to classification.
fn tag_entries<'de, D>(deserializer: D) -> Result<Vec<(String, RawTag)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<(String, RawTag)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping of tag name to tag entry")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, RawTag>()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(EntriesVisitor)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTag {
    value: YamlValue,
}

/// Validated process settings, immutable after load.
#[derive(Debug, Clone)]
pub struct Settings {
    /// The inventory project whose clusters are exported.
    pub project_id: String,
    /// The validated tag configuration.
    pub tags: TagModel,
}

impl Settings {
    /// Loads and validates settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the file cannot be read, is not
    /// valid YAML, or contains a malformed tag configuration.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_yaml_str(&text)?;
        debug!(
            path = %path.display(),
            tags = settings.tags.len(),
            "settings loaded"
        );
        Ok(settings)
    }

    /// Parses settings from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] on YAML or tag-configuration errors.
    pub fn from_yaml_str(text: &str) -> Result<Self, SettingsError> {
        let raw: RawSettings = serde_yaml::from_str(text)?;
        let tags = TagModel::from_yaml_entries(
            raw.tags.into_iter().map(|(name, tag)| (name, tag.value)),
        )?;
        Ok(Self {
            project_id: raw.project_id,
            tags,
        })
    }
}
