//! Analyzer settings (versioned YAML/JSON schema)

use super::error::{ConfigError, ConfigResult};
use crate::url::ResolvedUrl;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const SUPPORTED_VERSIONS: &[u32] = &[1];

const VALID_FIELDS: &[&str] = &["version", "lazy_edges", "max_concurrent_loads"];

pub const DEFAULT_MAX_CONCURRENT_LOADS: usize = 32;
const MAX_CONCURRENT_LOADS_RANGE: (usize, usize) = (1, 4096);

/// Settings that shape what gets analyzed, as opposed to the code-level
/// collaborators (loader, parsers, scanners) wired in `AnalyzerOptions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerSettings {
    /// Schema version (always 1 for v1)
    pub version: u32,

    /// Extra imports to add to a document, keyed by the importing document's
    /// resolved URL. Added as lazy imports: followed for scanning, skipped by
    /// queries that exclude lazy imports.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub lazy_edges: BTreeMap<String, Vec<String>>,

    /// Upper bound on loader calls in flight
    #[serde(default = "default_max_concurrent_loads")]
    pub max_concurrent_loads: usize,
}

fn default_max_concurrent_loads() -> usize {
    DEFAULT_MAX_CONCURRENT_LOADS
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            version: 1,
            lazy_edges: BTreeMap::new(),
            max_concurrent_loads: DEFAULT_MAX_CONCURRENT_LOADS,
        }
    }
}

impl AnalyzerSettings {
    /// Parse and validate settings from YAML text
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        Self::from_yaml_value(value)
    }

    /// Parse and validate settings from JSON text
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        // JSON is a YAML subset; reuse one validation path.
        let value = serde_yaml::to_value(value)?;
        Self::from_yaml_value(value)
    }

    /// Load from a file; `.json` files are read as JSON, anything else as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }

    fn from_yaml_value(value: serde_yaml::Value) -> ConfigResult<Self> {
        let mapping = match &value {
            serde_yaml::Value::Mapping(mapping) => mapping,
            serde_yaml::Value::Null => return Err(ConfigError::MissingVersion),
            other => return Err(ConfigError::NotAMapping(describe(other).to_string())),
        };

        for key in mapping.keys() {
            let name = key.as_str().unwrap_or_default();
            if !VALID_FIELDS.contains(&name) {
                return Err(ConfigError::unknown_field(name, VALID_FIELDS));
            }
        }

        let version = mapping
            .get("version")
            .ok_or(ConfigError::MissingVersion)?
            .as_u64()
            .ok_or(ConfigError::MissingVersion)?;
        let supported = u32::try_from(version)
            .map(|version| SUPPORTED_VERSIONS.contains(&version))
            .unwrap_or(false);
        if !supported {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let settings: AnalyzerSettings = serde_yaml::from_value(value)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let (min, max) = MAX_CONCURRENT_LOADS_RANGE;
        if !(min..=max).contains(&self.max_concurrent_loads) {
            return Err(ConfigError::range_with_hint(
                "max_concurrent_loads",
                self.max_concurrent_loads,
                min,
                max,
                "At least one load must be allowed to make progress",
            ));
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn with_lazy_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.lazy_edges.entry(from.into()).or_default().push(to.into());
        self
    }

    pub fn with_max_concurrent_loads(mut self, max: usize) -> Self {
        self.max_concurrent_loads = max;
        self
    }

    /// Configured lazy imports of `url`, as written in the settings
    pub fn lazy_edges_for(&self, url: &ResolvedUrl) -> &[String] {
        self.lazy_edges
            .get(url.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn describe(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}
