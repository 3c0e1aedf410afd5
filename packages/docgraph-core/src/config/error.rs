//! Configuration error types

use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Range validation error
    #[error("Invalid range for field '{field}': {value} not in {min}..={max}. {hint}")]
    Range {
        field: String,
        value: String,
        min: String,
        max: String,
        hint: String,
    },

    /// Unknown top-level field in a settings file
    #[error("Unknown field '{field}' in analyzer settings. {suggestion}")]
    UnknownField {
        field: String,
        suggestion: String,
        valid_fields: Vec<String>,
    },

    /// Missing version field
    #[error("Missing 'version' field in analyzer settings. Add 'version: 1' to the top of the file.")]
    MissingVersion,

    /// Unsupported version
    #[error("Unsupported settings version {found}. Supported versions: {}", supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u64, supported: Vec<u32> },

    /// Settings file must be a mapping at the top level
    #[error("Analyzer settings must be a mapping, found {0}")]
    NotAMapping(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Create a range error with a hint
    pub fn range_with_hint(
        field: impl Into<String>,
        value: impl ToString,
        min: impl ToString,
        max: impl ToString,
        hint: impl Into<String>,
    ) -> Self {
        Self::Range {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
            hint: hint.into(),
        }
    }

    /// Create an unknown field error, suggesting the nearest valid name
    pub fn unknown_field(field: impl Into<String>, valid_fields: &[&str]) -> Self {
        let field = field.into();
        let suggestion = valid_fields
            .iter()
            .min_by_key(|candidate| edit_distance(&field, candidate))
            .map(|closest| format!("Did you mean '{closest}'?"))
            .unwrap_or_else(|| "No valid fields available".to_string());

        Self::UnknownField {
            field,
            suggestion,
            valid_fields: valid_fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Levenshtein distance, one row at a time
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let substitution = diagonal + usize::from(ca != *cb);
            row[j + 1] = substitution.min(above + 1).min(row[j] + 1);
            diagonal = above;
        }
    }
    row[b.len()]
}
