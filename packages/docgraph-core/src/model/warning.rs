//! Diagnostics

use super::SourceRange;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Warning codes emitted by the engine itself. Scanners may use any code.
pub mod codes {
    pub const COULD_NOT_LOAD: &str = "could-not-load";
    pub const COULD_NOT_PARSE: &str = "could-not-parse";
    pub const COULD_NOT_SCAN: &str = "could-not-scan";
    pub const INTERNAL_SCANNING_ERROR: &str = "internal-scanning-error";
    pub const COULD_NOT_RESOLVE_REFERENCE: &str = "could-not-resolve-reference";
    pub const UNABLE_TO_ANALYZE: &str = "unable-to-analyze";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recoverable problem found in a source document.
///
/// The owning document is `source_range.file`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Warning {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub source_range: SourceRange,
}

impl Warning {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        source_range: SourceRange,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity,
            source_range,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>, source_range: SourceRange) -> Self {
        Self::new(code, message, Severity::Error, source_range)
    }

    /// Same diagnostic, reported at another location
    pub fn relocated(&self, source_range: SourceRange) -> Self {
        Self {
            source_range,
            ..self.clone()
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}] {}",
            self.source_range, self.severity, self.code, self.message
        )
    }
}

impl std::error::Error for Warning {}
