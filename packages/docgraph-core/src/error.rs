use crate::model::Warning;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Failure of a pipeline stage.
///
/// Problems in the analyzed sources are never raised through this type on
/// their own: they travel as [`Warning`]s (the `Warning` arm) and end up in a
/// document's diagnostics or in the failed-documents map. The remaining
/// variants describe the engine itself.
///
/// The type is `Clone` because a single computed result is shared by every
/// caller waiting on the same cache entry.
#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    #[error("Analysis cancelled")]
    Cancelled,

    #[error("{0}")]
    Warning(Box<Warning>),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Analysis task failed: {0}")]
    TaskFailed(String),

    #[error("Unable to list package files: {0}")]
    PackageListing(String),
}

impl AnalysisError {
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }

    pub fn task_failed<E: std::fmt::Display>(e: E) -> Self {
        Self::TaskFailed(e.to_string())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalysisError::Cancelled)
    }

    pub fn as_warning(&self) -> Option<&Warning> {
        match self {
            AnalysisError::Warning(warning) => Some(warning),
            _ => None,
        }
    }
}

impl From<Warning> for AnalysisError {
    fn from(warning: Warning) -> Self {
        AnalysisError::Warning(Box::new(warning))
    }
}
