//! Analyzer configuration
//!
//! Settings live in a versioned YAML (or JSON) document:
//!
//! ```yaml
//! version: 1
//! max_concurrent_loads: 16
//! lazy_edges:
//!   index.html:
//!     - lazy/panel.html
//! ```

mod error;
mod settings;

pub use error::{ConfigError, ConfigResult};
pub use settings::{AnalyzerSettings, DEFAULT_MAX_CONCURRENT_LOADS, SUPPORTED_VERSIONS};
