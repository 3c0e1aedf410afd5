//! Data model shared by every pipeline stage
//!
//! Stage outputs, in pipeline order:
//! - [`ParsedDocument`]: AST + source metadata
//! - [`ScannedDocument`]: extracted features and import edges
//! - [`Document`]: features linked against the rest of the generation

mod document;
mod parsed;
mod scanned;
mod source_range;
mod warning;

pub use document::{Document, Feature, Import, QueryOptions, ResolveScope};
pub use parsed::{InlineDocInfo, ParsedDocument};
pub use scanned::{
    ResolvedCustomFeature, ScannedCustomFeature, ScannedDocument, ScannedFeature, ScannedImport,
    ScannedInlineDocument,
};
pub use source_range::{Position, SourceRange};
pub use warning::{codes, Severity, Warning};
