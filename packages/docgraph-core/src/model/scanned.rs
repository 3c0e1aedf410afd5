//! Scanned documents and the features scanners extract from them

use super::{ParsedDocument, Position, ResolveScope, SourceRange, Warning};
use crate::url::{ResolvedUrl, UnresolvedUrl};
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// An import edge found by a scanner.
///
/// Shared by every generation that reuses the scan, so it carries no
/// per-generation state. Whether the target loaded is decided when the
/// importing document resolves (see [`super::Import::error`]).
#[derive(Debug)]
pub struct ScannedImport {
    pub kind: String,
    pub url: Option<ResolvedUrl>,
    pub original_url: UnresolvedUrl,
    pub source_range: SourceRange,
    pub url_source_range: SourceRange,
    pub lazy: bool,
}

impl ScannedImport {
    pub fn new(
        kind: impl Into<String>,
        url: Option<ResolvedUrl>,
        original_url: UnresolvedUrl,
        source_range: SourceRange,
        url_source_range: SourceRange,
    ) -> Self {
        Self {
            kind: kind.into(),
            url,
            original_url,
            source_range,
            url_source_range,
            lazy: false,
        }
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }
}

/// A document embedded in another one.
///
/// Scanners fill everything but `scanned_document`, which the local scan
/// sets after parsing and scanning the contents.
#[derive(Debug)]
pub struct ScannedInlineDocument {
    pub kind: String,
    pub contents: String,
    pub location_offset: Position,
    pub source_range: SourceRange,
    pub scanned_document: Option<Arc<ScannedDocument>>,
}

impl ScannedInlineDocument {
    pub fn new(
        kind: impl Into<String>,
        contents: impl Into<String>,
        location_offset: Position,
        source_range: SourceRange,
    ) -> Self {
        Self {
            kind: kind.into(),
            contents: contents.into(),
            location_offset,
            source_range,
            scanned_document: None,
        }
    }
}

/// Language-specific feature contributed by a scanner.
pub trait ScannedCustomFeature: Debug + Send + Sync {
    fn kind(&self) -> &str;

    fn source_range(&self) -> &SourceRange;

    /// Link the feature against the rest of the analysis. Returning `None`
    /// drops it from the resolved document; problems go to `scope.warn`.
    fn resolve(&self, scope: &mut ResolveScope<'_>) -> Option<Arc<dyn ResolvedCustomFeature>>;
}

pub trait ResolvedCustomFeature: Debug + Send + Sync {
    fn kind(&self) -> &str;

    fn source_range(&self) -> &SourceRange;

    /// Names this feature can be looked up by
    fn identifiers(&self) -> Vec<String> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug)]
pub enum ScannedFeature {
    Import(Arc<ScannedImport>),
    InlineDocument(ScannedInlineDocument),
    Custom(Arc<dyn ScannedCustomFeature>),
}

impl ScannedFeature {
    pub fn import(import: ScannedImport) -> Self {
        ScannedFeature::Import(Arc::new(import))
    }

    pub fn custom(feature: impl ScannedCustomFeature + 'static) -> Self {
        ScannedFeature::Custom(Arc::new(feature))
    }
}

/// A parsed document with its extracted features.
#[derive(Debug)]
pub struct ScannedDocument {
    pub document: Arc<ParsedDocument>,
    pub features: Vec<ScannedFeature>,
    pub warnings: Vec<Warning>,
}

impl ScannedDocument {
    pub fn new(document: Arc<ParsedDocument>, features: Vec<ScannedFeature>, warnings: Vec<Warning>) -> Self {
        Self {
            document,
            features,
            warnings,
        }
    }

    pub fn url(&self) -> &ResolvedUrl {
        &self.document.url
    }

    pub fn is_inline(&self) -> bool {
        self.document.is_inline()
    }

    /// Imports of this document and of every inline document it contains,
    /// in source order.
    pub fn nested_imports(&self) -> Vec<Arc<ScannedImport>> {
        let mut imports = Vec::new();
        self.collect_imports(&mut imports);
        imports
    }

    fn collect_imports(&self, out: &mut Vec<Arc<ScannedImport>>) {
        for feature in &self.features {
            match feature {
                ScannedFeature::Import(import) => out.push(Arc::clone(import)),
                ScannedFeature::InlineDocument(inline) => {
                    if let Some(doc) = &inline.scanned_document {
                        doc.collect_imports(out);
                    }
                }
                ScannedFeature::Custom(_) => {}
            }
        }
    }

    /// Resolved targets of all nested imports, duplicates removed
    pub fn import_targets(&self) -> Vec<ResolvedUrl> {
        let mut targets: Vec<ResolvedUrl> = Vec::new();
        for import in self.nested_imports() {
            if let Some(url) = &import.url {
                if !targets.contains(url) {
                    targets.push(url.clone());
                }
            }
        }
        targets
    }
}
