//! Resolved documents and queries over the import graph

use super::{
    ParsedDocument, ResolvedCustomFeature, ScannedDocument, ScannedImport, SourceRange, Warning,
};
use crate::url::ResolvedUrl;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tracing::warn;

/// Options shared by every document query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Follow imports into other documents
    pub imported: bool,
    /// When following imports, skip lazy ones
    pub exclude_lazy_imports: bool,
}

impl QueryOptions {
    /// Only this document and its inline documents
    pub fn local() -> Self {
        Self::default()
    }

    /// This document plus everything it transitively imports
    pub fn imported() -> Self {
        Self {
            imported: true,
            exclude_lazy_imports: false,
        }
    }

    pub fn exclude_lazy(mut self) -> Self {
        self.exclude_lazy_imports = true;
        self
    }
}

/// Where a resolved import points.
///
/// Targets that finished resolving first are owned, so strong edges always
/// point at documents completed earlier and can never form a cycle. An edge
/// back into a document that is still resolving (an import cycle) is weak;
/// the generation owning the cycle keeps its target alive.
#[derive(Debug, Clone)]
enum ImportTarget {
    Missing,
    Owned(Arc<Document>),
    Cycle(Weak<Document>),
}

/// A resolved import edge.
///
/// The load status of the target is captured when the importing document
/// resolves and never changes afterwards.
#[derive(Debug, Clone)]
pub struct Import {
    scanned: Arc<ScannedImport>,
    target: ImportTarget,
    error: Option<Warning>,
}

impl Import {
    pub(crate) fn new(
        scanned: Arc<ScannedImport>,
        document: Option<&Arc<Document>>,
        error: Option<Warning>,
    ) -> Self {
        let target = match document {
            None => ImportTarget::Missing,
            Some(doc) if doc.is_resolved() => ImportTarget::Owned(Arc::clone(doc)),
            Some(doc) => ImportTarget::Cycle(Arc::downgrade(doc)),
        };
        Self {
            scanned,
            target,
            error,
        }
    }

    pub fn kind(&self) -> &str {
        &self.scanned.kind
    }

    pub fn url(&self) -> Option<&ResolvedUrl> {
        self.scanned.url.as_ref()
    }

    pub fn is_lazy(&self) -> bool {
        self.scanned.lazy
    }

    pub fn source_range(&self) -> &SourceRange {
        &self.scanned.source_range
    }

    /// Target document, if it loaded.
    ///
    /// `None` for a loaded target only when the import closes a cycle and
    /// the generation that built the cycle has been dropped; see
    /// [`Import::is_detached`].
    pub fn document(&self) -> Option<Arc<Document>> {
        match &self.target {
            ImportTarget::Missing => None,
            ImportTarget::Owned(doc) => Some(Arc::clone(doc)),
            ImportTarget::Cycle(doc) => doc.upgrade(),
        }
    }

    /// True when the target resolved but is no longer reachable: this import
    /// closes a cycle and every owner of the target is gone.
    pub fn is_detached(&self) -> bool {
        matches!(&self.target, ImportTarget::Cycle(doc) if doc.strong_count() == 0)
    }

    /// Why the target could not be analyzed, positioned on the import's URL
    pub fn error(&self) -> Option<Warning> {
        self.error.clone()
    }

    pub fn scanned(&self) -> &Arc<ScannedImport> {
        &self.scanned
    }

    fn followed_document(&self, importer: &ResolvedUrl) -> Option<Arc<Document>> {
        let document = self.document();
        if document.is_none() && self.is_detached() {
            warn!(
                importer = %importer,
                imported = ?self.url(),
                "import cycle target was dropped with its generation; skipping it"
            );
        }
        document
    }
}

#[derive(Debug, Clone)]
pub enum Feature {
    Import(Import),
    Document(Arc<Document>),
    Custom(Arc<dyn ResolvedCustomFeature>),
}

impl Feature {
    pub fn kind(&self) -> &str {
        match self {
            Feature::Import(import) => import.kind(),
            Feature::Document(_) => "document",
            Feature::Custom(custom) => custom.kind(),
        }
    }

    pub fn source_range(&self) -> SourceRange {
        match self {
            Feature::Import(import) => import.source_range().clone(),
            Feature::Document(doc) => doc.source_range(),
            Feature::Custom(custom) => custom.source_range().clone(),
        }
    }
}

/// Handed to custom features while they resolve.
pub struct ResolveScope<'a> {
    document_url: &'a ResolvedUrl,
    lookup: &'a dyn Fn(&ResolvedUrl) -> Option<Arc<Document>>,
    warnings: Vec<Warning>,
}

impl<'a> ResolveScope<'a> {
    pub(crate) fn new(
        document_url: &'a ResolvedUrl,
        lookup: &'a dyn Fn(&ResolvedUrl) -> Option<Arc<Document>>,
    ) -> Self {
        Self {
            document_url,
            lookup,
            warnings: Vec::new(),
        }
    }

    pub fn document_url(&self) -> &ResolvedUrl {
        self.document_url
    }

    /// Look up another document of the same generation. A document that is
    /// itself still resolving (an import cycle) is returned as-is.
    pub fn document(&self, url: &ResolvedUrl) -> Option<Arc<Document>> {
        (self.lookup)(url)
    }

    pub fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub(crate) fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

struct Resolved {
    features: Vec<Feature>,
    warnings: Vec<Warning>,
}

/// A fully resolved document.
///
/// Immutable once resolution finishes. While a document is resolving (it is
/// reachable from itself through imports) its feature list reads as empty.
pub struct Document {
    scanned: Arc<ScannedDocument>,
    resolved: OnceLock<Resolved>,
}

impl Document {
    pub(crate) fn new(scanned: Arc<ScannedDocument>) -> Self {
        Self {
            scanned,
            resolved: OnceLock::new(),
        }
    }

    pub(crate) fn complete(&self, features: Vec<Feature>, warnings: Vec<Warning>) {
        let _ = self.resolved.set(Resolved { features, warnings });
    }

    pub fn url(&self) -> &ResolvedUrl {
        self.scanned.url()
    }

    pub fn kind(&self) -> &str {
        &self.scanned.document.kind
    }

    pub fn is_inline(&self) -> bool {
        self.scanned.is_inline()
    }

    pub fn contents(&self) -> &str {
        &self.scanned.document.contents
    }

    pub fn parsed_document(&self) -> &Arc<ParsedDocument> {
        &self.scanned.document
    }

    pub fn scanned_document(&self) -> &Arc<ScannedDocument> {
        &self.scanned
    }

    pub fn source_range(&self) -> SourceRange {
        self.scanned.document.source_range()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// This document's own features, in source order
    pub fn features(&self) -> &[Feature] {
        self.resolved
            .get()
            .map(|resolved| resolved.features.as_slice())
            .unwrap_or(&[])
    }

    /// Diagnostics owned by this document: scan and resolve warnings plus
    /// failures of its own import statements.
    pub fn warnings(&self) -> Vec<Warning> {
        let mut warnings = self.scanned.warnings.clone();
        if let Some(resolved) = self.resolved.get() {
            warnings.extend(resolved.warnings.iter().cloned());
        }
        for feature in self.features() {
            if let Feature::Import(import) = feature {
                if let Some(error) = &import.error {
                    warnings.push(error.clone());
                }
            }
        }
        warnings
    }

    /// Features of this document, its inline documents and, with
    /// `imported`, of every transitively imported document. Imported
    /// documents are visited once each, in static import order.
    pub fn get_features(&self, options: &QueryOptions) -> Vec<Feature> {
        let mut out = Vec::new();
        let mut visited = self.seed_visited();
        self.walk(options, &mut visited, &mut |feature| out.push(feature.clone()));
        out
    }

    /// This document followed by every other reachable document
    pub fn get_documents(self: &Arc<Self>, options: &QueryOptions) -> Vec<Arc<Document>> {
        let mut out = vec![Arc::clone(self)];
        for feature in self.get_features(options) {
            match feature {
                Feature::Document(doc) => out.push(doc),
                Feature::Import(import) if options.imported => {
                    if options.exclude_lazy_imports && import.is_lazy() {
                        continue;
                    }
                    if let Some(doc) = import.followed_document(self.url()) {
                        if !out.iter().any(|seen| Arc::ptr_eq(seen, &doc)) {
                            out.push(doc);
                        }
                    }
                }
                _ => {}
            }
        }
        out
    }

    /// One entry per import statement reachable under `options`
    pub fn get_imports(&self, options: &QueryOptions) -> Vec<Import> {
        self.get_features(options)
            .into_iter()
            .filter_map(|feature| match feature {
                Feature::Import(import) => Some(import),
                _ => None,
            })
            .collect()
    }

    pub fn get_custom_features(
        &self,
        kind: &str,
        options: &QueryOptions,
    ) -> Vec<Arc<dyn ResolvedCustomFeature>> {
        self.get_features(options)
            .into_iter()
            .filter_map(|feature| match feature {
                Feature::Custom(custom) if custom.kind() == kind => Some(custom),
                _ => None,
            })
            .collect()
    }

    /// Warnings of every document reachable under `options`, deduplicated
    pub fn get_warnings(self: &Arc<Self>, options: &QueryOptions) -> Vec<Warning> {
        let mut warnings: Vec<Warning> = Vec::new();
        for doc in self.get_documents(options) {
            for warning in doc.warnings() {
                if !warnings.contains(&warning) {
                    warnings.push(warning);
                }
            }
        }
        warnings
    }

    /// Most specific document (this one or a nested inline document)
    /// whose range contains `range`.
    pub fn get_document_containing(self: &Arc<Self>, range: &SourceRange) -> Option<Arc<Document>> {
        if !self.source_range().contains(range) {
            return None;
        }
        for feature in self.features() {
            if let Feature::Document(inline) = feature {
                if let Some(found) = inline.get_document_containing(range) {
                    return Some(found);
                }
            }
        }
        Some(Arc::clone(self))
    }

    fn seed_visited(&self) -> HashSet<ResolvedUrl> {
        let mut visited = HashSet::new();
        visited.insert(self.url().clone());
        visited
    }

    fn walk(
        &self,
        options: &QueryOptions,
        visited: &mut HashSet<ResolvedUrl>,
        visit: &mut dyn FnMut(&Feature),
    ) {
        for feature in self.features() {
            visit(feature);
            match feature {
                Feature::Document(inline) => inline.walk(options, visited, visit),
                Feature::Import(import) if options.imported => {
                    if options.exclude_lazy_imports && import.is_lazy() {
                        continue;
                    }
                    if let Some(doc) = import.followed_document(self.url()) {
                        if visited.insert(doc.url().clone()) {
                            doc.walk(options, visited, visit);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("url", self.url())
            .field("kind", &self.kind())
            .field("is_inline", &self.is_inline())
            .field("features", &self.features().len())
            .finish()
    }
}
