//! One generation of cached analysis state
//!
//! Four memoized pipeline layers, three plain result maps and the import
//! graph they were computed against. A cache is never edited after the
//! generation that owns it starts serving results; edits produce a new cache
//! through [`AnalysisCache::invalidate`].

use crate::dependency_graph::DependencyGraph;
use crate::error::{AnalysisError, Result};
use crate::model::{Document, ParsedDocument, ScannedDocument, Warning};
use crate::url::ResolvedUrl;
use crate::work_cache::WorkCache;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Outcome of resolving one URL
pub type DocumentResult = std::result::Result<Arc<Document>, Warning>;

pub struct AnalysisCache {
    /// url -> parse of its contents
    pub(crate) parsed: WorkCache<ResolvedUrl, Arc<ParsedDocument>>,
    /// url -> local scan (own features only)
    pub(crate) scanned: WorkCache<ResolvedUrl, Arc<ScannedDocument>>,
    /// url -> local scan, completed once the import closure is scanned too
    pub(crate) dependencies_scanned: WorkCache<ResolvedUrl, Arc<ScannedDocument>>,
    /// url -> resolved document
    pub(crate) analyzed: WorkCache<ResolvedUrl, Arc<Document>>,

    pub(crate) scanned_documents: DashMap<ResolvedUrl, Arc<ScannedDocument>>,
    pub(crate) analyzed_documents: DashMap<ResolvedUrl, Arc<Document>>,
    pub(crate) failed_documents: DashMap<ResolvedUrl, Warning>,

    pub(crate) graph: Arc<DependencyGraph>,
}

/// Entry counts per store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub parsed: usize,
    pub scanned: usize,
    pub dependencies_scanned: usize,
    pub analyzed: usize,
    pub scanned_documents: usize,
    pub analyzed_documents: usize,
    pub failed_documents: usize,
    pub graph_nodes: usize,
}

impl AnalysisCache {
    /// Copy every store of `from` (or start empty) and use `graph`, or a
    /// fresh graph when none is given.
    pub fn new(from: Option<&AnalysisCache>, graph: Option<Arc<DependencyGraph>>) -> Self {
        let graph = graph.unwrap_or_default();
        match from {
            Some(parent) => Self {
                parsed: WorkCache::from_parent(&parent.parsed),
                scanned: WorkCache::from_parent(&parent.scanned),
                dependencies_scanned: WorkCache::from_parent(&parent.dependencies_scanned),
                analyzed: WorkCache::from_parent(&parent.analyzed),
                scanned_documents: parent.scanned_documents.clone(),
                analyzed_documents: parent.analyzed_documents.clone(),
                failed_documents: parent.failed_documents.clone(),
                graph,
            },
            None => Self {
                parsed: WorkCache::new(),
                scanned: WorkCache::new(),
                dependencies_scanned: WorkCache::new(),
                analyzed: WorkCache::new(),
                scanned_documents: DashMap::new(),
                analyzed_documents: DashMap::new(),
                failed_documents: DashMap::new(),
                graph,
            },
        }
    }

    /// Next generation after `urls` changed.
    ///
    /// The changed URLs lose every cached entry. Their transitive dependants
    /// (taken from the graph as it was before the change) lose only their
    /// transitive-scan and resolved results; their own parse and local scan
    /// are still valid.
    pub fn invalidate(&self, urls: &[ResolvedUrl]) -> AnalysisCache {
        let mut dependants = HashSet::new();
        for url in urls {
            dependants.extend(self.graph.get_all_dependants_of(url));
        }

        let graph = Arc::new(self.graph.invalidate_paths(urls));
        let next = AnalysisCache::new(Some(self), Some(graph));

        for url in urls {
            next.parsed.delete(url);
            next.scanned.delete(url);
            next.dependencies_scanned.delete(url);
            next.analyzed.delete(url);
            next.scanned_documents.remove(url);
            next.analyzed_documents.remove(url);
            next.failed_documents.remove(url);
        }

        for dependant in &dependants {
            next.dependencies_scanned.delete(dependant);
            next.analyzed_documents.remove(dependant);
        }

        // Only documents that survived may answer from the analyzed layer.
        next.analyzed.clear();
        for entry in next.analyzed_documents.iter() {
            next.analyzed
                .insert_ready(entry.key().clone(), Arc::clone(entry.value()));
        }

        debug!(
            changed = urls.len(),
            dependants = dependants.len(),
            surviving_documents = next.analyzed_documents.len(),
            "analysis cache invalidated"
        );
        next
    }

    /// Store a local scan result. Registering a second, different document
    /// under the same URL means two scans ran for one key.
    pub fn register_scanned(&self, document: &Arc<ScannedDocument>) -> Result<()> {
        let url = document.url().clone();
        let existing = self
            .scanned_documents
            .entry(url.clone())
            .or_insert_with(|| Arc::clone(document))
            .value()
            .clone();
        if Arc::ptr_eq(&existing, document) {
            Ok(())
        } else {
            Err(AnalysisError::internal(format!(
                "two different scanned documents registered for {url}"
            )))
        }
    }

    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    /// Whether `url` already has a final answer: a document or a failure
    pub fn has_analyzed(&self, url: &ResolvedUrl) -> bool {
        self.analyzed_documents.contains_key(url) || self.failed_documents.contains_key(url)
    }

    pub fn analyzed_document(&self, url: &ResolvedUrl) -> Option<Arc<Document>> {
        self.analyzed_documents
            .get(url)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn scanned_document(&self, url: &ResolvedUrl) -> Option<Arc<ScannedDocument>> {
        self.scanned_documents
            .get(url)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn failed_document(&self, url: &ResolvedUrl) -> Option<Warning> {
        self.failed_documents.get(url).map(|entry| entry.value().clone())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            parsed: self.parsed.len(),
            scanned: self.scanned.len(),
            dependencies_scanned: self.dependencies_scanned.len(),
            analyzed: self.analyzed.len(),
            scanned_documents: self.scanned_documents.len(),
            analyzed_documents: self.analyzed_documents.len(),
            failed_documents: self.failed_documents.len(),
            graph_nodes: self.graph.len(),
        }
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        AnalysisCache::new(None, None)
    }
}

impl std::fmt::Debug for AnalysisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisCache")
            .field("stats", &self.stats())
            .finish()
    }
}
