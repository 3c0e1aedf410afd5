//! Analysis - read-only view over the context one request produced

use crate::analysis_cache::DocumentResult;
use crate::context::AnalysisContext;
use crate::model::{codes, Document, QueryOptions, SourceRange, Warning};
use crate::url::ResolvedUrl;
use std::collections::HashSet;
use std::sync::Arc;

/// A URL as the caller wrote it, plus what it resolved to
#[derive(Debug, Clone)]
pub struct RequestedUrl {
    pub original: String,
    pub resolved: Option<ResolvedUrl>,
}

impl RequestedUrl {
    pub fn new(original: impl Into<String>, resolved: Option<ResolvedUrl>) -> Self {
        Self {
            original: original.into(),
            resolved,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Analysis {
    context: Arc<AnalysisContext>,
    requested: Vec<RequestedUrl>,
}

impl Analysis {
    pub(crate) fn new(context: Arc<AnalysisContext>, requested: Vec<RequestedUrl>) -> Self {
        Self { context, requested }
    }

    pub fn context(&self) -> &Arc<AnalysisContext> {
        &self.context
    }

    pub fn requested(&self) -> &[RequestedUrl] {
        &self.requested
    }

    /// Document for `url`, or the warning explaining why there is none.
    /// Unanalyzed URLs are answered with a warning rather than an error.
    pub fn get_document(&self, url: &str) -> DocumentResult {
        match self.context.resolve_url(url) {
            Some(resolved) => self.context.get_document(&resolved),
            None => Err(unresolvable(url)),
        }
    }

    /// Most specific document (inline documents included) containing `range`
    pub fn get_document_containing(&self, range: &SourceRange) -> Option<Arc<Document>> {
        self.context.get_document_containing(range)
    }

    /// Successfully analyzed requested documents, in request order
    pub fn documents(&self) -> Vec<Arc<Document>> {
        let mut seen = HashSet::new();
        self.requested
            .iter()
            .filter_map(|request| request.resolved.as_ref())
            .filter(|url| seen.insert((*url).clone()))
            .filter_map(|url| self.context.get_document(url).ok())
            .collect()
    }

    /// Warnings of every document reachable from the requested ones, plus
    /// the reason each failed request has no document
    pub fn get_warnings(&self) -> Vec<Warning> {
        let options = QueryOptions::imported();
        let mut seen = HashSet::new();
        let mut warnings = Vec::new();

        for request in &self.requested {
            let result = match &request.resolved {
                Some(url) => self.context.get_document(url),
                None => Err(unresolvable(&request.original)),
            };
            let found = match result {
                Ok(document) => document.get_warnings(&options),
                Err(warning) => vec![warning],
            };
            for warning in found {
                if seen.insert(warning.clone()) {
                    warnings.push(warning);
                }
            }
        }
        warnings
    }

    /// Groups of documents that import each other
    pub fn import_cycles(&self) -> Vec<Vec<ResolvedUrl>> {
        self.context.cache().graph().import_cycles()
    }
}

fn unresolvable(url: &str) -> Warning {
    Warning::error(
        codes::COULD_NOT_LOAD,
        format!("Unable to resolve URL '{url}'"),
        SourceRange::zero(ResolvedUrl::new(url)),
    )
}
