//! AnalysisContext - one generation of the analysis pipeline
//!
//! Per URL the pipeline runs five stages, each memoized in its own layer of
//! the generation's [`AnalysisCache`]:
//!
//! 1. `load`       loader call, bounded by a semaphore
//! 2. `parse`      contents -> [`ParsedDocument`]
//! 3. `scan_local` own features + import edges, registered in the graph
//! 4. `scan`       waits until the whole import closure is locally scanned
//! 5. `get_document` links features into a [`Document`]
//!
//! `scan` never awaits the scans of its imports. It starts them and then
//! waits on the graph's structural readiness, which is what keeps import
//! cycles from deadlocking.
//!
//! A context never mutates shared state of another generation. Edits and
//! new requests produce forks.

use crate::analysis_cache::{AnalysisCache, DocumentResult};
use crate::config::AnalyzerSettings;
use crate::error::{AnalysisError, Result};
use crate::model::{
    codes, Document, Feature, Import, InlineDocInfo, ParsedDocument, ResolveScope, ScannedDocument,
    ScannedFeature, ScannedImport, ScannedInlineDocument, SourceRange, Warning,
};
use crate::ports::{Parser, ScanScope, Scanner, UrlLoader, UrlResolver};
use crate::url::{ResolvedUrl, UnresolvedUrl};
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{oneshot, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Kind given to imports added from `AnalyzerSettings::lazy_edges`
pub const LAZY_IMPORT_KIND: &str = "lazy-import";

/// Collaborators shared by every generation of one analyzer
#[derive(Clone)]
pub(crate) struct PipelineConfig {
    pub(crate) loader: Arc<dyn UrlLoader>,
    pub(crate) resolver: Arc<dyn UrlResolver>,
    pub(crate) parsers: HashMap<String, Arc<dyn Parser>>,
    pub(crate) scanners: HashMap<String, Vec<Arc<dyn Scanner>>>,
    pub(crate) settings: Arc<AnalyzerSettings>,
    pub(crate) load_permits: Arc<Semaphore>,
}

impl PipelineConfig {
    fn scanners_for(&self, kind: &str) -> &[Arc<dyn Scanner>] {
        self.scanners.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Overrides applied when forking a context
#[derive(Clone, Default)]
pub struct ForkOptions {
    pub loader: Option<Arc<dyn UrlLoader>>,
}

type CompletionSignal = Shared<BoxFuture<'static, ()>>;

fn completed() -> CompletionSignal {
    futures::future::ready(()).boxed().shared()
}

pub struct AnalysisContext {
    config: Arc<PipelineConfig>,
    cache: Arc<AnalysisCache>,
    generation: u64,
    /// Resolves when the analysis that produced this context has finished
    analysis_complete: Mutex<CompletionSignal>,
}

impl AnalysisContext {
    pub(crate) fn new(config: PipelineConfig) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            cache: Arc::new(AnalysisCache::default()),
            generation: 0,
            analysis_complete: Mutex::new(completed()),
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cache(&self) -> &Arc<AnalysisCache> {
        &self.cache
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.config.settings
    }

    pub fn resolve_url(&self, url: &str) -> Option<ResolvedUrl> {
        self.config.resolver.resolve(None, &UnresolvedUrl::new(url))
    }

    pub fn can_load(&self, url: &ResolvedUrl) -> bool {
        self.config.loader.can_load(url)
    }

    pub fn has_parser(&self, kind: &str) -> bool {
        self.config.parsers.contains_key(kind)
    }

    /// Every file the loader lists under the package root
    pub async fn package_files(&self) -> Result<Vec<String>> {
        self.config
            .loader
            .read_directory("", true)
            .await
            .map_err(|err| AnalysisError::PackageListing(format!("{err:#}")))
    }

    /// Wait for the analysis that created this context to finish
    pub async fn analysis_done(&self) {
        let signal = self.analysis_complete.lock().clone();
        signal.await;
    }

    // ------------------------------------------------------------------
    // Stage 1: load
    // ------------------------------------------------------------------

    pub async fn load(&self, url: &ResolvedUrl) -> std::result::Result<String, String> {
        if !self.config.loader.can_load(url) {
            return Err(format!("configured loader cannot load {url}"));
        }
        let _permit = self
            .config
            .load_permits
            .acquire()
            .await
            .map_err(|err| err.to_string())?;
        self.config
            .loader
            .load(url)
            .await
            .map_err(|err| format!("{err:#}"))
    }

    // ------------------------------------------------------------------
    // Stage 2: parse
    // ------------------------------------------------------------------

    pub async fn parse(
        self: &Arc<Self>,
        url: &ResolvedUrl,
        cancel: &CancellationToken,
    ) -> Result<Arc<ParsedDocument>> {
        let context = Arc::clone(self);
        let key = url.clone();
        self.cache
            .parsed
            .get_or_compute(
                url.clone(),
                move || async move { context.parse_uncached(&key).await },
                cancel,
            )
            .await
    }

    async fn parse_uncached(&self, url: &ResolvedUrl) -> Result<Arc<ParsedDocument>> {
        let start_of_file = || SourceRange::zero(url.clone());

        let contents = self.load(url).await.map_err(|reason| {
            Warning::error(
                codes::COULD_NOT_LOAD,
                format!("Unable to load {url}: {reason}"),
                start_of_file(),
            )
        })?;

        let kind = url.extension().unwrap_or_default();
        let parser = self.config.parsers.get(kind).ok_or_else(|| {
            Warning::error(
                codes::COULD_NOT_PARSE,
                format!("No parser registered for file type '{kind}'"),
                start_of_file(),
            )
        })?;

        let parsed = parser
            .parse(&contents, url, self.config.resolver.as_ref(), None)
            .map_err(|err| plugin_warning(err, codes::COULD_NOT_PARSE, start_of_file()))?;

        debug!(url = %url, kind, generation = self.generation, "parsed");
        Ok(Arc::new(parsed))
    }

    // ------------------------------------------------------------------
    // Stage 3: local scan
    // ------------------------------------------------------------------

    pub async fn scan_local(
        self: &Arc<Self>,
        url: &ResolvedUrl,
        cancel: &CancellationToken,
    ) -> Result<Arc<ScannedDocument>> {
        let context = Arc::clone(self);
        let key = url.clone();
        self.cache
            .scanned
            .get_or_compute(url.clone(), move || context.scan_local_uncached(key), cancel)
            .await
    }

    async fn scan_local_uncached(self: Arc<Self>, url: ResolvedUrl) -> Result<Arc<ScannedDocument>> {
        let never = CancellationToken::new();
        let outcome = match self.parse(&url, &never).await {
            Ok(parsed) => self.scan_document(parsed).await,
            Err(err) => Err(err),
        };

        let scanned = match outcome.and_then(|scanned| {
            let scanned = Arc::new(scanned);
            self.cache.register_scanned(&scanned)?;
            Ok(scanned)
        }) {
            Ok(scanned) => scanned,
            Err(err) => {
                let rejection = warning_for(&err, SourceRange::zero(url.clone()));
                debug!(url = %url, code = %rejection.code, "local scan failed");
                self.cache.graph.reject_document(&url, rejection);
                return Err(err);
            }
        };

        self.cache.graph.add_document(&url, &scanned.import_targets());
        debug!(
            url = %url,
            features = scanned.features.len(),
            generation = self.generation,
            "scanned locally"
        );
        Ok(scanned)
    }

    /// Run every scanner for the document's kind, then parse and scan its
    /// inline documents. Boxed because inline documents recurse.
    fn scan_document(
        self: &Arc<Self>,
        parsed: Arc<ParsedDocument>,
    ) -> BoxFuture<'_, Result<ScannedDocument>> {
        async move {
            let scope = ScanScope::new(self.config.resolver.as_ref());
            let mut features = Vec::new();
            let mut warnings = Vec::new();

            for scanner in self.config.scanners_for(&parsed.kind) {
                let outcome = AssertUnwindSafe(scanner.scan(&parsed, &scope))
                    .catch_unwind()
                    .await;
                let result = match outcome {
                    Ok(Ok(result)) => result,
                    Ok(Err(err)) => {
                        return Err(plugin_warning(err, codes::COULD_NOT_SCAN, parsed.source_range()).into());
                    }
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        warn!(url = %parsed.url, panic = %message, "scanner panicked");
                        return Err(Warning::error(
                            codes::INTERNAL_SCANNING_ERROR,
                            format!("Internal error while scanning {}: {message}", parsed.url),
                            parsed.source_range(),
                        )
                        .into());
                    }
                };
                features.extend(result.features);
                warnings.extend(result.warnings);
            }

            for feature in features.iter_mut() {
                if let ScannedFeature::InlineDocument(inline) = feature {
                    match self.scan_inline(&parsed, inline).await {
                        Ok(scanned) => inline.scanned_document = Some(Arc::new(scanned)),
                        Err(warning) => warnings.push(warning),
                    }
                }
            }

            if !parsed.is_inline() {
                features.extend(self.lazy_imports(&parsed));
            }

            Ok(ScannedDocument::new(parsed, features, warnings))
        }
        .boxed()
    }

    /// Failures stay on the container as warnings.
    async fn scan_inline(
        self: &Arc<Self>,
        container: &ParsedDocument,
        inline: &ScannedInlineDocument,
    ) -> std::result::Result<ScannedDocument, Warning> {
        let parser = self.config.parsers.get(&inline.kind).ok_or_else(|| {
            Warning::error(
                codes::COULD_NOT_PARSE,
                format!("No parser registered for inline {} documents", inline.kind),
                inline.source_range.clone(),
            )
        })?;

        let info = InlineDocInfo {
            location_offset: inline.location_offset,
            source_range: inline.source_range.clone(),
        };
        let parsed = parser
            .parse(
                &inline.contents,
                &container.url,
                self.config.resolver.as_ref(),
                Some(info.clone()),
            )
            .map_err(|err| plugin_warning(err, codes::COULD_NOT_PARSE, inline.source_range.clone()))?
            .with_base_url(container.base_url.clone());
        let parsed = if parsed.is_inline() {
            parsed
        } else {
            parsed.with_inline(info)
        };

        self.scan_document(Arc::new(parsed))
            .await
            .map_err(|err| warning_for(&err, inline.source_range.clone()))
    }

    fn lazy_imports(&self, parsed: &ParsedDocument) -> Vec<ScannedFeature> {
        self.config
            .settings
            .lazy_edges_for(&parsed.url)
            .iter()
            .map(|target| {
                let original = UnresolvedUrl::new(target.as_str());
                let resolved = self.config.resolver.resolve(Some(&parsed.base_url), &original);
                let range = SourceRange::zero(parsed.url.clone());
                ScannedFeature::import(
                    ScannedImport::new(LAZY_IMPORT_KIND, resolved, original, range.clone(), range)
                        .lazy(true),
                )
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Stage 4: transitive scan
    // ------------------------------------------------------------------

    pub async fn scan(
        self: &Arc<Self>,
        url: &ResolvedUrl,
        cancel: &CancellationToken,
    ) -> Result<Arc<ScannedDocument>> {
        let context = Arc::clone(self);
        let key = url.clone();
        self.cache
            .dependencies_scanned
            .get_or_compute(url.clone(), move || context.scan_task(key), cancel)
            .await
    }

    /// Start `scan(url)` without waiting for it
    fn scan_in_background(self: &Arc<Self>, url: &ResolvedUrl) {
        let context = Arc::clone(self);
        let key = url.clone();
        let _ = self
            .cache
            .dependencies_scanned
            .compute(url.clone(), move || context.scan_task(key));
    }

    // Explicitly boxed: the task spawns copies of itself for every import.
    fn scan_task(self: Arc<Self>, url: ResolvedUrl) -> BoxFuture<'static, Result<Arc<ScannedDocument>>> {
        async move { self.scan_uncached(url).await }.boxed()
    }

    async fn scan_uncached(self: Arc<Self>, url: ResolvedUrl) -> Result<Arc<ScannedDocument>> {
        let never = CancellationToken::new();
        let scanned = match self.scan_local(&url, &never).await {
            Ok(scanned) => scanned,
            Err(err) => {
                if !self.cache.graph.is_locally_done(&url) {
                    let rejection = warning_for(&err, SourceRange::zero(url.clone()));
                    self.cache.graph.reject_document(&url, rejection);
                }
                return Err(err);
            }
        };

        // A local scan copied from the parent generation while in flight
        // registered itself with the parent only.
        self.cache.register_scanned(&scanned)?;
        self.cache.graph.add_document(&url, &scanned.import_targets());

        let imports = scanned.nested_imports();
        for import in &imports {
            if let Some(target) = &import.url {
                self.scan_in_background(target);
            }
        }

        self.cache.graph.when_ready(&url).await;

        debug!(url = %url, imports = imports.len(), "import closure scanned");
        Ok(scanned)
    }

    // ------------------------------------------------------------------
    // Stage 5: resolve
    // ------------------------------------------------------------------

    async fn analyze_document(
        self: &Arc<Self>,
        url: &ResolvedUrl,
        cancel: &CancellationToken,
    ) -> Result<Arc<Document>> {
        let context = Arc::clone(self);
        let key = url.clone();
        self.cache
            .analyzed
            .get_or_compute(
                url.clone(),
                move || async move {
                    let never = CancellationToken::new();
                    context.scan(&key, &never).await?;
                    context.get_document(&key).map_err(AnalysisError::from)
                },
                cancel,
            )
            .await
    }

    /// Resolved document for `url`, built on first request from the
    /// generation's scanned documents.
    pub fn get_document(&self, url: &ResolvedUrl) -> DocumentResult {
        if let Some(warning) = self.cache.failed_document(url) {
            return Err(warning);
        }
        if let Some(document) = self.cache.analyzed_document(url) {
            return Ok(document);
        }

        let scanned = self
            .cache
            .scanned_document(url)
            .or_else(|| self.adopt_completed_scan(url));
        match scanned {
            Some(scanned) => Ok(self.build_document(scanned)),
            None => Err(self.cache.graph.rejection(url).unwrap_or_else(|| {
                Warning::error(
                    codes::UNABLE_TO_ANALYZE,
                    format!("Document {url} was requested before its scan completed"),
                    SourceRange::zero(url.clone()),
                )
            })),
        }
    }

    pub fn get_document_containing(&self, range: &SourceRange) -> Option<Arc<Document>> {
        self.get_document(&range.file).ok()?.get_document_containing(range)
    }

    fn adopt_completed_scan(&self, url: &ResolvedUrl) -> Option<Arc<ScannedDocument>> {
        let scanned = self.cache.scanned.get_completed(url)?.ok()?;
        self.cache.register_scanned(&scanned).ok()?;
        Some(scanned)
    }

    /// Top-level documents enter `analyzed_documents` before their features
    /// resolve, so a cycle leading back here finds the document in progress.
    fn build_document(&self, scanned: Arc<ScannedDocument>) -> Arc<Document> {
        let document = Arc::new(Document::new(Arc::clone(&scanned)));
        if !scanned.is_inline() {
            match self.cache.analyzed_documents.entry(scanned.url().clone()) {
                Entry::Occupied(existing) => return Arc::clone(existing.get()),
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(&document));
                }
            }
        }

        let (features, warnings) = self.resolve_features(&scanned);
        document.complete(features, warnings);
        document
    }

    fn resolve_features(&self, scanned: &ScannedDocument) -> (Vec<Feature>, Vec<Warning>) {
        let lookup = |url: &ResolvedUrl| self.get_document(url).ok();
        let mut scope = ResolveScope::new(scanned.url(), &lookup);
        let mut features = Vec::with_capacity(scanned.features.len());

        for feature in &scanned.features {
            match feature {
                ScannedFeature::Import(import) => {
                    features.push(Feature::Import(self.resolve_import(import)));
                }
                ScannedFeature::InlineDocument(inline) => {
                    if let Some(inline_scanned) = &inline.scanned_document {
                        let document = self.build_document(Arc::clone(inline_scanned));
                        features.push(Feature::Document(document));
                    }
                }
                ScannedFeature::Custom(custom) => {
                    if let Some(resolved) = custom.resolve(&mut scope) {
                        features.push(Feature::Custom(resolved));
                    }
                }
            }
        }

        (features, scope.into_warnings())
    }

    /// Link an import against this generation. Its error reflects the
    /// graph as this generation saw it.
    fn resolve_import(&self, import: &Arc<ScannedImport>) -> Import {
        let Some(target) = &import.url else {
            return Import::new(Arc::clone(import), None, None);
        };
        let error = self.cache.graph.rejection(target).map(|rejection| {
            Warning::new(
                rejection.code.clone(),
                format!("Unable to load import: {}", rejection.message),
                rejection.severity,
                import.url_source_range.clone(),
            )
        });
        let document = self.get_document(target).ok();
        Import::new(Arc::clone(import), document.as_ref(), error)
    }

    // ------------------------------------------------------------------
    // Generations
    // ------------------------------------------------------------------

    /// Analyze `urls`, returning the context that holds the results.
    ///
    /// Returns `self` when every URL already has an answer. Otherwise the
    /// work happens on a fork, so readers of `self` never observe it.
    /// Per-URL failures land in the fork's failed documents; cancelled URLs
    /// are left unanswered until their work finishes in the background.
    pub async fn analyze(
        self: &Arc<Self>,
        urls: &[ResolvedUrl],
        cancel: &CancellationToken,
    ) -> Result<Arc<AnalysisContext>> {
        self.analysis_done().await;

        if urls.iter().all(|url| self.cache.has_analyzed(url)) {
            debug!(generation = self.generation, requested = urls.len(), "analysis served from cache");
            return Ok(Arc::clone(self));
        }

        let fork = self.fork(None, ForkOptions::default());
        let (done_tx, done_rx) = oneshot::channel::<()>();
        *fork.analysis_complete.lock() = async move {
            let _ = done_rx.await;
        }
        .boxed()
        .shared();

        let results =
            futures::future::join_all(urls.iter().map(|url| fork.analyze_document(url, cancel))).await;

        let mut fatal = None;
        let mut unfinished = Vec::new();
        for (url, result) in urls.iter().zip(results) {
            match result {
                Ok(_) => {}
                Err(AnalysisError::Cancelled) => {
                    debug!(url = %url, "analysis cancelled");
                    unfinished.extend(fork.cache.analyzed.get(url));
                }
                Err(AnalysisError::Warning(warning)) => {
                    fork.cache.failed_documents.insert(url.clone(), *warning);
                }
                Err(err) => {
                    warn!(url = %url, error = %err, "analysis failed");
                    fatal.get_or_insert(err);
                }
            }
        }
        // Cancelled work keeps running; the generation only counts as done
        // once it lands, so the next fork never copies it half-finished.
        if unfinished.is_empty() {
            let _ = done_tx.send(());
        } else {
            debug!(generation = fork.generation, unfinished = unfinished.len(), "settling cancelled work");
            tokio::spawn(async move {
                futures::future::join_all(unfinished).await;
                let _ = done_tx.send(());
            });
        }

        info!(
            generation = fork.generation,
            requested = urls.len(),
            stats = ?fork.cache.stats(),
            "analysis complete"
        );
        match fatal {
            Some(err) => Err(err),
            None => Ok(fork),
        }
    }

    /// Next generation with `urls` and everything depending on them invalidated
    pub fn files_changed(&self, urls: &[ResolvedUrl]) -> Arc<AnalysisContext> {
        info!(generation = self.generation, changed = urls.len(), "files changed");
        self.fork(Some(self.cache.invalidate(urls)), ForkOptions::default())
    }

    /// Next generation with nothing cached
    pub fn clear_caches(&self) -> Arc<AnalysisContext> {
        info!(generation = self.generation, "caches cleared");
        self.fork(Some(AnalysisCache::default()), ForkOptions::default())
    }

    pub fn fork(&self, cache: Option<AnalysisCache>, options: ForkOptions) -> Arc<AnalysisContext> {
        let config = match options.loader {
            Some(loader) => Arc::new(PipelineConfig {
                loader,
                ..(*self.config).clone()
            }),
            None => Arc::clone(&self.config),
        };
        let cache = cache.unwrap_or_else(|| self.cache.invalidate(&[]));

        debug!(from = self.generation, to = self.generation + 1, "forked analysis context");
        Arc::new(AnalysisContext {
            config,
            cache: Arc::new(cache),
            generation: self.generation + 1,
            analysis_complete: Mutex::new(completed()),
        })
    }
}

impl std::fmt::Debug for AnalysisContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisContext")
            .field("generation", &self.generation)
            .field("cache", &self.cache)
            .finish()
    }
}

/// A plugin error as a user-facing warning. Plugins that already produced a
/// [`Warning`] keep it.
fn plugin_warning(err: anyhow::Error, code: &str, source_range: SourceRange) -> Warning {
    match err.downcast::<Warning>() {
        Ok(warning) => warning,
        Err(err) => Warning::error(code, format!("{err:#}"), source_range),
    }
}

fn warning_for(err: &AnalysisError, source_range: SourceRange) -> Warning {
    match err.as_warning() {
        Some(warning) => warning.clone(),
        None => Warning::error(codes::INTERNAL_SCANNING_ERROR, err.to_string(), source_range),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
