//! Analyzer - public entry point
//!
//! Holds the current [`AnalysisContext`] as the tail of a chain of pending
//! requests. Every request (analysis, file change, cache reset) appends one
//! link, so requests apply in call order and each one starts from the state
//! the previous one produced.

use crate::analysis::{Analysis, RequestedUrl};
use crate::config::{AnalyzerSettings, ConfigResult};
use crate::context::{AnalysisContext, PipelineConfig};
use crate::error::Result;
use crate::infrastructure::PackageUrlResolver;
use crate::ports::{Parser, Scanner, UrlLoader, UrlResolver};
use crate::url::ResolvedUrl;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::info;

type ContextFuture = Shared<BoxFuture<'static, Arc<AnalysisContext>>>;

/// Code-level collaborators plus settings for an [`Analyzer`]
pub struct AnalyzerOptions {
    loader: Arc<dyn UrlLoader>,
    resolver: Arc<dyn UrlResolver>,
    parsers: HashMap<String, Arc<dyn Parser>>,
    scanners: HashMap<String, Vec<Arc<dyn Scanner>>>,
    settings: AnalyzerSettings,
}

impl AnalyzerOptions {
    pub fn new(loader: impl UrlLoader + 'static) -> Self {
        Self {
            loader: Arc::new(loader),
            resolver: Arc::new(PackageUrlResolver::new()),
            parsers: HashMap::new(),
            scanners: HashMap::new(),
            settings: AnalyzerSettings::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: impl UrlResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Parser for files whose extension is `kind`, and for inline documents
    /// of that kind
    pub fn with_parser(mut self, kind: impl Into<String>, parser: impl Parser + 'static) -> Self {
        self.parsers.insert(kind.into(), Arc::new(parser));
        self
    }

    /// Add a scanner for `kind`. Scanners of one kind run in registration order.
    pub fn with_scanner(mut self, kind: impl Into<String>, scanner: impl Scanner + 'static) -> Self {
        self.scanners
            .entry(kind.into())
            .or_default()
            .push(Arc::new(scanner));
        self
    }

    pub fn with_settings(mut self, settings: AnalyzerSettings) -> Self {
        self.settings = settings;
        self
    }
}

pub struct Analyzer {
    current: Mutex<ContextFuture>,
}

impl Analyzer {
    pub fn new(options: AnalyzerOptions) -> ConfigResult<Self> {
        options.settings.validate()?;
        let config = PipelineConfig {
            loader: options.loader,
            resolver: options.resolver,
            parsers: options.parsers,
            scanners: options.scanners,
            load_permits: Arc::new(Semaphore::new(options.settings.max_concurrent_loads)),
            settings: Arc::new(options.settings),
        };
        let context = AnalysisContext::new(config);
        Ok(Self {
            current: Mutex::new(futures::future::ready(context).boxed().shared()),
        })
    }

    /// Context after every request made so far has been applied
    pub async fn current_context(&self) -> Arc<AnalysisContext> {
        let current = self.current.lock().clone();
        current.await
    }

    pub async fn analyze<S: AsRef<str>>(&self, urls: &[S]) -> Result<Analysis> {
        self.analyze_with_cancel(urls, CancellationToken::new()).await
    }

    /// Analyze `urls` (and, transitively, everything they import).
    ///
    /// Cancelling `cancel` returns early for this caller; URLs it left
    /// unfinished read as not analyzed. The work itself keeps running, and
    /// later requests start once it has landed so they can reuse it.
    pub async fn analyze_with_cancel<S: AsRef<str>>(
        &self,
        urls: &[S],
        cancel: CancellationToken,
    ) -> Result<Analysis> {
        let context = self.current_context().await;
        let requested: Vec<RequestedUrl> = urls
            .iter()
            .map(|url| RequestedUrl::new(url.as_ref(), context.resolve_url(url.as_ref())))
            .collect();
        let resolved: Vec<ResolvedUrl> = requested
            .iter()
            .filter_map(|request| request.resolved.clone())
            .collect();

        let step = {
            let mut current = self.current.lock();
            let previous = current.clone();
            let step = async move {
                let context = previous.await;
                match context.analyze(&resolved, &cancel).await {
                    Ok(next) => (Arc::clone(&next), Ok(next)),
                    Err(err) => (context, Err(err)),
                }
            }
            .boxed()
            .shared();
            let next = step.clone();
            *current = async move { next.await.0 }.boxed().shared();
            step
        };

        let (_, outcome) = step.await;
        Ok(Analysis::new(outcome?, requested))
    }

    /// Analyze every file the loader lists that has a registered parser
    pub async fn analyze_package(&self) -> Result<Analysis> {
        let context = self.current_context().await;
        let files: Vec<String> = context
            .package_files()
            .await?
            .into_iter()
            .filter(|file| {
                ResolvedUrl::new(file.as_str())
                    .extension()
                    .map(|kind| context.has_parser(kind))
                    .unwrap_or(false)
            })
            .collect();
        info!(files = files.len(), "analyzing package");
        self.analyze(&files).await
    }

    /// Invalidate `urls` and everything that depends on them
    pub async fn files_changed<S: AsRef<str>>(&self, urls: &[S]) {
        let context = self.current_context().await;
        let changed: Vec<ResolvedUrl> = urls
            .iter()
            .filter_map(|url| context.resolve_url(url.as_ref()))
            .collect();
        self.advance(move |context| context.files_changed(&changed)).await;
    }

    /// Drop every cached result
    pub async fn clear_caches(&self) {
        self.advance(|context| context.clear_caches()).await;
    }

    pub async fn load(&self, url: &str) -> std::result::Result<String, String> {
        let context = self.current_context().await;
        let resolved = context
            .resolve_url(url)
            .ok_or_else(|| format!("unable to resolve {url}"))?;
        context.load(&resolved).await
    }

    pub async fn can_load(&self, url: &str) -> bool {
        let context = self.current_context().await;
        context
            .resolve_url(url)
            .map(|resolved| context.can_load(&resolved))
            .unwrap_or(false)
    }

    pub async fn resolve_url(&self, url: &str) -> Option<ResolvedUrl> {
        self.current_context().await.resolve_url(url)
    }

    /// Append a synchronous transition to the request chain and wait for it
    fn advance<F>(&self, transition: F) -> impl Future<Output = Arc<AnalysisContext>>
    where
        F: FnOnce(Arc<AnalysisContext>) -> Arc<AnalysisContext> + Send + 'static,
    {
        let mut current = self.current.lock();
        let previous = current.clone();
        let next = async move {
            let context = previous.await;
            context.analysis_done().await;
            transition(context)
        }
        .boxed()
        .shared();
        *current = next.clone();
        next
    }
}
