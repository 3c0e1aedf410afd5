//! Ports - collaborator interfaces the pipeline is parameterized over
//!
//! Loaders fetch contents, resolvers canonicalize references, parsers build
//! ASTs and scanners pull features out of them. Implementations report
//! problems through `anyhow::Error`; an error that is a [`Warning`] is shown
//! to users unchanged.

use crate::model::{InlineDocInfo, ParsedDocument, ScannedFeature, Warning};
use crate::url::{ResolvedUrl, UnresolvedUrl};
use async_trait::async_trait;

/// Fetches document contents
#[async_trait]
pub trait UrlLoader: Send + Sync {
    fn can_load(&self, url: &ResolvedUrl) -> bool;

    async fn load(&self, url: &ResolvedUrl) -> anyhow::Result<String>;

    /// List loadable files under `path` (relative, `""` for the root)
    async fn read_directory(&self, path: &str, deep: bool) -> anyhow::Result<Vec<String>> {
        let _ = deep;
        anyhow::bail!("loader cannot list directory '{path}'")
    }
}

/// Turns references into canonical URLs
pub trait UrlResolver: Send + Sync {
    /// `None` when `url` cannot be turned into something loadable
    fn resolve(&self, base: Option<&ResolvedUrl>, url: &UnresolvedUrl) -> Option<ResolvedUrl>;

    /// Reference that leads from `from` to `to`
    fn relative(&self, from: &ResolvedUrl, to: &ResolvedUrl) -> String;
}

/// Parser for one file type
pub trait Parser: Send + Sync {
    fn parse(
        &self,
        contents: &str,
        url: &ResolvedUrl,
        resolver: &dyn UrlResolver,
        inline: Option<InlineDocInfo>,
    ) -> anyhow::Result<ParsedDocument>;
}

/// Everything a scanner may consult besides the document itself
pub struct ScanScope<'a> {
    resolver: &'a dyn UrlResolver,
}

impl<'a> ScanScope<'a> {
    pub fn new(resolver: &'a dyn UrlResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &dyn UrlResolver {
        self.resolver
    }

    /// Resolve a reference made from inside `document`
    pub fn resolve(&self, document: &ParsedDocument, url: &UnresolvedUrl) -> Option<ResolvedUrl> {
        self.resolver.resolve(Some(&document.base_url), url)
    }
}

#[derive(Debug, Default)]
pub struct ScanResult {
    pub features: Vec<ScannedFeature>,
    pub warnings: Vec<Warning>,
}

/// Feature extractor for one file type. Several may run per document.
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, document: &ParsedDocument, scope: &ScanScope<'_>) -> anyhow::Result<ScanResult>;
}
