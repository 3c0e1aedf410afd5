/*
 * docgraph-core - Incremental Document-Graph Analysis Engine
 *
 * Layers (leaves first):
 * - work_cache/       : per-key async memoization (shared in-flight work)
 * - dependency_graph/ : import edges, dependants, cycle-tolerant readiness
 * - analysis_cache/   : one generation of cached stage results
 * - context/          : load -> parse -> scan_local -> scan -> resolve
 * - analyzer/         : request serialization + generations
 *
 * Ports:
 * - ports/            : loader, resolver, parser and scanner traits
 * - infrastructure/   : in-memory + filesystem loaders, package resolver
 */

pub mod analysis;
pub mod analysis_cache;
pub mod analyzer;
pub mod config;
pub mod context;
pub mod dependency_graph;
pub mod error;
pub mod infrastructure;
pub mod model;
pub mod ports;
pub mod telemetry;
pub mod url;
pub mod work_cache;

pub use analysis::{Analysis, RequestedUrl};
pub use analysis_cache::{AnalysisCache, CacheStats, DocumentResult};
pub use analyzer::{Analyzer, AnalyzerOptions};
pub use config::{AnalyzerSettings, ConfigError, ConfigResult};
pub use context::{AnalysisContext, ForkOptions, LAZY_IMPORT_KIND};
pub use dependency_graph::{DependencyGraph, ScanStatus};
pub use error::{AnalysisError, Result};
pub use model::{
    codes, Document, Feature, Import, InlineDocInfo, ParsedDocument, Position, QueryOptions,
    ResolveScope, ResolvedCustomFeature, ScannedCustomFeature, ScannedDocument, ScannedFeature,
    ScannedImport, ScannedInlineDocument, Severity, SourceRange, Warning,
};
pub use ports::{Parser, ScanResult, ScanScope, Scanner, UrlLoader, UrlResolver};
pub use url::{ResolvedUrl, UnresolvedUrl};
pub use work_cache::{SharedWork, WorkCache};
