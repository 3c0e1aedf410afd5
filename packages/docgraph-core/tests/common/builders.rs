//! Analyzer builders over the in-memory loader

use super::fixtures::{FixtureParser, FixtureScanner, DOC};
use docgraph_core::infrastructure::InMemoryUrlLoader;
use docgraph_core::{Analyzer, AnalyzerOptions, AnalyzerSettings};
use std::time::Duration;

/// Builder for an [`Analyzer`] wired to the fixture language
#[derive(Default)]
pub struct AnalyzerBuilder {
    loader: InMemoryUrlLoader,
    settings: AnalyzerSettings,
}

impl AnalyzerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, url: &str, contents: &str) -> Self {
        self.loader.set(url, contents);
        self
    }

    pub fn with_files(self, files: &[(&str, &str)]) -> Self {
        for (url, contents) in files {
            self.loader.set(*url, *contents);
        }
        self
    }

    pub fn with_settings(mut self, settings: AnalyzerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.loader = self.loader.with_latency(latency);
        self
    }

    /// The analyzer plus a handle on its loader, for editing files and
    /// counting loads
    pub fn build(self) -> (Analyzer, InMemoryUrlLoader) {
        let handle = self.loader.clone();
        let options = AnalyzerOptions::new(self.loader)
            .with_parser(DOC, FixtureParser)
            .with_scanner(DOC, FixtureScanner)
            .with_settings(self.settings);
        let analyzer = Analyzer::new(options).expect("valid analyzer settings");
        (analyzer, handle)
    }
}

/// Analyzer over `files`
pub fn fixture_analyzer(files: &[(&str, &str)]) -> (Analyzer, InMemoryUrlLoader) {
    docgraph_core::telemetry::init_test_tracing();
    AnalyzerBuilder::new().with_files(files).build()
}
