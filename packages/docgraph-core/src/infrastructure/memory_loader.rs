//! In-memory URL loader
//!
//! Backs unsaved editor buffers and tests. Counts loads per URL so callers
//! can observe how often the pipeline actually hit the loader.

use crate::ports::UrlLoader;
use crate::url::ResolvedUrl;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Default)]
pub struct InMemoryUrlLoader {
    files: Arc<RwLock<BTreeMap<String, String>>>,
    load_counts: Arc<DashMap<String, usize>>,
    latency: Option<Duration>,
}

impl InMemoryUrlLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, url: impl Into<String>, contents: impl Into<String>) -> Self {
        self.set(url, contents);
        self
    }

    /// Delay every load, so concurrent requests overlap
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set(&self, url: impl Into<String>, contents: impl Into<String>) {
        self.files.write().insert(url.into(), contents.into());
    }

    pub fn remove(&self, url: &str) -> Option<String> {
        self.files.write().remove(url)
    }

    pub fn load_count(&self, url: &str) -> usize {
        self.load_counts.get(url).map(|count| *count).unwrap_or(0)
    }

    pub fn total_loads(&self) -> usize {
        self.load_counts.iter().map(|entry| *entry.value()).sum()
    }
}

#[async_trait]
impl UrlLoader for InMemoryUrlLoader {
    /// Any scheme-less URL; unknown files fail at load time
    fn can_load(&self, url: &ResolvedUrl) -> bool {
        !url.as_str().contains("://")
    }

    async fn load(&self, url: &ResolvedUrl) -> anyhow::Result<String> {
        *self.load_counts.entry(url.as_str().to_string()).or_insert(0) += 1;
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.files
            .read()
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such file: {url}"))
    }

    async fn read_directory(&self, path: &str, deep: bool) -> anyhow::Result<Vec<String>> {
        let prefix = match path.trim_end_matches('/') {
            "" => String::new(),
            dir => format!("{dir}/"),
        };
        Ok(self
            .files
            .read()
            .keys()
            .filter(|url| url.starts_with(&prefix))
            .filter(|url| deep || !url[prefix.len()..].contains('/'))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_counts_and_missing_files() {
        let loader = InMemoryUrlLoader::new().with_file("a.html", "hello");

        assert_eq!(loader.load(&"a.html".into()).await.unwrap(), "hello");
        assert!(loader.load(&"b.html".into()).await.is_err());
        assert_eq!(loader.load_count("a.html"), 1);
        assert_eq!(loader.total_loads(), 2);
    }

    #[tokio::test]
    async fn test_read_directory_depth() {
        let loader = InMemoryUrlLoader::new()
            .with_file("index.html", "")
            .with_file("src/a.html", "")
            .with_file("src/deep/b.html", "");

        assert_eq!(loader.read_directory("", false).await.unwrap(), vec!["index.html"]);
        assert_eq!(
            loader.read_directory("src", true).await.unwrap(),
            vec!["src/a.html", "src/deep/b.html"]
        );
    }
}
