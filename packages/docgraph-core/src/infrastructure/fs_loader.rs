//! Filesystem loader rooted at a package directory

use crate::ports::UrlLoader;
use crate::url::ResolvedUrl;
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct FsUrlLoader {
    root: PathBuf,
}

impl FsUrlLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a package-relative URL. URLs with a scheme, absolute paths and
    /// paths escaping the root have none.
    fn path_of(&self, url: &str) -> Option<PathBuf> {
        if url.contains("://") {
            return None;
        }
        let relative = Path::new(url);
        let inside_root = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        inside_root.then(|| self.root.join(relative))
    }

    /// Canonical form of `path`, refused when symlinks lead it out of the
    /// package root.
    async fn contained(&self, path: &Path) -> anyhow::Result<PathBuf> {
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .with_context(|| format!("package root {} is not accessible", self.root.display()))?;
        let real = tokio::fs::canonicalize(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        if !real.starts_with(&root) {
            anyhow::bail!("{} resolves outside the package root", path.display());
        }
        Ok(real)
    }
}

fn url_of(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Package-relative URLs of the regular files under `start`. Symlinks are
/// neither followed nor listed.
fn list_files(root: &Path, start: &Path, deep: bool) -> anyhow::Result<Vec<String>> {
    let mut walker = WalkDir::new(start).follow_links(false).min_depth(1);
    if !deep {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("failed to list {}", start.display()))?;
        if entry.file_type().is_file() {
            files.extend(url_of(root, entry.path()));
        }
    }
    files.sort();
    Ok(files)
}

#[async_trait]
impl UrlLoader for FsUrlLoader {
    fn can_load(&self, url: &ResolvedUrl) -> bool {
        self.path_of(url.as_str()).is_some()
    }

    async fn load(&self, url: &ResolvedUrl) -> anyhow::Result<String> {
        let path = self
            .path_of(url.as_str())
            .with_context(|| format!("{url} is outside the package root"))?;
        let real = self.contained(&path).await?;
        tokio::fs::read_to_string(&real)
            .await
            .with_context(|| format!("failed to read {}", path.display()))
    }

    async fn read_directory(&self, path: &str, deep: bool) -> anyhow::Result<Vec<String>> {
        let start = self
            .path_of(path)
            .with_context(|| format!("{path} is outside the package root"))?;

        let root = self.root.clone();
        tokio::task::spawn_blocking(move || list_files(&root, &start, deep))
            .await
            .context("directory listing task failed")?
    }
}
