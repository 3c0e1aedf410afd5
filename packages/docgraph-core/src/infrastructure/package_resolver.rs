//! Package-relative URL resolution
//!
//! Resolved URLs are `/`-separated paths relative to the package root
//! (`src/app.html`). References resolve against the directory of the
//! referencing document; a leading `/` means the package root. References
//! with a scheme, or that climb above the root, do not resolve.

use crate::ports::UrlResolver;
use crate::url::{ResolvedUrl, UnresolvedUrl};

#[derive(Debug, Clone, Copy, Default)]
pub struct PackageUrlResolver;

impl PackageUrlResolver {
    pub fn new() -> Self {
        Self
    }

    fn has_scheme(url: &str) -> bool {
        if url.starts_with("//") {
            return true;
        }
        match url.split_once(':') {
            Some((scheme, _)) => {
                !scheme.is_empty()
                    && !scheme.contains('/')
                    && scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
            }
            None => false,
        }
    }

    fn normalize(path: &str) -> Option<String> {
        let mut segments: Vec<&str> = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop()?;
                }
                other => segments.push(other),
            }
        }
        if segments.is_empty() {
            None
        } else {
            Some(segments.join("/"))
        }
    }
}

impl UrlResolver for PackageUrlResolver {
    fn resolve(&self, base: Option<&ResolvedUrl>, url: &UnresolvedUrl) -> Option<ResolvedUrl> {
        let raw = url.as_str().trim();
        let raw = raw.split(['#', '?']).next().unwrap_or_default();
        if raw.is_empty() || Self::has_scheme(raw) {
            return None;
        }

        let joined = match (raw.strip_prefix('/'), base) {
            (Some(from_root), _) => from_root.to_string(),
            (None, Some(base)) => format!("{}{}", base.directory(), raw),
            (None, None) => raw.to_string(),
        };
        Self::normalize(&joined).map(ResolvedUrl::new)
    }

    fn relative(&self, from: &ResolvedUrl, to: &ResolvedUrl) -> String {
        let from_dirs: Vec<&str> = from.directory().split('/').filter(|s| !s.is_empty()).collect();
        let to_parts: Vec<&str> = to.as_str().split('/').collect();

        let common = from_dirs
            .iter()
            .zip(to_parts.iter())
            .take_while(|(a, b)| a == b)
            .count()
            .min(to_parts.len().saturating_sub(1));

        let mut parts: Vec<&str> = vec![".."; from_dirs.len() - common];
        parts.extend(&to_parts[common..]);
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(base: Option<&str>, url: &str) -> Option<String> {
        let base = base.map(ResolvedUrl::new);
        PackageUrlResolver
            .resolve(base.as_ref(), &UnresolvedUrl::new(url))
            .map(|resolved| resolved.as_str().to_string())
    }

    #[test]
    fn test_resolve_relative_to_base_directory() {
        assert_eq!(resolve(Some("src/app.html"), "util.html").as_deref(), Some("src/util.html"));
        assert_eq!(resolve(Some("src/app.html"), "../lib/x.js").as_deref(), Some("lib/x.js"));
        assert_eq!(resolve(Some("src/app.html"), "./a/./b.css").as_deref(), Some("src/a/b.css"));
        assert_eq!(resolve(Some("src/app.html"), "/index.html").as_deref(), Some("index.html"));
        assert_eq!(resolve(None, "index.html#top").as_deref(), Some("index.html"));
    }

    #[test]
    fn test_unresolvable_references() {
        assert_eq!(resolve(None, "https://cdn.example.com/x.js"), None);
        assert_eq!(resolve(None, "//cdn.example.com/x.js"), None);
        assert_eq!(resolve(None, "data:text/plain,hi"), None);
        assert_eq!(resolve(Some("a.html"), "../escape.html"), None);
        assert_eq!(resolve(None, ""), None);
    }

    #[test]
    fn test_relative() {
        let resolver = PackageUrlResolver;
        let rel = |from: &str, to: &str| resolver.relative(&from.into(), &to.into());

        assert_eq!(rel("src/app.html", "src/util.html"), "util.html");
        assert_eq!(rel("src/app.html", "lib/x.js"), "../lib/x.js");
        assert_eq!(rel("index.html", "src/a/b.html"), "src/a/b.html");
        assert_eq!(rel("src/a/b.html", "index.html"), "../../index.html");
    }
}
