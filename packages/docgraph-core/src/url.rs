//! URL newtypes
//!
//! A [`ResolvedUrl`] is canonical and loadable. It keys every cache layer and
//! every node of the dependency graph. An [`UnresolvedUrl`] is whatever text a
//! document used to refer to another one; only a `UrlResolver` turns one into
//! the other.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Canonical document identifier (cheap to clone).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedUrl(Arc<str>);

impl ResolvedUrl {
    pub fn new(url: impl Into<Arc<str>>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extension of the last path segment, used as the document's file type.
    pub fn extension(&self) -> Option<&str> {
        let path = self.0.split(['?', '#']).next().unwrap_or_default();
        let segment = path.rsplit('/').next().unwrap_or(path);
        match segment.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// Everything up to and including the last `/`.
    pub fn directory(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..=idx],
            None => "",
        }
    }
}

impl fmt::Display for ResolvedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ResolvedUrl {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResolvedUrl {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

/// A reference exactly as written in a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnresolvedUrl(String);

impl UnresolvedUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnresolvedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnresolvedUrl {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_extension() {
        assert_eq!(ResolvedUrl::new("a/b/index.html").extension(), Some("html"));
        assert_eq!(ResolvedUrl::new("lib.min.js?v=2").extension(), Some("js"));
        assert_eq!(ResolvedUrl::new("dir.d/README").extension(), None);
        assert_eq!(ResolvedUrl::new(".hidden").extension(), None);
    }

    #[test]
    fn test_directory() {
        assert_eq!(ResolvedUrl::new("a/b/index.html").directory(), "a/b/");
        assert_eq!(ResolvedUrl::new("index.html").directory(), "");
    }

    #[test]
    fn test_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(ResolvedUrl::new("x.html"), 1);
        assert_eq!(map.get("x.html"), Some(&1));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let url = ResolvedUrl::new("src/a.doc");
        let json = serde_json::to_string(&url).unwrap();
        assert_eq!(json, r#""src/a.doc""#);
        assert_eq!(serde_json::from_str::<ResolvedUrl>(&json).unwrap(), url);
    }
}
