use super::{Position, SourceRange};
use crate::url::ResolvedUrl;
use std::any::Any;
use std::sync::Arc;

/// Where an inline document sits inside its container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineDocInfo {
    pub location_offset: Position,
    /// Range of the inline document in the container file
    pub source_range: SourceRange,
}

/// One file's (or one inline block's) AST plus source metadata.
///
/// The AST is opaque to the engine; scanners downcast it with
/// [`ParsedDocument::ast`].
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub url: ResolvedUrl,
    pub base_url: ResolvedUrl,
    pub kind: String,
    pub contents: String,
    pub ast: Arc<dyn Any + Send + Sync>,
    pub inline: Option<InlineDocInfo>,
}

impl ParsedDocument {
    pub fn new(
        url: ResolvedUrl,
        kind: impl Into<String>,
        contents: impl Into<String>,
        ast: impl Any + Send + Sync,
    ) -> Self {
        Self {
            base_url: url.clone(),
            url,
            kind: kind.into(),
            contents: contents.into(),
            ast: Arc::new(ast),
            inline: None,
        }
    }

    pub fn with_base_url(mut self, base_url: ResolvedUrl) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_inline(mut self, inline: InlineDocInfo) -> Self {
        self.inline = Some(inline);
        self
    }

    pub fn is_inline(&self) -> bool {
        self.inline.is_some()
    }

    pub fn ast<T: Any>(&self) -> Option<&T> {
        self.ast.downcast_ref::<T>()
    }

    pub fn location_offset(&self) -> Position {
        self.inline
            .as_ref()
            .map(|inline| inline.location_offset)
            .unwrap_or_default()
    }

    /// Range spanned by this document in its file
    pub fn source_range(&self) -> SourceRange {
        match &self.inline {
            Some(inline) => inline.source_range.clone(),
            None => SourceRange::spanning(self.url.clone(), Position::default(), &self.contents),
        }
    }

    /// Convert document-local positions into a range of the containing file.
    pub fn range_of(&self, start: Position, end: Position) -> SourceRange {
        let offset = self.location_offset();
        SourceRange::new(self.url.clone(), start.offset_by(offset), end.offset_by(offset))
    }
}
