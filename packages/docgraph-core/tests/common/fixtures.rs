//! Line-based fixture language
//!
//! One directive per line; anything else is plain text:
//!
//! ```text
//! import other.doc        import edge
//! lazy other.doc          lazy import edge
//! feature Name            declares Name
//! uses other.doc#Name     reference to Name, resolved through other.doc's imports
//! warn message            scanner warning
//! error                   scanner fails
//! panic                   scanner panics
//! !!parse-error           parser fails
//! <inline doc>            inline document of kind `doc` until `</inline>`
//! ```

use anyhow::anyhow;
use async_trait::async_trait;
use docgraph_core::{
    codes, Document, InlineDocInfo, ParsedDocument, Position, QueryOptions, ResolveScope,
    ResolvedCustomFeature, ResolvedUrl, ScanResult, ScanScope, ScannedCustomFeature,
    ScannedFeature, ScannedImport, ScannedInlineDocument, Scanner, Severity, SourceRange,
    UnresolvedUrl, UrlResolver, Warning,
};
use std::any::Any;
use std::sync::Arc;

/// File kind (and extension) handled by the fixture parser
pub const DOC: &str = "doc";

pub const NAME_KIND: &str = "name";
pub const REFERENCE_KIND: &str = "reference";
pub const FIXTURE_WARNING: &str = "fixture-warning";

#[derive(Debug)]
pub struct Line {
    pub number: u32,
    pub text: String,
}

#[derive(Debug)]
pub struct InlineBlock {
    pub kind: String,
    /// Line of the opening tag
    pub start: u32,
    /// Line of the closing tag
    pub end: u32,
    pub contents: String,
}

#[derive(Debug)]
pub enum Node {
    Line(Line),
    Inline(InlineBlock),
}

#[derive(Debug, Default)]
pub struct FixtureAst {
    pub nodes: Vec<Node>,
}

pub struct FixtureParser;

impl docgraph_core::Parser for FixtureParser {
    fn parse(
        &self,
        contents: &str,
        url: &ResolvedUrl,
        _resolver: &dyn UrlResolver,
        inline: Option<InlineDocInfo>,
    ) -> anyhow::Result<ParsedDocument> {
        let offset = inline
            .as_ref()
            .map(|info| info.location_offset)
            .unwrap_or_default();
        let ast = parse_nodes(contents, url, offset)?;

        let parsed = ParsedDocument::new(url.clone(), DOC, contents, ast);
        Ok(match inline {
            Some(info) => parsed.with_inline(info),
            None => parsed,
        })
    }
}

fn parse_nodes(contents: &str, url: &ResolvedUrl, offset: Position) -> anyhow::Result<FixtureAst> {
    let mut ast = FixtureAst::default();
    let mut open: Option<(String, u32, Vec<&str>)> = None;

    for (number, text) in contents.lines().enumerate() {
        let number = number as u32;
        let trimmed = text.trim();

        if trimmed == "!!parse-error" {
            let at = Position::new(number, 0).offset_by(offset);
            return Err(Warning::error(
                codes::COULD_NOT_PARSE,
                format!("fixture parse error on line {}", at.line + 1),
                SourceRange::new(url.clone(), at, at),
            )
            .into());
        }

        if let Some((kind, start, mut body)) = open.take() {
            if trimmed == "</inline>" {
                ast.nodes.push(Node::Inline(InlineBlock {
                    kind,
                    start,
                    end: number,
                    contents: body.join("\n"),
                }));
            } else {
                body.push(text);
                open = Some((kind, start, body));
            }
            continue;
        }

        if let Some(kind) = trimmed
            .strip_prefix("<inline ")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            open = Some((kind.trim().to_string(), number, Vec::new()));
            continue;
        }

        ast.nodes.push(Node::Line(Line {
            number,
            text: text.to_string(),
        }));
    }

    match open {
        Some((_, start, _)) => Err(anyhow!("unterminated inline block opened on line {}", start + 1)),
        None => Ok(ast),
    }
}

pub struct FixtureScanner;

#[async_trait]
impl Scanner for FixtureScanner {
    async fn scan(&self, document: &ParsedDocument, scope: &ScanScope<'_>) -> anyhow::Result<ScanResult> {
        let ast = document
            .ast::<FixtureAst>()
            .ok_or_else(|| anyhow!("{} is not a fixture document", document.url))?;
        let mut result = ScanResult::default();

        for node in &ast.nodes {
            match node {
                Node::Line(line) => scan_line(document, scope, line, &mut result)?,
                Node::Inline(block) => {
                    let range = document.range_of(
                        Position::new(block.start, 0),
                        Position::new(block.end, "</inline>".len() as u32),
                    );
                    let location_offset =
                        Position::new(block.start + 1, 0).offset_by(document.location_offset());
                    result
                        .features
                        .push(ScannedFeature::InlineDocument(ScannedInlineDocument::new(
                            block.kind.clone(),
                            block.contents.clone(),
                            location_offset,
                            range,
                        )));
                }
            }
        }
        Ok(result)
    }
}

fn scan_line(
    document: &ParsedDocument,
    scope: &ScanScope<'_>,
    line: &Line,
    result: &mut ScanResult,
) -> anyhow::Result<()> {
    let trimmed = line.text.trim();
    let (keyword, rest) = trimmed.split_once(' ').unwrap_or((trimmed, ""));
    let rest = rest.trim();
    let range = document.range_of(
        Position::new(line.number, 0),
        Position::new(line.number, line.text.len() as u32),
    );

    match keyword {
        "import" | "lazy" => {
            let original = UnresolvedUrl::new(rest);
            let url = scope.resolve(document, &original);
            let import = ScannedImport::new(keyword, url, original, range.clone(), range)
                .lazy(keyword == "lazy");
            result.features.push(ScannedFeature::import(import));
        }
        "feature" => result.features.push(ScannedFeature::custom(ScannedName {
            name: rest.to_string(),
            range,
        })),
        "uses" => {
            let (path, name) = rest.split_once('#').unwrap_or((rest, ""));
            result.features.push(ScannedFeature::custom(ScannedReference {
                target: scope.resolve(document, &UnresolvedUrl::new(path)),
                name: name.to_string(),
                range,
            }));
        }
        "warn" => result
            .warnings
            .push(Warning::new(FIXTURE_WARNING, rest, Severity::Warning, range)),
        "error" => return Err(anyhow!("scanner gave up on line {}", line.number + 1)),
        "panic" => panic!("scanner exploded on line {}", line.number + 1),
        _ => {}
    }
    Ok(())
}

#[derive(Debug)]
pub struct ScannedName {
    pub name: String,
    pub range: SourceRange,
}

impl ScannedCustomFeature for ScannedName {
    fn kind(&self) -> &str {
        NAME_KIND
    }

    fn source_range(&self) -> &SourceRange {
        &self.range
    }

    fn resolve(&self, _scope: &mut ResolveScope<'_>) -> Option<Arc<dyn ResolvedCustomFeature>> {
        Some(Arc::new(Name {
            name: self.name.clone(),
            range: self.range.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct Name {
    pub name: String,
    pub range: SourceRange,
}

impl ResolvedCustomFeature for Name {
    fn kind(&self) -> &str {
        NAME_KIND
    }

    fn source_range(&self) -> &SourceRange {
        &self.range
    }

    fn identifiers(&self) -> Vec<String> {
        vec![self.name.clone()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct ScannedReference {
    pub target: Option<ResolvedUrl>,
    pub name: String,
    pub range: SourceRange,
}

impl ScannedCustomFeature for ScannedReference {
    fn kind(&self) -> &str {
        REFERENCE_KIND
    }

    fn source_range(&self) -> &SourceRange {
        &self.range
    }

    fn resolve(&self, scope: &mut ResolveScope<'_>) -> Option<Arc<dyn ResolvedCustomFeature>> {
        let declaration = self
            .target
            .as_ref()
            .and_then(|url| scope.document(url))
            .and_then(|doc| {
                doc.get_custom_features(NAME_KIND, &QueryOptions::imported())
                    .into_iter()
                    .find(|feature| feature.identifiers().contains(&self.name))
            });

        match declaration {
            Some(declaration) => Some(Arc::new(Reference {
                name: self.name.clone(),
                range: self.range.clone(),
                declared_in: declaration.source_range().file.clone(),
            })),
            None => {
                scope.warn(Warning::error(
                    codes::COULD_NOT_RESOLVE_REFERENCE,
                    format!("Could not resolve reference to '{}'", self.name),
                    self.range.clone(),
                ));
                None
            }
        }
    }
}

#[derive(Debug)]
pub struct Reference {
    pub name: String,
    pub range: SourceRange,
    pub declared_in: ResolvedUrl,
}

impl ResolvedCustomFeature for Reference {
    fn kind(&self) -> &str {
        REFERENCE_KIND
    }

    fn source_range(&self) -> &SourceRange {
        &self.range
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Names declared under `options`, in walk order
pub fn declared_names(document: &Arc<Document>, options: &QueryOptions) -> Vec<String> {
    document
        .get_custom_features(NAME_KIND, options)
        .iter()
        .flat_map(|feature| feature.identifiers())
        .collect()
}

/// Codes of a warning list, for compact assertions
pub fn warning_codes(warnings: &[Warning]) -> Vec<String> {
    warnings.iter().map(|warning| warning.code.clone()).collect()
}
