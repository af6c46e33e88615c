//! Link and diagram resolution.
//!
//! Scans a document body for the references it makes and checks the local
//! ones against the known asset set:
//!
//! | Markdown | Reference |
//! |----------|-----------|
//! | ```` ```mermaid ```` fenced block | inline diagram (never unresolved) |
//! | `![flow](../diagrams/flow.mmd)` | diagram file reference |
//! | `[see also](./clean-architecture.md)`, `![](arch.png)` | internal link |
//! | `https://…`, `mailto:…`, `//cdn…`, `#anchor` | ignored |
//!
//! Diagram languages and file extensions come from
//! [`DiagramConfig`](crate::config::DiagramConfig).
//!
//! ## Path rules
//!
//! - Relative targets resolve against the document's directory.
//! - Targets starting with `/` resolve against the content root.
//! - Query strings and fragments are dropped; percent-escapes are decoded.
//! - A target that climbs above the content root is always an issue.
//! - A link resolves if it names an asset file, or the id of a document
//!   (`/posts/clean-architecture/` matches `posts/clean-architecture/index.md`).
//!   The content root (`/`) names the root `index.md`.
//!
//! The body is tokenized with `pulldown-cmark`, so references inside code
//! spans or indented code are not mistaken for links.
//!
//! ## Laziness
//!
//! [`Resolver::references`] and [`Resolver::issues`] are lazy iterators over
//! a fresh parse of the body. Calling them again restarts the scan; nothing is
//! cached between calls. A document with issues is flagged, never dropped.

use crate::config::PipelineConfig;
use crate::naming;
use crate::scan::AssetSet;
use crate::types::{DiagramKind, DiagramReference, Document, DocumentId};
use pulldown_cmark::{CodeBlockKind, Event, LinkType, OffsetIter, Parser, Tag, TagEnd};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// A reference found in a document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyReference {
    /// Fenced diagram block; `source` is the diagram text.
    InlineDiagram { source: String, line: usize },
    /// Image or link to a diagram definition file, target as written.
    DiagramFile { target: String, line: usize },
    /// Any other local link or image, target as written.
    Link { target: String, line: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingDiagram,
    MissingLink,
    OutsideContentRoot,
}

/// An unresolved reference. Reported as a warning; never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionIssue {
    pub document: DocumentId,
    pub source_path: String,
    pub kind: IssueKind,
    /// Target as written in the body.
    pub target: String,
    /// 1-based line of the source file.
    pub line: usize,
}

impl fmt::Display for ResolutionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            IssueKind::MissingDiagram => "diagram file not found",
            IssueKind::MissingLink => "link target not found",
            IssueKind::OutsideContentRoot => "target is outside the content root",
        };
        write!(
            f,
            "{}:{}: {}: {}",
            self.source_path, self.line, what, self.target
        )
    }
}

/// Checks body references against the assets known for one run.
pub struct Resolver<'a> {
    assets: &'a AssetSet,
    config: &'a PipelineConfig,
    /// Ids of every content file in the asset set, for links to pages.
    page_ids: HashSet<DocumentId>,
}

impl<'a> Resolver<'a> {
    pub fn new(assets: &'a AssetSet, config: &'a PipelineConfig) -> Self {
        let page_ids = assets
            .iter()
            .filter(|p| {
                Path::new(p)
                    .extension()
                    .is_some_and(|e| config.content.is_content_extension(&e.to_string_lossy()))
            })
            .map(|p| naming::document_id(Path::new(p)))
            .collect();
        Self {
            assets,
            config,
            page_ids,
        }
    }

    /// Lazily scan a document body for references.
    pub fn references<'d>(&'d self, doc: &'d Document) -> References<'d> {
        References {
            events: Parser::new(&doc.body).into_offset_iter(),
            line_starts: line_starts(&doc.body),
            body_line: doc.body_line.max(1),
            config: self.config,
        }
    }

    /// Lazily yield one issue per unresolved reference in `doc`.
    pub fn issues<'d>(&'d self, doc: &'d Document) -> impl Iterator<Item = ResolutionIssue> + 'd {
        self.references(doc)
            .filter_map(move |reference| self.check(doc, &reference))
    }

    /// Record the document's diagrams, flag it if anything is unresolved,
    /// and return the issues found.
    pub fn resolve(&self, mut doc: Document) -> (Document, Vec<ResolutionIssue>) {
        let mut diagrams = Vec::new();
        let mut issues = Vec::new();
        for reference in self.references(&doc) {
            match &reference {
                BodyReference::InlineDiagram { source, line } => diagrams.push(DiagramReference {
                    kind: DiagramKind::Inline,
                    source: source.clone(),
                    line: *line,
                }),
                BodyReference::DiagramFile { target, line } => {
                    let source = local_path(target)
                        .and_then(|p| normalize(&doc.source_path, &p))
                        .unwrap_or_else(|| target.clone());
                    diagrams.push(DiagramReference {
                        kind: DiagramKind::FileRef,
                        source,
                        line: *line,
                    });
                }
                BodyReference::Link { .. } => {}
            }
            issues.extend(self.check(&doc, &reference));
        }
        doc.diagrams = diagrams;
        doc.has_issues = !issues.is_empty();
        (doc, issues)
    }

    fn check(&self, doc: &Document, reference: &BodyReference) -> Option<ResolutionIssue> {
        let (target, line, missing) = match reference {
            BodyReference::InlineDiagram { .. } => return None,
            BodyReference::DiagramFile { target, line } => {
                (target, *line, IssueKind::MissingDiagram)
            }
            BodyReference::Link { target, line } => (target, *line, IssueKind::MissingLink),
        };

        let kind = match local_path(target).map(|p| normalize(&doc.source_path, &p)) {
            None => missing,
            Some(None) => IssueKind::OutsideContentRoot,
            Some(Some(path)) if self.exists(&path, missing) => return None,
            Some(Some(_)) => missing,
        };
        Some(ResolutionIssue {
            document: doc.id.clone(),
            source_path: doc.source_path.clone(),
            kind,
            target: target.clone(),
            line,
        })
    }

    fn exists(&self, path: &str, kind: IssueKind) -> bool {
        if self.assets.contains(path) {
            return true;
        }
        // Diagrams must name a file; links may also name a page by its id.
        kind == IssueKind::MissingLink && self.page_ids.contains(page_id(path))
    }
}

/// Iterator returned by [`Resolver::references`].
pub struct References<'d> {
    events: OffsetIter<'d>,
    line_starts: Vec<usize>,
    body_line: usize,
    config: &'d PipelineConfig,
}

impl References<'_> {
    fn line_at(&self, offset: usize) -> usize {
        let index = self.line_starts.partition_point(|&start| start <= offset);
        self.body_line + index.saturating_sub(1)
    }
}

impl Iterator for References<'_> {
    type Item = BodyReference;

    fn next(&mut self) -> Option<BodyReference> {
        while let Some((event, range)) = self.events.next() {
            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                    let lang = info.split_whitespace().next().unwrap_or("");
                    if !self.config.diagrams.is_diagram_language(lang) {
                        continue;
                    }
                    let line = self.line_at(range.start);
                    let mut source = String::new();
                    for (inner, _) in self.events.by_ref() {
                        match inner {
                            Event::Text(text) => source.push_str(&text),
                            Event::End(TagEnd::CodeBlock) => break,
                            _ => {}
                        }
                    }
                    return Some(BodyReference::InlineDiagram { source, line });
                }
                Event::Start(Tag::Link {
                    link_type: LinkType::Email,
                    ..
                }) => {}
                Event::Start(Tag::Image { dest_url, .. } | Tag::Link { dest_url, .. }) => {
                    if is_ignored(&dest_url) {
                        continue;
                    }
                    // An undecodable target is still a local link.
                    let path = local_path(&dest_url).unwrap_or_default();
                    let line = self.line_at(range.start);
                    let target = dest_url.to_string();
                    let is_diagram = Path::new(&path)
                        .extension()
                        .is_some_and(|e| self.config.diagrams.is_diagram_extension(&e.to_string_lossy()));
                    return Some(if is_diagram {
                        BodyReference::DiagramFile { target, line }
                    } else {
                        BodyReference::Link { target, line }
                    });
                }
                _ => {}
            }
        }
        None
    }
}

fn line_starts(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// The page id a normalized directory-style path names. The content root
/// itself (`/`, or `../` back up to it) is the root `index` page.
fn page_id(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "index",
        dir => dir,
    }
}

/// `true` for targets with a URL scheme (`https:`, `mailto:`) or `//host`.
fn is_external(target: &str) -> bool {
    if target.starts_with("//") {
        return true;
    }
    match target.find(':') {
        Some(colon) => {
            let scheme = &target[..colon];
            scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// External URLs, anchors and query-only targets are not checked.
fn is_ignored(target: &str) -> bool {
    target.is_empty() || target.starts_with(['#', '?']) || is_external(target)
}

/// The decoded path part of a local target, or `None` if it isn't one.
pub(crate) fn local_path(target: &str) -> Option<String> {
    if is_ignored(target) {
        return None;
    }
    let end = target.find(['?', '#']).unwrap_or(target.len());
    urlencoding::decode(&target[..end]).ok().map(|p| p.into_owned())
}

/// Resolve `target` against the directory of `source_path`, lexically.
///
/// Returns `None` when the path climbs above the content root.
pub(crate) fn normalize(source_path: &str, target: &str) -> Option<String> {
    let mut segments: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        let mut dir: Vec<&str> = source_path.split('/').collect();
        dir.pop();
        dir
    };
    let trailing_slash = target.ends_with('/');

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    let mut path = segments.join("/");
    if trailing_slash && !path.is_empty() {
        path.push('/');
    }
    Some(path)
}
