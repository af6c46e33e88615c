//! Static HTML output.
//!
//! ## Output Structure
//!
//! ```text
//! dist/
//! ├── index.html                         # All articles, newest first
//! ├── posts/
//! │   ├── domain-driven-design/
//! │   │   └── index.html                 # Article page
//! │   └── clean-architecture/
//! │       ├── index.html
//! │       └── layers.mmd                 # Copied asset
//! ├── tags/
//! │   ├── index.html                     # Every tag with its article count
//! │   └── architecture/
//! │       └── index.html                 # Articles tagged "architecture"
//! └── diagrams/
//!     └── bounded-contexts.mmd
//! ```
//!
//! ## Markdown
//!
//! Bodies are rendered with `pulldown-cmark`, with three rewrites:
//!
//! - Fenced blocks in a diagram language become `<pre class="mermaid">`.
//! - Image embeds of a diagram file are replaced by the file's source, also
//!   as `<pre class="mermaid">`, so the diagram renders in place.
//! - Local link and image targets are rewritten to absolute URLs under
//!   `site.base_url`, since an article moves one directory deeper than its
//!   source file. Links to other content files point at their article page.
//!
//! Pages with diagrams load Mermaid from a CDN.

use super::{RenderError, RenderSummary, Renderer};
use crate::config::{ContentConfig, DiagramConfig, PipelineConfig, SiteConfig};
use crate::index::Collection;
use crate::naming;
use crate::resolve;
use crate::scan::AssetSet;
use crate::types::Document;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html as md_html};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

const CSS: &str = include_str!("../../static/style.css");
const MERMAID_LOADER: &str = "import mermaid from 'https://cdn.jsdelivr.net/npm/mermaid@11/dist/mermaid.esm.min.mjs';\nmermaid.initialize({ startOnLoad: true });";

pub struct HtmlRenderer<'a> {
    site: &'a SiteConfig,
    content: &'a ContentConfig,
    diagrams: &'a DiagramConfig,
    content_root: &'a Path,
    assets: &'a AssetSet,
}

impl<'a> HtmlRenderer<'a> {
    pub fn new(config: &'a PipelineConfig, content_root: &'a Path, assets: &'a AssetSet) -> Self {
        Self {
            site: &config.site,
            content: &config.content,
            diagrams: &config.diagrams,
            content_root,
            assets,
        }
    }

    fn is_content_file(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .is_some_and(|e| self.content.is_content_extension(&e.to_string_lossy()))
    }

    fn is_diagram_file(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .is_some_and(|e| self.diagrams.is_diagram_extension(&e.to_string_lossy()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.site.base_url, path)
    }

    fn document_url(&self, doc: &Document) -> String {
        self.url(&format!("{}/", doc.id))
    }

    /// Assets copied through as-is: everything but content files.
    fn copied_assets(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().filter(|a| !self.is_content_file(a))
    }

    fn copy_assets(&self, out_dir: &Path) -> Result<Vec<String>, RenderError> {
        let mut copied = Vec::new();
        for asset in self.copied_assets() {
            let dst = out_dir.join(asset);
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(self.content_root.join(asset), &dst)?;
            copied.push(asset.to_string());
        }
        Ok(copied)
    }

    /// Claim every output path up front so two outputs never share a file.
    ///
    /// A document with id `tags`, or a root `index.html` asset, would
    /// otherwise be silently overwritten.
    fn check_output_paths(
        &self,
        collection: &Collection,
        slugs: &BTreeMap<&str, String>,
    ) -> Result<(), RenderError> {
        let mut claims = HashMap::new();
        claim(&mut claims, "index.html".into(), "the article index".into())?;
        for doc in collection.all() {
            claim(
                &mut claims,
                format!("{}/index.html", doc.id),
                format!("document {}", doc.source_path),
            )?;
        }
        claim(&mut claims, "tags/index.html".into(), "the tag list".into())?;
        for (tag, slug) in slugs {
            claim(
                &mut claims,
                format!("tags/{slug}/index.html"),
                format!("tag '{tag}'"),
            )?;
        }
        for asset in self.copied_assets() {
            claim(&mut claims, asset.to_string(), format!("asset {asset}"))?;
        }
        Ok(())
    }
}

fn claim(
    claims: &mut HashMap<String, String>,
    path: String,
    owner: String,
) -> Result<(), RenderError> {
    match claims.entry(path) {
        Entry::Occupied(taken) => Err(RenderError::OutputCollision {
            path: taken.key().clone(),
            first: taken.get().clone(),
            second: owner,
        }),
        Entry::Vacant(free) => {
            free.insert(owner);
            Ok(())
        }
    }
}

impl Renderer for HtmlRenderer<'_> {
    fn name(&self) -> &'static str {
        "html"
    }

    fn render(&self, collection: &Collection, out_dir: &Path) -> Result<RenderSummary, RenderError> {
        let slugs = tag_slugs(collection);
        self.check_output_paths(collection, &slugs)?;
        fs::create_dir_all(out_dir)?;
        let mut pages = Vec::new();

        let mut write_page = |rel: String, markup: Markup| -> Result<(), RenderError> {
            let path = out_dir.join(&rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, markup.into_string())?;
            pages.push(rel);
            Ok(())
        };

        write_page("index.html".into(), self.render_index(collection, &slugs))?;

        for doc in collection.all() {
            let body = self.render_body(doc)?;
            write_page(
                format!("{}/index.html", doc.id),
                self.render_document(doc, &body, &slugs),
            )?;
        }

        write_page("tags/index.html".into(), self.render_tag_list(collection, &slugs))?;
        for (tag, slug) in &slugs {
            write_page(
                format!("tags/{slug}/index.html"),
                self.render_tag_page(collection, tag, &slugs),
            )?;
        }

        let assets = self.copy_assets(out_dir)?;
        Ok(RenderSummary { pages, assets })
    }
}

/// Map each tag to a unique URL slug.
///
/// Tags differing only in case or punctuation would share a slug; later ones
/// (in tag order) get a numeric suffix.
fn tag_slugs(collection: &Collection) -> BTreeMap<&str, String> {
    let mut taken = std::collections::HashSet::new();
    let mut slugs = BTreeMap::new();
    for (tag, _) in collection.tags() {
        let base = match naming::slugify(tag) {
            s if s.is_empty() => "tag".to_string(),
            s => s,
        };
        let mut slug = base.clone();
        let mut n = 2;
        while !taken.insert(slug.clone()) {
            slug = format!("{base}-{n}");
            n += 1;
        }
        slugs.insert(tag, slug);
    }
    slugs
}

// ============================================================================
// Markdown
// ============================================================================

impl HtmlRenderer<'_> {
    /// Render a document body to HTML.
    fn render_body(&self, doc: &Document) -> Result<String, RenderError> {
        let mut events = Vec::new();
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS;
        let mut parser = Parser::new_ext(&doc.body, options);

        while let Some(event) = parser.next() {
            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))
                    if self
                        .diagrams
                        .is_diagram_language(info.split_whitespace().next().unwrap_or("")) =>
                {
                    let mut source = String::new();
                    for inner in parser.by_ref() {
                        match inner {
                            Event::Text(text) => source.push_str(&text),
                            Event::End(TagEnd::CodeBlock) => break,
                            _ => {}
                        }
                    }
                    events.push(diagram_block(&source));
                }
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => match self.local_target(doc, &dest_url) {
                    Some(path) if self.is_diagram_file(&path) && self.assets.contains(&path) => {
                        // Drop the alt text; the diagram replaces the whole image.
                        for inner in parser.by_ref() {
                            if matches!(inner, Event::End(TagEnd::Image)) {
                                break;
                            }
                        }
                        let source = fs::read_to_string(self.content_root.join(&path))?;
                        events.push(diagram_block(&source));
                    }
                    target => events.push(Event::Start(Tag::Image {
                        link_type,
                        dest_url: self.rewrite(target, dest_url),
                        title,
                        id,
                    })),
                },
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => {
                    let target = self.local_target(doc, &dest_url);
                    events.push(Event::Start(Tag::Link {
                        link_type,
                        dest_url: self.rewrite(target, dest_url),
                        title,
                        id,
                    }));
                }
                other => events.push(other),
            }
        }

        let mut out = String::with_capacity(doc.body.len() * 3 / 2);
        md_html::push_html(&mut out, events.into_iter());
        Ok(out)
    }

    /// Content-root-relative path of a local target, if it stays in the root.
    fn local_target(&self, doc: &Document, dest_url: &str) -> Option<String> {
        resolve::local_path(dest_url).and_then(|p| resolve::normalize(&doc.source_path, &p))
    }

    fn rewrite<'e>(&self, target: Option<String>, original: CowStr<'e>) -> CowStr<'e> {
        let Some(path) = target else {
            return original;
        };
        let fragment = original.find('#').map(|i| &original[i..]).unwrap_or("");
        let url = if self.is_content_file(&path) {
            format!("{}/{fragment}", self.url(naming::document_id(Path::new(&path)).as_str()))
        } else {
            format!("{}{fragment}", self.url(&path))
        };
        CowStr::from(url)
    }
}

fn diagram_block(source: &str) -> Event<'static> {
    let markup = html! { pre.mermaid { (source) } };
    Event::Html(CowStr::from(format!("{}\n", markup.into_string())))
}

// ============================================================================
// HTML Components
// ============================================================================

fn base_document(title: &str, site_title: &str, with_diagrams: bool, content: Markup) -> Markup {
    let full_title = if title == site_title {
        title.to_string()
    } else {
        format!("{title} · {site_title}")
    };
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (full_title) }
                style { (PreEscaped(CSS)) }
            }
            body {
                (content)
                @if with_diagrams {
                    script type="module" { (PreEscaped(MERMAID_LOADER)) }
                }
            }
        }
    }
}

impl HtmlRenderer<'_> {
    fn site_header(&self) -> Markup {
        html! {
            header.site-header {
                a.site-title href=(self.site.base_url) { (self.site.title) }
                nav.site-nav {
                    a href=(self.url("tags/")) { "Tags" }
                }
            }
        }
    }

    fn tag_links(&self, doc: &Document, slugs: &BTreeMap<&str, String>) -> Markup {
        html! {
            @if !doc.tags.is_empty() {
                ul.tags {
                    @for tag in &doc.tags {
                        @if let Some(slug) = slugs.get(tag.as_str()) {
                            li { a href=(self.url(&format!("tags/{slug}/"))) { (tag) } }
                        }
                    }
                }
            }
        }
    }

    fn article_list<'d>(
        &self,
        docs: impl Iterator<Item = &'d Document>,
        slugs: &BTreeMap<&str, String>,
    ) -> Markup {
        html! {
            ol.article-list {
                @for doc in docs {
                    li {
                        time datetime=(doc.published_at.to_rfc3339()) {
                            (doc.published_at.format("%Y-%m-%d"))
                        }
                        " "
                        a href=(self.document_url(doc)) { (doc.title) }
                        @if doc.draft {
                            " " span.badge { "draft" }
                        }
                        @if let Some(description) = &doc.description {
                            p.description { (description) }
                        }
                        (self.tag_links(doc, slugs))
                    }
                }
            }
        }
    }

    fn render_index(&self, collection: &Collection, slugs: &BTreeMap<&str, String>) -> Markup {
        let content = html! {
            (self.site_header())
            main.index-page {
                @if collection.is_empty() {
                    p.empty { "No articles yet." }
                } @else {
                    (self.article_list(collection.all().iter(), slugs))
                }
            }
        };
        base_document(&self.site.title, &self.site.title, false, content)
    }

    fn render_document(
        &self,
        doc: &Document,
        body_html: &str,
        slugs: &BTreeMap<&str, String>,
    ) -> Markup {
        let content = html! {
            (self.site_header())
            main.article-page {
                article {
                    header {
                        h1 { (doc.title) }
                        p.meta {
                            time datetime=(doc.published_at.to_rfc3339()) {
                                (doc.published_at.format("%B %-d, %Y"))
                            }
                        }
                        (self.tag_links(doc, slugs))
                    }
                    div.article-body {
                        (PreEscaped(body_html))
                    }
                }
            }
        };
        base_document(&doc.title, &self.site.title, !doc.diagrams.is_empty(), content)
    }

    fn render_tag_list(&self, collection: &Collection, slugs: &BTreeMap<&str, String>) -> Markup {
        let content = html! {
            (self.site_header())
            main.tags-page {
                h1 { "Tags" }
                ul.tag-list {
                    @for (tag, count) in collection.tags() {
                        @if let Some(slug) = slugs.get(tag) {
                            li {
                                a href=(self.url(&format!("tags/{slug}/"))) { (tag) }
                                " (" (count) ")"
                            }
                        }
                    }
                }
            }
        };
        base_document("Tags", &self.site.title, false, content)
    }

    fn render_tag_page(
        &self,
        collection: &Collection,
        tag: &str,
        slugs: &BTreeMap<&str, String>,
    ) -> Markup {
        let content = html! {
            (self.site_header())
            main.tag-page {
                h1 { "Tagged " q { (tag) } }
                (self.article_list(collection.by_tag(tag), slugs))
            }
        };
        base_document(tag, &self.site.title, false, content)
    }
}

// ============================================================================
// Tests
// ============================================================================
