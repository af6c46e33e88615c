//! # Quire
//!
//! A static content-and-diagram pipeline for collections of Markdown
//! articles. Your filesystem is the data source: every Markdown file is an
//! article, its front matter is the metadata, and diagram files sit next to
//! the prose that embeds them.
//!
//! # Architecture: Ingest, Then Render
//!
//! ```text
//! 1. Scan      content/      →  source units + asset set
//! 2. Parse     source unit   →  front-matter fields + body     (per file, parallel)
//! 3. Validate  fields        →  typed Document                 (per file, parallel)
//! 4. Resolve   Document      →  diagrams + link issues         (per file, parallel)
//! 5. Index     Documents     →  sealed Collection              (sequential)
//! 6. Render    Collection    →  dist/                          (HTML or JSON)
//! ```
//!
//! Stages 2–4 look at one file at a time and share nothing, so they run on a
//! rayon pool. Stage 5 merges in source-path order so output is identical
//! between runs on unchanged input.
//!
//! A broken file never takes the run down with it: malformed or invalid
//! front matter excludes that one file, and an unresolved link only flags
//! its document. The single run-level failure is two files claiming the same
//! document id, in which case nothing is published.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Walks the content root into source units and the asset set |
//! | [`frontmatter`] | Splits front matter from body, decodes YAML or TOML |
//! | [`validate`] | Checks required fields and types, promotes to [`types::Document`] |
//! | [`resolve`] | Finds diagrams and checks local links against the asset set |
//! | [`index`] | Duplicate-id check, sealed [`index::Collection`] with id and tag lookup |
//! | [`pipeline`] | Runs the stages above and builds the [`pipeline::BuildReport`] |
//! | [`render`] | `Renderer` trait with HTML and JSON manifest output |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`naming`] | Document ids and URL slugs derived from paths and titles |
//! | [`types`] | Shared types serialized into the manifest |
//! | [`output`] | CLI output formatting for reports, listings and render results |
//!
//! # Design Decisions
//!
//! ## Ids From Paths
//!
//! A document's id is its root-relative path without the extension, with
//! `index.md` collapsing to its directory. Ids are stable as long as files
//! don't move, need no front-matter bookkeeping, and map directly onto output
//! URLs (`posts/ddd.md` → `posts/ddd/index.html`).
//!
//! ## Report, Don't Abort
//!
//! Every per-file problem is collected into one report, with every violation
//! in a file listed together, so a single `quire check` shows everything that
//! needs fixing.
//!
//! ## Maud for HTML
//!
//! HTML output uses [Maud](https://maud.lambda.xyz/) compile-time templates:
//! malformed markup is a build error and all interpolation is auto-escaped.

pub mod config;
pub mod frontmatter;
pub mod index;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod resolve;
pub mod scan;
pub mod types;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_helpers;
