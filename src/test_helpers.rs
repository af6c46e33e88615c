//! Shared test utilities for the quire test suite.
//!
//! Provides a fixture copy, a [`DocBuilder`] for documents that skip the
//! parse/validate stages, and lookup helpers over pipeline results.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let doc = DocBuilder::new("posts/ddd.md")
//!     .title("Domain-Driven Design")
//!     .date("2024-09-30")
//!     .tags(&["ddd", "architecture"])
//!     .build();
//! assert_eq!(doc.id.as_str(), "posts/ddd");
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::index::Collection;
use crate::naming;
use crate::pipeline::{BuildReport, Exclusion};
use crate::types::Document;
use crate::validate::parse_timestamp;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/content/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/content");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Document builder
// =========================================================================

/// Builds a validated [`Document`] directly, for tests of later stages.
pub struct DocBuilder {
    doc: Document,
}

impl DocBuilder {
    pub fn new(source_path: &str) -> Self {
        Self {
            doc: Document {
                id: naming::document_id(Path::new(source_path)),
                source_path: source_path.to_string(),
                title: "Untitled".to_string(),
                published_at: parse_timestamp("2024-01-01").unwrap(),
                draft: false,
                tags: Default::default(),
                description: None,
                extra: Default::default(),
                body: String::new(),
                body_line: 1,
                diagrams: Vec::new(),
                has_issues: false,
                fingerprint: String::new(),
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.doc.title = title.to_string();
        self
    }

    /// Any format [`parse_timestamp`] accepts. Panics if it doesn't parse.
    pub fn date(mut self, date: &str) -> Self {
        self.doc.published_at =
            parse_timestamp(date).unwrap_or_else(|| panic!("bad test date '{date}'"));
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.doc.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.doc.body = body.to_string();
        self
    }

    pub fn draft(mut self, draft: bool) -> Self {
        self.doc.draft = draft;
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.doc.description = Some(description.to_string());
        self
    }

    pub fn build(self) -> Document {
        self.doc
    }
}

// =========================================================================
// Lookups: panic with a clear message on miss
// =========================================================================

/// All document ids in collection order.
pub fn document_ids(collection: &Collection) -> Vec<&str> {
    collection.all().iter().map(|d| d.id.as_str()).collect()
}

/// Find a document by id. Panics if not found.
pub fn find_document<'a>(collection: &'a Collection, id: &str) -> &'a Document {
    collection.by_id(id).unwrap_or_else(|_| {
        let ids = document_ids(collection);
        panic!("document '{id}' not found. Available: {ids:?}")
    })
}

/// Find an exclusion by source path. Panics if not found.
pub fn find_exclusion<'a>(report: &'a BuildReport, source_path: &str) -> &'a Exclusion {
    report
        .excluded
        .iter()
        .find(|e| e.source_path == source_path)
        .unwrap_or_else(|| {
            let paths: Vec<&str> = report.excluded.iter().map(|e| e.source_path.as_str()).collect();
            panic!("exclusion '{source_path}' not found. Available: {paths:?}")
        })
}
