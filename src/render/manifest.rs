//! JSON manifest output.
//!
//! ```json
//! {
//!   "site": { "title": "Articles", "base_url": "/" },
//!   "documents": [ { "id": "posts/ddd", "title": "...", ... } ],
//!   "tags": { "ddd": ["posts/ddd"], "rust": ["posts/errors", "posts/ddd"] }
//! }
//! ```
//!
//! `documents` is in collection order (newest first) and each tag lists its
//! document ids in the same order. Nothing run-specific (timestamps, absolute
//! paths) is written, so unchanged input gives a byte-identical file.

use super::{RenderError, RenderSummary, Renderer};
use crate::config::SiteConfig;
use crate::index::Collection;
use crate::types::{Document, DocumentId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const MANIFEST_FILENAME: &str = "collection.json";

#[derive(Serialize)]
struct Manifest<'a> {
    site: &'a SiteConfig,
    documents: &'a [Document],
    tags: BTreeMap<&'a str, Vec<&'a DocumentId>>,
}

pub struct ManifestRenderer {
    site: SiteConfig,
}

impl ManifestRenderer {
    pub fn new(site: SiteConfig) -> Self {
        Self { site }
    }
}

impl Renderer for ManifestRenderer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn render(&self, collection: &Collection, out_dir: &Path) -> Result<RenderSummary, RenderError> {
        let tags = collection
            .tags()
            .map(|(tag, _)| (tag, collection.by_tag(tag).map(|d| &d.id).collect()))
            .collect();
        let manifest = Manifest {
            site: &self.site,
            documents: collection.all(),
            tags,
        };

        fs::create_dir_all(out_dir)?;
        let json = serde_json::to_string_pretty(&manifest)?;
        fs::write(out_dir.join(MANIFEST_FILENAME), json)?;

        Ok(RenderSummary {
            pages: vec![MANIFEST_FILENAME.to_string()],
            assets: Vec::new(),
        })
    }
}
