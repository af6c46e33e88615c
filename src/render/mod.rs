//! Output stage: turn a sealed [`Collection`] into files.
//!
//! Rendering is pluggable through the [`Renderer`] trait. Two renderers ship
//! with quire:
//!
//! | Renderer | Output |
//! |---|---|
//! | [`ManifestRenderer`] | `collection.json` for an external site generator |
//! | [`HtmlRenderer`] | a small static site: article pages, index, tag pages |
//!
//! Renderers only read the collection; they never change which documents
//! are published.

mod html;
mod manifest;

pub use html::HtmlRenderer;
pub use manifest::{MANIFEST_FILENAME, ManifestRenderer};

use crate::index::Collection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Output {path} would be written by both {first} and {second}")]
    OutputCollision {
        path: String,
        first: String,
        second: String,
    },
}

/// What a renderer wrote, as output-relative `/`-separated paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// Generated files, in the order they were written.
    pub pages: Vec<String>,
    /// Content assets copied through unchanged.
    pub assets: Vec<String>,
}

pub trait Renderer {
    /// Short name shown in CLI output.
    fn name(&self) -> &'static str;

    /// Write the collection below `out_dir`, creating it if needed.
    fn render(&self, collection: &Collection, out_dir: &Path) -> Result<RenderSummary, RenderError>;
}
