//! Content directory scanning.
//!
//! Stage 1 of the quire pipeline. Walks the content root and splits what it
//! finds into two inputs for the later stages:
//!
//! - **Source units**: every file with a content extension (`.md`,
//!   `.markdown` by default), read into memory with its relative path.
//! - **Asset set**: every file under the root, as `/`-separated relative
//!   paths. The resolver checks diagram embeds and relative links against it.
//!
//! ## Directory Structure
//!
//! ```text
//! content/
//! ├── config.toml                          # Pipeline config (not an asset)
//! ├── posts/
//! │   ├── domain-driven-design.md          # Document posts/domain-driven-design
//! │   ├── clean-architecture/
//! │   │   ├── index.md                     # Document posts/clean-architecture
//! │   │   └── layers.mmd                   # Diagram asset
//! │   └── error-handling.md
//! ├── diagrams/
//! │   └── bounded-contexts.mmd
//! └── .drafts/                             # Hidden = skipped
//! ```
//!
//! Entries are visited in file-name order so the unit list, and everything
//! derived from it, is identical between runs on unchanged input.

use crate::config::{CONFIG_FILENAME, PipelineConfig};
use crate::naming;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Content root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// One raw content file: front matter plus body, not yet parsed.
///
/// Bytes are kept undecoded; a file that is not UTF-8 fails in the parser
/// and is excluded on its own.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// Content-root-relative path, `/`-separated.
    pub rel_path: String,
    pub bytes: Vec<u8>,
}

impl SourceUnit {
    pub fn new(rel_path: impl Into<String>, text: impl Into<String>) -> Self {
        Self::from_bytes(rel_path, text.into().into_bytes())
    }

    pub fn from_bytes(rel_path: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            rel_path: rel_path.into(),
            bytes,
        }
    }

    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }
}

/// Known asset paths under the content root.
#[derive(Debug, Clone, Default)]
pub struct AssetSet {
    paths: BTreeSet<String>,
}

impl AssetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rel_path: impl Into<String>) {
        self.paths.insert(rel_path.into());
    }

    pub fn contains(&self, rel_path: &str) -> bool {
        self.paths.contains(rel_path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for AssetSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Everything the scan stage found under a content root.
#[derive(Debug, Default)]
pub struct Sources {
    pub units: Vec<SourceUnit>,
    pub assets: AssetSet,
}

/// Walk `root`, reading content files and recording every asset path.
pub fn scan(root: &Path, config: &PipelineConfig) -> Result<Sources, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let mut sources = Sources::default();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped(e, config));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        // Only the root config file is pipeline configuration; a nested
        // config.toml is ordinary content.
        if entry.depth() == 1 && entry.file_name() == CONFIG_FILENAME {
            continue;
        }

        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let rel_path = naming::to_slash(rel);

        if is_content_file(entry.path(), config) {
            let bytes = fs::read(entry.path())?;
            sources.units.push(SourceUnit::from_bytes(rel_path.clone(), bytes));
        }
        sources.assets.insert(rel_path);
    }

    Ok(sources)
}

/// Hidden entries and configured ignore names are pruned with their subtrees.
fn is_skipped(entry: &DirEntry, config: &PipelineConfig) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || config.content.ignore.iter().any(|i| i.as_str() == name.as_ref())
}

fn is_content_file(path: &Path, config: &PipelineConfig) -> bool {
    path.extension()
        .map(|e| config.content.is_content_extension(&e.to_string_lossy()))
        .unwrap_or(false)
}
