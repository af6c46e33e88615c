//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! overridden by a sparse user file in the content root:
//!
//! ```text
//! content/
//! ├── config.toml              # Overrides stock defaults (optional)
//! ├── posts/
//! │   └── ...
//! └── diagrams/
//!     └── ...
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! title = "Articles"
//! base_url = "/"
//!
//! [content]
//! extensions = ["md", "markdown"]   # Files that become documents
//! ignore = []                       # File or directory names to skip
//!
//! [front_matter]
//! default_draft = false             # Used when `draft` is absent
//! default_tags = []                 # Used when `tags` is absent
//! required = []                     # Extra keys every document must set
//!
//! [diagrams]
//! languages = ["mermaid"]           # Fenced code block languages
//! extensions = ["mmd", "mermaid"]   # Diagram definition file extensions
//!
//! [publish]
//! include_drafts = false
//!
//! [processing]
//! max_processes = 4                 # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! The loaded [`PipelineConfig`] is passed explicitly into the parser,
//! validator and resolver. Nothing reads configuration from global state.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the configuration file looked up in the content root.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Site identity, used by renderers.
    pub site: SiteConfig,
    /// Which files are documents and which are skipped.
    pub content: ContentConfig,
    /// Defaults and extra requirements for front matter.
    pub front_matter: FrontMatterConfig,
    /// How diagrams are recognized in bodies.
    pub diagrams: DiagramConfig,
    /// What makes it into the published collection.
    pub publish: PublishConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "content.extensions must not be empty".into(),
            ));
        }
        let all_extensions = self
            .content
            .extensions
            .iter()
            .chain(&self.diagrams.extensions);
        for ext in all_extensions {
            if ext.is_empty() || ext.starts_with('.') {
                return Err(ConfigError::Validation(format!(
                    "extension {ext:?} must be non-empty and given without a leading dot"
                )));
            }
        }
        if let Some(ext) = self
            .diagrams
            .extensions
            .iter()
            .find(|e| self.content.is_content_extension(e))
        {
            return Err(ConfigError::Validation(format!(
                "extension {ext:?} cannot be both a content and a diagram extension"
            )));
        }
        if !self.site.base_url.ends_with('/') {
            return Err(ConfigError::Validation(
                "site.base_url must end with '/'".into(),
            ));
        }
        if self.front_matter.required.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "front_matter.required entries must not be empty".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub title: String,
    /// Prefix for generated links. Must end with `/`.
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Articles".to_string(),
            base_url: "/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentConfig {
    /// Extensions (without dot) of files that become documents.
    pub extensions: Vec<String>,
    /// File or directory names skipped entirely during scanning.
    pub ignore: Vec<String>,
}

impl ContentConfig {
    pub fn is_content_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["md".to_string(), "markdown".to_string()],
            ignore: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrontMatterConfig {
    /// Value of `draft` for documents that don't set it.
    pub default_draft: bool,
    /// Tags for documents that don't set `tags` at all.
    pub default_tags: Vec<String>,
    /// Additional keys that must be present in every document.
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiagramConfig {
    /// Fenced code block info strings treated as inline diagrams.
    pub languages: Vec<String>,
    /// Extensions of diagram definition files embedded by path.
    pub extensions: Vec<String>,
}

impl DiagramConfig {
    pub fn is_diagram_language(&self, lang: &str) -> bool {
        self.languages.iter().any(|l| l.eq_ignore_ascii_case(lang))
    }

    pub fn is_diagram_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            languages: vec!["mermaid".to_string()],
            extensions: vec!["mmd".to_string(), "mermaid".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    /// Keep `draft = true` documents in the collection instead of excluding them.
    pub include_drafts: bool,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel parse/validate workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given content root.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# quire configuration
# ===================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file in the content root. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Site identity (used by renderers)
# ---------------------------------------------------------------------------
[site]
# Title shown on the generated index page.
title = "Articles"
# Prefix for every generated link. Must end with "/".
base_url = "/"

# ---------------------------------------------------------------------------
# Content discovery
# ---------------------------------------------------------------------------
[content]
# Files with these extensions become documents. Every other file is an asset.
extensions = ["md", "markdown"]
# File or directory names skipped entirely (hidden entries are always skipped).
ignore = []

# ---------------------------------------------------------------------------
# Front matter
# ---------------------------------------------------------------------------
# Every document needs `title` and a date (`date`, `published_at`,
# `publishedAt` or `pubDate`). Front matter goes between `---` fences (YAML)
# or `+++` fences (TOML).
[front_matter]
# Value of `draft` when a document doesn't set it.
default_draft = false
# Tags applied when a document has no `tags` key at all.
default_tags = []
# Extra keys that must be present, e.g. ["description"].
required = []

# ---------------------------------------------------------------------------
# Diagrams
# ---------------------------------------------------------------------------
[diagrams]
# Fenced code blocks with these languages are inline diagrams.
languages = ["mermaid"]
# Images or links to files with these extensions are diagram file references
# and must exist in the content directory.
extensions = ["mmd", "mermaid"]

# ---------------------------------------------------------------------------
# Publishing
# ---------------------------------------------------------------------------
[publish]
# Include documents marked `draft: true`. When false they are reported as
# excluded drafts.
include_drafts = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for parsing and validation.
# Omit to use all CPU cores. Values above the core count are clamped.
# max_processes = 4
"##
}
