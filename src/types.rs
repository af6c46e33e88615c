//! Shared types used across all pipeline stages.
//!
//! A [`Document`] is produced by the validator, annotated by the resolver and
//! owned by the [`Collection`](crate::index::Collection) once indexed. All of
//! these types serialize to the JSON manifest handed to external renderers, so
//! field names here are part of that format.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Stable identifier of a document, derived from its source path.
///
/// See [`naming::document_id`](crate::naming::document_id) for the derivation
/// rules. Ids compare and sort as plain strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DocumentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A decoded front-matter value, independent of the source format.
///
/// YAML and TOML front matter both decode into this shape so the validator
/// only has one representation to check. TOML datetimes are kept as their
/// string form and parsed like any other date string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Short type name used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::String(_) => "string",
            FieldValue::List(_) => "list",
            FieldValue::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// How a diagram is attached to a document body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramKind {
    /// Diagram source written in a fenced code block (```` ```mermaid ````).
    Inline,
    /// Diagram stored in a separate definition file and embedded by path.
    FileRef,
}

/// A diagram found in a document body.
///
/// For [`DiagramKind::Inline`], `source` is the diagram text itself. For
/// [`DiagramKind::FileRef`], it is the content-root-relative path of the
/// definition file the embed resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagramReference {
    pub kind: DiagramKind,
    pub source: String,
    /// 1-based line of the source file where the reference starts.
    pub line: usize,
}

/// One parsed, validated article.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: DocumentId,
    /// Content-root-relative source path, `/`-separated.
    pub source_path: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub draft: bool,
    pub tags: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Front-matter keys not consumed by the typed fields above.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, FieldValue>,
    /// Raw Markdown body (front matter stripped).
    pub body: String,
    /// 1-based line of the source file where the body starts.
    #[serde(skip)]
    pub body_line: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagrams: Vec<DiagramReference>,
    /// Set when the resolver reported at least one unresolved reference.
    pub has_issues: bool,
    /// SHA-256 of the raw source text, lowercase hex.
    pub fingerprint: String,
}

impl Document {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}
