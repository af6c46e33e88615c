//! Centralized derivation of document ids and URL slugs.
//!
//! ## Document ids
//!
//! A document's id is its content-root-relative path with the extension
//! removed, always `/`-separated regardless of platform:
//!
//! - `posts/clean-architecture.md` → `posts/clean-architecture`
//! - `posts/ddd/index.md` → `posts/ddd` (page bundle)
//! - `_index.md` → `index`
//!
//! The bundle rule means `posts/ddd.md` and `posts/ddd/index.md` map to the
//! same id. The indexer rejects that as a duplicate rather than guessing which
//! file is meant.
//!
//! ## Slugs
//!
//! Tags end up in URLs (`tags/<slug>/`), so [`slugify`] lowercases them and
//! replaces anything that is not ASCII alphanumeric with dashes:
//! - `Domain-Driven Design` → `domain-driven-design`
//! - `C#` → `c`

use crate::types::DocumentId;
use std::path::{Component, Path};

/// Stems that name a directory bundle rather than a page of their own.
const BUNDLE_STEMS: &[&str] = &["index", "_index"];

/// Render a relative path with `/` separators.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Derive a document id from a content-root-relative source path.
pub fn document_id(rel_path: &Path) -> DocumentId {
    let stem = rel_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = rel_path.parent().map(to_slash).unwrap_or_default();

    if BUNDLE_STEMS.contains(&stem.as_str()) {
        if parent.is_empty() {
            return DocumentId::new("index");
        }
        return DocumentId::new(parent);
    }

    if parent.is_empty() {
        DocumentId::new(stem)
    } else {
        DocumentId::new(format!("{parent}/{stem}"))
    }
}

const MAX_SLUG_LEN: usize = 80;

/// Turn a display string into a lowercase URL slug.
///
/// - Replaces non-alphanumeric characters with dashes
/// - Collapses consecutive dashes into one
/// - Strips leading and trailing dashes
/// - Truncates to `MAX_SLUG_LEN` characters (breaks at last dash before limit)
pub fn slugify(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len());
    let mut prev_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            collapsed.push(c.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash {
            collapsed.push('-');
            prev_dash = true;
        }
    }

    let trimmed = collapsed.trim_matches('-');

    if trimmed.len() <= MAX_SLUG_LEN {
        trimmed.to_string()
    } else {
        let truncated = &trimmed[..MAX_SLUG_LEN];
        match truncated.rfind('-') {
            Some(pos) => truncated[..pos].to_string(),
            None => truncated.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_strips_extension() {
        let id = document_id(Path::new("posts/clean-architecture.md"));
        assert_eq!(id.as_str(), "posts/clean-architecture");
    }

    #[test]
    fn id_at_root() {
        assert_eq!(document_id(Path::new("about.md")).as_str(), "about");
    }

    #[test]
    fn id_collapses_bundle_index() {
        assert_eq!(document_id(Path::new("posts/ddd/index.md")).as_str(), "posts/ddd");
        assert_eq!(document_id(Path::new("posts/_index.markdown")).as_str(), "posts");
    }

    #[test]
    fn id_root_index() {
        assert_eq!(document_id(Path::new("_index.md")).as_str(), "index");
        assert_eq!(document_id(Path::new("index.md")).as_str(), "index");
    }

    #[test]
    fn bundle_and_flat_file_collide() {
        assert_eq!(
            document_id(Path::new("posts/ddd.md")),
            document_id(Path::new("posts/ddd/index.md"))
        );
    }

    #[test]
    fn id_keeps_dots_inside_stem() {
        let id = document_id(Path::new("notes/v1.2-release.md"));
        assert_eq!(id.as_str(), "notes/v1.2-release");
    }

    #[test]
    fn to_slash_drops_current_dir() {
        assert_eq!(to_slash(Path::new("./a/b.md")), "a/b.md");
    }

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Domain-Driven Design"), "domain-driven-design");
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("  Error -- Handling!! "), "error-handling");
    }

    #[test]
    fn slugify_symbol_only_suffix() {
        assert_eq!(slugify("C#"), "c");
    }

    #[test]
    fn slugify_truncates_at_dash() {
        let long = "word ".repeat(30);
        let slug = slugify(&long);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
        assert!(slug.starts_with("word-word"));
    }
}
