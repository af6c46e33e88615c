//! CLI output formatting for all pipeline stages.
//!
//! # Information-First Display
//!
//! Output is **document-centric, not file-centric**. The primary display for
//! every article is its title and positional index; source paths, ids and
//! problems are secondary context on indented lines. The output reads as a
//! content inventory while still letting users trace each entry back to a
//! file.
//!
//! # Output Format
//!
//! ## Check / build report
//!
//! ```text
//! Included
//! 001 Domain-Driven Design in Practice
//!     Source: posts/domain-driven-design.md
//! 002 Error Handling Without Exceptions
//!     Source: posts/error-handling.md
//!     Issues: 1
//!
//! Excluded
//! 001 notes/broken.md
//!     Reason: malformed front matter: opening `---` delimiter is never closed
//!
//! Warnings
//!     posts/error-handling.md:13: diagram file not found: ../diagrams/error-flow.mmd
//!
//! 2 documents included, 1 excluded, 1 warning
//! ```
//!
//! ## List
//!
//! ```text
//! 001 2024-11-01 Error Handling Without Exceptions
//!     Id: posts/error-handling
//!     Tags: errors, rust
//! ```
//!
//! ## Render
//!
//! ```text
//! index.html
//! posts/error-handling/index.html
//! tags/index.html
//!
//! Generated 3 pages, copied 2 assets
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::pipeline::{BuildReport, PipelineEvent};
use crate::render::RenderSummary;
use crate::types::Document;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// `1 warning`, `2 warnings`.
fn plural(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {plural}")
    }
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        None => text.to_string(),
        Some((end, _)) => format!("{}...", &text[..end]),
    }
}

// ============================================================================
// Pipeline progress
// ============================================================================

/// Format a single pipeline progress event as display lines.
pub fn format_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::Started { units } => {
            vec![format!("Found {}", plural(*units, "source file", "source files"))]
        }
        PipelineEvent::Included {
            title,
            source_path,
            issues,
        } => {
            let mut lines = vec![
                format!("    {title}"),
                format!("        Source: {source_path}"),
            ];
            if *issues > 0 {
                lines.push(format!("        Issues: {issues}"));
            }
            lines
        }
        PipelineEvent::Excluded {
            source_path,
            reason,
        } => vec![
            format!("    ({source_path})"),
            format!("        Excluded: {reason}"),
        ],
    }
}

// ============================================================================
// Build report
// ============================================================================

/// Format the end-of-run report: inclusions, exclusions, warnings, summary.
pub fn format_report(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.included.is_empty() {
        lines.push("Included".to_string());
        for (i, inc) in report.included.iter().enumerate() {
            let draft = if report.drafts.contains(&inc.id) {
                " (draft)"
            } else {
                ""
            };
            lines.push(format!("{} {}{}", format_index(i + 1), inc.title, draft));
            lines.push(format!("    Source: {}", inc.source_path));
            let issues = report
                .warnings
                .iter()
                .filter(|w| w.document == inc.id)
                .count();
            if issues > 0 {
                lines.push(format!("    Issues: {issues}"));
            }
        }
    }

    if !report.excluded.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Excluded".to_string());
        for (i, exc) in report.excluded.iter().enumerate() {
            lines.push(format!("{} {}", format_index(i + 1), exc.source_path));
            lines.push(format!("    Reason: {}", exc.reason));
        }
    }

    if !report.warnings.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Warnings".to_string());
        for warning in &report.warnings {
            lines.push(format!("    {warning}"));
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "{} included, {} excluded, {}",
        plural(report.included.len(), "document", "documents"),
        report.excluded.len(),
        plural(report.warnings.len(), "warning", "warnings"),
    ));
    lines
}

pub fn print_report(report: &BuildReport) {
    for line in format_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Collection listing
// ============================================================================

/// Format documents as a dated, indexed list.
pub fn format_document_list<'a>(docs: impl IntoIterator<Item = &'a Document>) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, doc) in docs.into_iter().enumerate() {
        lines.push(format!(
            "{} {} {}",
            format_index(i + 1),
            doc.published_at.format("%Y-%m-%d"),
            doc.title
        ));
        lines.push(format!("    Id: {}", doc.id));
        if !doc.tags.is_empty() {
            let tags: Vec<&str> = doc.tags.iter().map(String::as_str).collect();
            lines.push(format!("    Tags: {}", tags.join(", ")));
        }
        if let Some(description) = &doc.description {
            lines.push(format!("    {}", truncate_desc(description, 60)));
        }
    }
    if lines.is_empty() {
        lines.push("No documents".to_string());
    }
    lines
}

pub fn print_document_list<'a>(docs: impl IntoIterator<Item = &'a Document>) {
    for line in format_document_list(docs) {
        println!("{}", line);
    }
}

// ============================================================================
// Render output
// ============================================================================

/// Format the files a renderer wrote.
pub fn format_render_summary(summary: &RenderSummary) -> Vec<String> {
    let mut lines: Vec<String> = summary.pages.clone();
    lines.push(String::new());
    let pages = plural(summary.pages.len(), "page", "pages");
    if summary.assets.is_empty() {
        lines.push(format!("Generated {pages}"));
    } else {
        lines.push(format!(
            "Generated {pages}, copied {}",
            plural(summary.assets.len(), "asset", "assets")
        ));
    }
    lines
}

pub fn print_render_summary(summary: &RenderSummary) {
    for line in format_render_summary(summary) {
        println!("{}", line);
    }
}
