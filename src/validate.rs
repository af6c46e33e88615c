//! Front-matter validation.
//!
//! Turns a [`ParsedDocument`] into a typed [`Document`], checking every field
//! and collecting **all** violations before failing, so one run surfaces
//! every problem in a document at once.
//!
//! ## Fields
//!
//! | Key | Rule |
//! |-----|------|
//! | `title` | required, non-empty string |
//! | `date` / `published_at` / `publishedAt` / `pubDate` | required, first present wins, must parse as a timestamp |
//! | `draft` | boolean (the parser fills in the configured default) |
//! | `tags` | list of non-empty strings; a single string is one tag |
//! | `description` | optional string |
//! | `front_matter.required` keys | must be present and non-null |
//!
//! A key set to null (`title:` with nothing after it) counts as absent.
//! Every other key is carried through untouched in [`Document::extra`].
//!
//! ## Timestamps
//!
//! Accepted formats, tried in order:
//!
//! ```text
//! 2024-10-28T09:30:00+02:00     RFC 3339
//! 2024-10-28 09:30:00 +0200     date, time, numeric offset
//! 2024-10-28 09:30:00           naive, taken as UTC
//! 2024-10-28T09:30:00           naive, taken as UTC
//! 2024-10-28 09:30              naive, taken as UTC
//! 2024-10-28                    midnight UTC
//! ```

use crate::config::FrontMatterConfig;
use crate::frontmatter::ParsedDocument;
use crate::types::{Document, FieldValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Keys accepted as the publication date, in priority order.
pub const DATE_KEYS: &[&str] = &["date", "published_at", "publishedAt", "pubDate"];

/// One violated field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

impl FieldViolation {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Every violation found in one document. Fatal for that document only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid front matter in {source_path}: {}", describe(.violations))]
pub struct ValidationError {
    pub source_path: String,
    pub violations: Vec<FieldViolation>,
}

fn describe(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} {}", v.field, v.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate a parsed document and promote it to a typed [`Document`].
pub fn validate(
    parsed: ParsedDocument,
    config: &FrontMatterConfig,
) -> Result<Document, ValidationError> {
    let ParsedDocument {
        id,
        source_path,
        mut fields,
        body,
        body_line,
        fingerprint,
        ..
    } = parsed;
    fields.retain(|_, v| *v != FieldValue::Null);

    let mut violations = Vec::new();

    let title = match fields.remove("title") {
        None => {
            violations.push(FieldViolation::new("title", "is required"));
            None
        }
        Some(FieldValue::String(s)) if s.trim().is_empty() => {
            violations.push(FieldViolation::new("title", "must not be empty"));
            None
        }
        Some(FieldValue::String(s)) => Some(s.trim().to_string()),
        Some(other) => {
            violations.push(type_violation("title", "a string", &other));
            None
        }
    };

    let published_at = validate_date(&mut fields, &mut violations);

    let draft = match fields.remove("draft") {
        None => false,
        Some(FieldValue::Bool(b)) => b,
        Some(other) => {
            violations.push(type_violation("draft", "a boolean", &other));
            false
        }
    };

    let tags = match fields.remove("tags") {
        None => BTreeSet::new(),
        Some(value) => validate_tags(value, &mut violations),
    };

    let description = match fields.remove("description") {
        None => None,
        Some(FieldValue::String(s)) => Some(s),
        Some(other) => {
            violations.push(type_violation("description", "a string", &other));
            None
        }
    };

    for key in &config.required {
        // Typed fields were already checked (and removed) above.
        let consumed = matches!(key.as_str(), "title" | "draft" | "tags" | "description")
            || DATE_KEYS.contains(&key.as_str());
        let present = match key.as_str() {
            "description" => description.is_some(),
            "tags" => !tags.is_empty(),
            _ => consumed || fields.contains_key(key),
        };
        if !present {
            violations.push(FieldViolation::new(key, "is required by configuration"));
        }
    }

    match (title, published_at) {
        (Some(title), Some(published_at)) if violations.is_empty() => Ok(Document {
            id,
            source_path,
            title,
            published_at,
            draft,
            tags,
            description,
            extra: fields,
            body,
            body_line,
            diagrams: Vec::new(),
            has_issues: false,
            fingerprint,
        }),
        _ => Err(ValidationError {
            source_path,
            violations,
        }),
    }
}

fn validate_date(
    fields: &mut BTreeMap<String, FieldValue>,
    violations: &mut Vec<FieldViolation>,
) -> Option<DateTime<Utc>> {
    let mut found = None;
    for key in DATE_KEYS {
        if let Some(value) = fields.remove(*key)
            && found.is_none()
        {
            found = Some((*key, value));
        }
    }

    match found {
        None => {
            violations.push(FieldViolation::new(
                "date",
                format!("is required (one of {})", DATE_KEYS.join(", ")),
            ));
            None
        }
        Some((key, FieldValue::String(s))) => {
            let parsed = parse_timestamp(&s);
            if parsed.is_none() {
                violations.push(FieldViolation::new(
                    key,
                    format!("{s:?} is not a valid timestamp"),
                ));
            }
            parsed
        }
        Some((key, other)) => {
            violations.push(type_violation(key, "a date string", &other));
            None
        }
    }
}

fn validate_tags(value: FieldValue, violations: &mut Vec<FieldViolation>) -> BTreeSet<String> {
    let items = match value {
        FieldValue::String(s) => vec![FieldValue::String(s)],
        FieldValue::List(items) => items,
        other => {
            violations.push(type_violation("tags", "a list of strings", &other));
            return BTreeSet::new();
        }
    };

    let mut tags = BTreeSet::new();
    for (i, item) in items.into_iter().enumerate() {
        let field = format!("tags[{i}]");
        match item {
            FieldValue::String(s) if s.trim().is_empty() => {
                violations.push(FieldViolation::new(field, "must not be empty"));
            }
            FieldValue::String(s) => {
                tags.insert(s.trim().to_string());
            }
            other => violations.push(type_violation(&field, "a string", &other)),
        }
    }
    tags
}

fn type_violation(field: &str, expected: &str, found: &FieldValue) -> FieldViolation {
    FieldViolation::new(
        field,
        format!("must be {expected}, found {}", found.type_name()),
    )
}

/// Parse a front-matter timestamp. Naive values are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::parse;
    use crate::scan::SourceUnit;
    use chrono::TimeZone;

    fn check(text: &str) -> Result<Document, ValidationError> {
        check_with(text, &FrontMatterConfig::default())
    }

    fn check_with(text: &str, config: &FrontMatterConfig) -> Result<Document, ValidationError> {
        let parsed = parse(&SourceUnit::new("posts/ddd.md", text), config).unwrap();
        validate(parsed, config)
    }

    fn violated_fields(err: &ValidationError) -> Vec<&str> {
        err.violations.iter().map(|v| v.field.as_str()).collect()
    }

    #[test]
    fn valid_document() {
        let doc = check(
            "---\ntitle: Domain-Driven Design\ndate: 2024-10-28\ntags: [ddd, architecture]\n\
             description: Bounded contexts\nauthor: someone\n---\nBody",
        )
        .unwrap();
        assert_eq!(doc.id.as_str(), "posts/ddd");
        assert_eq!(doc.title, "Domain-Driven Design");
        assert_eq!(
            doc.published_at,
            Utc.with_ymd_and_hms(2024, 10, 28, 0, 0, 0).unwrap()
        );
        assert!(!doc.draft);
        assert_eq!(
            doc.tags.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["architecture", "ddd"]
        );
        assert_eq!(doc.description.as_deref(), Some("Bounded contexts"));
        assert_eq!(
            doc.extra.get("author"),
            Some(&FieldValue::String("someone".into()))
        );
        assert_eq!(doc.body, "Body");
        assert!(!doc.has_issues);
    }

    #[test]
    fn reports_every_violation_at_once() {
        let err = check("---\ntitle: 42\ndraft: maybe\ntags: [ok, 3, '']\n---\n").unwrap_err();
        assert_eq!(
            violated_fields(&err),
            vec!["title", "date", "draft", "tags[1]", "tags[2]"]
        );
        assert_eq!(err.source_path, "posts/ddd.md");
    }

    #[test]
    fn missing_title_and_date() {
        let err = check("---\ntags: [a]\n---\n").unwrap_err();
        assert_eq!(violated_fields(&err), vec!["title", "date"]);
        assert_eq!(err.violations[0].reason, "is required");
    }

    #[test]
    fn null_title_counts_as_missing() {
        let err = check("---\ntitle:\ndate: 2024-01-01\n---\n").unwrap_err();
        assert_eq!(violated_fields(&err), vec!["title"]);
        assert_eq!(err.violations[0].reason, "is required");
    }

    #[test]
    fn blank_title_rejected() {
        let err = check("---\ntitle: '   '\ndate: 2024-01-01\n---\n").unwrap_err();
        assert_eq!(err.violations[0].reason, "must not be empty");
    }

    #[test]
    fn title_is_trimmed() {
        let doc = check("---\ntitle: '  Clean Architecture '\ndate: 2024-01-01\n---\n").unwrap();
        assert_eq!(doc.title, "Clean Architecture");
    }

    #[test]
    fn unparseable_date() {
        let err = check("---\ntitle: X\ndate: 2024-13-45\n---\n").unwrap_err();
        assert_eq!(violated_fields(&err), vec!["date"]);
        assert!(err.violations[0].reason.contains("not a valid timestamp"));
    }

    #[test]
    fn non_string_date() {
        let err = check("---\ntitle: X\ndate: 2024\n---\n").unwrap_err();
        assert_eq!(err.violations[0].reason, "must be a date string, found integer");
    }

    #[test]
    fn date_key_aliases() {
        let doc = check("---\ntitle: X\npublishedAt: 2024-11-01T08:00:00Z\n---\n").unwrap();
        assert_eq!(
            doc.published_at,
            Utc.with_ymd_and_hms(2024, 11, 1, 8, 0, 0).unwrap()
        );
        // Aliases are consumed, not left in extra
        let doc = check("---\ntitle: X\ndate: 2024-01-01\npubDate: 2023-01-01\n---\n").unwrap();
        assert_eq!(doc.published_at.format("%Y").to_string(), "2024");
        assert!(doc.extra.is_empty());
    }

    #[test]
    fn toml_datetime_is_accepted() {
        let doc = check("+++\ntitle = \"X\"\ndate = 2024-09-30T12:00:00+02:00\n+++\n").unwrap();
        assert_eq!(
            doc.published_at,
            Utc.with_ymd_and_hms(2024, 9, 30, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn single_string_tag() {
        let doc = check("---\ntitle: X\ndate: 2024-01-01\ntags: rust\n---\n").unwrap();
        assert!(doc.has_tag("rust"));
        assert_eq!(doc.tags.len(), 1);
    }

    #[test]
    fn duplicate_tags_collapse() {
        let doc = check("---\ntitle: X\ndate: 2024-01-01\ntags: [a, ' a', b]\n---\n").unwrap();
        assert_eq!(doc.tags.len(), 2);
    }

    #[test]
    fn tags_wrong_type() {
        let err = check("---\ntitle: X\ndate: 2024-01-01\ntags: {a: 1}\n---\n").unwrap_err();
        assert_eq!(err.violations[0].reason, "must be a list of strings, found map");
    }

    #[test]
    fn draft_flag_read() {
        let doc = check("---\ntitle: X\ndate: 2024-01-01\ndraft: true\n---\n").unwrap();
        assert!(doc.draft);
    }

    #[test]
    fn configured_required_fields() {
        let config = FrontMatterConfig {
            required: vec!["description".to_string(), "author".to_string()],
            ..Default::default()
        };
        let err = check_with("---\ntitle: X\ndate: 2024-01-01\n---\n", &config).unwrap_err();
        assert_eq!(violated_fields(&err), vec!["description", "author"]);

        let doc = check_with(
            "---\ntitle: X\ndate: 2024-01-01\ndescription: d\nauthor: a\n---\n",
            &config,
        )
        .unwrap();
        assert_eq!(doc.extra.len(), 1);
    }

    #[test]
    fn error_message_lists_violations() {
        let err = check("---\ndate: nope\n---\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("posts/ddd.md"));
        assert!(msg.contains("title is required"));
        assert!(msg.contains("date \"nope\" is not a valid timestamp"));
    }

    // =========================================================================
    // Timestamp formats
    // =========================================================================

    #[test]
    fn timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 10, 28, 9, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-10-28T09:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-28T11:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-28 11:30:00 +0200"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-28 09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-28T09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-28 09:30"), Some(expected));
        assert_eq!(
            parse_timestamp(" 2024-10-28 "),
            Some(Utc.with_ymd_and_hms(2024, 10, 28, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-02-30"), None);
        assert_eq!(parse_timestamp("28/10/2024"), None);
    }
}
