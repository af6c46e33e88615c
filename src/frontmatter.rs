//! Document parsing: front matter splitting and decoding.
//!
//! A source unit is a front-matter block followed by a Markdown body:
//!
//! ```text
//! ---
//! title: Clean Architecture in Practice
//! date: 2024-10-28
//! tags: [architecture, clean-architecture]
//! ---
//! # Clean Architecture in Practice
//! ...
//! ```
//!
//! `---` fences hold YAML, `+++` fences hold TOML. A leading byte-order mark
//! and blank lines before the opening fence are ignored, and CRLF line endings
//! are accepted.
//!
//! Parsing only checks structure: the fences exist, the block decodes, and it
//! is a key/value mapping. Field presence and types are the validator's job,
//! so a document with a missing title still parses.
//!
//! ## Duplicate keys
//!
//! Both YAML and TOML decoders reject repeated keys. Authors who copy a
//! header between articles often end up with two `date:` lines, so top-level
//! keys are deduplicated before decoding and the **last occurrence wins**.

use crate::config::FrontMatterConfig;
use crate::naming;
use crate::scan::SourceUnit;
use crate::types::{DocumentId, FieldValue};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

/// Why a source unit's front matter could not be parsed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedKind {
    #[error("source is not valid UTF-8 (invalid byte at offset {0})")]
    NotUtf8(usize),
    #[error("no opening `---` or `+++` delimiter")]
    MissingOpening,
    #[error("opening `{0}` delimiter is never closed")]
    Unclosed(&'static str),
    #[error("invalid YAML: {0}")]
    Yaml(String),
    #[error("invalid TOML: {0}")]
    Toml(String),
    #[error("front matter must be a key/value mapping, found {0}")]
    NotAMapping(&'static str),
    #[error("unsupported front matter key: {0}")]
    UnsupportedKey(String),
}

/// Structural front matter failure. Fatal for the one document only.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("malformed front matter in {source_path}: {kind}")]
pub struct MalformedFrontMatter {
    pub source_path: String,
    pub kind: MalformedKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontMatterFormat {
    Yaml,
    Toml,
}

impl FrontMatterFormat {
    fn delimiter(self) -> &'static str {
        match self {
            FrontMatterFormat::Yaml => "---",
            FrontMatterFormat::Toml => "+++",
        }
    }
}

/// A source unit split into decoded front matter and raw body.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub id: DocumentId,
    pub source_path: String,
    pub format: FrontMatterFormat,
    pub fields: BTreeMap<String, FieldValue>,
    pub body: String,
    /// 1-based line of the source file where the body starts.
    pub body_line: usize,
    pub fingerprint: String,
}

/// Parse a source unit, applying front-matter defaults for absent keys.
pub fn parse(
    unit: &SourceUnit,
    defaults: &FrontMatterConfig,
) -> Result<ParsedDocument, MalformedFrontMatter> {
    let malformed = |kind| MalformedFrontMatter {
        source_path: unit.rel_path.clone(),
        kind,
    };

    let text = unit
        .text()
        .map_err(|e| malformed(MalformedKind::NotUtf8(e.valid_up_to())))?;
    let split = split_front_matter(text).map_err(malformed)?;
    let mut fields = match split.format {
        FrontMatterFormat::Yaml => decode_yaml(&dedupe_yaml_keys(split.front)),
        FrontMatterFormat::Toml => decode_toml(&dedupe_toml_keys(split.front)),
    }
    .map_err(malformed)?;

    if !fields.contains_key("draft") {
        fields.insert("draft".to_string(), FieldValue::Bool(defaults.default_draft));
    }
    if !fields.contains_key("tags") && !defaults.default_tags.is_empty() {
        let tags = defaults
            .default_tags
            .iter()
            .cloned()
            .map(FieldValue::String)
            .collect();
        fields.insert("tags".to_string(), FieldValue::List(tags));
    }

    Ok(ParsedDocument {
        id: naming::document_id(Path::new(&unit.rel_path)),
        source_path: unit.rel_path.clone(),
        format: split.format,
        fields,
        body: split.body.to_string(),
        body_line: split.body_line,
        fingerprint: format!("{:x}", Sha256::digest(&unit.bytes)),
    })
}

struct Split<'a> {
    format: FrontMatterFormat,
    front: &'a str,
    body: &'a str,
    body_line: usize,
}

fn split_front_matter(text: &str) -> Result<Split<'_>, MalformedKind> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    // (byte offset just past the line, line without terminator)
    let mut offset = 0;
    let mut lines = text.split_inclusive('\n').map(|raw| {
        offset += raw.len();
        (offset, raw.trim_end_matches(['\n', '\r']))
    });

    let mut line_no = 0;
    let (format, front_start) = loop {
        let Some((end, line)) = lines.next() else {
            return Err(MalformedKind::MissingOpening);
        };
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let format = match line.trim_end() {
            "---" => FrontMatterFormat::Yaml,
            "+++" => FrontMatterFormat::Toml,
            _ => return Err(MalformedKind::MissingOpening),
        };
        break (format, end);
    };

    let mut front_end = front_start;
    for (end, line) in lines {
        line_no += 1;
        if line.trim_end() == format.delimiter() {
            return Ok(Split {
                format,
                front: &text[front_start..front_end],
                body: &text[end..],
                body_line: line_no + 1,
            });
        }
        front_end = end;
    }

    Err(MalformedKind::Unclosed(format.delimiter()))
}

// ============================================================================
// Duplicate key handling
// ============================================================================

/// A run of lines belonging to one top-level key.
struct KeyBlock<'a> {
    key: Option<String>,
    lines: Vec<&'a str>,
}

/// Keep only the last block of each key, at the position of that last block.
///
/// Returns the input unchanged when there are no duplicates, so decoder error
/// positions keep pointing at the author's lines.
fn keep_last_blocks(src: &str, blocks: Vec<KeyBlock<'_>>, tail: &str) -> String {
    let mut last_index: HashMap<&str, usize> = HashMap::new();
    for (i, block) in blocks.iter().enumerate() {
        if let Some(key) = &block.key {
            last_index.insert(key.as_str(), i);
        }
    }
    let keyed = blocks.iter().filter(|b| b.key.is_some()).count();
    if last_index.len() == keyed {
        return src.to_string();
    }

    let mut out = String::with_capacity(src.len());
    for (i, block) in blocks.iter().enumerate() {
        let keep = match &block.key {
            Some(key) => last_index.get(key.as_str()) == Some(&i),
            None => true,
        };
        if keep {
            for line in &block.lines {
                out.push_str(line);
            }
        }
    }
    out.push_str(tail);
    out
}

fn dedupe_yaml_keys(src: &str) -> String {
    let mut blocks: Vec<KeyBlock<'_>> = Vec::new();
    for line in src.split_inclusive('\n') {
        match yaml_top_level_key(line) {
            Some(key) => blocks.push(KeyBlock {
                key: Some(key),
                lines: vec![line],
            }),
            None => match blocks.last_mut() {
                Some(block) => block.lines.push(line),
                None => blocks.push(KeyBlock {
                    key: None,
                    lines: vec![line],
                }),
            },
        }
    }
    keep_last_blocks(src, blocks, "")
}

/// Key of a `key: value` line at column 0, if the line starts a new entry.
fn yaml_top_level_key(line: &str) -> Option<String> {
    let first = line.chars().next()?;
    if first.is_whitespace() || matches!(first, '#' | '-' | '{' | '[' | '?' | '|' | '>') {
        return None;
    }
    if first == '"' || first == '\'' {
        let rest = &line[1..];
        let end = rest.find(first)?;
        return rest[end + 1..]
            .trim_start()
            .starts_with(':')
            .then(|| rest[..end].to_string());
    }
    let colon = line.find(':')?;
    Some(line[..colon].trim().to_string())
}

fn dedupe_toml_keys(src: &str) -> String {
    let lines = toml_lines(src);
    // Keys under a `[table]` header belong to that table; only the root
    // table is deduplicated.
    let root_len = lines
        .iter()
        .position(|(line, top)| *top && line.starts_with('['))
        .unwrap_or(lines.len());
    let tail_start: usize = lines[..root_len].iter().map(|(line, _)| line.len()).sum();

    let mut blocks: Vec<KeyBlock<'_>> = Vec::new();
    for &(line, top) in &lines[..root_len] {
        match top.then(|| toml_top_level_key(line)).flatten() {
            Some(key) => blocks.push(KeyBlock {
                key: Some(key),
                lines: vec![line],
            }),
            None => match blocks.last_mut() {
                Some(block) => block.lines.push(line),
                None => blocks.push(KeyBlock {
                    key: None,
                    lines: vec![line],
                }),
            },
        }
    }
    keep_last_blocks(src, blocks, &src[tail_start..])
}

/// Split TOML into lines, each paired with whether it starts at the top
/// level: outside any multi-line string or multi-line array.
fn toml_lines(src: &str) -> Vec<(&str, bool)> {
    let mut open_string: Option<&'static str> = None;
    let mut depth = 0usize;
    let mut lines = Vec::new();

    for line in src.split_inclusive('\n') {
        lines.push((line, open_string.is_none() && depth == 0));

        let mut rest = line;
        loop {
            if let Some(delim) = open_string {
                match find_closing(rest, delim) {
                    Some(end) => {
                        rest = &rest[end + delim.len()..];
                        open_string = None;
                    }
                    None => break,
                }
                continue;
            }
            let Some(pos) = rest.find(['#', '"', '\'', '[', ']']) else {
                break;
            };
            let token = &rest[pos..];
            match token.as_bytes()[0] {
                b'#' => break,
                b'[' => {
                    depth += 1;
                    rest = &token[1..];
                }
                b']' => {
                    depth = depth.saturating_sub(1);
                    rest = &token[1..];
                }
                quote => {
                    let delim = if token.starts_with(r#"""""#) {
                        r#"""""#
                    } else if token.starts_with("'''") {
                        "'''"
                    } else if quote == b'"' {
                        "\""
                    } else {
                        "'"
                    };
                    let body = &token[delim.len()..];
                    if delim.len() == 3 {
                        open_string = Some(delim);
                        rest = body;
                    } else {
                        match find_closing(body, delim) {
                            Some(end) => rest = &body[end + 1..],
                            None => break,
                        }
                    }
                }
            }
        }
    }
    lines
}

/// Byte offset of the closing `delim` in `s`. Basic (`"`) strings skip
/// backslash escapes; literal (`'`) strings have none.
fn find_closing(s: &str, delim: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let escapes = delim.starts_with('"');
    let mut i = 0;
    while i < bytes.len() {
        if escapes && bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i..].starts_with(delim.as_bytes()) {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn toml_top_level_key(line: &str) -> Option<String> {
    let first = line.chars().next()?;
    if first == '"' || first == '\'' {
        let rest = &line[1..];
        let end = rest.find(first)?;
        return rest[end + 1..]
            .trim_start()
            .starts_with('=')
            .then(|| rest[..end].to_string());
    }
    let eq = line.find('=')?;
    let key = line[..eq].trim_end();
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    bare.then(|| key.to_string())
}

// ============================================================================
// Decoding
// ============================================================================

fn decode_yaml(src: &str) -> Result<BTreeMap<String, FieldValue>, MalformedKind> {
    if src.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let value: serde_yaml::Value =
        serde_yaml::from_str(src).map_err(|e| MalformedKind::Yaml(e.to_string()))?;
    match value {
        serde_yaml::Value::Null => Ok(BTreeMap::new()),
        serde_yaml::Value::Mapping(map) => yaml_mapping(map),
        other => Err(MalformedKind::NotAMapping(yaml_type_name(&other))),
    }
}

fn yaml_mapping(map: serde_yaml::Mapping) -> Result<BTreeMap<String, FieldValue>, MalformedKind> {
    map.into_iter()
        .map(|(k, v)| Ok((yaml_key(k)?, yaml_value(v)?)))
        .collect()
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, MalformedKind> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(MalformedKind::UnsupportedKey(
            yaml_type_name(&other).to_string(),
        )),
    }
}

fn yaml_value(value: serde_yaml::Value) -> Result<FieldValue, MalformedKind> {
    Ok(match value {
        serde_yaml::Value::Null => FieldValue::Null,
        serde_yaml::Value::Bool(b) => FieldValue::Bool(b),
        serde_yaml::Value::Number(n) => match n.as_i64() {
            Some(i) => FieldValue::Integer(i),
            None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_yaml::Value::String(s) => FieldValue::String(s),
        serde_yaml::Value::Sequence(seq) => {
            FieldValue::List(seq.into_iter().map(yaml_value).collect::<Result<_, _>>()?)
        }
        serde_yaml::Value::Mapping(map) => FieldValue::Map(yaml_mapping(map)?),
        serde_yaml::Value::Tagged(tagged) => yaml_value(tagged.value)?,
    })
}

fn yaml_type_name(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "boolean",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "list",
        serde_yaml::Value::Mapping(_) => "map",
        serde_yaml::Value::Tagged(_) => "tagged value",
    }
}

fn decode_toml(src: &str) -> Result<BTreeMap<String, FieldValue>, MalformedKind> {
    let table: toml::Table = toml::from_str(src).map_err(|e| MalformedKind::Toml(e.to_string()))?;
    Ok(table.into_iter().map(|(k, v)| (k, toml_value(v))).collect())
}

fn toml_value(value: toml::Value) -> FieldValue {
    match value {
        toml::Value::String(s) => FieldValue::String(s),
        toml::Value::Integer(i) => FieldValue::Integer(i),
        toml::Value::Float(f) => FieldValue::Float(f),
        toml::Value::Boolean(b) => FieldValue::Bool(b),
        toml::Value::Datetime(dt) => FieldValue::String(dt.to_string()),
        toml::Value::Array(items) => FieldValue::List(items.into_iter().map(toml_value).collect()),
        toml::Value::Table(table) => {
            FieldValue::Map(table.into_iter().map(|(k, v)| (k, toml_value(v))).collect())
        }
    }
}
