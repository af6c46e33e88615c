//! Ingestion pipeline: source units in, sealed collection and report out.
//!
//! ```text
//! SourceUnit ──parse──▶ ParsedDocument ──validate──▶ Document ──resolve──▶ Document
//!                                                                            │
//!                            (sequential, source-path order)   Indexer ◀─────┘
//! ```
//!
//! Each unit is handled independently on the rayon pool; nothing a unit does
//! can affect another. Outcomes are then merged on the calling thread in the
//! order the scanner produced the units, so the report and the collection are
//! identical between runs on unchanged input.
//!
//! ## Failure handling
//!
//! | Failure | Effect |
//! |---------|--------|
//! | Malformed front matter | document excluded, run continues |
//! | Invalid front matter | document excluded with every violation, run continues |
//! | Unresolved link or diagram | document kept with `has_issues`, warning reported |
//! | Draft (`publish.include_drafts = false`) | document excluded as a draft |
//! | Duplicate id | whole run fails, nothing is published |

use crate::config::{self, PipelineConfig};
use crate::frontmatter::{self, MalformedFrontMatter};
use crate::index::{Collection, IndexError, Indexer};
use crate::resolve::{ResolutionIssue, Resolver};
use crate::scan::{self, ScanError, SourceUnit, Sources};
use crate::types::{Document, DocumentId};
use crate::validate::{self, FieldViolation, ValidationError};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("duplicate document id '{id}': {first} and {second}")]
    DuplicateDocumentId {
        id: DocumentId,
        first: String,
        second: String,
    },
    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

/// Progress events sent while merging, in source-path order.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Started {
        units: usize,
    },
    Included {
        title: String,
        source_path: String,
        issues: usize,
    },
    Excluded {
        source_path: String,
        reason: ExclusionReason,
    },
}

/// A document that made it into the collection.
#[derive(Debug, Clone, Serialize)]
pub struct Inclusion {
    pub id: DocumentId,
    pub source_path: String,
    pub title: String,
    pub has_issues: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExclusionReason {
    MalformedFrontMatter { message: String },
    InvalidFrontMatter { violations: Vec<FieldViolation> },
    Draft,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::MalformedFrontMatter { message } => {
                write!(f, "malformed front matter: {message}")
            }
            ExclusionReason::InvalidFrontMatter { violations } => {
                let parts: Vec<String> = violations
                    .iter()
                    .map(|v| format!("{} {}", v.field, v.reason))
                    .collect();
                write!(f, "invalid front matter: {}", parts.join("; "))
            }
            ExclusionReason::Draft => f.write_str("draft"),
        }
    }
}

/// A source unit that did not make it into the collection.
#[derive(Debug, Clone, Serialize)]
pub struct Exclusion {
    pub source_path: String,
    #[serde(flatten)]
    pub reason: ExclusionReason,
}

/// Everything that happened to every source unit in one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub included: Vec<Inclusion>,
    pub excluded: Vec<Exclusion>,
    pub warnings: Vec<ResolutionIssue>,
    /// Ids of drafts published because `publish.include_drafts` is set.
    pub drafts: Vec<DocumentId>,
}

impl BuildReport {
    fn include(&mut self, doc: &Document) {
        self.included.push(Inclusion {
            id: doc.id.clone(),
            source_path: doc.source_path.clone(),
            title: doc.title.clone(),
            has_issues: doc.has_issues,
        });
        if doc.draft {
            self.drafts.push(doc.id.clone());
        }
    }
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub collection: Collection,
    pub report: BuildReport,
}

/// Result of taking one unit through parse, validate and resolve.
enum UnitOutcome {
    Ready(Document, Vec<ResolutionIssue>),
    Malformed(MalformedFrontMatter),
    Invalid(ValidationError),
}

fn process_unit(unit: &SourceUnit, config: &PipelineConfig, resolver: &Resolver) -> UnitOutcome {
    let parsed = match frontmatter::parse(unit, &config.front_matter) {
        Ok(parsed) => parsed,
        Err(e) => return UnitOutcome::Malformed(e),
    };
    let doc = match validate::validate(parsed, &config.front_matter) {
        Ok(doc) => doc,
        Err(e) => return UnitOutcome::Invalid(e),
    };
    let (doc, issues) = resolver.resolve(doc);
    UnitOutcome::Ready(doc, issues)
}

/// Run every source unit through the pipeline and seal the result.
pub fn run(
    sources: &Sources,
    config: &PipelineConfig,
    progress: Option<Sender<PipelineEvent>>,
) -> Result<BuildOutcome, PipelineError> {
    let emit = |event: PipelineEvent| {
        if let Some(tx) = &progress {
            tx.send(event).ok();
        }
    };
    emit(PipelineEvent::Started {
        units: sources.units.len(),
    });

    let resolver = Resolver::new(&sources.assets, config);
    let outcomes: Vec<UnitOutcome> = sources
        .units
        .par_iter()
        .map(|unit| process_unit(unit, config, &resolver))
        .collect();

    let mut indexer = Indexer::new();
    let mut report = BuildReport::default();
    let mut seen: HashMap<DocumentId, String> = HashMap::new();

    for outcome in outcomes {
        let (doc, issues) = match outcome {
            UnitOutcome::Ready(doc, issues) => (doc, issues),
            UnitOutcome::Malformed(e) => {
                exclude(
                    &mut report,
                    &emit,
                    e.source_path,
                    ExclusionReason::MalformedFrontMatter {
                        message: e.kind.to_string(),
                    },
                );
                continue;
            }
            UnitOutcome::Invalid(e) => {
                exclude(
                    &mut report,
                    &emit,
                    e.source_path,
                    ExclusionReason::InvalidFrontMatter {
                        violations: e.violations,
                    },
                );
                continue;
            }
        };

        if doc.draft && !config.publish.include_drafts {
            exclude(&mut report, &emit, doc.source_path, ExclusionReason::Draft);
            continue;
        }

        if let Some(first) = seen.get(&doc.id) {
            return Err(PipelineError::DuplicateDocumentId {
                id: doc.id,
                first: first.clone(),
                second: doc.source_path,
            });
        }
        seen.insert(doc.id.clone(), doc.source_path.clone());

        emit(PipelineEvent::Included {
            title: doc.title.clone(),
            source_path: doc.source_path.clone(),
            issues: issues.len(),
        });
        report.include(&doc);
        report.warnings.extend(issues);
        indexer.ingest(doc)?;
    }

    indexer.seal()?;
    Ok(BuildOutcome {
        collection: indexer.into_collection(),
        report,
    })
}

fn exclude(
    report: &mut BuildReport,
    emit: &impl Fn(PipelineEvent),
    source_path: String,
    reason: ExclusionReason,
) {
    emit(PipelineEvent::Excluded {
        source_path: source_path.clone(),
        reason: reason.clone(),
    });
    report.excluded.push(Exclusion {
        source_path,
        reason,
    });
}

/// Load config, scan and run the pipeline for a content root.
pub fn ingest_dir(root: &Path) -> Result<(PipelineConfig, Sources, BuildOutcome), PipelineError> {
    let config = config::load_config(root)?;
    let sources = scan::scan(root, &config)?;
    let outcome = run(&sources, &config, None)?;
    Ok((config, sources, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::AssetSet;
    use crate::test_helpers::{document_ids, find_document, find_exclusion, setup_fixtures};

    fn sources(units: &[(&str, &str)]) -> Sources {
        let assets: AssetSet = units.iter().map(|(p, _)| *p).collect();
        Sources {
            units: units
                .iter()
                .map(|(p, t)| SourceUnit::new(*p, *t))
                .collect(),
            assets,
        }
    }

    fn article(title: &str, date: &str) -> String {
        format!("---\ntitle: {title}\ndate: {date}\ntags: [rust]\n---\nBody of {title}.\n")
    }

    #[test]
    fn valid_units_are_published() {
        let src = sources(&[
            ("a.md", article("A", "2024-09-30").as_str()),
            ("b.md", article("B", "2024-11-01").as_str()),
        ]);
        let outcome = run(&src, &PipelineConfig::default(), None).unwrap();
        assert_eq!(outcome.collection.len(), 2);
        assert_eq!(outcome.report.included.len(), 2);
        assert!(outcome.report.excluded.is_empty());
        assert_eq!(outcome.collection.by_id("b").unwrap().title, "B");
    }

    #[test]
    fn malformed_and_invalid_units_excluded_others_kept() {
        let src = sources(&[
            ("a.md", article("A", "2024-09-30").as_str()),
            ("broken.md", "no front matter here"),
            ("invalid.md", "---\ntitle: 3\n---\n"),
        ]);
        let outcome = run(&src, &PipelineConfig::default(), None).unwrap();
        assert_eq!(outcome.collection.len(), 1);

        let excluded = &outcome.report.excluded;
        assert_eq!(excluded.len(), 2);
        assert_eq!(excluded[0].source_path, "broken.md");
        assert!(matches!(
            excluded[0].reason,
            ExclusionReason::MalformedFrontMatter { .. }
        ));
        assert_eq!(excluded[1].source_path, "invalid.md");
        match &excluded[1].reason {
            ExclusionReason::InvalidFrontMatter { violations } => {
                let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
                assert_eq!(fields, vec!["title", "date"]);
            }
            other => panic!("expected invalid front matter, got {other:?}"),
        }
    }

    #[test]
    fn non_utf8_unit_excluded_others_kept() {
        let mut src = sources(&[("good.md", article("Good", "2024-09-30").as_str())]);
        src.units
            .insert(0, SourceUnit::from_bytes("bad.md", b"---\n\xff\n".to_vec()));

        let outcome = run(&src, &PipelineConfig::default(), None).unwrap();
        assert_eq!(document_ids(&outcome.collection), vec!["good"]);
        match &find_exclusion(&outcome.report, "bad.md").reason {
            ExclusionReason::MalformedFrontMatter { message } => {
                assert!(message.contains("not valid UTF-8"), "{message}");
            }
            other => panic!("expected malformed front matter, got {other:?}"),
        }
    }

    #[test]
    fn drafts_excluded_by_default() {
        let src = sources(&[(
            "wip.md",
            "---\ntitle: WIP\ndate: 2024-10-01\ndraft: true\n---\n",
        )]);
        let outcome = run(&src, &PipelineConfig::default(), None).unwrap();
        assert!(outcome.collection.is_empty());
        assert_eq!(outcome.report.excluded[0].reason, ExclusionReason::Draft);
        assert!(outcome.report.drafts.is_empty());
    }

    #[test]
    fn drafts_published_when_configured() {
        let src = sources(&[(
            "wip.md",
            "---\ntitle: WIP\ndate: 2024-10-01\ndraft: true\n---\n",
        )]);
        let mut config = PipelineConfig::default();
        config.publish.include_drafts = true;
        let outcome = run(&src, &config, None).unwrap();
        assert_eq!(outcome.collection.len(), 1);
        assert_eq!(outcome.report.drafts, vec![DocumentId::new("wip")]);
    }

    #[test]
    fn duplicate_ids_fail_the_run() {
        let src = sources(&[
            ("posts/ddd.md", article("One", "2024-09-30").as_str()),
            ("posts/ddd/index.md", article("Two", "2024-10-28").as_str()),
        ]);
        let err = run(&src, &PipelineConfig::default(), None).unwrap_err();
        match err {
            PipelineError::DuplicateDocumentId { id, first, second } => {
                assert_eq!(id.as_str(), "posts/ddd");
                assert_eq!(first, "posts/ddd.md");
                assert_eq!(second, "posts/ddd/index.md");
            }
            other => panic!("expected duplicate id, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_references_flag_but_keep() {
        let src = sources(&[
            (
                "a.md",
                "---\ntitle: A\ndate: 2024-09-30\n---\n![flow](missing.mmd)\n",
            ),
            ("b.md", article("B", "2024-11-01").as_str()),
        ]);
        let outcome = run(&src, &PipelineConfig::default(), None).unwrap();
        assert_eq!(outcome.collection.len(), 2);
        assert!(outcome.collection.by_id("a").unwrap().has_issues);
        assert!(!outcome.collection.by_id("b").unwrap().has_issues);
        assert_eq!(outcome.report.warnings.len(), 1);
        assert_eq!(outcome.report.warnings[0].line, 5);
    }

    #[test]
    fn events_follow_source_order() {
        let src = sources(&[
            ("a.md", article("A", "2024-09-30").as_str()),
            ("b.md", "oops"),
            ("c.md", article("C", "2024-11-01").as_str()),
        ]);
        let (tx, rx) = std::sync::mpsc::channel();
        run(&src, &PipelineConfig::default(), Some(tx)).unwrap();
        let events: Vec<PipelineEvent> = rx.iter().collect();

        assert!(matches!(events[0], PipelineEvent::Started { units: 3 }));
        assert!(matches!(&events[1], PipelineEvent::Included { title, .. } if title == "A"));
        assert!(matches!(&events[2], PipelineEvent::Excluded { source_path, .. } if source_path == "b.md"));
        assert!(matches!(&events[3], PipelineEvent::Included { title, .. } if title == "C"));
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn rerun_is_identical() {
        let src = sources(&[
            ("a.md", article("A", "2024-10-28").as_str()),
            ("b.md", article("B", "2024-11-01").as_str()),
            ("c.md", article("C", "2024-09-30").as_str()),
        ]);
        let config = PipelineConfig::default();
        let first = run(&src, &config, None).unwrap();
        let second = run(&src, &config, None).unwrap();
        let ids = |o: &BuildOutcome| -> Vec<String> {
            o.collection.all().iter().map(|d| d.id.to_string()).collect()
        };
        assert_eq!(ids(&first), vec!["b", "a", "c"]);
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn report_serializes_reason_tag() {
        let src = sources(&[(
            "wip.md",
            "---\ntitle: WIP\ndate: 2024-10-01\ndraft: true\n---\n",
        )]);
        let outcome = run(&src, &PipelineConfig::default(), None).unwrap();
        let json = serde_json::to_value(&outcome.report).unwrap();
        assert_eq!(json["excluded"][0]["reason"], "draft");
        assert_eq!(json["excluded"][0]["source_path"], "wip.md");
    }

    #[test]
    fn exclusion_reason_display() {
        let reason = ExclusionReason::InvalidFrontMatter {
            violations: vec![FieldViolation {
                field: "title".into(),
                reason: "is required".into(),
            }],
        };
        assert_eq!(reason.to_string(), "invalid front matter: title is required");
    }

    // =========================================================================
    // Fixture content
    // =========================================================================

    #[test]
    fn fixture_content_ingests() {
        let tmp = setup_fixtures();
        let (config, _, outcome) = ingest_dir(tmp.path()).unwrap();
        assert_eq!(config.site.title, "Engineering Notes");

        assert_eq!(
            document_ids(&outcome.collection),
            vec![
                "posts/error-handling",
                "posts/clean-architecture",
                "posts/domain-driven-design",
                "about",
            ]
        );

        let errors = find_document(&outcome.collection, "posts/error-handling");
        assert!(errors.has_issues);
        assert_eq!(errors.extra["series"].as_str(), Some("rust-patterns"));

        let ddd = find_document(&outcome.collection, "posts/domain-driven-design");
        assert!(!ddd.has_issues);
        assert_eq!(ddd.diagrams.len(), 2);

        assert!(matches!(
            find_exclusion(&outcome.report, "notes/broken.md").reason,
            ExclusionReason::MalformedFrontMatter { .. }
        ));
        assert!(matches!(
            find_exclusion(&outcome.report, "notes/untitled.md").reason,
            ExclusionReason::InvalidFrontMatter { .. }
        ));
        assert_eq!(
            find_exclusion(&outcome.report, "posts/object-mapping.md").reason,
            ExclusionReason::Draft
        );
    }
}
