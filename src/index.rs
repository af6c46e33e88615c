//! Collection indexing.
//!
//! The [`Indexer`] accepts validated documents one at a time, rejects
//! duplicate ids, and is then sealed into a read-only [`Collection`]:
//!
//! ```text
//! Building ──ingest()──▶ Building ──seal()──▶ Sealed
//!                                              │
//!                 ingest() / seal() ──▶ IndexError::IndexSealed
//! ```
//!
//! ## Storage
//!
//! The collection owns its documents in one `Vec`, ordered newest first
//! (`published_at` descending, ties broken by id ascending). Lookups by id
//! and tag are side tables of positions into that vector, so every query
//! returns documents in collection order without re-sorting.
//!
//! Tag membership is exact and case-sensitive: `by_tag("rust")` never
//! returns a document tagged only `Rust`.

use crate::types::{Document, DocumentId};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("duplicate document id '{0}'")]
    DuplicateDocumentId(DocumentId),
    #[error("index is sealed; no further documents can be added")]
    IndexSealed,
    #[error("no document with id '{0}'")]
    NotFound(String),
}

/// Lifecycle of an [`Indexer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Building,
    Sealed,
}

#[derive(Debug)]
enum Stage {
    Building {
        documents: Vec<Document>,
        ids: HashSet<DocumentId>,
    },
    Sealed(Collection),
}

/// Accumulates documents and seals them into a [`Collection`].
#[derive(Debug)]
pub struct Indexer {
    stage: Stage,
}

impl Default for Indexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Indexer {
    pub fn new() -> Self {
        Self {
            stage: Stage::Building {
                documents: Vec::new(),
                ids: HashSet::new(),
            },
        }
    }

    pub fn state(&self) -> IndexState {
        match self.stage {
            Stage::Building { .. } => IndexState::Building,
            Stage::Sealed(_) => IndexState::Sealed,
        }
    }

    /// Add a document. On a duplicate id the indexer is left unchanged.
    pub fn ingest(&mut self, doc: Document) -> Result<(), IndexError> {
        match &mut self.stage {
            Stage::Sealed(_) => Err(IndexError::IndexSealed),
            Stage::Building { documents, ids } => {
                if ids.contains(&doc.id) {
                    return Err(IndexError::DuplicateDocumentId(doc.id));
                }
                ids.insert(doc.id.clone());
                documents.push(doc);
                Ok(())
            }
        }
    }

    /// Freeze the index. Sealing twice is an error.
    pub fn seal(&mut self) -> Result<&Collection, IndexError> {
        if let Stage::Building { documents, .. } = &mut self.stage {
            self.stage = Stage::Sealed(Collection::new(std::mem::take(documents)));
            if let Stage::Sealed(collection) = &self.stage {
                return Ok(collection);
            }
        }
        Err(IndexError::IndexSealed)
    }

    /// The sealed collection, `None` while still building.
    pub fn collection(&self) -> Option<&Collection> {
        match &self.stage {
            Stage::Sealed(collection) => Some(collection),
            Stage::Building { .. } => None,
        }
    }

    /// Consume the indexer, sealing it first if needed.
    pub fn into_collection(self) -> Collection {
        match self.stage {
            Stage::Sealed(collection) => collection,
            Stage::Building { documents, .. } => Collection::new(documents),
        }
    }
}

/// The sealed, queryable set of published documents.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    documents: Vec<Document>,
    by_id: HashMap<DocumentId, usize>,
    by_tag: BTreeMap<String, Vec<usize>>,
}

impl Collection {
    fn new(mut documents: Vec<Document>) -> Self {
        documents.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut by_id = HashMap::with_capacity(documents.len());
        let mut by_tag: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (pos, doc) in documents.iter().enumerate() {
            by_id.insert(doc.id.clone(), pos);
            for tag in &doc.tags {
                by_tag.entry(tag.clone()).or_default().push(pos);
            }
        }

        Self {
            documents,
            by_id,
            by_tag,
        }
    }

    /// Every document, newest first.
    pub fn all(&self) -> &[Document] {
        &self.documents
    }

    pub fn by_id(&self, id: &str) -> Result<&Document, IndexError> {
        self.by_id
            .get(id)
            .map(|&pos| &self.documents[pos])
            .ok_or_else(|| IndexError::NotFound(id.to_string()))
    }

    /// Documents carrying exactly `tag`, newest first. Unknown tags yield
    /// nothing.
    pub fn by_tag<'a>(&'a self, tag: &str) -> impl Iterator<Item = &'a Document> + 'a {
        self.by_tag
            .get(tag)
            .into_iter()
            .flatten()
            .map(|&pos| &self.documents[pos])
    }

    /// Distinct tags with their document counts, in tag order.
    pub fn tags(&self) -> impl Iterator<Item = (&str, usize)> {
        self.by_tag.iter().map(|(tag, docs)| (tag.as_str(), docs.len()))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Serializes as the ordered document list.
impl Serialize for Collection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.documents.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::DocBuilder;

    fn doc(path: &str, date: &str, tags: &[&str]) -> Document {
        DocBuilder::new(path).date(date).tags(tags).build()
    }

    fn sealed(docs: Vec<Document>) -> Collection {
        let mut indexer = Indexer::new();
        for d in docs {
            indexer.ingest(d).unwrap();
        }
        indexer.seal().unwrap().clone()
    }

    fn ids<'a>(docs: impl IntoIterator<Item = &'a Document>) -> Vec<&'a str> {
        docs.into_iter().map(|d| d.id.as_str()).collect()
    }

    // =========================================================================
    // State machine
    // =========================================================================

    #[test]
    fn starts_building() {
        assert_eq!(Indexer::new().state(), IndexState::Building);
    }

    #[test]
    fn seal_transitions_to_sealed() {
        let mut indexer = Indexer::new();
        indexer.ingest(doc("a.md", "2024-01-01", &[])).unwrap();
        let collection = indexer.seal().unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(indexer.state(), IndexState::Sealed);
    }

    #[test]
    fn ingest_after_seal_fails() {
        let mut indexer = Indexer::new();
        indexer.seal().unwrap();
        let err = indexer.ingest(doc("a.md", "2024-01-01", &[])).unwrap_err();
        assert_eq!(err, IndexError::IndexSealed);
        assert!(indexer.collection().unwrap().is_empty());
    }

    #[test]
    fn second_seal_fails() {
        let mut indexer = Indexer::new();
        indexer.seal().unwrap();
        assert_eq!(indexer.seal().unwrap_err(), IndexError::IndexSealed);
    }

    #[test]
    fn collection_unavailable_while_building() {
        assert!(Indexer::new().collection().is_none());
    }

    #[test]
    fn duplicate_id_rejected_and_first_kept() {
        let mut indexer = Indexer::new();
        indexer.ingest(DocBuilder::new("a.md").title("First").build()).unwrap();
        let err = indexer
            .ingest(DocBuilder::new("a/index.md").title("Second").build())
            .unwrap_err();
        assert_eq!(err, IndexError::DuplicateDocumentId(DocumentId::new("a")));

        let collection = indexer.into_collection();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.by_id("a").unwrap().title, "First");
    }

    #[test]
    fn empty_collection() {
        let collection = sealed(vec![]);
        assert!(collection.is_empty());
        assert_eq!(collection.tags().count(), 0);
        assert_eq!(collection.by_tag("rust").count(), 0);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[test]
    fn all_sorted_newest_first_then_by_id() {
        let collection = sealed(vec![
            doc("old.md", "2024-09-30", &[]),
            doc("b.md", "2024-11-01", &[]),
            doc("a.md", "2024-11-01", &[]),
            doc("mid.md", "2024-10-28", &[]),
        ]);
        assert_eq!(ids(collection.all()), vec!["a", "b", "mid", "old"]);
    }

    #[test]
    fn by_id_returns_document() {
        let collection = sealed(vec![doc("posts/ddd.md", "2024-09-30", &["ddd"])]);
        let found = collection.by_id("posts/ddd").unwrap();
        assert_eq!(found.source_path, "posts/ddd.md");
    }

    #[test]
    fn by_id_missing_is_not_found() {
        let collection = sealed(vec![]);
        assert_eq!(
            collection.by_id("nope").unwrap_err(),
            IndexError::NotFound("nope".into())
        );
    }

    #[test]
    fn by_tag_is_exact_and_ordered() {
        let collection = sealed(vec![
            doc("a.md", "2024-09-30", &["rust", "ddd"]),
            doc("b.md", "2024-11-01", &["rust"]),
            doc("c.md", "2024-10-28", &["Rust"]),
            doc("d.md", "2024-10-01", &["ddd"]),
        ]);
        assert_eq!(ids(collection.by_tag("rust")), vec!["b", "a"]);
        assert_eq!(ids(collection.by_tag("Rust")), vec!["c"]);
        assert_eq!(ids(collection.by_tag("ddd")), vec!["d", "a"]);
        assert_eq!(collection.by_tag("unknown").count(), 0);
    }

    #[test]
    fn tags_with_counts() {
        let collection = sealed(vec![
            doc("a.md", "2024-09-30", &["rust", "ddd"]),
            doc("b.md", "2024-11-01", &["rust"]),
        ]);
        let tags: Vec<_> = collection.tags().collect();
        assert_eq!(tags, vec![("ddd", 1), ("rust", 2)]);
    }

    #[test]
    fn into_collection_seals_implicitly() {
        let mut indexer = Indexer::new();
        indexer.ingest(doc("b.md", "2024-01-01", &[])).unwrap();
        indexer.ingest(doc("a.md", "2024-02-01", &[])).unwrap();
        let collection = indexer.into_collection();
        assert_eq!(ids(collection.all()), vec!["a", "b"]);
    }

    #[test]
    fn serializes_as_ordered_list() {
        let collection = sealed(vec![
            doc("a.md", "2024-01-01", &[]),
            doc("b.md", "2024-02-01", &[]),
        ]);
        let json = serde_json::to_value(&collection).unwrap();
        let arr = json.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["id"], "b");
        assert_eq!(arr[1]["id"], "a");
    }
}
