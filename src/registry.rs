//! Built collections and the registry consumers query.
//!
//! ```text
//!                  CollectionRegistry (ArcSwap)
//!   ┌──────────────────────────────────────────────────────┐
//!   │  snapshot: { "posts" → Arc<Collection>,              │
//!   │              "projects" → Arc<Collection> }          │
//!   └──────────┬──────────────────────────────┬────────────┘
//!              │                              │
//!     get_collection / find_by_slug        publish
//!        (lock-free load)            (whole map, atomic swap)
//! ```
//!
//! A rebuild replaces every collection at once. Readers holding an
//! `Arc<Collection>` from the old snapshot keep a consistent view; readers
//! arriving after the swap see only the new one. A half-built map is never
//! visible.

use crate::compile::CompiledBody;
use crate::derive::DerivedFields;
use crate::validate::Metadata;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("no collection named `{0}` has been built")]
    UnknownKind(String),
}

/// One validated, compiled document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(skip)]
    pub path: PathBuf,
    /// Path relative to the collection directory.
    pub relative_path: String,
    pub metadata: Metadata,
    #[serde(flatten)]
    pub derived: DerivedFields,
    pub body: CompiledBody,
}

impl Record {
    pub fn slug(&self) -> &str {
        &self.derived.slug
    }

    pub fn read_time(&self) -> &str {
        &self.derived.read_time
    }

    pub fn html(&self) -> &str {
        &self.body.html
    }

    /// Parsed value of a `date` field.
    pub fn date(&self, field: &str) -> Option<DateTime<Utc>> {
        self.derived.dates.get(field).copied()
    }
}

/// All records of one kind, in directory walk order.
#[derive(Debug, Clone)]
pub struct Collection {
    kind: String,
    records: Vec<Arc<Record>>,
    by_slug: HashMap<String, usize>,
}

impl Collection {
    /// Build a collection. Slugs are expected to be unique; on a repeat the
    /// first record keeps the index entry.
    pub fn new(kind: impl Into<String>, records: Vec<Record>) -> Self {
        let records: Vec<Arc<Record>> = records.into_iter().map(Arc::new).collect();
        let mut by_slug = HashMap::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            by_slug.entry(record.slug().to_string()).or_insert(idx);
        }
        Self {
            kind: kind.into(),
            records,
            by_slug,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Record>> {
        self.records.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.records.iter()
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<Arc<Record>> {
        self.by_slug
            .get(slug)
            .map(|&idx| Arc::clone(&self.records[idx]))
    }

    /// Records ordered newest first by a `date` field.
    /// Records without that date keep walk order at the end.
    pub fn sorted_by_date_desc(&self, field: &str) -> Vec<Arc<Record>> {
        let mut records = self.records.clone();
        records.sort_by(|a, b| b.date(field).cmp(&a.date(field)));
        records
    }

    /// Records whose string-array `field` contains `tag`.
    pub fn with_tag(&self, field: &str, tag: &str) -> Vec<Arc<Record>> {
        self.records
            .iter()
            .filter(|r| {
                r.metadata
                    .strings(field)
                    .is_some_and(|tags| tags.iter().any(|t| t == tag))
            })
            .cloned()
            .collect()
    }
}

impl Serialize for Collection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let records: Vec<&Record> = self.records.iter().map(Arc::as_ref).collect();
        let mut state = serializer.serialize_struct("Collection", 2)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("records", &records)?;
        state.end()
    }
}

type Snapshot = HashMap<String, Arc<Collection>>;

/// Query surface over the last successfully built collections.
///
/// Starts empty. Populated by [`crate::pipeline::Pipeline::rebuild`].
pub struct CollectionRegistry {
    snapshot: ArcSwap<Snapshot>,
}

impl Default for CollectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CollectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn get_collection(&self, kind: &str) -> Result<Arc<Collection>, RegistryError> {
        self.snapshot
            .load()
            .get(kind)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownKind(kind.to_string()))
    }

    /// `Ok(None)` when the kind exists but no record has that slug.
    pub fn find_by_slug(
        &self,
        kind: &str,
        slug: &str,
    ) -> Result<Option<Arc<Record>>, RegistryError> {
        Ok(self.get_collection(kind)?.find_by_slug(slug))
    }

    /// Published kinds in name order.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.snapshot.load().keys().cloned().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Replace every published collection at once.
    pub(crate) fn publish(&self, collections: Vec<Collection>) {
        let snapshot: Snapshot = collections
            .into_iter()
            .map(|c| (c.kind.clone(), Arc::new(c)))
            .collect();
        self.snapshot.store(Arc::new(snapshot));
    }
}
