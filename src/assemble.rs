//! Collection assembly: documents → validated, compiled records.
//!
//! Every document runs the full chain independently:
//!
//! ```text
//! SourceDocument ─► parse_front_matter ─► validate ─► compile ─► derive ─► Record
//!        │                  │                 │           │          │
//!        └──── LoadError ───┴─ FieldErrors ───┴─ Compile ─┴─ Date ───┴──► DocumentFailure
//! ```
//!
//! The per-document stage runs on a bounded rayon pool. Results are joined
//! in directory walk order, then slugs are checked across the whole
//! collection: every document sharing a slug with another is reported as
//! [`DocumentError::DuplicateSlug`] and left out.
//!
//! Nothing stops at the first failure. The assembler attempts every document
//! and reports all failures together in one [`BuildFailed`], alongside the
//! records that did succeed.
//!
//! ## Cancellation
//!
//! A [`CancelToken`] is checked before each document starts. Documents
//! already running finish; the run then ends with [`BuildError::Cancelled`]
//! and no partial collection.

use crate::compile::{CompileError, Compiler};
use crate::config::{PipelineConfig, effective_threads};
use crate::derive::{DeriveError, derive};
use crate::loader::{DocumentSet, LoadError, LoadFailure, SourceDocument, parse_front_matter};
use crate::registry::{Collection, Record};
use crate::schema::{Schema, SchemaError};
use crate::validate::{FieldError, validate};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why one document was left out of its collection.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("{0}")]
    Load(#[from] LoadError),
    #[error("front-matter validation failed: {}", join_field_errors(.0))]
    ValidationFailed(Vec<FieldError>),
    #[error("compilation failed at {0}")]
    Compilation(#[from] CompileError),
    #[error("{0}")]
    DateParse(#[from] DeriveError),
    #[error("duplicate slug `{slug}` shared by {}", join_paths(.paths))]
    DuplicateSlug { slug: String, paths: Vec<PathBuf> },
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub error: DocumentError,
}

impl fmt::Display for DocumentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

impl From<LoadFailure> for DocumentFailure {
    fn from(failure: LoadFailure) -> Self {
        Self {
            path: failure.path,
            error: failure.error.into(),
        }
    }
}

/// A collection with at least one failed document.
#[derive(Error, Debug)]
#[error("collection `{kind}`: {} document(s) failed", .failures.len())]
pub struct BuildFailed {
    pub kind: String,
    pub failures: Vec<DocumentFailure>,
    /// Records that succeeded. Never published.
    pub partial: Collection,
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("build cancelled")]
    Cancelled,
    #[error("{} collection(s) failed to build", .0.len())]
    Failed(Vec<BuildFailed>),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("collection `{kind}`: {source}")]
    Load { kind: String, source: LoadError },
    #[error("cannot start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything the per-document chain needs besides the schema.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub compiler: Compiler,
    pub words_per_minute: u32,
    /// Worker threads for the per-document stage.
    pub threads: usize,
}

impl AssembleOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            compiler: Compiler::new(&config.markup),
            words_per_minute: config.read_time.words_per_minute,
            threads: effective_threads(&config.processing),
        }
    }
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Outcome of assembling one collection, failures included.
#[derive(Debug)]
pub struct AssemblyReport {
    pub collection: Collection,
    pub failures: Vec<DocumentFailure>,
}

impl AssemblyReport {
    pub fn into_result(self) -> Result<Collection, BuildFailed> {
        if self.failures.is_empty() {
            Ok(self.collection)
        } else {
            Err(BuildFailed {
                kind: self.collection.kind().to_string(),
                failures: self.failures,
                partial: self.collection,
            })
        }
    }
}

/// Assemble `kind` from `documents`, failing if any document fails.
pub fn assemble(
    kind: &str,
    schema: &Schema,
    documents: &DocumentSet,
    options: &AssembleOptions,
) -> Result<Collection, BuildError> {
    let report = assemble_report(kind, schema, documents, options, &CancelToken::new())?;
    report
        .into_result()
        .map_err(|failed| BuildError::Failed(vec![failed]))
}

/// Assemble `kind`, returning successes and failures side by side.
///
/// Errors only when cancelled or when the worker pool cannot start.
pub fn assemble_report(
    kind: &str,
    schema: &Schema,
    documents: &DocumentSet,
    options: &AssembleOptions,
    cancel: &CancelToken,
) -> Result<AssemblyReport, BuildError> {
    run_documents(kind, documents, options.threads, cancel, |doc| {
        process_document(doc, schema, options)
    })
}

/// Apply `process` to every document on a pool of `threads` workers, then
/// join in walk order and check slugs.
fn run_documents<F>(
    kind: &str,
    documents: &DocumentSet,
    threads: usize,
    cancel: &CancelToken,
    process: F,
) -> Result<AssemblyReport, BuildError>
where
    F: Fn(&SourceDocument) -> Result<Record, DocumentError> + Sync,
{
    let mut loaded = Vec::new();
    for item in documents.iter() {
        if cancel.is_cancelled() {
            return Err(BuildError::Cancelled);
        }
        loaded.push(item);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()?;
    let outcomes: Vec<Option<Result<Record, DocumentFailure>>> = pool.install(|| {
        loaded
            .into_par_iter()
            .map(|item| {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(match item {
                    Ok(doc) => process(&doc).map_err(|error| DocumentFailure {
                        path: doc.path.clone(),
                        error,
                    }),
                    Err(failure) => Err(failure.into()),
                })
            })
            .collect()
    });
    if cancel.is_cancelled() {
        return Err(BuildError::Cancelled);
    }

    let mut records = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes.into_iter().flatten() {
        match outcome {
            Ok(record) => records.push(record),
            Err(failure) => failures.push(failure),
        }
    }

    let (records, duplicates) = split_duplicate_slugs(records);
    failures.extend(duplicates);

    for failure in &failures {
        warn!(kind, path = %failure.path.display(), "{}", failure.error);
    }
    info!(
        kind,
        records = records.len(),
        failures = failures.len(),
        "assembled collection"
    );

    Ok(AssemblyReport {
        collection: Collection::new(kind, records),
        failures,
    })
}

/// Run one document through validate → compile → derive.
pub fn process_document(
    doc: &SourceDocument,
    schema: &Schema,
    options: &AssembleOptions,
) -> Result<Record, DocumentError> {
    debug!(path = %doc.path.display(), "processing document");
    let raw = parse_front_matter(&doc.front_matter)?;
    let metadata = validate(schema, &raw).map_err(DocumentError::ValidationFailed)?;
    let body = options.compiler.compile(&doc.body)?;
    let derived = derive(doc, schema, &metadata, &body, options.words_per_minute)?;
    Ok(Record {
        path: doc.path.clone(),
        relative_path: doc.relative_path.clone(),
        metadata,
        derived,
        body,
    })
}

/// Separate records whose slug is unique from those that collide.
///
/// Every colliding record becomes a failure naming all paths that share
/// its slug, in walk order.
fn split_duplicate_slugs(records: Vec<Record>) -> (Vec<Record>, Vec<DocumentFailure>) {
    let mut paths_by_slug: BTreeMap<&str, Vec<&Path>> = BTreeMap::new();
    for record in &records {
        paths_by_slug
            .entry(record.slug())
            .or_default()
            .push(&record.path);
    }
    let colliding: BTreeMap<String, Vec<PathBuf>> = paths_by_slug
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|(slug, paths)| {
            (
                slug.to_string(),
                paths.into_iter().map(Path::to_path_buf).collect(),
            )
        })
        .collect();

    let mut unique = Vec::with_capacity(records.len());
    let mut failures = Vec::new();
    for record in records {
        match colliding.get(record.slug()) {
            Some(paths) => failures.push(DocumentFailure {
                error: DocumentError::DuplicateSlug {
                    slug: record.slug().to_string(),
                    paths: paths.clone(),
                },
                path: record.path,
            }),
            None => unique.push(record),
        }
    }
    (unique, failures)
}
