//! Shared test utilities for the folio test suite.
//!
//! Provides fixture setup, lookup helpers and bulk extractors that work with
//! built collections (`Collection`, `Record`).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let collections = build_fixtures(tmp.path());
//!
//! let posts = find_collection(&collections, "posts");
//! let hello = find_record(posts, "hello-world");
//! assert_eq!(hello.read_time(), "1 min read");
//!
//! assert_eq!(record_slugs(posts), ["year-in-review", "hello-world", "rust-tips"]);
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::assemble::CancelToken;
use crate::config::load_config;
use crate::pipeline::Pipeline;
use crate::registry::{Collection, Record};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/content/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/content");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_document(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// Load `root/config.toml` and build every collection. Panics on any failure.
pub fn build_fixtures(root: &Path) -> Vec<Collection> {
    let config = load_config(root).unwrap();
    let pipeline = Pipeline::new(root, config).unwrap();
    pipeline
        .build(&CancelToken::new())
        .unwrap_or_else(|e| panic!("fixture build failed: {e:?}"))
}

// =========================================================================
// Collection lookups: panic listing what exists on a miss
// =========================================================================

/// Find a collection by kind. Panics if not found.
pub fn find_collection<'a>(collections: &'a [Collection], kind: &str) -> &'a Collection {
    collections
        .iter()
        .find(|c| c.kind() == kind)
        .unwrap_or_else(|| {
            let kinds: Vec<&str> = collections.iter().map(|c| c.kind()).collect();
            panic!("collection '{kind}' not found. Available: {kinds:?}")
        })
}

/// Find a record by slug. Panics if not found.
pub fn find_record<'a>(collection: &'a Collection, slug: &str) -> &'a Record {
    collection
        .iter()
        .find(|r| r.slug() == slug)
        .map(|r| r.as_ref())
        .unwrap_or_else(|| {
            let slugs = record_slugs(collection);
            panic!(
                "record '{slug}' not found in '{}'. Available: {slugs:?}",
                collection.kind()
            )
        })
}

// =========================================================================
// Bulk extractors
// =========================================================================

/// All slugs in collection order.
pub fn record_slugs(collection: &Collection) -> Vec<&str> {
    collection.iter().map(|r| r.slug()).collect()
}

/// All heading ids of a record in document order.
pub fn heading_ids(record: &Record) -> Vec<&str> {
    record.body.headings.iter().map(|h| h.id.as_str()).collect()
}
