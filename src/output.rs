//! CLI output formatting for builds and queries.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Every record leads
//! with its positional index and title; the slug, reading time and source
//! file follow as context. Failures are listed under the collection they
//! belong to, one line per problem, so an author can fix everything in one
//! pass.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! posts (2 records, 1 failed)
//!     001 Hello World → hello-world (1 min read)
//!         Source: posts/hello world.md
//!     002 Rust Tips → rust-tips (3 min read)
//!         Source: posts/rust-tips.md
//!     FAILED posts/draft.md
//!         title: expected string, received number 42
//!         publishDate: expected date string (YYYY-MM-DD), received missing
//!
//! Built 1 collection: 2 records, 1 failure
//! ```
//!
//! ## Show record
//!
//! ```text
//! Hello World → hello-world
//!     Source: hello world.md
//!     Read time: 1 min read
//!     publishDate: 2024-01-15 (2024-01-15T00:00:00+00:00)
//!     tags: rust, web
//!     Contents
//!         Introduction (#introduction)
//!             Setup (#setup)
//!     HTML: 1843 bytes, sha256 3f2a9c…
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::assemble::{AssemblyReport, BuildFailed, DocumentError, DocumentFailure};
use crate::registry::{Collection, Record};
use crate::validate::FieldValue;
use std::path::Path;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Plural suffix helper: `plural(1, "record")` → `"1 record"`.
fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

/// Human title of a record: `title`, then `name`, then the slug.
fn display_title(record: &Record) -> &str {
    record
        .metadata
        .str("title")
        .or_else(|| record.metadata.str("name"))
        .unwrap_or_else(|| record.slug())
}

/// Record header line.
///
/// ```text
/// 001 Hello World → hello-world (1 min read)
/// ```
fn record_line(index: usize, record: &Record) -> String {
    format!(
        "{} {} → {} ({})",
        format_index(index),
        display_title(record),
        record.slug(),
        record.read_time()
    )
}

/// Path shown relative to `root` when it lies inside it.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn format_value(value: &FieldValue) -> String {
    match value {
        FieldValue::String(s) | FieldValue::Date(s) => s.clone(),
        FieldValue::StringArray(items) => items.join(", "),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Null => "(none)".to_string(),
    }
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// ============================================================================
// Failures
// ============================================================================

/// One failed document: a `FAILED` header plus one line per problem.
fn failure_lines(failure: &DocumentFailure, source_root: &Path, depth: usize) -> Vec<String> {
    let base = indent(depth);
    let mut lines = vec![format!(
        "{}FAILED {}",
        base,
        display_path(&failure.path, source_root)
    )];
    match &failure.error {
        DocumentError::ValidationFailed(errors) => {
            lines.extend(errors.iter().map(|e| format!("{base}    {e}")));
        }
        DocumentError::DuplicateSlug { slug, paths } => {
            lines.push(format!("{base}    duplicate slug `{slug}`, also used by:"));
            lines.extend(
                paths
                    .iter()
                    .filter(|p| **p != failure.path)
                    .map(|p| format!("{base}        {}", display_path(p, source_root))),
            );
        }
        other => lines.push(format!("{base}    {other}")),
    }
    lines
}

// ============================================================================
// Build output
// ============================================================================

/// Format the outcome of a build: each collection, its records and failures.
pub fn format_build_report(reports: &[AssemblyReport], source_root: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    for report in reports {
        let collection = &report.collection;
        let header = if report.failures.is_empty() {
            format!("{} ({})", collection.kind(), plural(collection.len(), "record"))
        } else {
            format!(
                "{} ({}, {} failed)",
                collection.kind(),
                plural(collection.len(), "record"),
                report.failures.len()
            )
        };
        lines.push(header);

        for (i, record) in collection.iter().enumerate() {
            lines.push(format!("{}{}", indent(1), record_line(i + 1, record)));
            lines.push(format!(
                "{}Source: {}",
                indent(2),
                display_path(&record.path, source_root)
            ));
        }
        for failure in &report.failures {
            lines.extend(failure_lines(failure, source_root, 1));
        }
        lines.push(String::new());
    }

    lines.push(format_summary(reports));
    lines
}

/// One-line totals: `Built 2 collections: 5 records, 0 failures`.
pub fn format_summary(reports: &[AssemblyReport]) -> String {
    let records: usize = reports.iter().map(|r| r.collection.len()).sum();
    let failures: usize = reports.iter().map(|r| r.failures.len()).sum();
    format!(
        "Built {}: {}, {}",
        plural(reports.len(), "collection"),
        plural(records, "record"),
        plural(failures, "failure")
    )
}

pub fn print_build_report(reports: &[AssemblyReport], source_root: &Path) {
    for line in format_build_report(reports, source_root) {
        println!("{}", line);
    }
}

/// Format only the failures of failed collections.
pub fn format_build_failures(failed: &[BuildFailed], source_root: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    for build in failed {
        lines.push(format!(
            "{} ({} failed)",
            build.kind,
            plural(build.failures.len(), "document")
        ));
        for failure in &build.failures {
            lines.extend(failure_lines(failure, source_root, 1));
        }
    }
    lines
}

pub fn print_build_failures(failed: &[BuildFailed], source_root: &Path) {
    for line in format_build_failures(failed, source_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Query output
// ============================================================================

/// Format a collection listing for `show <kind>`.
pub fn format_collection(collection: &Collection) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({})",
        collection.kind(),
        plural(collection.len(), "record")
    )];
    for (i, record) in collection.iter().enumerate() {
        lines.push(format!("{}{}", indent(1), record_line(i + 1, record)));
        if let Some(description) = record.metadata.str("description") {
            lines.push(format!("{}{}", indent(2), truncate(description, 60)));
        }
    }
    lines
}

/// Format one record in full for `show <kind> <slug>`.
pub fn format_record(record: &Record) -> Vec<String> {
    let mut lines = vec![format!("{} → {}", display_title(record), record.slug())];
    let d1 = indent(1);

    lines.push(format!("{d1}Source: {}", record.relative_path));
    lines.push(format!("{d1}Read time: {}", record.read_time()));

    for (field, value) in record.metadata.iter() {
        match record.date(field) {
            Some(parsed) => lines.push(format!(
                "{d1}{field}: {} ({})",
                format_value(value),
                parsed.to_rfc3339()
            )),
            None => lines.push(format!("{d1}{field}: {}", format_value(value))),
        }
    }

    if !record.body.headings.is_empty() {
        lines.push(format!("{d1}Contents"));
        let top = record
            .body
            .headings
            .iter()
            .map(|h| h.level)
            .min()
            .unwrap_or(1);
        for heading in &record.body.headings {
            let depth = 2 + usize::from(heading.level - top);
            lines.push(format!("{}{} (#{})", indent(depth), heading.text, heading.id));
        }
    }

    lines.push(format!(
        "{d1}HTML: {} bytes, sha256 {}",
        record.html().len(),
        truncate(&record.body.digest, 12)
    ));
    lines
}

pub fn print_collection(collection: &Collection) {
    for line in format_collection(collection) {
        println!("{}", line);
    }
}

pub fn print_record(record: &Record) {
    for line in format_record(record) {
        println!("{}", line);
    }
}
