//! Document discovery and front-matter splitting.
//!
//! A collection directory is walked recursively; every file whose path
//! (relative to the directory) matches the include glob becomes a
//! [`SourceDocument`]:
//!
//! ```text
//! posts/                          # collection directory
//! ├── hello world.md              # → file_stem "hello world"
//! ├── 2024/
//! │   └── rust-tips.mdx           # → relative_path "2024/rust-tips.mdx"
//! ├── .draft.md                   # hidden, skipped
//! └── notes.txt                   # not matched by **/*.{md,mdx}
//! ```
//!
//! ## Document Layout
//!
//! ```text
//! ignored preamble                # anything before the first `---` is dropped
//! ---
//! title: Hello World              # raw front-matter (YAML key/value pairs)
//! tags: [a, b]
//! ---
//! Body text in markdown.          # raw body
//! ```
//!
//! A delimiter is a line containing only `---` (trailing whitespace allowed).
//! A file without an opening and a closing delimiter is malformed. Failures
//! are yielded per file so one broken document never hides the others.
//!
//! ## Two-Phase Front-Matter Parsing
//!
//! [`parse_front_matter`] is phase one: generic YAML into an untyped
//! [`RawFrontMatter`] map. Phase two, schema-driven conversion into typed
//! values, lives in [`crate::validate`].

use globset::{Glob, GlobMatcher};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Invalid include pattern: {0}")]
    Pattern(#[from] globset::Error),
    #[error("Malformed document: {0}")]
    Malformed(String),
}

/// A per-file load failure. Collected by the assembler, never fatal to the load.
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: LoadError,
}

/// Untyped front-matter: key → YAML value, before schema validation.
pub type RawFrontMatter = BTreeMap<String, serde_yaml::Value>;

/// One document read from disk, split into front-matter and body.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// Path on disk.
    pub path: PathBuf,
    /// Path relative to the collection directory, `/`-separated.
    pub relative_path: String,
    /// File name without its extension.
    pub file_stem: String,
    /// Raw text between the front-matter delimiters.
    pub front_matter: String,
    /// Raw text after the closing delimiter.
    pub body: String,
}

/// The documents of one collection directory.
///
/// Restartable: every call to [`DocumentSet::iter`] walks the directory again
/// and reads files lazily as the iterator advances.
#[derive(Debug, Clone)]
pub struct DocumentSet {
    directory: PathBuf,
    matcher: GlobMatcher,
}

/// Prepare a document set for `directory`, selecting files with `include_pattern`.
///
/// Only the pattern is checked here; nothing is read until iteration.
pub fn load(directory: &Path, include_pattern: &str) -> Result<DocumentSet, LoadError> {
    let matcher = Glob::new(include_pattern)?.compile_matcher();
    Ok(DocumentSet {
        directory: directory.to_path_buf(),
        matcher,
    })
}

impl DocumentSet {
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Walk the directory in file-name order, yielding one item per matching file.
    pub fn iter(&self) -> impl Iterator<Item = Result<SourceDocument, LoadFailure>> + '_ {
        WalkDir::new(&self.directory)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
            .filter_map(move |entry| match entry {
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.directory.clone());
                    Some(Err(LoadFailure {
                        path,
                        error: e.into(),
                    }))
                }
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        return None;
                    }
                    let relative = relative_path(entry.path(), &self.directory);
                    if !self.matcher.is_match(&relative) {
                        return None;
                    }
                    Some(read_document(entry.path(), relative))
                }
            })
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn relative_path(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_document(path: &Path, relative_path: String) -> Result<SourceDocument, LoadFailure> {
    let fail = |error: LoadError| LoadFailure {
        path: path.to_path_buf(),
        error,
    };

    let text = fs::read_to_string(path).map_err(|e| fail(e.into()))?;
    let (front_matter, body) = split_front_matter(&text).map_err(fail)?;
    let file_stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(SourceDocument {
        path: path.to_path_buf(),
        relative_path,
        file_stem,
        front_matter: front_matter.to_string(),
        body: body.to_string(),
    })
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == "---"
}

/// Split a document into `(front_matter, body)` at the first `---` pair.
pub fn split_front_matter(text: &str) -> Result<(&str, &str), LoadError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut offset = 0;
    let mut open_end = None;
    for line in text.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        if !is_delimiter(line) {
            continue;
        }
        match open_end {
            None => open_end = Some(offset),
            Some(front_start) => return Ok((&text[front_start..start], &text[offset..])),
        }
    }

    match open_end {
        None => Err(LoadError::Malformed(
            "missing front-matter block (no `---` delimiter line)".into(),
        )),
        Some(_) => Err(LoadError::Malformed(
            "front-matter block is never closed (missing second `---`)".into(),
        )),
    }
}

/// Parse raw front-matter text into an untyped key/value map.
///
/// An empty block yields an empty map. Anything that is not a YAML mapping
/// with string keys is malformed.
pub fn parse_front_matter(raw: &str) -> Result<RawFrontMatter, LoadError> {
    if raw.trim().is_empty() {
        return Ok(RawFrontMatter::new());
    }
    let value: serde_yaml::Value = serde_yaml::from_str(raw)
        .map_err(|e| LoadError::Malformed(format!("front-matter is not valid YAML: {e}")))?;

    match value {
        serde_yaml::Value::Null => Ok(RawFrontMatter::new()),
        serde_yaml::Value::Mapping(map) => map
            .into_iter()
            .map(|(key, value)| match key {
                serde_yaml::Value::String(key) => Ok((key, value)),
                other => Err(LoadError::Malformed(format!(
                    "front-matter key {other:?} is not a string"
                ))),
            })
            .collect(),
        _ => Err(LoadError::Malformed(
            "front-matter must be a list of `key: value` pairs".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn stems(set: &DocumentSet) -> Vec<String> {
        set.iter()
            .map(|r| {
                r.map(|d| d.file_stem)
                    .unwrap_or_else(|f| format!("ERR {}", f.path.display()))
            })
            .collect()
    }

    // =========================================================================
    // split_front_matter
    // =========================================================================

    #[test]
    fn split_basic_document() {
        let (front, body) = split_front_matter("---\ntitle: Hi\n---\nBody\n").unwrap();
        assert_eq!(front, "title: Hi\n");
        assert_eq!(body, "Body\n");
    }

    #[test]
    fn split_discards_preamble() {
        let (front, body) =
            split_front_matter("preamble text\n---\na: 1\n---\nbody").unwrap();
        assert_eq!(front, "a: 1\n");
        assert_eq!(body, "body");
    }

    #[test]
    fn split_empty_front_matter() {
        let (front, body) = split_front_matter("---\n---\nbody").unwrap();
        assert_eq!(front, "");
        assert_eq!(body, "body");
    }

    #[test]
    fn split_only_first_pair_counts() {
        let (front, body) = split_front_matter("---\na: 1\n---\nx\n---\ny\n").unwrap();
        assert_eq!(front, "a: 1\n");
        assert_eq!(body, "x\n---\ny\n");
    }

    #[test]
    fn split_accepts_crlf_and_trailing_spaces() {
        let (front, body) = split_front_matter("---  \r\na: 1\r\n---\r\nbody").unwrap();
        assert_eq!(front, "a: 1\r\n");
        assert_eq!(body, "body");
    }

    #[test]
    fn split_ignores_dashes_with_other_text() {
        let result = split_front_matter("--- title\na: 1\n----\n");
        assert!(matches!(result, Err(LoadError::Malformed(_))));
    }

    #[test]
    fn split_missing_opener_is_malformed() {
        let result = split_front_matter("just a body\n");
        assert!(matches!(result, Err(LoadError::Malformed(_))));
    }

    #[test]
    fn split_missing_closer_is_malformed() {
        let err = split_front_matter("---\ntitle: x\nbody").unwrap_err();
        assert!(err.to_string().contains("never closed"));
    }

    #[test]
    fn split_strips_bom() {
        let (front, _) = split_front_matter("\u{feff}---\na: 1\n---\n").unwrap();
        assert_eq!(front, "a: 1\n");
    }

    // =========================================================================
    // parse_front_matter
    // =========================================================================

    #[test]
    fn parse_key_values_and_arrays() {
        let raw = "title: \"Hello World\"\npublishDate: 2024-01-01\ntags: [a, b]\nyear: 2023\n";
        let map = parse_front_matter(raw).unwrap();
        assert_eq!(map["title"], serde_yaml::Value::from("Hello World"));
        assert_eq!(map["publishDate"], serde_yaml::Value::from("2024-01-01"));
        assert!(map["tags"].is_sequence());
        assert!(map["year"].is_number());
    }

    #[test]
    fn parse_empty_is_empty_map() {
        assert!(parse_front_matter("").unwrap().is_empty());
        assert!(parse_front_matter("  \n").unwrap().is_empty());
        assert!(parse_front_matter("~").unwrap().is_empty());
    }

    #[test]
    fn parse_non_mapping_is_malformed() {
        assert!(matches!(
            parse_front_matter("- a\n- b\n"),
            Err(LoadError::Malformed(_))
        ));
    }

    #[test]
    fn parse_invalid_yaml_is_malformed() {
        assert!(matches!(
            parse_front_matter("title: [unclosed\n"),
            Err(LoadError::Malformed(_))
        ));
    }

    #[test]
    fn parse_non_string_key_is_malformed() {
        assert!(matches!(
            parse_front_matter("1: one\n"),
            Err(LoadError::Malformed(_))
        ));
    }

    // =========================================================================
    // DocumentSet
    // =========================================================================

    #[test]
    fn load_matches_include_pattern() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "b.md", "---\n---\n");
        write(tmp.path(), "a.mdx", "---\n---\n");
        write(tmp.path(), "notes.txt", "---\n---\n");

        let set = load(tmp.path(), "**/*.{md,mdx}").unwrap();
        assert_eq!(stems(&set), vec!["a", "b"]);
    }

    #[test]
    fn load_recurses_into_subdirectories() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "2024/rust tips.md", "---\ntitle: x\n---\nbody");

        let set = load(tmp.path(), "**/*.md").unwrap();
        let docs: Vec<SourceDocument> = set.iter().map(Result::unwrap).collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].relative_path, "2024/rust tips.md");
        assert_eq!(docs[0].file_stem, "rust tips");
        assert_eq!(docs[0].front_matter, "title: x\n");
        assert_eq!(docs[0].body, "body");
    }

    #[test]
    fn load_skips_hidden_entries() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), ".draft.md", "---\n---\n");
        write(tmp.path(), ".git/x.md", "---\n---\n");
        write(tmp.path(), "ok.md", "---\n---\n");

        let set = load(tmp.path(), "**/*.md").unwrap();
        assert_eq!(stems(&set), vec!["ok"]);
    }

    #[test]
    fn malformed_file_does_not_stop_others() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.md", "no front matter");
        write(tmp.path(), "b.md", "---\ntitle: b\n---\n");

        let set = load(tmp.path(), "*.md").unwrap();
        let items: Vec<_> = set.iter().collect();
        assert_eq!(items.len(), 2);
        let failure = items[0].as_ref().unwrap_err();
        assert!(failure.path.ends_with("a.md"));
        assert!(matches!(failure.error, LoadError::Malformed(_)));
        assert_eq!(items[1].as_ref().unwrap().file_stem, "b");
    }

    #[test]
    fn document_set_is_restartable() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.md", "---\n---\n");

        let set = load(tmp.path(), "*.md").unwrap();
        assert_eq!(stems(&set), vec!["a"]);

        write(tmp.path(), "b.md", "---\n---\n");
        assert_eq!(stems(&set), vec!["a", "b"]);
    }

    #[test]
    fn missing_directory_is_a_failure_item() {
        let tmp = TempDir::new().unwrap();
        let set = load(&tmp.path().join("nope"), "*.md").unwrap();
        let items: Vec<_> = set.iter().collect();
        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0].as_ref().unwrap_err().error,
            LoadError::Walk(_)
        ));
    }

    #[test]
    fn invalid_pattern_rejected_immediately() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            load(tmp.path(), "*.{md"),
            Err(LoadError::Pattern(_))
        ));
    }
}
