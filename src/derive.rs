//! Fields computed from a document rather than authored in it.
//!
//! | Field | Source | Rule |
//! |-------|--------|------|
//! | `slug` | file stem | spaces → `-`, lowercased; punctuation kept |
//! | `read_time` | raw body | words ÷ words-per-minute, rounded up, at least 1 |
//! | `dates` | `date` fields | parsed to UTC timestamps |
//!
//! Read time counts the prose a reader actually reads: fenced code blocks
//! (fence lines included) and HTML-like tags are removed before counting
//! whitespace-separated words.

use crate::compile::CompiledBody;
use crate::compile::directives::{fence_closes, fence_opens};
use crate::loader::SourceDocument;
use crate::schema::Schema;
use crate::validate::{FieldValue, Metadata};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeriveError {
    #[error("field `{field}`: cannot parse date `{value}`")]
    DateParse { field: String, value: String },
}

/// Derived fields of one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedFields {
    pub slug: String,
    /// Display form, e.g. `"4 min read"`.
    pub read_time: String,
    pub read_minutes: u32,
    /// Parsed value of every non-null `date` field.
    pub dates: BTreeMap<String, DateTime<Utc>>,
}

/// Compute the derived fields for one validated, compiled document.
pub fn derive(
    doc: &SourceDocument,
    schema: &Schema,
    metadata: &Metadata,
    body: &CompiledBody,
    words_per_minute: u32,
) -> Result<DerivedFields, DeriveError> {
    let mut dates = BTreeMap::new();
    for field in schema.date_fields() {
        if let Some(FieldValue::Date(value)) = metadata.get(field) {
            let parsed = parse_date(value).ok_or_else(|| DeriveError::DateParse {
                field: field.to_string(),
                value: value.clone(),
            })?;
            dates.insert(field.to_string(), parsed);
        }
    }

    let read_minutes = read_minutes(&body.raw, words_per_minute);
    Ok(DerivedFields {
        slug: slug(&doc.file_stem),
        read_time: format_read_time(read_minutes),
        read_minutes,
        dates,
    })
}

/// URL slug from a file stem: `"Hello World"` → `"hello-world"`.
pub fn slug(file_stem: &str) -> String {
    file_stem.replace(' ', "-").to_lowercase()
}

/// Estimated reading time, e.g. `"3 min read"`.
pub fn read_time(raw: &str, words_per_minute: u32) -> String {
    format_read_time(read_minutes(raw, words_per_minute))
}

fn format_read_time(minutes: u32) -> String {
    format!("{minutes} min read")
}

fn read_minutes(raw: &str, words_per_minute: u32) -> u32 {
    let words = count_words(raw);
    let wpm = words_per_minute.max(1);
    words.div_ceil(wpm).max(1)
}

fn count_words(raw: &str) -> u32 {
    let prose = strip_tags(&strip_fenced_code(raw));
    prose.split_whitespace().count() as u32
}

fn strip_fenced_code(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut fence = None;
    for line in raw.lines() {
        match fence {
            Some(marker) => {
                if fence_closes(line, marker) {
                    fence = None;
                }
            }
            None => match fence_opens(line) {
                Some(marker) => fence = Some(marker),
                None => {
                    out.push_str(line);
                    out.push('\n');
                }
            },
        }
    }
    out
}

/// Remove `<...>` runs. An unmatched `<` is kept as text.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        match rest[open..].find('>') {
            Some(close) => {
                out.push_str(&rest[..open]);
                out.push(' ');
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Parse an authored date into UTC.
///
/// Accepts RFC 3339 (`2024-03-01T09:30:00+02:00`), a zoneless date-time
/// (`2024-03-01T09:30[:00]`, `T` or space separated, read as UTC) and a
/// bare date (`2024-03-01`, midnight UTC).
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
