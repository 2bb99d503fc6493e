//! Schema-driven front-matter validation.
//!
//! Phase two of front-matter parsing: converts the untyped
//! [`RawFrontMatter`](crate::loader::RawFrontMatter) map into typed
//! [`Metadata`], one [`FieldValue`] per schema field.
//!
//! ## Coercion rules
//!
//! | Field type        | Accepted input | Result |
//! |-------------------|----------------|--------|
//! | `string`          | non-empty string | trimmed string |
//! | `string-array`    | sequence of strings | trimmed strings (a plain string is *not* split) |
//! | `number`          | number, or string that parses fully (`"12"` ok, `"12px"` rejected) | `f64` |
//! | `optional-string` | string, null, missing | string or `Null` (empty string → `Null`) |
//! | `date`            | string shaped `YYYY-MM-DD...` | original string; parsed later by [`crate::derive`] |
//!
//! Every failing field is reported, not just the first one, so an author can
//! fix a document in one pass. Keys the schema does not declare are ignored.

use crate::loader::RawFrontMatter;
use crate::schema::{FieldType, Schema};
use serde::Serialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;

/// One schema violation in a document's front-matter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub expected: String,
    pub received: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, received {}",
            self.field, self.expected, self.received
        )
    }
}

/// A value that does not fit a field type. Becomes a [`FieldError`] once the
/// field name is known.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub expected: String,
    pub received: String,
}

impl Mismatch {
    fn new(expected: impl Into<String>, received: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            received: received.into(),
        }
    }

    fn for_field(self, field: &str) -> FieldError {
        FieldError {
            field: field.to_string(),
            expected: self.expected,
            received: self.received,
        }
    }
}

/// A validated front-matter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    StringArray(Vec<String>),
    Number(f64),
    /// Date-typed field, kept as authored.
    Date(String),
    /// Absent optional field without a default.
    Null,
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) | FieldValue::Date(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            FieldValue::StringArray(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

/// Typed front-matter of one document. Has an entry for every schema field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, FieldValue>);

impl Metadata {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    /// String or date value of `field`.
    pub fn str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    pub fn strings(&self, field: &str) -> Option<&[String]> {
        self.get(field).and_then(FieldValue::as_strings)
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(FieldValue::as_number)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Apply `schema` to raw front-matter.
///
/// Returns every field error found, in schema field order.
pub fn validate(schema: &Schema, raw: &RawFrontMatter) -> Result<Metadata, Vec<FieldError>> {
    let mut values = BTreeMap::new();
    let mut errors = Vec::new();

    for (name, spec) in schema.fields() {
        let result = match raw.get(name).filter(|v| !v.is_null()) {
            Some(value) => coerce(spec.field_type, value),
            None if spec.is_required() => {
                let received = if raw.contains_key(name) { "null" } else { "missing" };
                Err(Mismatch::new(spec.field_type.describe(), received))
            }
            None => match &spec.default {
                Some(default) => coerce(spec.field_type, default),
                None => Ok(FieldValue::Null),
            },
        };

        match result {
            Ok(value) => {
                values.insert(name.to_string(), value);
            }
            Err(mismatch) => errors.push(mismatch.for_field(name)),
        }
    }

    if errors.is_empty() {
        Ok(Metadata(values))
    } else {
        Err(errors)
    }
}

/// Convert one YAML value to `field_type`.
pub fn coerce(field_type: FieldType, value: &Value) -> Result<FieldValue, Mismatch> {
    let expected = field_type.describe();
    match field_type {
        FieldType::String => match value {
            Value::String(s) if !s.trim().is_empty() => Ok(FieldValue::String(s.trim().into())),
            other => Err(Mismatch::new("non-empty string", describe(other))),
        },
        FieldType::OptionalString => match value {
            Value::Null => Ok(FieldValue::Null),
            Value::String(s) if s.trim().is_empty() => Ok(FieldValue::Null),
            Value::String(s) => Ok(FieldValue::String(s.trim().into())),
            other => Err(Mismatch::new(expected, describe(other))),
        },
        FieldType::StringArray => match value {
            Value::Sequence(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.trim().to_string()),
                    other => Err(Mismatch::new(
                        expected,
                        format!("array containing {}", describe(other)),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::StringArray),
            other => Err(Mismatch::new(expected, describe(other))),
        },
        FieldType::Number => match value {
            Value::Number(n) => n
                .as_f64()
                .filter(|f| f.is_finite())
                .map(FieldValue::Number)
                .ok_or_else(|| Mismatch::new(expected, describe(value))),
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(FieldValue::Number(n)),
                _ => Err(Mismatch::new(expected, describe(value))),
            },
            other => Err(Mismatch::new(expected, describe(other))),
        },
        FieldType::Date => match value {
            Value::String(s) if looks_like_date(s.trim()) => Ok(FieldValue::Date(s.trim().into())),
            other => Err(Mismatch::new(expected, describe(other))),
        },
    }
}

/// Loose shape check: `YYYY-MM-DD`, optionally followed by a time part.
///
/// Calendar correctness (e.g. `2024-02-30`) is checked when the date is parsed.
fn looks_like_date(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() < 10 {
        return false;
    }
    let digits = |range: std::ops::Range<usize>| b[range].iter().all(u8::is_ascii_digit);
    digits(0..4)
        && b[4] == b'-'
        && digits(5..7)
        && b[7] == b'-'
        && digits(8..10)
        && (b.len() == 10 || matches!(b[10], b'T' | b't' | b' '))
}

const MAX_DESCRIBE_LEN: usize = 40;

/// Short description of a YAML value for error reports.
fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) if s.trim().is_empty() => "empty string".into(),
        Value::String(s) => {
            let shown: String = s.chars().take(MAX_DESCRIBE_LEN).collect();
            if shown.len() < s.len() {
                format!("string \"{shown}...\"")
            } else {
                format!("string {s:?}")
            }
        }
        Value::Sequence(_) => "array".into(),
        Value::Mapping(_) => "mapping".into(),
        Value::Tagged(tagged) => format!("tagged value {}", tagged.tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_front_matter;
    use crate::schema::FieldSpec;

    fn schema(fields: &[(&str, FieldSpec)]) -> Schema {
        Schema::new(
            "test",
            fields
                .iter()
                .map(|(name, spec)| (name.to_string(), spec.clone()))
                .collect(),
        )
    }

    fn spec(ty: FieldType) -> FieldSpec {
        FieldSpec::new(ty)
    }

    fn run(schema: &Schema, yaml: &str) -> Result<Metadata, Vec<FieldError>> {
        validate(schema, &parse_front_matter(yaml).unwrap())
    }

    fn error_fields(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    // =========================================================================
    // Required fields and accumulation
    // =========================================================================

    #[test]
    fn valid_document_passes() {
        let s = schema(&[
            ("title", spec(FieldType::String)),
            ("publishDate", spec(FieldType::Date)),
            ("tags", spec(FieldType::StringArray)),
        ]);
        let meta = run(
            &s,
            "title: \"Hello World\"\npublishDate: \"2024-01-01\"\ntags: [\"a\", \"b\"]",
        )
        .unwrap();

        assert_eq!(meta.str("title"), Some("Hello World"));
        assert_eq!(meta.str("publishDate"), Some("2024-01-01"));
        assert_eq!(meta.strings("tags").unwrap(), ["a", "b"]);
    }

    #[test]
    fn missing_required_field_named() {
        let s = schema(&[("title", spec(FieldType::String))]);
        let errors = run(&s, "other: x").unwrap_err();
        assert_eq!(
            errors,
            vec![FieldError {
                field: "title".into(),
                expected: "string".into(),
                received: "missing".into(),
            }]
        );
    }

    #[test]
    fn all_failures_accumulated() {
        let s = schema(&[
            ("a", spec(FieldType::String)),
            ("b", spec(FieldType::String)),
            ("c", spec(FieldType::String)),
        ]);
        let errors = run(&s, "c: present").unwrap_err();
        assert_eq!(error_fields(&errors), vec!["a", "b"]);
    }

    #[test]
    fn explicit_null_reported_as_null() {
        let s = schema(&[("title", spec(FieldType::String))]);
        let errors = run(&s, "title: ~").unwrap_err();
        assert_eq!(errors[0].received, "null");
    }

    #[test]
    fn unknown_fields_ignored() {
        let s = schema(&[("title", spec(FieldType::String))]);
        let meta = run(&s, "title: x\nmood: happy\nlayout: wide").unwrap();
        assert_eq!(meta.len(), 1);
        assert!(meta.get("mood").is_none());
    }

    // =========================================================================
    // Strings
    // =========================================================================

    #[test]
    fn strings_trimmed() {
        let s = schema(&[("title", spec(FieldType::String))]);
        let meta = run(&s, "title: \"  padded  \"").unwrap();
        assert_eq!(meta.str("title"), Some("padded"));
    }

    #[test]
    fn empty_required_string_rejected() {
        let s = schema(&[("title", spec(FieldType::String))]);
        let errors = run(&s, "title: \"   \"").unwrap_err();
        assert_eq!(errors[0].received, "empty string");
    }

    #[test]
    fn number_where_string_expected_rejected() {
        let s = schema(&[("title", spec(FieldType::String))]);
        let errors = run(&s, "title: 2024").unwrap_err();
        assert_eq!(errors[0].received, "number 2024");
    }

    #[test]
    fn optional_string_accepts_missing_null_and_empty() {
        let s = schema(&[("link", spec(FieldType::OptionalString))]);
        assert!(run(&s, "x: 1").unwrap().get("link").unwrap().is_null());
        assert!(run(&s, "link: ~").unwrap().get("link").unwrap().is_null());
        assert!(run(&s, "link: \"\"").unwrap().get("link").unwrap().is_null());
        assert_eq!(
            run(&s, "link: https://example.com").unwrap().str("link"),
            Some("https://example.com")
        );
    }

    #[test]
    fn optional_string_rejects_array() {
        let s = schema(&[("link", spec(FieldType::OptionalString))]);
        let errors = run(&s, "link: [a]").unwrap_err();
        assert_eq!(errors[0].received, "array");
    }

    // =========================================================================
    // Arrays
    // =========================================================================

    #[test]
    fn comma_string_not_split_into_array() {
        let s = schema(&[("tags", spec(FieldType::StringArray))]);
        let errors = run(&s, "tags: \"a, b\"").unwrap_err();
        assert_eq!(errors[0].expected, "array of strings");
        assert_eq!(errors[0].received, "string \"a, b\"");
    }

    #[test]
    fn array_with_non_string_rejected() {
        let s = schema(&[("tags", spec(FieldType::StringArray))]);
        let errors = run(&s, "tags: [a, 3]").unwrap_err();
        assert_eq!(errors[0].received, "array containing number 3");
    }

    #[test]
    fn empty_array_accepted() {
        let s = schema(&[("tags", spec(FieldType::StringArray))]);
        let meta = run(&s, "tags: []").unwrap();
        assert!(meta.strings("tags").unwrap().is_empty());
    }

    // =========================================================================
    // Numbers
    // =========================================================================

    #[test]
    fn numbers_accepted() {
        let s = schema(&[("year", spec(FieldType::Number))]);
        assert_eq!(run(&s, "year: 2023").unwrap().number("year"), Some(2023.0));
        assert_eq!(run(&s, "year: 1.5").unwrap().number("year"), Some(1.5));
        assert_eq!(run(&s, "year: \" 2023 \"").unwrap().number("year"), Some(2023.0));
    }

    #[test]
    fn partial_numeric_prefix_rejected() {
        let s = schema(&[("year", spec(FieldType::Number))]);
        let errors = run(&s, "year: 2023abc").unwrap_err();
        assert_eq!(errors[0].field, "year");
        assert_eq!(errors[0].expected, "number");
    }

    #[test]
    fn non_finite_number_rejected() {
        let s = schema(&[("year", spec(FieldType::Number))]);
        assert!(run(&s, "year: \"NaN\"").is_err());
        assert!(run(&s, "year: .inf").is_err());
    }

    // =========================================================================
    // Dates
    // =========================================================================

    #[test]
    fn date_kept_as_string() {
        let s = schema(&[("publishDate", spec(FieldType::Date))]);
        let meta = run(&s, "publishDate: 2024-01-01T10:30:00Z").unwrap();
        assert_eq!(
            meta.get("publishDate"),
            Some(&FieldValue::Date("2024-01-01T10:30:00Z".into()))
        );
    }

    #[test]
    fn date_shape_checked_loosely() {
        let s = schema(&[("publishDate", spec(FieldType::Date))]);
        assert!(run(&s, "publishDate: 2024-02-30").is_ok());
        assert!(run(&s, "publishDate: January 1st").is_err());
        assert!(run(&s, "publishDate: 2024-1-1").is_err());
        assert!(run(&s, "publishDate: 20240101").is_err());
    }

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn default_used_when_missing() {
        let s = schema(&[(
            "author",
            spec(FieldType::String).with_default("Anonymous".into()),
        )]);
        assert_eq!(run(&s, "x: 1").unwrap().str("author"), Some("Anonymous"));
        assert_eq!(run(&s, "author: Ada").unwrap().str("author"), Some("Ada"));
    }

    #[test]
    fn optional_without_default_is_null() {
        let s = schema(&[("tags", spec(FieldType::StringArray).optional())]);
        assert!(run(&s, "x: 1").unwrap().get("tags").unwrap().is_null());
    }

    #[test]
    fn metadata_serializes_untagged() {
        let s = schema(&[
            ("title", spec(FieldType::String)),
            ("year", spec(FieldType::Number)),
            ("link", spec(FieldType::OptionalString)),
        ]);
        let meta = run(&s, "title: T\nyear: 2020").unwrap();
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"title": "T", "year": 2020.0, "link": null})
        );
    }
}
