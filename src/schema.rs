//! Per-kind front-matter schemas.
//!
//! A [`Schema`] declares, for one document kind (`posts`, `projects`, ...),
//! which front-matter fields exist, what type each one has, whether it is
//! required, and an optional default. Schemas are pure data: no I/O, and no
//! mutation once registered.
//!
//! The field-type set is closed ([`FieldType`]) so the validator can match on
//! it exhaustively:
//!
//! | `type` in config.toml | Accepts |
//! |-----------------------|---------|
//! | `string`              | scalar string, trimmed |
//! | `string-array`        | sequence of strings |
//! | `number`              | number, or a string that parses fully as one |
//! | `optional-string`     | string, null, or missing |
//! | `date`                | date-shaped string (`YYYY-MM-DD...`), kept as text |
//!
//! The [`SchemaRegistry`] holds one schema per kind. Registering a kind twice
//! or asking for a kind that was never registered are configuration bugs and
//! fail immediately.

use crate::config::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SchemaError {
    #[error("Unknown document kind: {0}")]
    UnknownKind(String),
    #[error("Document kind registered twice: {0}")]
    DuplicateKind(String),
}

/// Semantic type of a front-matter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    String,
    StringArray,
    Number,
    OptionalString,
    #[serde(alias = "date-string")]
    Date,
}

impl FieldType {
    /// Human-readable name used in validation reports.
    pub fn describe(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::StringArray => "array of strings",
            FieldType::Number => "number",
            FieldType::OptionalString => "optional string",
            FieldType::Date => "date string (YYYY-MM-DD)",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Declaration of a single front-matter field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Defaults to `true` for every type except `optional-string`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Value used when the field is absent and not required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_yaml::Value>,
}

impl FieldSpec {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: None,
            default: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = Some(false);
        self
    }

    pub fn with_default(mut self, default: serde_yaml::Value) -> Self {
        self.required = Some(false);
        self.default = Some(default);
        self
    }

    pub fn is_required(&self) -> bool {
        match self.field_type {
            FieldType::OptionalString => false,
            _ => self.required.unwrap_or(true),
        }
    }
}

/// Field constraints for one document kind. Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    kind: String,
    fields: BTreeMap<String, FieldSpec>,
}

impl Schema {
    pub fn new(kind: impl Into<String>, fields: BTreeMap<String, FieldSpec>) -> Self {
        Self {
            kind: kind.into(),
            fields,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Fields in name order. Validation reports follow this order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Names of fields declared with the `date` type.
    pub fn date_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, spec)| spec.field_type == FieldType::Date)
            .map(|(name, _)| name.as_str())
    }
}

/// Registry of schemas keyed by document kind.
///
/// Populated once before any document is loaded, then only read.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry with one schema per configured collection.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, SchemaError> {
        let mut registry = Self::new();
        for (kind, collection) in &config.collections {
            registry.register(kind, collection.fields.clone())?;
        }
        Ok(registry)
    }

    pub fn register(
        &mut self,
        kind: &str,
        fields: BTreeMap<String, FieldSpec>,
    ) -> Result<(), SchemaError> {
        if self.schemas.contains_key(kind) {
            return Err(SchemaError::DuplicateKind(kind.to_string()));
        }
        self.schemas
            .insert(kind.to_string(), Arc::new(Schema::new(kind, fields)));
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Result<Arc<Schema>, SchemaError> {
        self.schemas
            .get(kind)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownKind(kind.to_string()))
    }

    /// Registered kinds in name order.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}
