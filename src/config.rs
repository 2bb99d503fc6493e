//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. The file lives in
//! the content root; every path inside it is relative to that root.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [collections.posts]
//! directory = "posts"           # Relative to the content root
//! include = "**/*.{md,mdx}"     # Glob matched against paths inside `directory`
//!
//! [collections.posts.fields]
//! title = { type = "string" }
//! publishDate = { type = "date" }
//! tags = { type = "string-array" }
//! author = { type = "string", default = "Anonymous" }
//!
//! [markup]
//! extensions = ["callout", "youtube", "figure"]  # Embedded block types
//!
//! [read_time]
//! words_per_minute = 300
//!
//! [processing]
//! max_processes = 4             # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want. The one
//! exception is `[collections]`: if the user file declares any collection,
//! the stock `posts`/`projects` collections are dropped and only the user's
//! collections are built. Merging collection by collection would leave stock
//! kinds pointing at directories that do not exist.
//!
//! Unknown keys are rejected to catch typos early.

use crate::compile::directives::BUILTIN_BLOCKS;
use crate::schema::{FieldSpec, FieldType};
use crate::validate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the configuration file inside the content root.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// One entry per document kind, keyed by kind name.
    pub collections: BTreeMap<String, CollectionConfig>,
    /// Body compiler settings.
    pub markup: MarkupConfig,
    /// Reading-time estimate settings.
    pub read_time: ReadTimeConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collections: stock_collections(),
            markup: MarkupConfig::default(),
            read_time: ReadTimeConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_time.words_per_minute == 0 {
            return Err(ConfigError::Validation(
                "read_time.words_per_minute must be greater than zero".into(),
            ));
        }
        for ext in &self.markup.extensions {
            if !BUILTIN_BLOCKS.contains(&ext.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "markup.extensions: unknown block type '{ext}' (known: {})",
                    BUILTIN_BLOCKS.join(", ")
                )));
            }
        }
        for (kind, collection) in &self.collections {
            collection.validate(kind)?;
        }
        Ok(())
    }
}

/// Where one document kind lives and what its front-matter looks like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionConfig {
    /// Directory holding the documents, relative to the content root.
    pub directory: String,
    /// Glob selecting documents inside `directory`.
    #[serde(default = "default_include")]
    pub include: String,
    /// Front-matter schema for this kind.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
}

fn default_include() -> String {
    "**/*.{md,mdx}".to_string()
}

impl CollectionConfig {
    fn validate(&self, kind: &str) -> Result<(), ConfigError> {
        if self.directory.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "collections.{kind}.directory must not be empty"
            )));
        }
        if let Err(e) = globset::Glob::new(&self.include) {
            return Err(ConfigError::Validation(format!(
                "collections.{kind}.include: {e}"
            )));
        }
        for (name, spec) in &self.fields {
            if spec.field_type == FieldType::OptionalString && spec.required == Some(true) {
                return Err(ConfigError::Validation(format!(
                    "collections.{kind}.fields.{name}: optional-string cannot be required"
                )));
            }
            if let Some(default) = &spec.default
                && let Err(e) = validate::coerce(spec.field_type, default)
            {
                return Err(ConfigError::Validation(format!(
                    "collections.{kind}.fields.{name}: default must be {}, got {}",
                    e.expected, e.received
                )));
            }
        }
        Ok(())
    }
}

/// Body compiler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkupConfig {
    /// Embedded block types (`:::name`) the compiler accepts.
    pub extensions: Vec<String>,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            extensions: BUILTIN_BLOCKS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Reading-time estimate settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadTimeConfig {
    pub words_per_minute: u32,
}

impl Default for ReadTimeConfig {
    fn default() -> Self {
        Self {
            words_per_minute: 300,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of documents compiled in parallel.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

fn stock_collections() -> BTreeMap<String, CollectionConfig> {
    let field = |name: &str, ty: FieldType| (name.to_string(), FieldSpec::new(ty));

    let posts = CollectionConfig {
        directory: "posts".to_string(),
        include: default_include(),
        fields: BTreeMap::from([
            field("title", FieldType::String),
            field("publishDate", FieldType::Date),
            field("description", FieldType::String),
            field("category", FieldType::String),
            field("tags", FieldType::StringArray),
            field("thumbnail", FieldType::String),
            field("author", FieldType::String),
        ]),
    };
    let projects = CollectionConfig {
        directory: "projects".to_string(),
        include: default_include(),
        fields: BTreeMap::from([
            field("name", FieldType::String),
            field("year", FieldType::Number),
            field("studyCase", FieldType::String),
            field("description", FieldType::String),
            field("techStack", FieldType::StringArray),
            field("thumbnail", FieldType::String),
            field("linkLive", FieldType::OptionalString),
            field("linkGithub", FieldType::OptionalString),
        ]),
    };

    BTreeMap::from([
        ("posts".to_string(), posts),
        ("projects".to_string(), projects),
    ])
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    mut base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => {
            if ov.get("collections").is_some()
                && let toml::Value::Table(table) = &mut base
            {
                table.remove("collections");
            }
            merge_toml(base, ov)
        }
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the content root.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Folio Configuration
# ===================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file in the content root. Paths are relative to that root.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Collections
# ---------------------------------------------------------------------------
# One table per document kind. Declaring any collection here replaces the
# stock `posts` and `projects` collections entirely.
#
# Field types: string, string-array, number, optional-string, date
# Fields are required unless `required = false`, a `default` is given, or
# the type is optional-string. Front-matter keys not listed are ignored.

[collections.posts]
directory = "posts"
include = "**/*.{md,mdx}"

[collections.posts.fields]
title = { type = "string" }
publishDate = { type = "date" }
description = { type = "string" }
category = { type = "string" }
tags = { type = "string-array" }
thumbnail = { type = "string" }
author = { type = "string" }

[collections.projects]
directory = "projects"
include = "**/*.{md,mdx}"

[collections.projects.fields]
name = { type = "string" }
year = { type = "number" }
studyCase = { type = "string" }
description = { type = "string" }
techStack = { type = "string-array" }
thumbnail = { type = "string" }
linkLive = { type = "optional-string" }
linkGithub = { type = "optional-string" }

# ---------------------------------------------------------------------------
# Markup
# ---------------------------------------------------------------------------
[markup]
# Embedded block types accepted in document bodies (`:::name ... :::`).
# A block whose type is not listed here fails the build.
extensions = ["callout", "youtube", "figure"]

# ---------------------------------------------------------------------------
# Reading time
# ---------------------------------------------------------------------------
[read_time]
# Words per minute used for the "<N> min read" estimate.
words_per_minute = 300

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum documents compiled in parallel.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
