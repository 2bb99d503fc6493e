//! # Folio
//!
//! Typed content collections from a directory of markdown documents.
//! Each document carries a YAML front-matter block and a markdown body;
//! folio validates the front-matter against a per-kind schema, compiles the
//! body to static HTML, derives a slug, reading time and parsed dates, and
//! publishes the results as immutable, queryable collections.
//!
//! # Architecture: Per-Document Pipeline
//!
//! ```text
//! content/posts/*.md
//!        │
//!        ▼
//! 1. Load       walk + split      →  SourceDocument   (front-matter text, body text)
//! 2. Validate   schema coercion   →  Metadata         (typed field values)
//! 3. Compile    markdown + blocks →  CompiledBody     (HTML, headings, digest)
//! 4. Derive     computed fields   →  DerivedFields    (slug, read time, dates)
//! 5. Assemble   join + slug check →  Collection       (ordered, indexed records)
//! 6. Publish    atomic swap       →  CollectionRegistry
//! ```
//!
//! Steps 1–4 are independent per document and run in parallel on a bounded
//! rayon pool. Step 5 is the only join point. Step 6 happens only when every
//! collection built cleanly.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`schema`] | Field types and the per-kind schema registry |
//! | [`loader`] | Directory walk, front-matter splitting, raw YAML parsing |
//! | [`validate`] | Schema-driven coercion of raw front-matter into [`validate::Metadata`] |
//! | [`compile`] | Markdown to HTML: heading anchors, code highlighting, `:::` blocks |
//! | [`derive`] | Slug, reading time and date parsing |
//! | [`assemble`] | Runs the per-document chain, accumulates failures, checks slugs |
//! | [`registry`] | `Record`, `Collection` and the atomically swapped `CollectionRegistry` |
//! | [`pipeline`] | Builds every configured collection and publishes them |
//! | [`kinds`] | Typed `Post` / `Project` views of stock records |
//! | [`config`] | `config.toml` loading, merging with stock defaults, validation |
//! | [`output`] | CLI output formatting for build reports and queries |
//!
//! # Design Decisions
//!
//! ## Every Failure, One Run
//!
//! A broken document never stops the build early and never silently drops
//! out of a collection. The assembler attempts every document, collects every
//! failure (all invalid fields of a document, not just the first) and fails
//! the build with the complete list. An author fixes everything in one pass.
//!
//! ## Two-Phase Front-Matter
//!
//! YAML is first parsed generically into an untyped map, then coerced field by
//! field against the schema. Keeping the phases apart lets the validator
//! report type errors in the author's terms (`expected number, received string
//! "12px"`) instead of surfacing a deserializer error.
//!
//! ## Closed Field Types
//!
//! Schemas use a fixed set of field types (`string`, `string-array`, `number`,
//! `optional-string`, `date`). Collections are configured in `config.toml`,
//! so adding a kind needs no code.
//!
//! ## Static Blocks
//!
//! Rich blocks (`:::callout`, `:::youtube`, `:::figure`) compile to plain
//! HTML with Maud. Nothing in the output needs a script to render.
//!
//! ## Registry as a Value
//!
//! The [`registry::CollectionRegistry`] is an ordinary object handed to
//! whoever queries it, not a global. Rebuilds replace its whole snapshot
//! through `arc-swap`; readers see either the old collections or the new
//! ones, never a mix.

pub mod assemble;
pub mod compile;
pub mod config;
pub mod derive;
pub mod kinds;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod registry;
pub mod schema;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_helpers;
