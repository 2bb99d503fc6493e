use clap::{Parser, Subcommand};
use folio::assemble::{BuildError, CancelToken};
use folio::pipeline::Pipeline;
use folio::registry::{Collection, CollectionRegistry};
use folio::{config, output};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Typed content collections from markdown documents")]
#[command(long_about = "\
Typed content collections from markdown documents

Every document is a markdown file with a YAML front-matter block. Each
collection directory is validated against its schema, compiled to HTML and
published as a typed collection.

Content structure:

  content/
  ├── config.toml                  # Collections, markup, read time (optional)
  ├── posts/                       # Collection directory (kind = posts)
  │   ├── Hello World.md           # slug: hello-world
  │   └── 2024/rust-tips.mdx       # Subdirectories are walked too
  └── projects/
      └── folio.md

Document layout:

  ---
  title: Hello World               # Front-matter, checked against the schema
  publishDate: 2024-01-15
  tags: [intro, meta]
  ---
  # Hello World                    # Markdown body

  :::callout type=tip              # Embedded blocks: callout, youtube, figure
  Compiled like the rest of the body.
  :::

Set RUST_LOG=debug for per-document diagnostics.
Run 'folio gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Content directory
    #[arg(long, default_value = "content", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    /// Maximum worker threads (capped at the number of cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build all collections and write collections.json
    Build,
    /// Validate content without writing anything
    Check,
    /// Print a collection, or one record of it
    Show {
        /// Collection kind, e.g. `posts`
        kind: String,
        /// Record slug
        slug: Option<String>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Build => {
            let pipeline = load_pipeline(&cli.source, cli.threads)?;
            println!("==> Building {}", cli.source.display());
            let reports = pipeline.build_reports(&CancelToken::new())?;
            output::print_build_report(&reports, &cli.source);
            if reports.iter().any(|r| !r.failures.is_empty()) {
                return Err("build failed; nothing was written".into());
            }

            let collections: BTreeMap<&str, &Collection> = reports
                .iter()
                .map(|r| (r.collection.kind(), &r.collection))
                .collect();
            std::fs::create_dir_all(&cli.output)?;
            let path = cli.output.join("collections.json");
            std::fs::write(&path, serde_json::to_string_pretty(&collections)?)?;
            println!("==> Build complete: {}", path.display());
        }
        Command::Check => {
            let pipeline = load_pipeline(&cli.source, cli.threads)?;
            println!("==> Checking {}", cli.source.display());
            let reports = pipeline.build_reports(&CancelToken::new())?;
            output::print_build_report(&reports, &cli.source);
            if reports.iter().any(|r| !r.failures.is_empty()) {
                return Err("content has errors".into());
            }
            println!("==> Content is valid");
        }
        Command::Show { kind, slug } => {
            let pipeline = load_pipeline(&cli.source, cli.threads)?;
            show(&pipeline, kind, slug.as_deref())?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load `config.toml` from the content root and apply CLI overrides.
fn load_pipeline(
    source: &Path,
    threads: Option<usize>,
) -> Result<Pipeline, Box<dyn std::error::Error>> {
    let mut config = config::load_config(source)?;
    if threads.is_some() {
        config.processing.max_processes = threads;
    }
    Ok(Pipeline::new(source, config)?)
}

/// Build into a fresh registry and print one collection, or one record of it.
fn show(
    pipeline: &Pipeline,
    kind: &str,
    slug: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = CollectionRegistry::new();
    if let Err(e) = pipeline.rebuild(&registry, &CancelToken::new()) {
        if let BuildError::Failed(failed) = &e {
            output::print_build_failures(failed, pipeline.root());
        }
        return Err(e.into());
    }
    match slug {
        Some(slug) => match registry.find_by_slug(kind, slug)? {
            Some(record) => output::print_record(&record),
            None => return Err(format!("no record `{slug}` in `{kind}`").into()),
        },
        None => {
            let collection = registry.get_collection(kind)?;
            output::print_collection(&collection);
        }
    }
    Ok(())
}
