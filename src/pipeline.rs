//! Build every configured collection and publish the result.
//!
//! ```text
//! content/config.toml ─► PipelineConfig ─► SchemaRegistry
//!                                              │
//!      for each [collections.<kind>]:          ▼
//!        load(root/directory, include) ─► assemble_report ─► AssemblyReport
//!                                                               │
//!                      all clean? ── yes ─► Vec<Collection> ─► registry.publish
//!                          │
//!                          no ─► BuildError::Failed(every BuildFailed)
//! ```
//!
//! A rebuild is all or nothing: the registry only changes when every
//! collection built cleanly, so a content error never replaces good data
//! with partial data.

use crate::assemble::{
    AssembleOptions, AssemblyReport, BuildError, CancelToken, assemble_report,
};
use crate::config::PipelineConfig;
use crate::loader::load;
use crate::registry::{Collection, CollectionRegistry};
use crate::schema::{SchemaError, SchemaRegistry};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug)]
pub struct Pipeline {
    root: PathBuf,
    config: PipelineConfig,
    schemas: SchemaRegistry,
    options: AssembleOptions,
}

impl Pipeline {
    /// Register one schema per configured collection. Paths resolve against `root`.
    pub fn new(root: impl Into<PathBuf>, config: PipelineConfig) -> Result<Self, SchemaError> {
        let schemas = SchemaRegistry::from_config(&config)?;
        let options = AssembleOptions::from_config(&config);
        Ok(Self {
            root: root.into(),
            config,
            schemas,
            options,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Assemble every collection, keeping failures alongside successes.
    ///
    /// Reports come back in kind-name order.
    pub fn build_reports(
        &self,
        cancel: &CancelToken,
    ) -> Result<Vec<AssemblyReport>, BuildError> {
        let mut reports = Vec::with_capacity(self.config.collections.len());
        for (kind, collection) in &self.config.collections {
            if cancel.is_cancelled() {
                return Err(BuildError::Cancelled);
            }
            let schema = self.schemas.get(kind)?;
            let directory = self.root.join(&collection.directory);
            info!(kind = kind.as_str(), directory = %directory.display(), "building collection");
            let documents =
                load(&directory, &collection.include).map_err(|source| BuildError::Load {
                    kind: kind.clone(),
                    source,
                })?;
            reports.push(assemble_report(kind, &schema, &documents, &self.options, cancel)?);
        }
        Ok(reports)
    }

    /// Assemble every collection; fails with every collection's failures.
    pub fn build(&self, cancel: &CancelToken) -> Result<Vec<Collection>, BuildError> {
        let mut collections = Vec::new();
        let mut failed = Vec::new();
        for report in self.build_reports(cancel)? {
            match report.into_result() {
                Ok(collection) => collections.push(collection),
                Err(build_failed) => failed.push(build_failed),
            }
        }
        if failed.is_empty() {
            Ok(collections)
        } else {
            Err(BuildError::Failed(failed))
        }
    }

    /// Build, then publish to `registry` atomically.
    ///
    /// On any error the registry keeps its previous collections.
    pub fn rebuild(
        &self,
        registry: &CollectionRegistry,
        cancel: &CancelToken,
    ) -> Result<(), BuildError> {
        let collections = self.build(cancel)?;
        info!(collections = collections.len(), "publishing collections");
        registry.publish(collections);
        Ok(())
    }
}
