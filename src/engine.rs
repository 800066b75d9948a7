//! The version store: commit orchestration and the engine surface.
//!
//! A commit is a single serialized operation producing artifact, commit
//! record and HEAD update in that order, each durable before the next is
//! written. The engine is synchronous on its critical path; the only
//! background work is the optional snapshot optimization.

use crate::analyze::LayerTree;
use crate::core::config::EngineConfig;
use crate::core::error::{CommitError, Error, Result};
use crate::core::types::{FileMetadata, StagedFile};
use crate::delta::flavor::StoragePlan;
use crate::delta::writer::write_delta;
use crate::repo::context::RepositoryContext;
use crate::repo::records::{self, CommitRecord, CompressionInfo, StrategyKind};
use crate::snapshot::optimizer::OptimizationScheduler;
use crate::snapshot::writer::write_snapshot;
use crate::status::{self, StatusReport};
use crate::strategy::select_strategy;
use crate::{restore, strategy};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// File-type scanner collaborator.
///
/// The engine consumes scan results through this seam; the real scanner
/// lives outside the storage engine and understands document internals.
pub trait FileScanner: Send + Sync {
    /// Metadata for one staged file, persisted into the commit record
    fn scan(&self, file: &StagedFile) -> Result<FileMetadata>;

    /// Parse a layered document's layer tree, `None` when the scanner
    /// cannot interpret the file
    fn parse_layers(&self, path: &Path) -> Result<Option<LayerTree>>;
}

/// Default scanner: extension-driven metadata, no layer parsing
pub struct GenericScanner;

impl FileScanner for GenericScanner {
    fn scan(&self, file: &StagedFile) -> Result<FileMetadata> {
        Ok(FileMetadata::generic_for(file))
    }

    fn parse_layers(&self, _path: &Path) -> Result<Option<LayerTree>> {
        Ok(None)
    }
}

/// Version-control store over one repository root.
pub struct VersionStore {
    ctx: Arc<RepositoryContext>,
    config: EngineConfig,
    scanner: Arc<dyn FileScanner>,
    optimizer: OptimizationScheduler,
}

impl VersionStore {
    /// Open a repository with the default scanner.
    ///
    /// Runs startup repair: leftover temp files are swept, orphaned
    /// artifacts garbage-collected and HEAD re-pointed at the newest
    /// commit record.
    pub fn open(root: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        Self::with_scanner(root, config, Arc::new(GenericScanner))
    }

    /// Open a repository with a caller-provided scanner collaborator
    pub fn with_scanner(
        root: impl AsRef<Path>,
        config: EngineConfig,
        scanner: Arc<dyn FileScanner>,
    ) -> Result<Self> {
        config.validate()?;
        let ctx = Arc::new(RepositoryContext::open(root.as_ref())?);
        ctx.startup_repair()?;

        let optimizer = OptimizationScheduler::new(config.optimize.clone());
        Ok(Self {
            ctx,
            config,
            scanner,
            optimizer,
        })
    }

    /// Repository context, mainly for collaborating components and tests
    pub fn context(&self) -> &RepositoryContext {
        &self.ctx
    }

    /// Largest committed version, 0 when the repository is empty
    pub fn current_version(&self) -> Result<u32> {
        records::current_version(&self.ctx)
    }

    /// Delta hops between `version` and its nearest self-contained artifact
    pub fn chain_length(&self, version: u32) -> Result<u32> {
        records::chain_length(&self.ctx, version)
    }

    /// Commit the staged files as the next version.
    ///
    /// Selects a storage strategy, writes the artifact, then persists the
    /// commit record and advances HEAD. A delta attempt that produces a
    /// poor ratio or fails outright is retried as a full snapshot; the
    /// user is informed through the log, not failed.
    pub fn create_commit(&self, message: &str, staged: &[StagedFile]) -> Result<CommitRecord> {
        if staged.is_empty() {
            return Err(CommitError::NoStagedFiles.into());
        }

        let version = self.current_version()? + 1;
        let chain_length = if version > 1 {
            records::chain_length(&self.ctx, version - 1)?
        } else {
            0
        };

        let plan = select_strategy(&self.config.strategy, staged, version, chain_length);
        let compression_info = self.execute_plan(&plan, version, staged)?;

        // Metadata for every staged file, from the scanner collaborator
        let mut metadata = BTreeMap::new();
        for file in staged {
            let scanned = self.scanner.scan(file).map_err(|e| {
                Error::Commit(CommitError::MetadataScanFailed {
                    path: file.logical_path.clone(),
                    reason: e.to_string(),
                })
            })?;
            metadata.insert(file.logical_path.clone(), scanned);
        }

        let parent_hash = if version == 1 {
            String::new()
        } else {
            records::load_record(&self.ctx, version - 1)?.hash
        };

        let record = CommitRecord {
            hash: records::compute_commit_hash(message, version, staged),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            author: self.config.author.clone(),
            files_count: staged.len(),
            version,
            metadata,
            parent_hash,
            snapshot_zip: None,
            compression_info: Some(compression_info.clone()),
        };

        records::write_record(&self.ctx, &record)?;
        records::write_head(&self.ctx, &record.hash)?;

        info!(
            version,
            hash = %record.hash,
            strategy = ?compression_info.strategy,
            "commit created"
        );

        if compression_info.strategy == StrategyKind::FastSnapshot {
            self.optimizer.schedule(self.ctx.clone(), version);
        }

        Ok(record)
    }

    /// Write the artifact the plan calls for, handling delta fallbacks
    fn execute_plan(
        &self,
        plan: &StoragePlan,
        version: u32,
        staged: &[StagedFile],
    ) -> Result<CompressionInfo> {
        let expansion_limit = self.config.strategy.snapshot_expansion_limit;

        let StoragePlan::Delta { base, flavor } = plan else {
            return Ok(write_snapshot(&self.ctx, version, staged, expansion_limit)?);
        };

        match write_delta(&self.ctx, self.scanner.as_ref(), version, *base, staged, flavor) {
            Ok(info) if strategy::accept_delta(&self.config.strategy, &info) => Ok(info),
            Ok(info) => {
                info!(
                    version,
                    ratio = info.compression_ratio,
                    "delta ratio above acceptance threshold, storing full snapshot instead"
                );
                let _ = fs::remove_file(self.ctx.root().join(&info.output_file));
                Ok(write_snapshot(&self.ctx, version, staged, expansion_limit)?)
            }
            Err(e) => {
                warn!(version, error = %e, "delta failed, storing full snapshot instead");
                Ok(write_snapshot(&self.ctx, version, staged, expansion_limit)?)
            }
        }
    }

    /// Per-path SHA-256 of every file materialized at `version`
    pub fn get_snapshot_file_hashes(&self, version: u32) -> Result<BTreeMap<String, String>> {
        status::snapshot_file_hashes(&self.ctx, version)
    }

    /// Restore a version's files over a working tree
    pub fn restore_to_version(&self, version: u32, working_root: &Path) -> Result<()> {
        restore::restore_to_version(&self.ctx, version, working_root)
    }

    /// Compare a committed version against a working tree
    pub fn working_tree_status(&self, version: u32, working_root: &Path) -> Result<StatusReport> {
        status::working_tree_status(&self.ctx, version, working_root)
    }

    /// Wait for background optimization to finish without cancelling it
    pub fn join_background_tasks(&self) {
        self.optimizer.join_all();
    }

    /// Cancel pending background work and join outstanding tasks
    pub fn shutdown(&self) {
        self.optimizer.shutdown();
    }
}
