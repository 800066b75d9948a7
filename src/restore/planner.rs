//! Restoration planning.
//!
//! A plan is one base step followed by zero or more patch steps in
//! forward order. Planning only probes the filesystem; no artifact bytes
//! are read until execution.

use crate::core::error::RestoreError;
use crate::repo::context::RepositoryContext;
use crate::restore::locator::{locate, LocatedArtifact};

/// Ordered steps that reconstruct one version's archive
#[derive(Debug)]
pub struct RestorePlan {
    /// Self-contained artifact the chain starts from
    pub base: LocatedArtifact,

    /// Patches to apply on top of the base, in ascending version order
    pub patches: Vec<LocatedArtifact>,
}

impl RestorePlan {
    /// Number of patch applications execution will perform
    pub fn patch_count(&self) -> usize {
        self.patches.len()
    }
}

/// Build the restoration plan for `target`.
///
/// The walk follows `delta -> base version` links backward until it
/// reaches a self-contained artifact. A missing artifact at the target
/// itself is [`RestoreError::ArtifactMissing`]; one further down the
/// chain is [`RestoreError::ChainBroken`].
pub fn plan(ctx: &RepositoryContext, target: u32) -> Result<RestorePlan, RestoreError> {
    let mut patches = Vec::new();
    let mut cursor = target;

    loop {
        let artifact = locate(ctx, cursor).ok_or({
            if cursor == target {
                RestoreError::ArtifactMissing(cursor)
            } else {
                RestoreError::ChainBroken(cursor)
            }
        })?;

        if artifact.kind.is_base() {
            patches.reverse();
            return Ok(RestorePlan {
                base: artifact,
                patches,
            });
        }

        patches.push(artifact);
        // Patch artifacts are always computed against the immediately
        // preceding version
        cursor -= 1;
        if cursor == 0 {
            return Err(RestoreError::ChainBroken(1));
        }
    }
}
