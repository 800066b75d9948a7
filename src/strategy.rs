//! Per-commit storage strategy selection.
//!
//! The selector inspects the staged set, the new version number and the
//! current delta-chain length, and decides once; the decision travels as
//! a [`StoragePlan`] value. After a delta is written, the post-hoc
//! acceptance check may still reject it and re-route the commit to a full
//! snapshot.

use crate::core::config::StrategyConfig;
use crate::core::types::StagedFile;
use crate::delta::flavor::{DeltaFlavor, StoragePlan};
use crate::repo::records::{CompressionInfo, StrategyKind};
use tracing::debug;

/// Choose the storage strategy for version `version`.
///
/// `chain_length` is the number of delta hops from the previous version
/// to its nearest self-contained artifact.
pub fn select_strategy(
    config: &StrategyConfig,
    staged: &[StagedFile],
    version: u32,
    chain_length: u32,
) -> StoragePlan {
    // The first version has nothing to diff against
    if version == 1 {
        debug!(version, "first commit, full snapshot");
        return StoragePlan::FullSnapshot;
    }

    // Diffing archives beyond this size costs more than it saves
    if let Some(huge) = staged
        .iter()
        .find(|f| f.size > config.full_snapshot_threshold)
    {
        debug!(
            version,
            path = %huge.logical_path,
            size = huge.size,
            "oversized staged file, full snapshot"
        );
        return StoragePlan::FullSnapshot;
    }

    // Bound chain depth so restore cost stays linear in a small constant
    if chain_length >= config.max_chain_length {
        debug!(version, chain_length, "chain cap reached, full snapshot");
        return StoragePlan::FullSnapshot;
    }

    if let Some(candidate) = staged
        .iter()
        .find(|f| f.size > config.delta_candidate_threshold)
    {
        debug!(
            version,
            path = %candidate.logical_path,
            size = candidate.size,
            "large staged file favors the delta path"
        );
    }

    let base = version - 1;
    match staged.iter().find(|f| f.is_layered(&config.layered_extensions)) {
        Some(layered) => {
            debug!(
                version,
                target = %layered.logical_path,
                "layered document staged, layered-smart delta"
            );
            StoragePlan::Delta {
                base,
                flavor: DeltaFlavor::LayeredSmart {
                    target: layered.clone(),
                },
            }
        }
        None => {
            debug!(version, base, "binary delta");
            StoragePlan::Delta {
                base,
                flavor: DeltaFlavor::Binary,
            }
        }
    }
}

/// Post-hoc acceptance of a written delta artifact.
///
/// Near-total rewrites produce patches almost as large as the data they
/// encode; storing those as deltas inflates the repository and lengthens
/// restore chains for nothing. Layered-smart artifacts are exempt: they
/// store the whole document by design and are kept for the semantic
/// change record they carry.
pub fn accept_delta(config: &StrategyConfig, info: &CompressionInfo) -> bool {
    if info.strategy != StrategyKind::BinaryDelta {
        return true;
    }
    info.compression_ratio <= config.delta_accept_ratio
}
