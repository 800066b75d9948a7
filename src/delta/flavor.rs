//! Storage-plan and delta-flavor values.
//!
//! The strategy selector decides once and passes a value; nothing
//! downstream dispatches on file names or extensions.

use crate::core::types::StagedFile;

/// Flavor of a delta artifact
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaFlavor {
    /// Binary patch between the base and current archives
    Binary,

    /// Semantic layered-document delta targeting one staged document
    LayeredSmart {
        /// The layered document driving the semantic analysis
        target: StagedFile,
    },
}

/// Per-commit storage decision produced by the strategy selector
#[derive(Debug, Clone, PartialEq)]
pub enum StoragePlan {
    /// Store a full structured-stream snapshot under the fast codec
    FullSnapshot,

    /// Store a delta against an earlier version
    Delta {
        /// Version the delta is computed against
        base: u32,
        /// Flavor of the delta artifact
        flavor: DeltaFlavor,
    },
}
