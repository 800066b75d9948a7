//! Repository layout, commit records and HEAD management

/// Resolved repository paths and startup repair
pub mod context;
/// Commit record persistence and version bookkeeping
pub mod records;

pub use context::{RepositoryContext, TempGuard};
pub use records::{CommitRecord, CompressionInfo, StrategyKind};
