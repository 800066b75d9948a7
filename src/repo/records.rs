//! Commit record persistence, HEAD management and version bookkeeping.
//!
//! One JSON record is written per version at `commits/v<N>.json` and never
//! mutated afterwards. Durability order within a commit is artifact,
//! record, HEAD; each is fsynced before the next is written so a crash
//! leaves the repository in one of the recoverable states handled by
//! startup repair.

use crate::core::error::{CommitError, Error, Result};
use crate::core::types::{FileMetadata, StagedFile};
use crate::repo::context::RepositoryContext;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// Storage strategy recorded for a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Full structured-stream snapshot under the fast codec
    FastSnapshot,
    /// Binary patch against an earlier version
    BinaryDelta,
    /// Self-contained layered-document delta with semantic change metadata
    LayeredSmartDelta,
}

impl StrategyKind {
    /// Whether artifacts of this strategy stand alone, without a base
    pub fn is_self_contained(self) -> bool {
        matches!(self, StrategyKind::FastSnapshot | StrategyKind::LayeredSmartDelta)
    }
}

/// Compression outcome persisted inside a commit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionInfo {
    /// Storage strategy chosen for this version
    pub strategy: StrategyKind,

    /// Artifact path relative to the repository root
    pub output_file: String,

    /// Uncompressed input bytes
    pub original_size: u64,

    /// Artifact bytes on disk
    pub compressed_size: u64,

    /// `compressed_size / original_size`
    pub compression_ratio: f64,

    /// Version the artifact was computed against, for delta strategies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version: Option<u32>,

    /// Wall-clock milliseconds spent producing the artifact
    pub compression_time_ms: u64,

    /// RFC 3339 creation timestamp
    pub created_at: String,
}

/// One commit record, the durable description of a version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    /// 12-hex-digit commit identifier
    pub hash: String,

    /// Commit message
    pub message: String,

    /// RFC 3339 commit timestamp
    pub timestamp: String,

    /// Author name from configuration
    pub author: String,

    /// Number of staged files in this commit
    pub files_count: usize,

    /// Version number, monotonically increasing from 1
    pub version: u32,

    /// Per-file metadata keyed by logical path
    #[serde(default)]
    pub metadata: BTreeMap<String, FileMetadata>,

    /// Hash of the previous version's record, empty for version 1
    #[serde(default)]
    pub parent_hash: String,

    /// Legacy archive path; only present in records written by older
    /// repositories, never written by this engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_zip: Option<String>,

    /// Storage outcome; authoritative when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_info: Option<CompressionInfo>,
}

/// Derive the 12-hex-digit commit hash.
///
/// The digest covers the message, the version, the current time and each
/// staged file's absolute path, size and modification time.
pub fn compute_commit_hash(message: &str, version: u32, staged: &[StagedFile]) -> String {
    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(message.as_bytes());
    hasher.update(version.to_le_bytes());
    hasher.update(now_nanos.to_le_bytes());
    for file in staged {
        hasher.update(file.absolute_path.to_string_lossy().as_bytes());
        hasher.update(file.size.to_le_bytes());
        hasher.update(file.modified.to_le_bytes());
    }

    hex::encode(&hasher.finalize()[..6])
}

/// Persist a commit record with fsync
pub fn write_record(ctx: &RepositoryContext, record: &CommitRecord) -> Result<()> {
    let json = serde_json::to_vec_pretty(record)?;
    let path = ctx.commit_path(record.version);

    let write = || -> std::io::Result<()> {
        let mut file = File::create(&path)?;
        file.write_all(&json)?;
        file.sync_all()
    };
    write().map_err(|source| {
        Error::Commit(CommitError::RecordWriteFailed {
            version: record.version,
            source,
        })
    })
}

/// Load the commit record of a version
pub fn load_record(ctx: &RepositoryContext, version: u32) -> Result<CommitRecord> {
    let contents = fs::read(ctx.commit_path(version))?;
    Ok(serde_json::from_slice(&contents)?)
}

/// Load the commit record of a version if it exists
pub fn try_load_record(ctx: &RepositoryContext, version: u32) -> Result<Option<CommitRecord>> {
    match fs::read(ctx.commit_path(version)) {
        Ok(contents) => Ok(Some(serde_json::from_slice(&contents)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Largest committed version, 0 when no commits exist
pub fn current_version(ctx: &RepositoryContext) -> Result<u32> {
    let mut max = 0;
    for entry in fs::read_dir(&ctx.commits_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(version) = name
            .strip_prefix('v')
            .and_then(|rest| rest.strip_suffix(".json"))
            .and_then(|digits| digits.parse::<u32>().ok())
        {
            max = max.max(version);
        }
    }
    Ok(max)
}

/// Read HEAD, trimmed; empty when no commits exist
pub fn read_head(ctx: &RepositoryContext) -> Result<String> {
    match fs::read_to_string(&ctx.head_file) {
        Ok(contents) => Ok(contents.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

/// Write HEAD with fsync
pub fn write_head(ctx: &RepositoryContext, hash: &str) -> Result<()> {
    let write = || -> std::io::Result<()> {
        let mut file = File::create(&ctx.head_file)?;
        file.write_all(hash.as_bytes())?;
        file.sync_all()
    };
    write().map_err(|e| Error::Commit(CommitError::HeadUpdateFailed(e)))
}

/// Number of delta hops between a version and the nearest self-contained
/// artifact reachable through `base_version` links.
///
/// Records without `compression_info` are legacy archive snapshots and
/// terminate the chain. A missing base record also terminates the walk;
/// restore will surface the broken chain if it matters.
pub fn chain_length(ctx: &RepositoryContext, version: u32) -> Result<u32> {
    let mut hops = 0;
    let mut cursor = version;

    while cursor >= 1 {
        let Some(record) = try_load_record(ctx, cursor)? else {
            break;
        };
        let Some(info) = record.compression_info else {
            break;
        };
        if info.strategy.is_self_contained() {
            break;
        }

        hops += 1;
        match info.base_version {
            Some(base) if base < cursor => cursor = base,
            _ => break,
        }
    }

    Ok(hops)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(version: u32, strategy: StrategyKind, base: Option<u32>) -> CommitRecord {
        CommitRecord {
            hash: format!("{:012x}", version),
            message: format!("commit {}", version),
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
            author: "test".to_string(),
            files_count: 1,
            version,
            metadata: BTreeMap::new(),
            parent_hash: String::new(),
            snapshot_zip: None,
            compression_info: Some(CompressionInfo {
                strategy,
                output_file: "snapshots/v1.lz4".to_string(),
                original_size: 100,
                compressed_size: 50,
                compression_ratio: 0.5,
                base_version: base,
                compression_time_ms: 1,
                created_at: "2026-01-01T00:00:00+00:00".to_string(),
            }),
        }
    }

    #[test]
    fn test_commit_hash_is_twelve_hex_chars() {
        let hash = compute_commit_hash("initial", 1, &[]);
        assert_eq!(hash.len(), 12);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_record_round_trips_with_fixed_field_names() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path()).unwrap();

        let rec = record(1, StrategyKind::FastSnapshot, None);
        write_record(&ctx, &rec).unwrap();

        let json = fs::read_to_string(ctx.commit_path(1)).unwrap();
        for field in [
            "\"hash\"",
            "\"message\"",
            "\"timestamp\"",
            "\"author\"",
            "\"files_count\"",
            "\"version\"",
            "\"parent_hash\"",
            "\"compression_info\"",
            "\"strategy\"",
            "\"output_file\"",
            "\"original_size\"",
            "\"compressed_size\"",
            "\"compression_ratio\"",
            "\"compression_time_ms\"",
            "\"created_at\"",
            "\"fast_snapshot\"",
        ] {
            assert!(json.contains(field), "missing field {}", field);
        }
        // Legacy-only field is not written for new records
        assert!(!json.contains("snapshot_zip"));

        let back = load_record(&ctx, 1).unwrap();
        assert_eq!(back.hash, rec.hash);
        assert_eq!(back.version, 1);
    }

    #[test]
    fn test_legacy_record_without_compression_info_loads() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path()).unwrap();

        let json = r#"{
            "hash": "abcdef123456",
            "message": "from the old tool",
            "timestamp": "2023-04-01T10:00:00+00:00",
            "author": "legacy",
            "files_count": 2,
            "version": 1,
            "snapshot_zip": "objects/v1.tar"
        }"#;
        fs::write(ctx.commit_path(1), json).unwrap();

        let rec = load_record(&ctx, 1).unwrap();
        assert_eq!(rec.snapshot_zip.as_deref(), Some("objects/v1.tar"));
        assert!(rec.compression_info.is_none());
        assert!(rec.parent_hash.is_empty());
        assert_eq!(chain_length(&ctx, 1).unwrap(), 0);
    }

    #[test]
    fn test_current_version_scans_commit_records() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path()).unwrap();
        assert_eq!(current_version(&ctx).unwrap(), 0);

        write_record(&ctx, &record(1, StrategyKind::FastSnapshot, None)).unwrap();
        write_record(&ctx, &record(2, StrategyKind::BinaryDelta, Some(1))).unwrap();
        write_record(&ctx, &record(10, StrategyKind::BinaryDelta, Some(9))).unwrap();
        assert_eq!(current_version(&ctx).unwrap(), 10);
    }

    #[test]
    fn test_chain_length_counts_delta_hops() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path()).unwrap();

        write_record(&ctx, &record(1, StrategyKind::FastSnapshot, None)).unwrap();
        write_record(&ctx, &record(2, StrategyKind::BinaryDelta, Some(1))).unwrap();
        write_record(&ctx, &record(3, StrategyKind::BinaryDelta, Some(2))).unwrap();

        assert_eq!(chain_length(&ctx, 1).unwrap(), 0);
        assert_eq!(chain_length(&ctx, 2).unwrap(), 1);
        assert_eq!(chain_length(&ctx, 3).unwrap(), 2);
    }

    #[test]
    fn test_chain_length_stops_at_smart_delta() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path()).unwrap();

        write_record(&ctx, &record(1, StrategyKind::FastSnapshot, None)).unwrap();
        write_record(&ctx, &record(2, StrategyKind::LayeredSmartDelta, Some(1))).unwrap();
        write_record(&ctx, &record(3, StrategyKind::BinaryDelta, Some(2))).unwrap();

        assert_eq!(chain_length(&ctx, 2).unwrap(), 0);
        assert_eq!(chain_length(&ctx, 3).unwrap(), 1);
    }

    #[test]
    fn test_head_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path()).unwrap();
        assert_eq!(read_head(&ctx).unwrap(), "");

        write_head(&ctx, "abcdef123456").unwrap();
        assert_eq!(read_head(&ctx).unwrap(), "abcdef123456");
    }
}
