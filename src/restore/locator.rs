//! Artifact location with fixed precedence.
//!
//! For a given version the locator probes the known artifact homes in
//! order, preferring optimized and migrated copies over the original and
//! honoring the legacy areas older repositories still carry.

use crate::repo::context::{
    RepositoryContext, ARCHIVE_EXT, FAST_CODEC_EXT, PATCH_EXT, SMART_EXT_LEGACY,
};
use std::path::PathBuf;

/// What kind of artifact was found, which decides how it is consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Structured stream under the fast codec
    SnapshotLz4,
    /// Structured stream under the higher-ratio codec
    SnapshotZstd,
    /// Legacy uncompressed archive
    LegacyArchive,
    /// Compressed binary patch against the previous version
    Patch,
    /// Self-contained layered-smart delta
    SmartDelta,
}

impl ArtifactKind {
    /// Whether this artifact terminates the backward walk
    pub fn is_base(self) -> bool {
        !matches!(self, ArtifactKind::Patch)
    }
}

/// One located on-disk artifact
#[derive(Debug, Clone)]
pub struct LocatedArtifact {
    /// Version the artifact realizes
    pub version: u32,
    /// Absolute path of the artifact
    pub path: PathBuf,
    /// How to consume it
    pub kind: ArtifactKind,
}

/// Locate the artifact for `version`, probing in precedence order.
pub fn locate(ctx: &RepositoryContext, version: u32) -> Option<LocatedArtifact> {
    let previous = version.checked_sub(1).filter(|b| *b >= 1);

    let mut candidates: Vec<(PathBuf, ArtifactKind)> = vec![
        (ctx.snapshot_path(version), ArtifactKind::SnapshotLz4),
        (
            // Hot snapshots migrated into the deltas area by background
            // maintenance keep the fast codec
            ctx.deltas_dir
                .join(format!("v{}.{}", version, FAST_CODEC_EXT)),
            ArtifactKind::SnapshotLz4,
        ),
        (ctx.optimized_path(version), ArtifactKind::SnapshotZstd),
        (
            ctx.objects_dir.join(format!("v{}.{}", version, ARCHIVE_EXT)),
            ArtifactKind::LegacyArchive,
        ),
    ];

    if let Some(base) = previous {
        candidates.push((ctx.patch_path(version, base), ArtifactKind::Patch));
        candidates.push((ctx.smart_path(version, base), ArtifactKind::SmartDelta));
        candidates.push((
            ctx.deltas_dir
                .join(format!("v{}_from_v{}.{}", version, base, SMART_EXT_LEGACY)),
            ArtifactKind::SmartDelta,
        ));
        candidates.push((
            ctx.objects_dir
                .join("deltas")
                .join(format!("v{}_from_v{}.{}", version, base, PATCH_EXT)),
            ArtifactKind::Patch,
        ));
    }

    candidates
        .into_iter()
        .find(|(path, _)| path.is_file())
        .map(|(path, kind)| LocatedArtifact {
            version,
            path,
            kind,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_precedence_prefers_primary_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path()).unwrap();

        fs::write(ctx.snapshot_path(2), b"snap").unwrap();
        fs::write(ctx.optimized_path(2), b"opt").unwrap();
        fs::write(ctx.patch_path(2, 1), b"patch").unwrap();

        let found = locate(&ctx, 2).unwrap();
        assert_eq!(found.kind, ArtifactKind::SnapshotLz4);
        assert_eq!(found.path, ctx.snapshot_path(2));
    }

    #[test]
    fn test_migrated_hot_snapshot_preferred_over_optimized() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path()).unwrap();

        fs::write(ctx.deltas_dir.join("v2.lz4"), b"migrated").unwrap();
        fs::write(ctx.optimized_path(2), b"opt").unwrap();

        let found = locate(&ctx, 2).unwrap();
        assert_eq!(found.kind, ArtifactKind::SnapshotLz4);
        assert_eq!(found.path, ctx.deltas_dir.join("v2.lz4"));
    }

    #[test]
    fn test_optimized_preferred_over_legacy_and_patch() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path()).unwrap();

        fs::create_dir_all(&ctx.objects_dir).unwrap();
        fs::write(ctx.optimized_path(3), b"opt").unwrap();
        fs::write(ctx.objects_dir.join("v3.tar"), b"legacy").unwrap();
        fs::write(ctx.patch_path(3, 2), b"patch").unwrap();

        let found = locate(&ctx, 3).unwrap();
        assert_eq!(found.kind, ArtifactKind::SnapshotZstd);
    }

    #[test]
    fn test_patch_found_when_no_base_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path()).unwrap();

        fs::write(ctx.patch_path(5, 4), b"patch").unwrap();
        let found = locate(&ctx, 5).unwrap();
        assert_eq!(found.kind, ArtifactKind::Patch);
    }

    #[test]
    fn test_legacy_smart_extension_is_honored() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path()).unwrap();

        fs::write(
            ctx.deltas_dir.join(format!("v4_from_v3.{}", SMART_EXT_LEGACY)),
            b"smart",
        )
        .unwrap();
        let found = locate(&ctx, 4).unwrap();
        assert_eq!(found.kind, ArtifactKind::SmartDelta);
    }

    #[test]
    fn test_canonical_smart_preferred_over_legacy_location_patch() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path()).unwrap();

        fs::create_dir_all(ctx.objects_dir.join("deltas")).unwrap();
        fs::write(ctx.smart_path(4, 3), b"smart").unwrap();
        fs::write(
            ctx.objects_dir.join("deltas").join("v4_from_v3.bsdiff"),
            b"patch",
        )
        .unwrap();

        let found = locate(&ctx, 4).unwrap();
        assert_eq!(found.kind, ArtifactKind::SmartDelta);
        assert_eq!(found.path, ctx.smart_path(4, 3));
    }

    #[test]
    fn test_missing_version_yields_none() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path()).unwrap();
        assert!(locate(&ctx, 9).is_none());
    }

    #[test]
    fn test_version_one_has_no_patch_candidates() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path()).unwrap();
        // Nothing exists; importantly this does not probe v1_from_v0
        assert!(locate(&ctx, 1).is_none());
    }
}
