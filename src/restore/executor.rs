//! Restoration execution.
//!
//! Materializes a plan into an archive: the base step is rewritten into
//! the byte-stable archive form, then each patch is applied forward with
//! a fresh temp file per step. Every temp file is removed on every exit
//! path, and the final archive bytes are deterministic for a given
//! repository state.

use crate::archive;
use crate::core::error::{Error, RestoreError, Result};
use crate::delta::layered;
use crate::repo::context::{RepositoryContext, TempGuard};
use crate::restore::locator::{ArtifactKind, LocatedArtifact};
use crate::restore::planner::plan;
use crate::stream;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Materialize the archive realizing `version` at `dest`.
///
/// Used by the working-tree restore, the fingerprint pipeline, and the
/// delta writer's base-archive step.
pub fn materialize_archive(ctx: &RepositoryContext, version: u32, dest: &Path) -> Result<()> {
    let plan = plan(ctx, version).map_err(Error::Restore)?;
    debug!(
        version,
        base = plan.base.version,
        patches = plan.patch_count(),
        "executing restore plan"
    );

    // Base step straight into `dest` when no patches follow
    if plan.patches.is_empty() {
        return materialize_base(ctx, &plan.base, dest);
    }

    let mut current = ctx.temp_path(&format!("restore_base_v{}", plan.base.version), "tar");
    let mut current_guard = TempGuard::new(&current);
    materialize_base(ctx, &plan.base, &current)?;

    for (index, patch) in plan.patches.iter().enumerate() {
        let last = index + 1 == plan.patches.len();
        let next = if last {
            dest.to_path_buf()
        } else {
            ctx.temp_path(&format!("restore_step_v{}", patch.version), "tar")
        };
        let next_guard = TempGuard::new(&next);

        apply_patch(&current, &patch.path, &next, patch.version)?;

        // The previous step's archive is no longer needed
        drop(current_guard);
        current = next;
        current_guard = next_guard;
    }

    current_guard.disarm();
    Ok(())
}

/// Restore a version's files over a working tree.
///
/// Existing files are overwritten; files that did not exist at `version`
/// are left untouched.
pub fn restore_to_version(
    ctx: &RepositoryContext,
    version: u32,
    working_root: &Path,
) -> Result<()> {
    let archive_tmp = ctx.temp_path(&format!("restore_v{}", version), "tar");
    let _guard = TempGuard::new(&archive_tmp);

    materialize_archive(ctx, version, &archive_tmp)?;
    archive::unpack_to_dir(&archive_tmp, working_root)?;

    info!(version, root = %working_root.display(), "restored working tree");
    Ok(())
}

/// Rewrite a base artifact into archive form at `dest`
fn materialize_base(ctx: &RepositoryContext, base: &LocatedArtifact, dest: &Path) -> Result<()> {
    let guard = TempGuard::new(dest);
    match base.kind {
        ArtifactKind::SnapshotLz4 => {
            let mut reader = stream::open_lz4(&base.path)?;
            archive::stream_to_archive(&mut reader, dest)?;
        }
        ArtifactKind::SnapshotZstd => {
            let mut reader = stream::open_zstd(&base.path)?;
            archive::stream_to_archive(&mut reader, dest)?;
        }
        ArtifactKind::LegacyArchive => {
            fs::copy(&base.path, dest)?;
        }
        ArtifactKind::SmartDelta => {
            // The single embedded document is the entire content
            let (metadata, mut content) = layered::open_envelope(&base.path)?;
            archive::single_entry_archive(&metadata.target_file, &mut content, dest)?;
        }
        ArtifactKind::Patch => {
            // The planner never hands a patch in base position
            return Err(Error::Restore(RestoreError::ChainBroken(base.version)));
        }
    }
    guard.disarm();
    Ok(())
}

/// Apply one compressed binary patch, producing the next archive
fn apply_patch(current: &Path, patch: &Path, next: &Path, version: u32) -> Result<()> {
    let base_bytes = fs::read(current)?;
    let compressed = fs::read(patch)?;

    let patch_bytes = zstd::decode_all(compressed.as_slice()).map_err(|e| {
        Error::Restore(RestoreError::PatchFailed {
            version,
            reason: format!("patch decompression failed: {}", e),
        })
    })?;

    let mut output = Vec::new();
    bsdiff::patch(&base_bytes, &mut patch_bytes.as_slice(), &mut output).map_err(|e| {
        Error::Restore(RestoreError::PatchFailed {
            version,
            reason: e.to_string(),
        })
    })?;

    fs::write(next, &output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::StagedFile;
    use crate::delta::flavor::DeltaFlavor;
    use crate::delta::writer::write_delta;
    use crate::engine::GenericScanner;
    use crate::snapshot::writer::write_snapshot;

    fn staged_fixture(dir: &Path, name: &str, content: &[u8]) -> StagedFile {
        let abs = dir.join(name);
        fs::write(&abs, content).unwrap();
        StagedFile::from_paths(abs, name).unwrap()
    }

    fn archive_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
        let mut entries = Vec::new();
        archive::for_each_entry(path, |name, content| {
            let mut buf = Vec::new();
            std::io::Read::read_to_end(content, &mut buf).unwrap();
            entries.push((name.to_string(), buf));
            Ok(())
        })
        .unwrap();
        entries
    }

    #[test]
    fn test_restore_snapshot_version() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path().join("repo")).unwrap();

        let staged = vec![
            staged_fixture(tmp.path(), "a.txt", b"hello\n"),
            staged_fixture(tmp.path(), "b.bin", &[7, 7, 7]),
        ];
        write_snapshot(&ctx, 1, &staged, 1.2).unwrap();

        let out = tmp.path().join("v1.tar");
        materialize_archive(&ctx, 1, &out).unwrap();

        let entries = archive_entries(&out);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("a.txt".to_string(), b"hello\n".to_vec()));
        assert_eq!(entries[1], ("b.bin".to_string(), vec![7, 7, 7]));
    }

    #[test]
    fn test_restore_through_patch_chain() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path().join("repo")).unwrap();

        let v1 = vec![staged_fixture(tmp.path(), "a.txt", b"hello\n")];
        write_snapshot(&ctx, 1, &v1, 1.2).unwrap();

        let v2 = vec![staged_fixture(tmp.path(), "a.txt", b"hello!\n")];
        write_delta(&ctx, &GenericScanner, 2, 1, &v2, &DeltaFlavor::Binary).unwrap();

        let v3 = vec![staged_fixture(tmp.path(), "a.txt", b"hello!!\n")];
        write_delta(&ctx, &GenericScanner, 3, 2, &v3, &DeltaFlavor::Binary).unwrap();

        let out = tmp.path().join("v3.tar");
        materialize_archive(&ctx, 3, &out).unwrap();
        let entries = archive_entries(&out);
        assert_eq!(entries, vec![("a.txt".to_string(), b"hello!!\n".to_vec())]);

        // Intermediate versions stay reachable too
        let out2 = tmp.path().join("v2.tar");
        materialize_archive(&ctx, 2, &out2).unwrap();
        let entries2 = archive_entries(&out2);
        assert_eq!(entries2, vec![("a.txt".to_string(), b"hello!\n".to_vec())]);
    }

    #[test]
    fn test_restore_is_deterministic() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path().join("repo")).unwrap();

        let v1 = vec![staged_fixture(tmp.path(), "a.txt", b"base")];
        write_snapshot(&ctx, 1, &v1, 1.2).unwrap();
        let v2 = vec![staged_fixture(tmp.path(), "a.txt", b"edited")];
        write_delta(&ctx, &GenericScanner, 2, 1, &v2, &DeltaFlavor::Binary).unwrap();

        let first = tmp.path().join("first.tar");
        let second = tmp.path().join("second.tar");
        materialize_archive(&ctx, 2, &first).unwrap();
        materialize_archive(&ctx, 2, &second).unwrap();
        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[test]
    fn test_restore_legacy_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path().join("repo")).unwrap();

        // A legacy repository left an archive-format snapshot behind
        fs::create_dir_all(&ctx.objects_dir).unwrap();
        let staged = vec![staged_fixture(tmp.path(), "old.txt", b"from the old tool")];
        archive::pack_staged_files(&staged, &ctx.objects_dir.join("v1.tar")).unwrap();

        let out = tmp.path().join("v1.tar");
        materialize_archive(&ctx, 1, &out).unwrap();
        let entries = archive_entries(&out);
        assert_eq!(
            entries,
            vec![("old.txt".to_string(), b"from the old tool".to_vec())]
        );
    }

    #[test]
    fn test_restore_to_working_tree_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path().join("repo")).unwrap();

        // Logical paths may contain directories
        fs::create_dir_all(tmp.path().join("art")).unwrap();
        let staged = vec![staged_fixture(tmp.path(), "art/a.txt", b"committed")];
        write_snapshot(&ctx, 1, &staged, 1.2).unwrap();

        let work = tmp.path().join("work");
        fs::create_dir_all(work.join("art")).unwrap();
        fs::write(work.join("art/a.txt"), b"dirty local edit").unwrap();

        restore_to_version(&ctx, 1, &work).unwrap();
        assert_eq!(fs::read(work.join("art/a.txt")).unwrap(), b"committed");

        // No temp files survive the restore
        let leftovers: Vec<_> = fs::read_dir(&ctx.temp_dir).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_corrupt_patch_reports_patch_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path().join("repo")).unwrap();

        let v1 = vec![staged_fixture(tmp.path(), "a.txt", b"base")];
        write_snapshot(&ctx, 1, &v1, 1.2).unwrap();
        fs::write(ctx.patch_path(2, 1), b"not a real patch").unwrap();

        let out = tmp.path().join("v2.tar");
        let err = materialize_archive(&ctx, 2, &out).unwrap_err();
        assert!(matches!(
            err,
            Error::Restore(RestoreError::PatchFailed { version: 2, .. })
        ));

        let leftovers: Vec<_> = fs::read_dir(&ctx.temp_dir).unwrap().collect();
        assert!(leftovers.is_empty());
        assert!(!out.exists());
    }
}
