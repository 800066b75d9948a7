//! Version fingerprints and working-tree comparison.
//!
//! The fingerprint pipeline materializes a version's archive and hashes
//! every entry in one streaming pass; the resulting `path -> sha256` map
//! is the externally observable artifact consumed by status display.

use crate::archive;
use crate::core::error::Result;
use crate::repo::context::{RepositoryContext, TempGuard};
use crate::restore;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Disjoint path sets produced by comparing a version with the working tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    /// Paths present in both whose content hashes differ
    pub modified: Vec<String>,

    /// Paths present only in the working tree
    pub untracked: Vec<String>,

    /// Paths present only in the committed version
    pub deleted: Vec<String>,

    /// Reserved; populated by the staging collaborator
    pub staged: Vec<String>,
}

/// Write adapter feeding a digest, so archive entries hash in a single
/// streaming pass
struct DigestWriter<'a>(&'a mut Sha256);

impl Write for DigestWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Per-path SHA-256 of every file materialized at `version`
pub fn snapshot_file_hashes(
    ctx: &RepositoryContext,
    version: u32,
) -> Result<BTreeMap<String, String>> {
    let archive_tmp = ctx.temp_path(&format!("hashes_v{}", version), "tar");
    let _guard = TempGuard::new(&archive_tmp);
    restore::materialize_archive(ctx, version, &archive_tmp)?;

    let mut hashes = BTreeMap::new();
    archive::for_each_entry(&archive_tmp, |path, content| {
        let mut hasher = Sha256::new();
        io::copy(content, &mut DigestWriter(&mut hasher))?;
        hashes.insert(path.to_string(), hex::encode(hasher.finalize()));
        Ok(())
    })?;

    Ok(hashes)
}

/// SHA-256 of one file on disk, streamed
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut File::open(path)?, &mut DigestWriter(&mut hasher))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Compare a committed version against a working tree.
///
/// The `staged` set is left empty; the staging collaborator owns it.
pub fn working_tree_status(
    ctx: &RepositoryContext,
    version: u32,
    working_root: &Path,
) -> Result<StatusReport> {
    let committed = snapshot_file_hashes(ctx, version)?;

    let mut working = BTreeMap::new();
    collect_working_files(working_root, working_root, ctx.root(), &mut working)?;

    let mut report = StatusReport::default();
    for (path, hash) in &working {
        match committed.get(path) {
            Some(committed_hash) if committed_hash != hash => report.modified.push(path.clone()),
            Some(_) => {}
            None => report.untracked.push(path.clone()),
        }
    }
    for path in committed.keys() {
        if !working.contains_key(path) {
            report.deleted.push(path.clone());
        }
    }

    Ok(report)
}

/// Recursively hash the working tree, skipping anything under the
/// repository root itself
fn collect_working_files(
    root: &Path,
    dir: &Path,
    repo_root: &Path,
    out: &mut BTreeMap<String, String>,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path == repo_root {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_working_files(root, &path, repo_root, out)?;
        } else if file_type.is_file() {
            let logical = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            let mut reader = File::open(&path)?;
            let mut hasher = Sha256::new();
            io::copy(&mut reader, &mut DigestWriter(&mut hasher))?;
            out.insert(logical, hex::encode(hasher.finalize()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::StagedFile;
    use crate::snapshot::writer::write_snapshot;
    use std::fs;

    fn staged_fixture(dir: &Path, name: &str, content: &[u8]) -> StagedFile {
        let abs = dir.join(name);
        fs::write(&abs, content).unwrap();
        StagedFile::from_paths(abs, name).unwrap()
    }

    fn sha256_hex(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    #[test]
    fn test_hashes_match_content_digests() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path().join("repo")).unwrap();

        let staged = vec![
            staged_fixture(tmp.path(), "a.txt", b"hello\n"),
            staged_fixture(tmp.path(), "b.bin", &[1, 2, 3]),
        ];
        write_snapshot(&ctx, 1, &staged, 1.2).unwrap();

        let hashes = snapshot_file_hashes(&ctx, 1).unwrap();
        assert_eq!(hashes.len(), 2);
        assert_eq!(hashes["a.txt"], sha256_hex(b"hello\n"));
        assert_eq!(hashes["b.bin"], sha256_hex(&[1, 2, 3]));

        // The temp archive is gone once the map is built
        let leftovers: Vec<_> = fs::read_dir(&ctx.temp_dir).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_status_sets_are_disjoint_and_complete() {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("work");
        fs::create_dir_all(&work).unwrap();
        let ctx = RepositoryContext::open(work.join(".vault")).unwrap();

        let staged = vec![
            staged_fixture(&work, "same.txt", b"unchanged"),
            staged_fixture(&work, "edit.txt", b"original"),
            staged_fixture(&work, "gone.txt", b"will vanish"),
        ];
        write_snapshot(&ctx, 1, &staged, 1.2).unwrap();

        fs::write(work.join("edit.txt"), b"changed").unwrap();
        fs::remove_file(work.join("gone.txt")).unwrap();
        fs::write(work.join("new.txt"), b"brand new").unwrap();

        let report = working_tree_status(&ctx, 1, &work).unwrap();
        assert_eq!(report.modified, vec!["edit.txt"]);
        assert_eq!(report.untracked, vec!["new.txt"]);
        assert_eq!(report.deleted, vec!["gone.txt"]);
        assert!(report.staged.is_empty());
    }

    #[test]
    fn test_repository_root_is_not_scanned() {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("work");
        fs::create_dir_all(&work).unwrap();
        let ctx = RepositoryContext::open(work.join(".vault")).unwrap();

        let staged = vec![staged_fixture(&work, "a.txt", b"content")];
        write_snapshot(&ctx, 1, &staged, 1.2).unwrap();

        let report = working_tree_status(&ctx, 1, &work).unwrap();
        // Nothing under .vault/ leaks into the untracked set
        assert!(report.untracked.is_empty());
    }
}
