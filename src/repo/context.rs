//! Resolved repository paths and startup repair.
//!
//! Every operation receives a [`RepositoryContext`] rather than reaching
//! for ambient process state: the context owns the resolved absolute paths
//! of the fixed layout and hands out uniquely named temp files. There is
//! no module-level mutable state anywhere in the engine.

use crate::core::error::Result;
use crate::repo::records;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Extension of fast-codec snapshot artifacts
pub const FAST_CODEC_EXT: &str = "lz4";
/// Extension of higher-ratio optimized artifacts
pub const HIGH_RATIO_EXT: &str = "zst";
/// Extension of binary-patch artifacts
pub const PATCH_EXT: &str = "bsdiff";
/// Canonical extension of layered-smart delta artifacts
pub const SMART_EXT: &str = "smart";
/// Legacy extension of layered-smart delta artifacts, honored on read
pub const SMART_EXT_LEGACY: &str = "psd_smart";
/// Extension of archive-format artifacts (legacy snapshots, temp archives)
pub const ARCHIVE_EXT: &str = "tar";

/// Resolved absolute paths of one repository.
///
/// The engine exclusively owns everything under `root`; the initializer
/// collaborator creates the layout once, and [`RepositoryContext::open`]
/// verifies and repairs it afterwards.
#[derive(Debug, Clone)]
pub struct RepositoryContext {
    root: PathBuf,
    /// `HEAD` file holding the current commit hash
    pub head_file: PathBuf,
    /// Full snapshots
    pub snapshots_dir: PathBuf,
    /// Delta artifacts and optimized snapshot copies
    pub deltas_dir: PathBuf,
    /// Commit records
    pub commits_dir: PathBuf,
    /// Legacy archive-format snapshots, read-only for the engine
    pub objects_dir: PathBuf,
    /// Ephemeral working area, never read by other components
    pub temp_dir: PathBuf,
}

impl RepositoryContext {
    /// Open a repository root, creating any missing fixed subdirectories
    /// and clearing leftover temp files.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let ctx = Self {
            head_file: root.join("HEAD"),
            snapshots_dir: root.join("snapshots"),
            deltas_dir: root.join("deltas"),
            commits_dir: root.join("commits"),
            objects_dir: root.join("objects"),
            temp_dir: root.join("temp"),
            root,
        };

        for dir in [
            &ctx.snapshots_dir,
            &ctx.deltas_dir,
            &ctx.commits_dir,
            &ctx.temp_dir,
        ] {
            fs::create_dir_all(dir)?;
        }
        if !ctx.head_file.exists() {
            fs::write(&ctx.head_file, b"")?;
        }

        ctx.clear_temp()?;
        Ok(ctx)
    }

    /// Repository root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A path expressed relative to the repository root, for persistence
    /// in commit records
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    /// Uniquely named file in the temp area
    pub fn temp_path(&self, stem: &str, ext: &str) -> PathBuf {
        self.temp_dir
            .join(format!("{}_{}.{}", stem, Uuid::new_v4().simple(), ext))
    }

    /// Path of a full snapshot artifact
    pub fn snapshot_path(&self, version: u32) -> PathBuf {
        self.snapshots_dir
            .join(format!("v{}.{}", version, FAST_CODEC_EXT))
    }

    /// Path of a binary-patch artifact
    pub fn patch_path(&self, version: u32, base: u32) -> PathBuf {
        self.deltas_dir
            .join(format!("v{}_from_v{}.{}", version, base, PATCH_EXT))
    }

    /// Path of a layered-smart delta artifact (canonical extension)
    pub fn smart_path(&self, version: u32, base: u32) -> PathBuf {
        self.deltas_dir
            .join(format!("v{}_from_v{}.{}", version, base, SMART_EXT))
    }

    /// Path of a background-optimized snapshot copy
    pub fn optimized_path(&self, version: u32) -> PathBuf {
        self.deltas_dir
            .join(format!("v{}_optimized.{}", version, HIGH_RATIO_EXT))
    }

    /// Path of a commit record
    pub fn commit_path(&self, version: u32) -> PathBuf {
        self.commits_dir.join(format!("v{}.json", version))
    }

    /// Remove every file in the temp area
    pub fn clear_temp(&self) -> Result<()> {
        for entry in fs::read_dir(&self.temp_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                debug!(path = %entry.path().display(), "removing leftover temp file");
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// Recover from a crash mid-commit.
    ///
    /// Three interrupted states are possible, in write order: an artifact
    /// without its commit record (orphan, garbage-collected here), a
    /// commit record without a HEAD update (HEAD repaired here), and
    /// partial optimized copies (swept with the temp area).
    pub fn startup_repair(&self) -> Result<()> {
        let max_version = records::current_version(self)?;

        self.collect_orphans(&self.snapshots_dir, max_version)?;
        self.collect_orphans(&self.deltas_dir, max_version)?;

        // HEAD must point at the newest record, or be empty when there is
        // no history at all.
        let expected = if max_version == 0 {
            String::new()
        } else {
            records::load_record(self, max_version)?.hash
        };
        let actual = records::read_head(self)?;
        if actual != expected {
            warn!(
                found = %actual,
                expected = %expected,
                "repairing HEAD after interrupted commit"
            );
            records::write_head(self, &expected)?;
        }

        Ok(())
    }

    /// Delete artifacts whose version has no commit record
    fn collect_orphans(&self, dir: &Path, max_version: u32) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(version) = artifact_version(&name) else {
                continue;
            };
            if version > max_version || !self.commit_path(version).is_file() {
                info!(artifact = %name, version, "garbage-collecting orphaned artifact");
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

/// Parse the version out of an artifact file name such as `v12.lz4`,
/// `v12_from_v11.bsdiff` or `v12_optimized.zst`
pub fn artifact_version(name: &str) -> Option<u32> {
    let digits: String = name
        .strip_prefix('v')?
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Removes a file on drop unless disarmed.
///
/// Temp archives and partially written artifacts are wrapped in a guard so
/// they disappear on every exit path, error paths included.
#[derive(Debug)]
pub struct TempGuard {
    path: PathBuf,
    armed: bool,
}

impl TempGuard {
    /// Guard a path that should be removed unless kept explicitly
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    /// Keep the file; the guard no longer removes it
    pub fn disarm(mut self) {
        self.armed = false;
    }

    /// Guarded path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if self.armed && self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "failed to remove temp file");
            }
        }
    }
}
