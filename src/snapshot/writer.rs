//! Full-snapshot writer.
//!
//! Streams the staged files through the structured-stream codec into the
//! snapshots area under the fast block compressor, then validates the
//! result sizes before reporting success.

use crate::core::error::SnapshotError;
use crate::core::types::StagedFile;
use crate::repo::context::RepositoryContext;
use crate::repo::records::{CompressionInfo, StrategyKind};
use crate::stream::StructuredStreamWriter;
use lz4_flex::frame::FrameEncoder;
use std::fs::File;
use std::io;
use std::time::Instant;
use tracing::{info, warn};

/// Validate input/output sizes of a finished snapshot.
///
/// Factored out of the write path so the rejection thresholds are testable
/// without fabricating pathological codec output.
fn validate_sizes(bytes_in: u64, bytes_out: u64, expansion_limit: f64) -> Result<(), SnapshotError> {
    if bytes_in == 0 {
        return Err(SnapshotError::NoData);
    }
    if bytes_out == 0 {
        return Err(SnapshotError::EmptyOutput);
    }
    if bytes_out as f64 > bytes_in as f64 * expansion_limit {
        return Err(SnapshotError::CompressionExpanded {
            input: bytes_in,
            output: bytes_out,
        });
    }
    Ok(())
}

/// Write the full snapshot artifact for `version`.
///
/// Unreadable staged files are skipped with a warning; the snapshot is
/// still produced and the skipped file will read back as deleted when the
/// version is restored. Files are written in logical-path order so the
/// artifact bytes are deterministic for a given input set.
pub fn write_snapshot(
    ctx: &RepositoryContext,
    version: u32,
    staged: &[StagedFile],
    expansion_limit: f64,
) -> Result<CompressionInfo, SnapshotError> {
    let start = Instant::now();
    let output = ctx.snapshot_path(version);

    let mut ordered: Vec<&StagedFile> = staged.iter().collect();
    ordered.sort_by(|a, b| a.logical_path.cmp(&b.logical_path));

    let file = File::create(&output)?;
    let mut writer = StructuredStreamWriter::new(FrameEncoder::new(file));

    let mut skipped = 0usize;
    for entry in &ordered {
        if let Err(e) = writer.append_file(&entry.logical_path, &entry.absolute_path) {
            warn!(
                path = %entry.logical_path,
                error = %e,
                "skipping unreadable staged file"
            );
            skipped += 1;
        }
    }

    let bytes_in = writer.bytes_in();
    let encoder = writer.finish()?;
    let file = encoder
        .finish()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    file.sync_all()?;
    let bytes_out = file.metadata()?.len();

    if let Err(e) = validate_sizes(bytes_in, bytes_out, expansion_limit) {
        let _ = std::fs::remove_file(&output);
        return Err(e);
    }

    let elapsed_ms = start.elapsed().as_millis() as u64;
    info!(
        version,
        files = ordered.len() - skipped,
        skipped,
        bytes_in,
        bytes_out,
        elapsed_ms,
        "wrote full snapshot"
    );

    Ok(CompressionInfo {
        strategy: StrategyKind::FastSnapshot,
        output_file: ctx.relative(&output),
        original_size: bytes_in,
        compressed_size: bytes_out,
        compression_ratio: bytes_out as f64 / bytes_in as f64,
        base_version: None,
        compression_time_ms: elapsed_ms,
        created_at: chrono::Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream;
    use std::fs;
    use std::path::Path;

    fn staged_fixture(dir: &Path, name: &str, content: &[u8]) -> StagedFile {
        let abs = dir.join(name);
        fs::write(&abs, content).unwrap();
        StagedFile::from_paths(abs, name).unwrap()
    }

    #[test]
    fn test_snapshot_round_trips_through_stream_reader() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path().join("repo")).unwrap();
        let staged = vec![
            staged_fixture(tmp.path(), "b.txt", b"second"),
            staged_fixture(tmp.path(), "a.txt", b"first"),
        ];

        let info = write_snapshot(&ctx, 1, &staged, 1.2).unwrap();
        assert_eq!(info.strategy, StrategyKind::FastSnapshot);
        assert_eq!(info.original_size, 11);
        assert!(info.compressed_size > 0);
        assert_eq!(info.base_version, None);
        assert_eq!(info.output_file, "snapshots/v1.lz4");

        // Entries come back sorted by logical path
        let mut reader = stream::open_lz4(&ctx.snapshot_path(1)).unwrap();
        let first = reader.next_record().unwrap().unwrap();
        assert_eq!(first.path, "a.txt");
        assert_eq!(reader.read_content().unwrap(), b"first");
        let second = reader.next_record().unwrap().unwrap();
        assert_eq!(second.path, "b.txt");
        assert_eq!(reader.read_content().unwrap(), b"second");
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_empty_input_fails_with_no_data() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path().join("repo")).unwrap();

        let err = write_snapshot(&ctx, 1, &[], 1.2).unwrap_err();
        assert!(matches!(err, SnapshotError::NoData));
        assert!(!ctx.snapshot_path(1).exists());
    }

    #[test]
    fn test_all_files_skipped_fails_with_no_data() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path().join("repo")).unwrap();

        let gone = staged_fixture(tmp.path(), "gone.bin", b"bytes");
        fs::remove_file(&gone.absolute_path).unwrap();

        let err = write_snapshot(&ctx, 1, &[gone], 1.2).unwrap_err();
        assert!(matches!(err, SnapshotError::NoData));
        assert!(!ctx.snapshot_path(1).exists());
    }

    #[test]
    fn test_skipped_file_still_produces_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext::open(tmp.path().join("repo")).unwrap();

        let kept = staged_fixture(tmp.path(), "kept.txt", b"kept");
        let gone = staged_fixture(tmp.path(), "gone.txt", b"gone");
        fs::remove_file(&gone.absolute_path).unwrap();

        let info = write_snapshot(&ctx, 1, &[kept, gone], 1.2).unwrap();
        assert_eq!(info.original_size, 4);

        let mut reader = stream::open_lz4(&ctx.snapshot_path(1)).unwrap();
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.path, "kept.txt");
        reader.skip_content().unwrap();
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_size_validation_thresholds() {
        assert!(matches!(validate_sizes(0, 0, 1.2), Err(SnapshotError::NoData)));
        assert!(matches!(
            validate_sizes(100, 0, 1.2),
            Err(SnapshotError::EmptyOutput)
        ));
        assert!(matches!(
            validate_sizes(100, 121, 1.2),
            Err(SnapshotError::CompressionExpanded { input: 100, output: 121 })
        ));
        assert!(validate_sizes(100, 120, 1.2).is_ok());
        assert!(validate_sizes(100, 50, 1.2).is_ok());
    }
}
