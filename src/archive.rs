//! Byte-stable archive container for diffing and restoration.
//!
//! Deltas are computed between uncompressed archives of two versions, so
//! the archive bytes must be deterministic: entries are written in the
//! order the caller supplies (sorted by logical path at the call sites)
//! with fixed ownership, mode and timestamp fields. Restoring the same
//! repository state always produces the identical byte sequence.

use crate::core::error::Result;
use crate::core::types::StagedFile;
use crate::stream::BoxedStreamReader;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::warn;

/// Totals produced while packing staged files
#[derive(Debug, Clone, Copy, Default)]
pub struct PackSummary {
    /// Uncompressed content bytes packed
    pub bytes_in: u64,
    /// Files that could not be read and were skipped with a warning
    pub skipped: usize,
}

/// Header with fixed ownership and timestamp fields.
///
/// Only size and path vary between entries, which keeps the archive bytes
/// stable across machines and runs.
fn deterministic_header(size: u64) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_size(size);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header
}

/// Pack staged files into an uncompressed archive at `dest`.
///
/// Each file's full content is read once; unreadable files are skipped
/// with a warning and the archive is still produced, matching the
/// snapshot writer's skip policy. The input slice must already be in the
/// intended entry order.
pub fn pack_staged_files(staged: &[StagedFile], dest: &Path) -> Result<PackSummary> {
    let file = File::create(dest)?;
    let mut builder = tar::Builder::new(BufWriter::new(file));
    let mut summary = PackSummary::default();

    for entry in staged {
        let mut content = Vec::new();
        match File::open(&entry.absolute_path).and_then(|mut f| f.read_to_end(&mut content)) {
            Ok(_) => {}
            Err(e) => {
                warn!(
                    path = %entry.logical_path,
                    error = %e,
                    "skipping unreadable staged file"
                );
                summary.skipped += 1;
                continue;
            }
        }

        let mut header = deterministic_header(content.len() as u64);
        builder.append_data(&mut header, &entry.logical_path, content.as_slice())?;
        summary.bytes_in += content.len() as u64;
    }

    let writer = builder.into_inner()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(summary)
}

/// Replay a structured stream into an archive at `dest`, returning the
/// content bytes transferred.
pub fn stream_to_archive(reader: &mut BoxedStreamReader, dest: &Path) -> Result<u64> {
    let file = File::create(dest)?;
    let mut builder = tar::Builder::new(BufWriter::new(file));
    let mut total = 0u64;

    while let Some(record) = reader.next_record()? {
        let mut header = deterministic_header(record.size);
        builder.append_data(&mut header, &record.path, reader.content_reader())?;
        total += record.size;
    }

    let writer = builder.into_inner()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(total)
}

/// Write an archive holding a single entry streamed from `content`.
///
/// Used when a self-contained layered-smart artifact replaces the whole
/// version with one embedded document.
pub fn single_entry_archive(
    logical_path: &str,
    content: &mut dyn Read,
    dest: &Path,
) -> Result<u64> {
    let mut buffered = Vec::new();
    content.read_to_end(&mut buffered)?;

    let file = File::create(dest)?;
    let mut builder = tar::Builder::new(BufWriter::new(file));
    let mut header = deterministic_header(buffered.len() as u64);
    builder.append_data(&mut header, logical_path, buffered.as_slice())?;

    let writer = builder.into_inner()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(buffered.len() as u64)
}

/// Visit every entry of an archive in order.
///
/// The callback receives the entry's logical path and a reader over its
/// content bytes.
pub fn for_each_entry<F>(archive: &Path, mut visit: F) -> Result<()>
where
    F: FnMut(&str, &mut dyn Read) -> Result<()>,
{
    let file = File::open(archive)?;
    let mut reader = tar::Archive::new(BufReader::new(file));

    for entry in reader.entries()? {
        let mut entry = entry?;
        let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        visit(&path, &mut entry)?;
    }
    Ok(())
}

/// Extract a single entry's content by logical path, if present
pub fn entry_bytes(archive: &Path, logical_path: &str) -> Result<Option<Vec<u8>>> {
    let mut found = None;
    for_each_entry(archive, |path, content| {
        if found.is_none() && path == logical_path {
            let mut buf = Vec::new();
            content.read_to_end(&mut buf)?;
            found = Some(buf);
        }
        Ok(())
    })?;
    Ok(found)
}

/// Unpack every entry of an archive under `dest_root`, overwriting
/// existing files. Parent directories are created as needed.
pub fn unpack_to_dir(archive: &Path, dest_root: &Path) -> Result<()> {
    for_each_entry(archive, |path, content| {
        let target = dest_root.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(content, &mut out)?;
        out.flush()?;
        Ok(())
    })
}
