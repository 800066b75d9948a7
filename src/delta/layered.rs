//! Layered-smart delta envelope.
//!
//! The artifact is a fixed ASCII header followed by the new document's
//! bytes under the fast codec:
//!
//! ```text
//! LAYERED_SMART_DELTA_V1\n
//! METADATA_LENGTH:<n>\n
//! <n bytes of change-analysis JSON>
//! \nBINARY_DATA:\n
//! <fast-codec stream of the new document's bytes>
//! ```
//!
//! The metadata JSON carries the [`ChangeAnalysis`] plus the document's
//! logical path, which restoration needs to rebuild the archive entry.

use crate::analyze::ChangeAnalysis;
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

/// First line of every layered-smart artifact
pub const MAGIC: &[u8] = b"LAYERED_SMART_DELTA_V1\n";
/// Separator between the metadata JSON and the compressed document
const BINARY_MARKER: &[u8] = b"\nBINARY_DATA:\n";

/// Metadata document embedded in the envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartDeltaMetadata {
    /// Logical path of the document this artifact replaces
    pub target_file: String,

    /// Semantic change summary against the base version
    #[serde(flatten)]
    pub analysis: ChangeAnalysis,
}

/// Write a layered-smart artifact at `dest`.
///
/// Returns the artifact size in bytes.
pub fn write_envelope(
    dest: &Path,
    metadata: &SmartDeltaMetadata,
    document: &Path,
) -> io::Result<u64> {
    let json = serde_json::to_vec(metadata)?;

    let mut out = File::create(dest)?;
    out.write_all(MAGIC)?;
    write!(out, "METADATA_LENGTH:{}\n", json.len())?;
    out.write_all(&json)?;
    out.write_all(BINARY_MARKER)?;

    let mut encoder = FrameEncoder::new(out);
    io::copy(&mut File::open(document)?, &mut encoder)?;
    let out = encoder
        .finish()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    out.sync_all()?;

    Ok(out.metadata()?.len())
}

/// Open a layered-smart artifact, returning its metadata and a reader
/// over the embedded document's decompressed bytes.
pub fn open_envelope(path: &Path) -> io::Result<(SmartDeltaMetadata, impl Read)> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    if line != MAGIC {
        return Err(invalid("bad magic line"));
    }

    line.clear();
    reader.read_until(b'\n', &mut line)?;
    let text = std::str::from_utf8(&line).map_err(|_| invalid("metadata length not ASCII"))?;
    let len: usize = text
        .trim_end_matches('\n')
        .strip_prefix("METADATA_LENGTH:")
        .ok_or_else(|| invalid("missing METADATA_LENGTH"))?
        .parse()
        .map_err(|_| invalid("unparsable metadata length"))?;

    let mut json = vec![0u8; len];
    reader.read_exact(&mut json)?;
    let metadata: SmartDeltaMetadata = serde_json::from_slice(&json)?;

    let mut marker = vec![0u8; BINARY_MARKER.len()];
    reader.read_exact(&mut marker)?;
    if marker != BINARY_MARKER {
        return Err(invalid("missing BINARY_DATA marker"));
    }

    Ok((metadata, FrameDecoder::new(reader)))
}

/// Read only the metadata of a layered-smart artifact
pub fn read_metadata(path: &Path) -> io::Result<SmartDeltaMetadata> {
    let (metadata, _) = open_envelope(path)?;
    Ok(metadata)
}

fn invalid(message: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("malformed layered-smart delta: {}", message),
    )
}
