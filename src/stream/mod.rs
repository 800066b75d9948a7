//! Structured-stream codec for multi-file snapshot artifacts.
//!
//! The container layers a tiny self-describing format inside a single
//! block-compressed stream. Each file is one record:
//!
//! ```text
//! FILE:<logical-path>:<byte-size>\n
//! <exactly byte-size bytes of content, no terminator>
//! ```
//!
//! Records are concatenated with no index and no global header; the whole
//! concatenation is fed to the block compressor as one stream. Logical
//! paths are passed through verbatim.

pub mod reader;
pub mod writer;

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

pub use reader::{RecordHeader, StructuredStreamReader};
pub use writer::StructuredStreamWriter;

/// Structured-stream reader over any decompressing transport
pub type BoxedStreamReader = StructuredStreamReader<Box<dyn Read>>;

/// Open a snapshot artifact compressed with the fast block codec
pub fn open_lz4(path: &Path) -> io::Result<BoxedStreamReader> {
    let file = File::open(path)?;
    let transport: Box<dyn Read> = Box::new(lz4_flex::frame::FrameDecoder::new(file));
    Ok(StructuredStreamReader::new(transport))
}

/// Open an optimized artifact compressed with the higher-ratio codec
pub fn open_zstd(path: &Path) -> io::Result<BoxedStreamReader> {
    let file = File::open(path)?;
    let transport: Box<dyn Read> = Box::new(zstd::stream::Decoder::new(file)?);
    Ok(StructuredStreamReader::new(transport))
}
