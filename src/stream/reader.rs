//! Structured-stream record reader.
//!
//! The reader takes ownership of the decompressing transport and exposes
//! records one at a time; callers never see the codec layer. Content is
//! consumed through [`StructuredStreamReader::content_reader`] or one of
//! the copy/skip helpers; an unconsumed remainder is discarded
//! automatically when the next record is requested.

use std::io::{self, BufRead, BufReader, Read, Write};

/// Header of one structured-stream record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    /// Logical path of the file, verbatim bytes from the producer
    pub path: String,

    /// Exact content length in bytes
    pub size: u64,
}

/// Streaming reader over `FILE:path:size` records.
pub struct StructuredStreamReader<R: Read> {
    inner: BufReader<R>,
    pending: u64,
}

impl<R: Read> StructuredStreamReader<R> {
    /// Create a reader over a decompressing transport
    pub fn new(transport: R) -> Self {
        Self {
            inner: BufReader::new(transport),
            pending: 0,
        }
    }

    /// Advance to the next record header, discarding any unread content of
    /// the current record.
    ///
    /// Lines that do not parse as a record header are skipped; older
    /// producers occasionally emitted benign bytes between records.
    /// Returns `None` at end of stream.
    pub fn next_record(&mut self) -> io::Result<Option<RecordHeader>> {
        self.skip_content()?;

        let mut line = Vec::new();
        loop {
            line.clear();
            let n = self.inner.read_until(b'\n', &mut line)?;
            if n == 0 {
                return Ok(None);
            }
            if line.last() == Some(&b'\n') {
                line.pop();
            }

            let rest = match line.strip_prefix(b"FILE:") {
                Some(rest) => rest,
                None => continue,
            };
            let text = match std::str::from_utf8(rest) {
                Ok(text) => text,
                Err(_) => continue,
            };
            // The size sits after the last colon; logical paths may
            // themselves contain colons.
            let (path, size) = match text.rsplit_once(':') {
                Some(split) => split,
                None => continue,
            };
            let size: u64 = match size.parse() {
                Ok(size) => size,
                Err(_) => continue,
            };

            self.pending = size;
            return Ok(Some(RecordHeader {
                path: path.to_string(),
                size,
            }));
        }
    }

    /// Reader over the current record's remaining content bytes
    pub fn content_reader(&mut self) -> ContentReader<'_, R> {
        ContentReader { parent: self }
    }

    /// Copy the current record's content into a writer, returning the byte
    /// count. Fails with `UnexpectedEof` if the stream ends short.
    pub fn copy_content<W: Write>(&mut self, out: &mut W) -> io::Result<u64> {
        let expected = self.pending;
        let copied = io::copy(&mut self.content_reader(), out)?;
        if copied != expected {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("record truncated: expected {} bytes, got {}", expected, copied),
            ));
        }
        Ok(copied)
    }

    /// Read the current record's content into a fresh buffer
    pub fn read_content(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.pending.min(1 << 20) as usize);
        self.copy_content(&mut buf)?;
        Ok(buf)
    }

    /// Discard the current record's remaining content
    pub fn skip_content(&mut self) -> io::Result<()> {
        if self.pending > 0 {
            self.copy_content(&mut io::sink())?;
        }
        Ok(())
    }
}

/// Bounded reader over one record's content.
///
/// Borrows the stream reader so the record boundary survives partial reads.
pub struct ContentReader<'a, R: Read> {
    parent: &'a mut StructuredStreamReader<R>,
}

impl<R: Read> Read for ContentReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.parent.pending == 0 {
            return Ok(0);
        }
        let limit = buf.len().min(self.parent.pending as usize);
        let n = self.parent.inner.read(&mut buf[..limit])?;
        self.parent.pending -= n as u64;
        Ok(n)
    }
}
