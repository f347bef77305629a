//! Byte-for-byte content comparison.

use std::fs::File;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use crate::repository::MediaStream;

/// Compares content in fixed-size chunks.
#[derive(Debug, Clone, Copy)]
pub struct ContentEqualityChecker {
    chunk_size: usize,
}

impl Default for ContentEqualityChecker {
    fn default() -> Self {
        Self::new(8192)
    }
}

impl ContentEqualityChecker {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Whether the remaining content of both streams is identical.
    ///
    /// Lengths are compared before any content is read. Both streams are left
    /// at the position they had on entry.
    pub fn streams_equal<A, B>(&self, a: &mut A, b: &mut B) -> io::Result<bool>
    where
        A: Read + Seek + ?Sized,
        B: Read + Seek + ?Sized,
    {
        let a_start = a.stream_position()?;
        let b_start = b.stream_position()?;

        let result = self.compare_from(a, a_start, b, b_start);

        a.seek(SeekFrom::Start(a_start))?;
        b.seek(SeekFrom::Start(b_start))?;
        result
    }

    /// Whether the file at `path` holds exactly the content of `stream`.
    ///
    /// A missing file never matches.
    pub fn file_matches(&self, path: &Path, stream: &mut MediaStream) -> io::Result<bool> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        if file.metadata()?.len() != stream.len() {
            return Ok(false);
        }

        stream.seek(SeekFrom::Start(0))?;
        self.streams_equal(&mut file, stream)
    }

    fn compare_from<A, B>(&self, a: &mut A, a_start: u64, b: &mut B, b_start: u64) -> io::Result<bool>
    where
        A: Read + Seek + ?Sized,
        B: Read + Seek + ?Sized,
    {
        let a_len = a.seek(SeekFrom::End(0))?.saturating_sub(a_start);
        let b_len = b.seek(SeekFrom::End(0))?.saturating_sub(b_start);
        if a_len != b_len {
            return Ok(false);
        }

        a.seek(SeekFrom::Start(a_start))?;
        b.seek(SeekFrom::Start(b_start))?;

        let mut a_buf = vec![0u8; self.chunk_size];
        let mut b_buf = vec![0u8; self.chunk_size];
        loop {
            let a_read = fill(a, &mut a_buf)?;
            let b_read = fill(b, &mut b_buf)?;
            if a_read != b_read || a_buf[..a_read] != b_buf[..b_read] {
                return Ok(false);
            }
            if a_read == 0 {
                return Ok(true);
            }
        }
    }
}

/// Read until `buf` is full or the reader is exhausted.
fn fill<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
