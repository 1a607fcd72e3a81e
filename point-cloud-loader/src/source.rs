//! Random-access byte sources and the large-read fallback.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::ReadFailure;

/// Anything the streamer can read byte ranges from.
pub trait ChunkSource {
    /// Total size in bytes.
    fn size(&self) -> u64;

    /// Read `start..end`. Callers keep `end` within [`ChunkSource::size`].
    fn read_range(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>>;
}

impl<S: ChunkSource + ?Sized> ChunkSource for &mut S {
    fn size(&self) -> u64 {
        (**self).size()
    }

    fn read_range(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        (**self).read_range(start, end)
    }
}

impl<S: ChunkSource + ?Sized> ChunkSource for Box<S> {
    fn size(&self) -> u64 {
        (**self).size()
    }

    fn read_range(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        (**self).read_range(start, end)
    }
}

/// A file on disk, read with seek + read_exact.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    size: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self { file, size })
    }
}

impl ChunkSource for FileSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let len = usize::try_from(end.saturating_sub(start))
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "range too large"))?;
        let mut buffer = vec![0u8; len];
        self.file.seek(SeekFrom::Start(start))?;
        self.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }
}

/// An in-memory file.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }
}

impl From<Vec<u8>> for MemorySource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl ChunkSource for MemorySource {
    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_range(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let range = usize::try_from(start).ok().zip(usize::try_from(end).ok());
        match range {
            Some((start, end)) if start <= end && end <= self.bytes.len() => {
                Ok(self.bytes[start..end].to_vec())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("range {start}..{end} is outside {} bytes", self.bytes.len()),
            )),
        }
    }
}

/// Size limits for [`read_with_fallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLimits {
    pub large_read_threshold: u64,
    pub part_size: u64,
}

/// Read `start..end` in one go, retrying part by part when a large read fails.
///
/// `end` is clamped to the source size and an empty range reads nothing.
/// Reads at or below the threshold fail straight away; larger ones are
/// retried as consecutive `part_size` reads whose bytes are concatenated.
pub fn read_with_fallback<S: ChunkSource + ?Sized>(
    source: &mut S,
    start: u64,
    end: u64,
    limits: ReadLimits,
) -> Result<Vec<u8>, ReadFailure> {
    let end = end.min(source.size());
    if start >= end {
        return Ok(Vec::new());
    }

    let error = match source.read_range(start, end) {
        Ok(bytes) => return Ok(bytes),
        Err(error) => error,
    };
    let len = end - start;
    if len <= limits.large_read_threshold || limits.part_size == 0 {
        return Err(ReadFailure {
            start,
            end,
            source: error,
        });
    }

    tracing::warn!(
        start,
        end,
        part_size = limits.part_size,
        %error,
        "large read failed, retrying in parts"
    );

    let mut bytes = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
    let mut part_start = start;
    while part_start < end {
        let part_end = (part_start + limits.part_size).min(end);
        let part = source
            .read_range(part_start, part_end)
            .map_err(|source| ReadFailure {
                start: part_start,
                end: part_end,
                source,
            })?;
        bytes.extend_from_slice(&part);
        part_start = part_end;
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fails any read longer than `max_read` bytes.
    struct Picky {
        inner: MemorySource,
        max_read: u64,
        reads: Vec<(u64, u64)>,
    }

    impl ChunkSource for Picky {
        fn size(&self) -> u64 {
            self.inner.size()
        }

        fn read_range(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>> {
            self.reads.push((start, end));
            if end - start > self.max_read {
                return Err(io::Error::new(io::ErrorKind::OutOfMemory, "read too large"));
            }
            self.inner.read_range(start, end)
        }
    }

    fn picky(len: usize, max_read: u64) -> Picky {
        Picky {
            inner: MemorySource::new((0..len).map(|i| (i % 251) as u8).collect()),
            max_read,
            reads: Vec::new(),
        }
    }

    const LIMITS: ReadLimits = ReadLimits {
        large_read_threshold: 100,
        part_size: 40,
    };

    #[test]
    fn large_reads_fall_back_to_parts() {
        let mut source = picky(1_000, 50);
        let bytes = read_with_fallback(&mut source, 10, 210, LIMITS).unwrap();

        assert_eq!(bytes, source.inner.read_range(10, 210).unwrap());
        assert_eq!(source.reads[0], (10, 210));
        assert_eq!(&source.reads[1..], &[(10, 50), (50, 90), (90, 130), (130, 170), (170, 210)]);
    }

    #[test]
    fn small_reads_fail_without_retry() {
        let mut source = picky(1_000, 10);
        let error = read_with_fallback(&mut source, 0, 80, LIMITS).unwrap_err();

        assert_eq!((error.start, error.end), (0, 80));
        assert_eq!(source.reads.len(), 1);
    }

    #[test]
    fn failing_part_reports_its_range() {
        let mut source = picky(1_000, 10);
        let error = read_with_fallback(&mut source, 0, 200, LIMITS).unwrap_err();
        assert_eq!((error.start, error.end), (0, 40));
    }

    #[test]
    fn end_is_clamped_and_empty_ranges_read_nothing() {
        let mut source = MemorySource::new(vec![7; 64]);
        assert_eq!(read_with_fallback(&mut source, 60, 500, LIMITS).unwrap(), vec![7; 4]);
        assert!(read_with_fallback(&mut source, 64, 500, LIMITS).unwrap().is_empty());
    }
}
