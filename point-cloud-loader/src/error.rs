//! Error types for header parsing, range reads and chunk decoding.

use std::io;

use thiserror::Error;

/// The header is not a usable uncompressed LAS header.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("header is {len} bytes, need at least {expected}")]
    HeaderTooShort { len: usize, expected: usize },
    #[error("not a LAS file: signature {found:?}, expected \"LASF\"")]
    BadSignature { found: String },
    #[error("compressed point data (format byte {format_byte:#04x}) is not supported")]
    Compressed { format_byte: u8 },
    #[error("point record length {length} is too short for point format {format}")]
    RecordTooShort { length: u16, format: u8 },
}

/// The header declares more points than the file can hold.
///
/// This is a warning, not a failure: streaming continues over the records
/// that are actually present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("header declares {declared} points but only {available} fit in the file")]
pub struct TruncatedData {
    pub declared: u64,
    pub available: u64,
}

/// A byte range could not be read, including after the part-by-part fallback.
#[derive(Debug, Error)]
#[error("failed to read bytes {start}..{end}")]
pub struct ReadFailure {
    pub start: u64,
    pub end: u64,
    #[source]
    pub source: io::Error,
}

/// A chunk handed to the worker pool did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeTaskError {
    #[error("decoding chunk {chunk_index} panicked: {message}")]
    Panicked { chunk_index: usize, message: String },
    #[error("decoding chunk {chunk_index} was cancelled")]
    Cancelled { chunk_index: usize },
    #[error("worker for chunk {chunk_index} dropped its result")]
    Disconnected { chunk_index: usize },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Read(#[from] ReadFailure),
    #[error(transparent)]
    DecodeTask(#[from] DecodeTaskError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to start decode workers: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),
    #[error("load cancelled")]
    Cancelled,
}

pub type LoadResult<T> = Result<T, LoadError>;
