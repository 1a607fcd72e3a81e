//! Streaming loader for uncompressed LAS point clouds.
//!
//! A file is read as a fixed header followed by fixed-length point records.
//! The loader plans byte ranges of whole records, reads each range on the
//! coordinator, and decodes it either inline or on a bounded worker pool.
//! Decoded chunks are collected in file order into a [`StreamResult`].

pub mod bounds;
pub mod chunk;
pub mod config;
pub mod crosscheck;
pub mod error;
pub mod header;
pub mod pool;
pub mod record;
pub mod source;
pub mod streamer;
pub mod synthetic;

pub use bounds::Bounds;
pub use chunk::{Chunk, ChunkPlan, StreamResult, plan_chunks};
pub use config::StreamConfig;
pub use error::{DecodeTaskError, FormatError, LoadError, LoadResult, ReadFailure, TruncatedData};
pub use header::{LasHeader, Version, decode_header, encode_header};
pub use pool::{DecodeWorkerPool, PendingChunk};
pub use record::{RecordLayout, decode_records};
pub use source::{ChunkSource, FileSource, MemorySource};
pub use streamer::{CancellationToken, StreamSession, StreamStep, stream_chunks, stream_chunks_parallel};
