use std::num::NonZeroUsize;
use std::path::Path;

use constants::streaming::{
    DEFAULT_CHUNKS_PER_TICK, DEFAULT_POINTS_PER_CHUNK, FALLBACK_WORKERS, LARGE_READ_THRESHOLD,
    MAX_DEFAULT_WORKERS, READ_PART_SIZE,
};
use serde::{Deserialize, Serialize};

use crate::error::{LoadError, LoadResult};
use crate::source::ReadLimits;

/// Hardware parallelism capped at [`MAX_DEFAULT_WORKERS`], never below one.
pub fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(FALLBACK_WORKERS)
        .clamp(1, MAX_DEFAULT_WORKERS)
}

/// Tunables for one streaming load. Missing JSON fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub points_per_chunk: u64,
    pub max_workers: usize,
    pub large_read_threshold: u64,
    pub read_part_size: u64,
    /// Chunks handled per [`crate::StreamSession::tick`].
    pub chunks_per_tick: usize,
    pub keep_intensity: bool,
    /// Decode positions relative to the header's coordinate offset.
    pub recenter: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            points_per_chunk: DEFAULT_POINTS_PER_CHUNK,
            max_workers: default_max_workers(),
            large_read_threshold: LARGE_READ_THRESHOLD,
            read_part_size: READ_PART_SIZE,
            chunks_per_tick: DEFAULT_CHUNKS_PER_TICK,
            keep_intensity: true,
            recenter: false,
        }
    }
}

impl StreamConfig {
    pub fn from_json_str(json: &str) -> LoadResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> LoadResult<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> LoadResult<()> {
        if self.points_per_chunk == 0 {
            return Err(LoadError::Config("points_per_chunk must be positive".into()));
        }
        if self.max_workers == 0 {
            return Err(LoadError::Config("max_workers must be at least 1".into()));
        }
        if self.read_part_size == 0 {
            return Err(LoadError::Config("read_part_size must be positive".into()));
        }
        if self.chunks_per_tick == 0 {
            return Err(LoadError::Config("chunks_per_tick must be at least 1".into()));
        }
        Ok(())
    }

    pub fn read_limits(&self) -> ReadLimits {
        ReadLimits {
            large_read_threshold: self.large_read_threshold,
            part_size: self.read_part_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_workers_are_bounded() {
        let workers = default_max_workers();
        assert!((1..=MAX_DEFAULT_WORKERS).contains(&workers));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = StreamConfig::from_json_str(r#"{ "points_per_chunk": 5000, "recenter": true }"#).unwrap();
        assert_eq!(config.points_per_chunk, 5000);
        assert!(config.recenter);
        assert_eq!(config.read_part_size, READ_PART_SIZE);
        assert!(config.keep_intensity);
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let error = StreamConfig::from_json_str(r#"{ "points_per_chunk": 0 }"#).unwrap_err();
        assert!(matches!(error, LoadError::Config(_)));
    }

    #[test]
    fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.json");
        std::fs::write(&path, r#"{ "max_workers": 2, "chunks_per_tick": 3 }"#).unwrap();

        let config = StreamConfig::from_json_file(&path).unwrap();
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.chunks_per_tick, 3);
    }
}
